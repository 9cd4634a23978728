//! Default SeaORM-backed ledger implementation.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::ledger::{LedgerStore, NewTransaction};
use crate::models::{journal, journal_link};
use crate::repositories::journal::JournalRepository;
use crate::repositories::transaction::ImportedTransactionRepository;

/// Ledger store backed by the service database.
#[derive(Debug, Clone)]
pub struct SeaOrmLedger {
    journals: JournalRepository,
    transactions: ImportedTransactionRepository,
}

impl SeaOrmLedger {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            journals: JournalRepository::new(db.clone()),
            transactions: ImportedTransactionRepository::new(db),
        }
    }
}

#[async_trait]
impl LedgerStore for SeaOrmLedger {
    async fn journals(&self) -> Result<Vec<journal::Model>> {
        self.journals.list().await
    }

    async fn record_link(
        &self,
        connection_id: &Uuid,
        iban: &str,
        journal_id: &Uuid,
        balance: Option<Decimal>,
    ) -> Result<()> {
        self.journals
            .record_link(connection_id, iban, journal_id, balance)
            .await?;
        Ok(())
    }

    async fn links_for(&self, connection_id: &Uuid) -> Result<Vec<journal_link::Model>> {
        self.journals.links_for_connection(connection_id).await
    }

    async fn transaction_exists(&self, trn_ref_no: &str) -> Result<bool> {
        self.transactions.exists(trn_ref_no).await
    }

    async fn insert_transactions(&self, batch: &[NewTransaction]) -> Result<usize> {
        self.transactions.insert_batch(batch).await
    }

    async fn create_journal(
        &self,
        name: &str,
        account_number: &str,
        currency: &str,
    ) -> Result<journal::Model> {
        self.journals.create(name, account_number, currency).await
    }
}
