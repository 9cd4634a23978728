//! Imported transaction repository
//!
//! Batch inserts with duplicate tolerance: the unique index on trn_ref_no
//! is the storage-level half of the dedup invariant, and a violation of it
//! is treated as a no-op rather than an error.

use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::is_unique_violation;
use crate::ledger::NewTransaction;
use crate::models::imported_transaction::{self, Entity as ImportedTransaction};

/// Repository for imported transaction operations
#[derive(Debug, Clone)]
pub struct ImportedTransactionRepository {
    pub db: Arc<DatabaseConnection>,
}

impl ImportedTransactionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Whether a remote reference has already been imported, ever.
    pub async fn exists(&self, trn_ref_no: &str) -> Result<bool> {
        Ok(ImportedTransaction::find()
            .filter(imported_transaction::Column::TrnRefNo.eq(trn_ref_no))
            .one(&*self.db)
            .await?
            .is_some())
    }

    /// Inserts a batch, skipping rows whose reference already exists.
    /// Returns the number of rows actually written.
    pub async fn insert_batch(&self, batch: &[NewTransaction]) -> Result<usize> {
        let mut inserted = 0;

        for tx in batch {
            let active = imported_transaction::ActiveModel {
                id: Set(Uuid::new_v4()),
                trn_ref_no: Set(tx.trn_ref_no.clone()),
                journal_id: Set(tx.journal_id),
                booked_on: Set(tx.booked_on),
                amount: Set(tx.amount),
                currency: Set(tx.currency.clone()),
                description: Set(tx.description.clone()),
                counterparty: Set(tx.counterparty.clone()),
                created_at: Set(Utc::now().into()),
            };

            match active.insert(&*self.db).await {
                Ok(_) => inserted += 1,
                Err(err) if is_unique_violation(&err) => {
                    tracing::debug!(
                        trn_ref_no = %tx.trn_ref_no,
                        "Duplicate transaction reference rejected by storage constraint"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use rust_decimal::Decimal;
    use sea_orm::Database;

    fn tx(trn_ref_no: &str, journal_id: Uuid) -> NewTransaction {
        NewTransaction {
            trn_ref_no: trn_ref_no.to_string(),
            journal_id,
            booked_on: chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            amount: Decimal::new(12_50, 2),
            currency: "AZN".to_string(),
            description: "test".to_string(),
            counterparty: None,
        }
    }

    #[tokio::test]
    async fn storage_constraint_makes_duplicate_inserts_no_ops() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        // Fixture rows do not satisfy cross-table relations.
        use sea_orm::{ConnectionTrait, Statement};
        db.execute(Statement::from_string(
            db.get_database_backend(),
            "PRAGMA foreign_keys = OFF".to_string(),
        ))
        .await
        .unwrap();
        let repo = ImportedTransactionRepository::new(Arc::new(db));

        let journal_id = Uuid::new_v4();
        let batch = vec![tx("AZ123", journal_id), tx("AZ124", journal_id)];

        assert_eq!(repo.insert_batch(&batch).await.unwrap(), 2);
        // Replaying the identical batch writes nothing.
        assert_eq!(repo.insert_batch(&batch).await.unwrap(), 0);

        assert!(repo.exists("AZ123").await.unwrap());
        assert!(!repo.exists("AZ999").await.unwrap());
    }
}
