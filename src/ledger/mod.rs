//! Ledger storage collaborator
//!
//! The accounting ledger is an external system; this module is its boundary.
//! The connector only needs a narrow surface: read journals for matching,
//! record links, check and insert transactions keyed by their remote
//! reference. [`orm::SeaOrmLedger`] is the default implementation backing
//! the service; tests may substitute their own.

pub mod orm;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{journal, journal_link};

/// A transaction ready for ledger storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Remote system's unique reference (dedup key)
    pub trn_ref_no: String,
    pub journal_id: Uuid,
    pub booked_on: NaiveDate,
    pub amount: Decimal,
    pub currency: String,
    pub description: String,
    pub counterparty: Option<String>,
}

/// Narrow interface to the accounting ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// All local journals with their account-number identifiers, in
    /// creation order (the order is the linking tie-break).
    async fn journals(&self) -> Result<Vec<journal::Model>>;

    /// Record a connection/IBAN → journal association. Existing links are
    /// left untouched.
    async fn record_link(
        &self,
        connection_id: &Uuid,
        iban: &str,
        journal_id: &Uuid,
        balance: Option<Decimal>,
    ) -> Result<()>;

    /// Links already recorded for a connection.
    async fn links_for(&self, connection_id: &Uuid) -> Result<Vec<journal_link::Model>>;

    /// Whether a remote reference was ever imported.
    async fn transaction_exists(&self, trn_ref_no: &str) -> Result<bool>;

    /// Insert a batch; duplicate references are no-ops. Returns the number
    /// of rows actually written.
    async fn insert_transactions(&self, batch: &[NewTransaction]) -> Result<usize>;

    /// Create a journal for a remote account that stayed pending.
    async fn create_journal(
        &self,
        name: &str,
        account_number: &str,
        currency: &str,
    ) -> Result<journal::Model>;
}
