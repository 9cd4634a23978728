//! Test utilities for the sync engine test suites.
//!
//! Provides an in-memory SQLite database with migrations applied, fixture
//! seeding helpers, and an executor wired against a wiremock bank.

use std::sync::Arc;

use anyhow::Result;
use banksync::config::{AppConfig, RetryPolicyConfig};
use banksync::crypto::CryptoKey;
use banksync::ledger::orm::SeaOrmLedger;
use banksync::models::journal;
use banksync::notify::orm::AlertNotifier;
use banksync::sync_executor::SyncExecutor;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set, Statement};
use uuid::Uuid;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<Arc<DatabaseConnection>> {
    let db = Database::connect("sqlite::memory:").await?;

    Migrator::up(&db, None).await?;

    // SQLite enforces foreign keys by default under sqlx; fixture rows do
    // not always satisfy cross-table relations.
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "PRAGMA foreign_keys = OFF".to_string(),
    ))
    .await?;

    Ok(Arc::new(db))
}

/// Configuration pointed at a mock bank, with instant retries.
pub fn test_config(mock_base_uri: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.crypto_key = Some(vec![7u8; 32]);
    config.api_base_sandbox = format!("{mock_base_uri}/api/b2b");
    config.http_timeout_seconds = 5;
    config.retry = RetryPolicyConfig {
        max_attempts: 3,
        base_seconds: 0,
        max_seconds: 0,
        jitter_factor: 0.0,
    };
    config
}

/// Builds an executor with the default ledger and notifier against the
/// given database.
pub fn build_executor(db: Arc<DatabaseConnection>, config: AppConfig) -> SyncExecutor {
    let config = Arc::new(config);
    let crypto_key = CryptoKey::new(config.crypto_key.clone().expect("test crypto key"))
        .expect("valid test crypto key");

    let ledger = Arc::new(SeaOrmLedger::new(db.clone()));
    let notifier = Arc::new(AlertNotifier::new(db.clone()));

    SyncExecutor::new(db, config, crypto_key, ledger, notifier)
}

/// Inserts a ledger journal row directly for testing.
pub async fn insert_journal(
    db: &DatabaseConnection,
    name: &str,
    account_number: &str,
    currency: &str,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let active = journal::ActiveModel {
        id: Set(id),
        name: Set(name.to_string()),
        account_number: Set(account_number.to_string()),
        currency: Set(currency.to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    active.insert(db).await?;

    Ok(id)
}

/// JSON body of a successful login response.
pub fn login_body(token: &str) -> serde_json::Value {
    serde_json::json!({
        "responseData": { "jwttoken": token }
    })
}

/// JSON body of an accounts listing.
pub fn accounts_body(accounts: &[(&str, &str, &str)]) -> serde_json::Value {
    let list: Vec<serde_json::Value> = accounts
        .iter()
        .map(|(iban, ccy, desc)| {
            serde_json::json!({
                "ibanAcNo": iban,
                "ccy": ccy,
                "acDesc": desc,
                "currAmt": 1000.0
            })
        })
        .collect();

    serde_json::json!({
        "responseData": { "accountsList": list }
    })
}

/// JSON body of a single statement page without a follow-up page.
pub fn statement_body(records: Vec<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "responseData": {
            "operations": {
                "statementList": records,
                "hasNextPage": false
            }
        }
    })
}

/// One statement record.
pub fn statement_record(trn_ref_no: &str, date: &str, amount: &str) -> serde_json::Value {
    serde_json::json!({
        "trnRefNo": trn_ref_no,
        "trnDt": date,
        "lcyAmount": amount,
        "ccy": "AZN",
        "purpose": format!("Payment {trn_ref_no}"),
        "contrAccount": "AZ96AZEJ00000000001234567890"
    })
}
