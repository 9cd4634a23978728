//! Connection repository for database operations
//!
//! Encapsulates SeaORM operations for the connections table: credential
//! encryption on write, lifecycle status transitions, and the monotonic
//! watermark guard.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::bank::BankEnvironment;
use crate::crypto::{CryptoKey, decrypt_secret, encrypt_secret};
use crate::models::connection::{self, ConnectionStatus, Entity as Connection};

/// Default history floor: 90 days before connection creation.
const DEFAULT_HISTORY_DAYS: i64 = 90;

/// Repository for connection database operations
#[derive(Debug, Clone)]
pub struct ConnectionRepository {
    /// Database connection pool
    pub db: Arc<DatabaseConnection>,
    /// Crypto key for secret encryption
    pub crypto_key: CryptoKey,
}

impl ConnectionRepository {
    /// Creates a new ConnectionRepository instance
    pub fn new(db: Arc<DatabaseConnection>, crypto_key: CryptoKey) -> Self {
        Self { db, crypto_key }
    }

    /// Creates a draft connection with the secret encrypted at rest.
    pub async fn create(
        &self,
        environment: BankEnvironment,
        username: &str,
        secret: &str,
        sync_history_from: Option<NaiveDate>,
    ) -> Result<connection::Model> {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let history_from = sync_history_from
            .unwrap_or_else(|| (now - Duration::days(DEFAULT_HISTORY_DAYS)).date_naive());

        let ciphertext = encrypt_secret(&self.crypto_key, &id, username, secret)
            .map_err(|e| anyhow!("secret encryption failed: {e}"))?;

        let active = connection::ActiveModel {
            id: Set(id),
            environment: Set(environment.as_str().to_string()),
            username: Set(username.to_string()),
            secret_ciphertext: Set(ciphertext),
            status: Set(ConnectionStatus::Draft.as_str().to_string()),
            sync_history_from: Set(history_from),
            last_success_at: Set(None),
            last_error: Set(None),
            discovered_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        active.insert(&*self.db).await?;

        // Query the row back explicitly so SQLite behaves like Postgres here.
        self.get(&id)
            .await?
            .ok_or_else(|| anyhow!("connection not persisted"))
    }

    /// Decrypts the stored login secret for a connection.
    pub fn decrypt_secret(
        &self,
        connection: &connection::Model,
    ) -> Result<String, crate::crypto::CryptoError> {
        decrypt_secret(
            &self.crypto_key,
            &connection.id,
            &connection.username,
            &connection.secret_ciphertext,
        )
        .inspect_err(|_| {
            tracing::error!(
                connection_id = %connection.id,
                username = %connection.username,
                "Secret decryption failed"
            );
        })
    }

    /// Retrieves a connection by its ID
    pub async fn get(&self, id: &Uuid) -> Result<Option<connection::Model>> {
        Ok(Connection::find_by_id(*id).one(&*self.db).await?)
    }

    /// Lists all connections ordered by creation time then ID
    pub async fn list(&self) -> Result<Vec<connection::Model>> {
        Ok(Connection::find()
            .order_by_asc(connection::Column::CreatedAt)
            .order_by_asc(connection::Column::Id)
            .all(&*self.db)
            .await?)
    }

    /// Lists connections whose next scheduled pass is due: active (connected
    /// or error) and not touched since the cutoff.
    pub async fn list_due(&self, cutoff: DateTime<Utc>) -> Result<Vec<connection::Model>> {
        let cutoff_db: DateTimeWithTimeZone = cutoff.into();
        Ok(Connection::find()
            .filter(
                connection::Column::Status.is_in([
                    ConnectionStatus::Connected.as_str(),
                    ConnectionStatus::Error.as_str(),
                ]),
            )
            .filter(connection::Column::UpdatedAt.lte(cutoff_db))
            .order_by_asc(connection::Column::UpdatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Transitions a connection to the given lifecycle status.
    pub async fn set_status(&self, id: &Uuid, status: ConnectionStatus) -> Result<()> {
        let active = connection::ActiveModel {
            id: Set(*id),
            status: Set(status.as_str().to_string()),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        active.update(&*self.db).await?;
        Ok(())
    }

    /// Marks a pass fully successful: status connected, last error cleared.
    pub async fn mark_connected(&self, id: &Uuid) -> Result<()> {
        let active = connection::ActiveModel {
            id: Set(*id),
            status: Set(ConnectionStatus::Connected.as_str().to_string()),
            last_error: Set(None),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        active.update(&*self.db).await?;
        Ok(())
    }

    /// Marks a pass failed with the verbatim cause. The watermark is left
    /// untouched so the next attempt retries the same window.
    pub async fn mark_error(&self, id: &Uuid, message: &str) -> Result<()> {
        let active = connection::ActiveModel {
            id: Set(*id),
            status: Set(ConnectionStatus::Error.as_str().to_string()),
            last_error: Set(Some(message.to_string())),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        active.update(&*self.db).await?;
        Ok(())
    }

    /// Records that discovery has run for this connection.
    pub async fn set_discovered(&self, id: &Uuid) -> Result<()> {
        let now = Utc::now();
        let active = connection::ActiveModel {
            id: Set(*id),
            discovered_at: Set(Some(now.into())),
            updated_at: Set(now.into()),
            ..Default::default()
        };
        active.update(&*self.db).await?;
        Ok(())
    }

    /// Advances the watermark to the given booking date, strictly forward.
    /// Returns whether the row moved; an older candidate is a no-op, which
    /// keeps `last_success_at` monotonically non-decreasing.
    pub async fn advance_watermark(&self, id: &Uuid, latest: NaiveDate) -> Result<bool> {
        let candidate: DateTimeWithTimeZone = latest.and_time(NaiveTime::MIN).and_utc().into();
        let now: DateTimeWithTimeZone = Utc::now().into();

        let result = Connection::update_many()
            .col_expr(connection::Column::LastSuccessAt, Expr::value(candidate))
            .col_expr(connection::Column::UpdatedAt, Expr::value(now))
            .filter(connection::Column::Id.eq(*id))
            .filter(
                Condition::any()
                    .add(connection::Column::LastSuccessAt.is_null())
                    .add(connection::Column::LastSuccessAt.lt(candidate)),
            )
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }
}
