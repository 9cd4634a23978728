//! Journal and journal link repository
//!
//! Read access to the ledger's journals for account matching, plus the
//! link rows produced by discovery.

use anyhow::{Result, anyhow};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::is_unique_violation;
use crate::models::journal::{self, Entity as Journal};
use crate::models::journal_link::{self, Entity as JournalLink};

/// Repository for journal and journal link operations
#[derive(Debug, Clone)]
pub struct JournalRepository {
    pub db: Arc<DatabaseConnection>,
}

impl JournalRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Lists all journals ordered by creation time then ID. The ordering is
    /// the tie-break for duplicate account numbers during linking.
    pub async fn list(&self) -> Result<Vec<journal::Model>> {
        Ok(Journal::find()
            .order_by_asc(journal::Column::CreatedAt)
            .order_by_asc(journal::Column::Id)
            .all(&*self.db)
            .await?)
    }

    pub async fn get(&self, id: &Uuid) -> Result<Option<journal::Model>> {
        Ok(Journal::find_by_id(*id).one(&*self.db).await?)
    }

    /// Creates a journal for a remote account that had no local match.
    pub async fn create(
        &self,
        name: &str,
        account_number: &str,
        currency: &str,
    ) -> Result<journal::Model> {
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
        active.insert(&*self.db).await?;

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow!("journal not persisted"))
    }

    /// Lists the journal links of a connection.
    pub async fn links_for_connection(
        &self,
        connection_id: &Uuid,
    ) -> Result<Vec<journal_link::Model>> {
        Ok(JournalLink::find()
            .filter(journal_link::Column::ConnectionId.eq(*connection_id))
            .order_by_asc(journal_link::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Records a connection/IBAN → journal link. A link that already exists
    /// is a no-op; returns whether a new row was written.
    pub async fn record_link(
        &self,
        connection_id: &Uuid,
        iban: &str,
        journal_id: &Uuid,
        balance: Option<Decimal>,
    ) -> Result<bool> {
        let active = journal_link::ActiveModel {
            id: Set(Uuid::new_v4()),
            connection_id: Set(*connection_id),
            iban: Set(iban.to_string()),
            journal_id: Set(*journal_id),
            balance: Set(balance),
            created_at: Set(Utc::now().into()),
        };

        match active.insert(&*self.db).await {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn repo() -> JournalRepository {
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
        JournalRepository::new(Arc::new(db))
    }

    #[tokio::test]
    async fn duplicate_links_are_no_ops() {
        let repo = repo().await;
        let journal = repo
            .create("Main AZN", "AZ21NABZ00000000137010001944", "AZN")
            .await
            .unwrap();
        let connection_id = Uuid::new_v4();

        let first = repo
            .record_link(
                &connection_id,
                "AZ21NABZ00000000137010001944",
                &journal.id,
                None,
            )
            .await
            .unwrap();
        let second = repo
            .record_link(
                &connection_id,
                "AZ21NABZ00000000137010001944",
                &journal.id,
                None,
            )
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
        assert_eq!(repo.links_for_connection(&connection_id).await.unwrap().len(), 1);
    }
}
