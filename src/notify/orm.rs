//! Default alert-table notifier.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::models::{alert, connection};
use crate::notify::{AUDIENCE_ADMIN, Notifier, SEVERITY_HIGH};

/// Notifier persisting alerts to the alerts table.
#[derive(Debug, Clone)]
pub struct AlertNotifier {
    db: Arc<DatabaseConnection>,
}

impl AlertNotifier {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Notifier for AlertNotifier {
    async fn sync_failed(&self, connection: &connection::Model, message: &str) -> Result<()> {
        error!(
            connection_id = %connection.id,
            username = %connection.username,
            environment = %connection.environment,
            error = %message,
            "Sync pass failed, raising admin alert"
        );

        let active = alert::ActiveModel {
            id: Set(Uuid::new_v4()),
            connection_id: Set(connection.id),
            severity: Set(SEVERITY_HIGH.to_string()),
            audience: Set(AUDIENCE_ADMIN.to_string()),
            message: Set(message.to_string()),
            acknowledged_at: Set(None),
            created_at: Set(Utc::now().into()),
        };
        active.insert(&*self.db).await?;

        counter!("bank_sync_alerts_total").increment(1);
        Ok(())
    }
}
