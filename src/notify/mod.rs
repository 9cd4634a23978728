//! Notification collaborator
//!
//! Sync failures must never be silent: every pass that ends in the error
//! state produces one persistent, admin-facing alert. The messaging system
//! itself is external; [`orm::AlertNotifier`] is the default implementation
//! writing alerts the UI reads until a human acknowledges them.

pub mod orm;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::connection;

/// Severity attached to sync failure alerts.
pub const SEVERITY_HIGH: &str = "high";

/// Role sync failure alerts are addressed to.
pub const AUDIENCE_ADMIN: &str = "admin";

/// Sink for admin-facing sync notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Emit a persistent high-priority alert for a failed sync pass,
    /// carrying the connection identity and the verbatim failure message.
    async fn sync_failed(&self, connection: &connection::Model, message: &str) -> Result<()>;
}
