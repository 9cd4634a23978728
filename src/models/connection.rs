//! Connection entity model
//!
//! This module contains the SeaORM entity model for the connections table,
//! which stores one bank credential pair together with its durable health
//! surface: status, watermark and last error.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Connection entity representing one credential pair against the bank API
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "connections")]
pub struct Model {
    /// Unique identifier for the connection (primary key)
    #[sea_orm(primary_key)]
    pub id: Uuid,

    /// Bank environment the credentials belong to (production|sandbox)
    pub environment: String,

    /// Login username for the bank's B2B API
    pub username: String,

    /// Encrypted login secret (AES-256-GCM, AAD-bound to id + username)
    pub secret_ciphertext: Vec<u8>,

    /// Lifecycle status (draft|connecting|connected|error)
    pub status: String,

    /// Date floor: transactions booked before this date are never imported
    pub sync_history_from: Date,

    /// Watermark: latest point up to which transactions were imported
    pub last_success_at: Option<DateTimeWithTimeZone>,

    /// Verbatim message of the last unrecovered failure
    pub last_error: Option<String>,

    /// Set once after the first successful account discovery
    pub discovered_at: Option<DateTimeWithTimeZone>,

    /// Timestamp when the connection was created
    pub created_at: DateTimeWithTimeZone,

    /// Timestamp when the connection was last updated
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::journal_link::Entity")]
    JournalLink,
    #[sea_orm(has_many = "super::alert::Entity")]
    Alert,
}

impl Related<super::journal_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalLink.def()
    }
}

impl Related<super::alert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Alert.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Connection lifecycle states.
///
/// `Draft → Connecting → Connected`, with `Error` reachable from any active
/// state and `Connected` reachable again from `Error` on the next fully
/// successful pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Draft,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Draft => "draft",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(ConnectionStatus::Draft),
            "connecting" => Some(ConnectionStatus::Connecting),
            "connected" => Some(ConnectionStatus::Connected),
            "error" => Some(ConnectionStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Model {
    /// Parsed lifecycle status; unknown values read as `Draft`.
    pub fn lifecycle_status(&self) -> ConnectionStatus {
        ConnectionStatus::parse(&self.status).unwrap_or(ConnectionStatus::Draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            ConnectionStatus::Draft,
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Error,
        ] {
            assert_eq!(ConnectionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ConnectionStatus::parse("disconnected"), None);
    }
}
