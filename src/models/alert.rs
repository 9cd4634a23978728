//! Alert entity model
//!
//! Persistent admin-facing notifications produced when a sync pass ends in
//! the error state. An alert stays visible until a human acknowledges it.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "alerts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,

    pub connection_id: Uuid,

    /// Alert severity, currently always "high"
    pub severity: String,

    /// Role the alert is addressed to, currently always "admin"
    pub audience: String,

    /// Verbatim failure message from the sync pass
    pub message: String,

    /// Set when a human dismisses the alert; NULL means still active
    pub acknowledged_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::connection::Entity",
        from = "Column::ConnectionId",
        to = "super::connection::Column::Id"
    )]
    Connection,
}

impl Related<super::connection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Connection.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
