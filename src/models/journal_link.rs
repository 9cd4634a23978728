//! Journal link entity model
//!
//! A journal link associates a connection and a canonical IBAN with a local
//! ledger journal. The journal itself is owned by the ledger collaborator;
//! the link is only the relation.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::{DateTimeWithTimeZone, Decimal};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "journal_links")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,

    pub connection_id: Uuid,

    /// Canonical IBAN of the remote account (uppercased, whitespace-free)
    pub iban: String,

    pub journal_id: Uuid,

    /// Account balance reported by the bank at discovery time
    pub balance: Option<Decimal>,

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
    #[sea_orm(
        belongs_to = "super::journal::Entity",
        from = "Column::JournalId",
        to = "super::journal::Column::Id"
    )]
    Journal,
}

impl Related<super::connection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Connection.def()
    }
}

impl Related<super::journal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Journal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
