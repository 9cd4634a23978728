//! Imported transaction entity model
//!
//! One row per remote transaction reference, ever. The unique index on
//! trn_ref_no backs the application-level dedup pre-check.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::{DateTimeWithTimeZone, Decimal};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "imported_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,

    /// Remote system's unique transaction reference (dedup key)
    #[sea_orm(unique)]
    pub trn_ref_no: String,

    /// Ledger journal the transaction is attached to
    pub journal_id: Uuid,

    /// Booking date as reported by the bank
    pub booked_on: Date,

    /// Signed amount in the journal currency
    pub amount: Decimal,

    /// ISO currency code
    pub currency: String,

    /// Payment reference / purpose text
    pub description: String,

    /// Counterparty account as reported by the bank
    pub counterparty: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::journal::Entity",
        from = "Column::JournalId",
        to = "super::journal::Column::Id"
    )]
    Journal,
}

impl Related<super::journal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Journal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
