//! Journal entity model
//!
//! Journals belong to the ledger collaborator; the connector reads them to
//! match remote accounts by account number and to attach imported
//! transactions.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "journals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: Uuid,

    /// Display name of the journal
    pub name: String,

    /// Bank account number (IBAN) backing this journal
    pub account_number: String,

    /// ISO currency code of the journal
    pub currency: String,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::imported_transaction::Entity")]
    ImportedTransaction,
    #[sea_orm(has_many = "super::journal_link::Entity")]
    JournalLink,
}

impl Related<super::imported_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ImportedTransaction.def()
    }
}

impl Related<super::journal_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalLink.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
