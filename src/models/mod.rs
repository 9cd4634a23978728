//! SeaORM entity models for the bank synchronization service.

pub mod alert;
pub mod connection;
pub mod imported_transaction;
pub mod journal;
pub mod journal_link;
