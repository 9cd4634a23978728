//! Database migrations for the bank synchronization service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_05_10_090000_create_journals;
mod m2026_05_10_090100_create_connections;
mod m2026_05_10_090200_create_journal_links;
mod m2026_05_10_090300_create_imported_transactions;
mod m2026_05_10_090400_create_alerts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_05_10_090000_create_journals::Migration),
            Box::new(m2026_05_10_090100_create_connections::Migration),
            Box::new(m2026_05_10_090200_create_journal_links::Migration),
            Box::new(m2026_05_10_090300_create_imported_transactions::Migration),
            Box::new(m2026_05_10_090400_create_alerts::Migration),
        ]
    }
}
