//! Migration to create the journals table.
//!
//! Journals are the local ledger's representation of a bank account. The
//! connector only reads them for account matching and attaches imported
//! transactions to them.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Journals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Journals::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Journals::Name).text().not_null())
                    .col(ColumnDef::new(Journals::AccountNumber).text().not_null())
                    .col(ColumnDef::new(Journals::Currency).text().not_null())
                    .col(
                        ColumnDef::new(Journals::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Journals::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Account numbers are the matching key during discovery.
        manager
            .create_index(
                Index::create()
                    .name("idx_journals_account_number")
                    .table(Journals::Table)
                    .col(Journals::AccountNumber)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_journals_account_number").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Journals::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Journals {
    Table,
    Id,
    Name,
    AccountNumber,
    Currency,
    CreatedAt,
    UpdatedAt,
}
