//! Migration to create the imported_transactions table.
//!
//! The unique index on trn_ref_no is the storage-level half of the
//! deduplication invariant; the application pre-check is the other half.
//! Duplicate inserts are treated as no-ops by the repositories.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ImportedTransactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ImportedTransactions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ImportedTransactions::TrnRefNo)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ImportedTransactions::JournalId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ImportedTransactions::BookedOn)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ImportedTransactions::Amount)
                            .decimal_len(18, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ImportedTransactions::Currency)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ImportedTransactions::Description)
                            .text()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ImportedTransactions::Counterparty)
                            .text()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(ImportedTransactions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_imported_transactions_journal_id")
                            .from(
                                ImportedTransactions::Table,
                                ImportedTransactions::JournalId,
                            )
                            .to(Journals::Table, Journals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Remote transaction references are globally unique across all time,
        // independent of journal.
        manager
            .create_index(
                Index::create()
                    .name("idx_imported_transactions_trn_ref_no")
                    .table(ImportedTransactions::Table)
                    .col(ImportedTransactions::TrnRefNo)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_imported_transactions_journal_booked")
                    .table(ImportedTransactions::Table)
                    .col(ImportedTransactions::JournalId)
                    .col(ImportedTransactions::BookedOn)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_imported_transactions_trn_ref_no")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_imported_transactions_journal_booked")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(ImportedTransactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ImportedTransactions {
    Table,
    Id,
    TrnRefNo,
    JournalId,
    BookedOn,
    Amount,
    Currency,
    Description,
    Counterparty,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Journals {
    Table,
    Id,
}
