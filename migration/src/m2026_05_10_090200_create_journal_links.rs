//! Migration to create the journal_links table.
//!
//! A journal link maps a connection plus a canonical IBAN to a local ledger
//! journal. Remote accounts without a link row are pending manual linking.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JournalLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(JournalLinks::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(JournalLinks::ConnectionId).uuid().not_null())
                    .col(ColumnDef::new(JournalLinks::Iban).text().not_null())
                    .col(ColumnDef::new(JournalLinks::JournalId).uuid().not_null())
                    .col(
                        ColumnDef::new(JournalLinks::Balance)
                            .decimal_len(18, 2)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(JournalLinks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_journal_links_connection_id")
                            .from(JournalLinks::Table, JournalLinks::ConnectionId)
                            .to(Connections::Table, Connections::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_journal_links_journal_id")
                            .from(JournalLinks::Table, JournalLinks::JournalId)
                            .to(Journals::Table, Journals::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_journal_links_connection_iban")
                    .table(JournalLinks::Table)
                    .col(JournalLinks::ConnectionId)
                    .col(JournalLinks::Iban)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_journal_links_connection_iban")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(JournalLinks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum JournalLinks {
    Table,
    Id,
    ConnectionId,
    Iban,
    JournalId,
    Balance,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Connections {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Journals {
    Table,
    Id,
}
