//! Migration to create the connections table.
//!
//! A connection is one bank credential pair: environment, username, the
//! encrypted secret, plus the durable health surface (status, watermark,
//! last error) mutated on every sync attempt.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Connections::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Connections::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Connections::Environment)
                            .text()
                            .not_null()
                            .default("production"),
                    )
                    .col(ColumnDef::new(Connections::Username).text().not_null())
                    .col(
                        ColumnDef::new(Connections::SecretCiphertext)
                            .binary()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Connections::Status)
                            .text()
                            .not_null()
                            .default("draft"),
                    )
                    .col(
                        ColumnDef::new(Connections::SyncHistoryFrom)
                            .date()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Connections::LastSuccessAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(ColumnDef::new(Connections::LastError).text().null())
                    .col(
                        ColumnDef::new(Connections::DiscoveredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Connections::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Connections::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One credential pair per environment.
        manager
            .create_index(
                Index::create()
                    .name("idx_connections_environment_username")
                    .table(Connections::Table)
                    .col(Connections::Environment)
                    .col(Connections::Username)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_connections_status")
                    .table(Connections::Table)
                    .col(Connections::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_connections_environment_username")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(Index::drop().name("idx_connections_status").to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Connections::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Connections {
    Table,
    Id,
    Environment,
    Username,
    SecretCiphertext,
    Status,
    SyncHistoryFrom,
    LastSuccessAt,
    LastError,
    DiscoveredAt,
    CreatedAt,
    UpdatedAt,
}
