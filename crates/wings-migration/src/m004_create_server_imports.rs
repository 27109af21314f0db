//! Миграция: импорты серверов и журнал активности.

use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m004_create_server_imports"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ServerImports::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ServerImports::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ServerImports::ServerId).integer().not_null())
                    .col(
                        ColumnDef::new(ServerImports::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(ServerImports::Error).text().null())
                    .col(ColumnDef::new(ServerImports::CreatedAt).string().not_null())
                    .col(ColumnDef::new(ServerImports::CompletedAt).string().null())
                    .to_owned(),
            )
            .await?;

        // Поиск последнего активного импорта сервера
        manager
            .create_index(
                Index::create()
                    .table(ServerImports::Table)
                    .col(ServerImports::ServerId)
                    .col(ServerImports::Status)
                    .name("idx_server_imports_server_status")
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ServerActivities::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ServerActivities::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ServerActivities::ServerId).integer().not_null())
                    .col(ColumnDef::new(ServerActivities::NodeId).integer().not_null())
                    .col(ColumnDef::new(ServerActivities::UserId).integer().null())
                    .col(ColumnDef::new(ServerActivities::Ip).string().null())
                    .col(ColumnDef::new(ServerActivities::Event).string().not_null())
                    .col(ColumnDef::new(ServerActivities::Metadata).text().null())
                    .col(ColumnDef::new(ServerActivities::Timestamp).string().not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ServerActivities::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ServerImports::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum ServerImports {
    Table,
    Id,
    ServerId,
    Status,
    Error,
    CreatedAt,
    CompletedAt,
}

#[derive(Iden)]
enum ServerActivities {
    Table,
    Id,
    ServerId,
    NodeId,
    UserId,
    Ip,
    Event,
    Metadata,
    Timestamp,
}
