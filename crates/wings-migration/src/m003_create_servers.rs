//! Миграция: allocations, servers и значения переменных серверов.

use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m003_create_servers"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Allocations::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Allocations::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Allocations::NodeId).integer().not_null())
                    .col(ColumnDef::new(Allocations::Ip).string().not_null())
                    .col(ColumnDef::new(Allocations::IpAlias).string().null())
                    .col(ColumnDef::new(Allocations::Port).integer().not_null())
                    .col(ColumnDef::new(Allocations::ServerId).integer().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Servers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Servers::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Servers::Uuid).string().not_null().unique_key())
                    .col(ColumnDef::new(Servers::Name).string().not_null())
                    .col(ColumnDef::new(Servers::Description).string().null())
                    .col(ColumnDef::new(Servers::NodeId).integer().not_null())
                    .col(ColumnDef::new(Servers::AllocationId).integer().not_null())
                    .col(ColumnDef::new(Servers::SpellId).integer().not_null())
                    .col(ColumnDef::new(Servers::RealmId).integer().not_null())
                    .col(ColumnDef::new(Servers::Memory).big_integer().not_null())
                    .col(ColumnDef::new(Servers::Swap).big_integer().not_null())
                    .col(ColumnDef::new(Servers::Disk).big_integer().not_null())
                    .col(ColumnDef::new(Servers::Cpu).integer().not_null())
                    .col(
                        ColumnDef::new(Servers::Io)
                            .integer()
                            .not_null()
                            .default(500),
                    )
                    .col(ColumnDef::new(Servers::Threads).string().null())
                    .col(
                        ColumnDef::new(Servers::OomDisabled)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Servers::AllocationLimit).integer().null())
                    .col(
                        ColumnDef::new(Servers::Status)
                            .string()
                            .not_null()
                            .default("installing"),
                    )
                    .col(ColumnDef::new(Servers::Startup).text().null())
                    .col(ColumnDef::new(Servers::Image).string().not_null())
                    .col(
                        ColumnDef::new(Servers::SkipScripts)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Servers::InstalledAt).string().null())
                    .col(ColumnDef::new(Servers::LastError).text().null())
                    .col(ColumnDef::new(Servers::UpdatedAt).string().null())
                    .to_owned(),
            )
            .await?;

        // Все колбэки и список серверов фильтруют по узлу
        manager
            .create_index(
                Index::create()
                    .table(Servers::Table)
                    .col(Servers::NodeId)
                    .name("idx_servers_node_id")
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(Allocations::Table)
                    .col(Allocations::ServerId)
                    .name("idx_allocations_server_id")
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ServerVariables::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ServerVariables::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ServerVariables::ServerId).integer().not_null())
                    .col(ColumnDef::new(ServerVariables::VariableId).integer().not_null())
                    .col(ColumnDef::new(ServerVariables::VariableValue).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(ServerVariables::Table)
                    .col(ServerVariables::ServerId)
                    .name("idx_server_variables_server_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ServerVariables::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Servers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Allocations::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Allocations {
    Table,
    Id,
    NodeId,
    Ip,
    IpAlias,
    Port,
    ServerId,
}

#[derive(Iden)]
enum Servers {
    Table,
    Id,
    Uuid,
    Name,
    Description,
    NodeId,
    AllocationId,
    SpellId,
    RealmId,
    Memory,
    Swap,
    Disk,
    Cpu,
    Io,
    Threads,
    OomDisabled,
    AllocationLimit,
    Status,
    Startup,
    Image,
    SkipScripts,
    InstalledAt,
    LastError,
    UpdatedAt,
}

#[derive(Iden)]
enum ServerVariables {
    Table,
    Id,
    ServerId,
    VariableId,
    VariableValue,
}
