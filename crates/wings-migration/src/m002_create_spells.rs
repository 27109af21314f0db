//! Миграция: realms, spells и определения переменных spell.

use sea_orm_migration::prelude::*;

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m002_create_spells"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Realms::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Realms::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Realms::Name).string().not_null())
                    .col(ColumnDef::new(Realms::Description).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Spells::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Spells::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Spells::Uuid).string().not_null().unique_key())
                    .col(ColumnDef::new(Spells::RealmId).integer().not_null())
                    .col(ColumnDef::new(Spells::Name).string().not_null())
                    .col(ColumnDef::new(Spells::Author).string().null())
                    .col(ColumnDef::new(Spells::Startup).text().null())
                    .col(ColumnDef::new(Spells::Features).text().null())
                    .col(ColumnDef::new(Spells::FileDenylist).text().null())
                    .col(ColumnDef::new(Spells::DockerImages).text().null())
                    .col(ColumnDef::new(Spells::ConfigFiles).text().null())
                    .col(ColumnDef::new(Spells::ConfigStartup).text().null())
                    .col(ColumnDef::new(Spells::ConfigLogs).text().null())
                    .col(ColumnDef::new(Spells::ConfigStop).text().null())
                    .col(
                        ColumnDef::new(Spells::ForceOutgoingIp)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Spells::ScriptContainer).string().null())
                    .col(ColumnDef::new(Spells::ScriptEntry).string().null())
                    .col(ColumnDef::new(Spells::ScriptInstall).text().null())
                    .col(ColumnDef::new(Spells::CopyScriptContainer).string().null())
                    .col(ColumnDef::new(Spells::CopyScriptEntry).string().null())
                    .col(ColumnDef::new(Spells::CopyScriptInstall).text().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(SpellVariables::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SpellVariables::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SpellVariables::SpellId).integer().not_null())
                    .col(ColumnDef::new(SpellVariables::Name).string().not_null())
                    .col(ColumnDef::new(SpellVariables::EnvVariable).string().not_null())
                    .col(ColumnDef::new(SpellVariables::DefaultValue).string().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .table(SpellVariables::Table)
                    .col(SpellVariables::SpellId)
                    .name("idx_spell_variables_spell_id")
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SpellVariables::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Spells::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Realms::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Realms {
    Table,
    Id,
    Name,
    Description,
}

#[derive(Iden)]
enum Spells {
    Table,
    Id,
    Uuid,
    RealmId,
    Name,
    Author,
    Startup,
    Features,
    FileDenylist,
    DockerImages,
    ConfigFiles,
    ConfigStartup,
    ConfigLogs,
    ConfigStop,
    ForceOutgoingIp,
    ScriptContainer,
    ScriptEntry,
    ScriptInstall,
    CopyScriptContainer,
    CopyScriptEntry,
    CopyScriptInstall,
}

#[derive(Iden)]
enum SpellVariables {
    Table,
    Id,
    SpellId,
    Name,
    EnvVariable,
    DefaultValue,
}
