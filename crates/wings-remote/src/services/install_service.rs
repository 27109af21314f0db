//! Установка сервера: скрипт для демона и колбэк о результате.

use crate::error::AppError;
use crate::services::spell_config;
use crate::services::status_service::ServerState;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait,
};
use serde::Serialize;
use wings_entities::servers::{self, Column};
use wings_entities::spells;

pub const DEFAULT_ENTRYPOINT: &str = "/bin/bash";

/// Что демону нужно для запуска установочного контейнера.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallScript {
    pub container_image: String,
    pub entrypoint: String,
    pub script: String,
}

/// Собрать установочный скрипт из spell.
///
/// Унаследованные поля `copy_script_*` важнее собственных `script_*`.
/// Образ: контейнер скрипта → первый образ spell → образ сервера.
pub fn install_script(server: &servers::Model, spell: &spells::Model) -> InstallScript {
    let container_image = non_blank(spell.copy_script_container.as_deref())
        .or_else(|| non_blank(spell.script_container.as_deref()))
        .map(str::to_string)
        .or_else(|| spell_config::first_docker_image(spell.docker_images.as_deref()))
        .unwrap_or_else(|| server.image.clone());

    let entrypoint = non_blank(spell.copy_script_entry.as_deref())
        .or_else(|| non_blank(spell.script_entry.as_deref()))
        .unwrap_or(DEFAULT_ENTRYPOINT)
        .to_string();

    let script = non_blank(spell.copy_script_install.as_deref())
        .or(spell.script_install.as_deref())
        .unwrap_or_default()
        .to_string();

    InstallScript {
        container_image,
        entrypoint,
        script,
    }
}

/// Статус после установки без учёта приостановки.
pub fn install_target(successful: bool, reinstall: bool) -> ServerState {
    match (successful, reinstall) {
        (true, _) => ServerState::Installed,
        (false, true) => ServerState::ReinstallFailed,
        (false, false) => ServerState::InstallFailed,
    }
}

#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub status: ServerState,
    pub installed_at: Option<String>,
}

/// Записать результат установки.
///
/// Запись условная (`status != 'suspended'`), поэтому приостановленный сервер
/// остаётся приостановленным даже при гонке с действием администратора.
pub async fn record_install(
    db: &DatabaseConnection,
    server_id: i32,
    successful: bool,
    reinstall: bool,
) -> Result<InstallOutcome, AppError> {
    let target = install_target(successful, reinstall);
    let now = Utc::now().to_rfc3339();
    let installed_at = successful.then(|| now.clone());

    let txn = db.begin().await?;

    let mut update = servers::Entity::update_many()
        .col_expr(Column::Status, Expr::value(target.as_str()))
        .col_expr(Column::UpdatedAt, Expr::value(now));
    if let Some(installed_at) = &installed_at {
        update = update.col_expr(Column::InstalledAt, Expr::value(installed_at.clone()));
    }
    let result = update
        .filter(Column::Id.eq(server_id))
        .filter(Column::Status.ne(ServerState::Suspended.as_str()))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if result.rows_affected == 0 {
        tracing::info!("Сервер {server_id} приостановлен, результат установки ({target}) не меняет статус");
        return Ok(InstallOutcome {
            status: ServerState::Suspended,
            installed_at: None,
        });
    }

    tracing::info!("Сервер {server_id}: установка завершена, статус {target}");
    Ok(InstallOutcome {
        status: target,
        installed_at,
    })
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}
