//! Сверка статуса контейнера, о котором сообщает демон, с записью сервера.

use crate::error::{AppError, Missing};
use crate::services::sanitize::{sanitize_text, truncate_chars};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use wings_entities::servers::{self, ActiveModel, Column, Entity as ServerEntity};

/// Максимальная длина текста ошибки от демона.
pub const MAX_ERROR_LEN: usize = 1000;

/// Статус, в который сбрасываются переходные состояния при перезапуске демона.
pub const RESET_TARGET: ServerState = ServerState::Offline;

/// Статус жизненного цикла сервера.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Installing,
    InstallFailed,
    ReinstallFailed,
    Installed,
    Suspended,
    Offline,
    Starting,
    Running,
    Stopping,
    Stopped,
    UpdateFailed,
    BackupFailed,
    Crashed,
}

impl ServerState {
    pub fn as_str(self) -> &'static str {
        match self {
            ServerState::Installing => "installing",
            ServerState::InstallFailed => "install_failed",
            ServerState::ReinstallFailed => "reinstall_failed",
            ServerState::Installed => "installed",
            ServerState::Suspended => "suspended",
            ServerState::Offline => "offline",
            ServerState::Starting => "starting",
            ServerState::Running => "running",
            ServerState::Stopping => "stopping",
            ServerState::Stopped => "stopped",
            ServerState::UpdateFailed => "update_failed",
            ServerState::BackupFailed => "backup_failed",
            ServerState::Crashed => "crashed",
        }
    }

    /// Состояния, которые демон вправе сообщить через container-status.
    ///
    /// `installed` и `reinstall_failed` выставляет только колбэк установки.
    pub fn is_daemon_reportable(self) -> bool {
        !matches!(self, ServerState::Installed | ServerState::ReinstallFailed)
    }

    /// Отказ, для которого сохраняется текст ошибки.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            ServerState::Crashed
                | ServerState::InstallFailed
                | ServerState::UpdateFailed
                | ServerState::BackupFailed
        )
    }
}

impl std::str::FromStr for ServerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "installing" => Ok(ServerState::Installing),
            "install_failed" => Ok(ServerState::InstallFailed),
            "reinstall_failed" => Ok(ServerState::ReinstallFailed),
            "installed" => Ok(ServerState::Installed),
            "suspended" => Ok(ServerState::Suspended),
            "offline" => Ok(ServerState::Offline),
            "starting" => Ok(ServerState::Starting),
            "running" => Ok(ServerState::Running),
            "stopping" => Ok(ServerState::Stopping),
            "stopped" => Ok(ServerState::Stopped),
            "update_failed" => Ok(ServerState::UpdateFailed),
            "backup_failed" => Ok(ServerState::BackupFailed),
            "crashed" => Ok(ServerState::Crashed),
            other => Err(format!("Неизвестный статус сервера: {other}")),
        }
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Разобрать статус из колбэка демона. `None` — значение вне допустимого набора.
pub fn parse_reported(state: &str) -> Option<ServerState> {
    state
        .parse::<ServerState>()
        .ok()
        .filter(|s| s.is_daemon_reportable())
}

/// Результат применения статуса.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub old_state: String,
    pub new_state: ServerState,
    pub installed_at: Option<String>,
    pub last_error: Option<String>,
}

/// Применить сообщённый демоном статус.
///
/// Чтение старого статуса и запись нового выполняются в одной транзакции.
/// `running` проставляет `installed_at`, если его ещё нет; состояния отказа
/// сохраняют текст ошибки.
pub async fn apply_reported_state(
    db: &DatabaseConnection,
    server_id: i32,
    state: ServerState,
    error: Option<&str>,
) -> Result<StatusChange, AppError> {
    let now = Utc::now().to_rfc3339();
    let txn = db.begin().await?;

    let record = ServerEntity::find_by_id(server_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound(Missing::Server))?;

    let old_state = record.status.clone();
    let mut installed_at = record.installed_at.clone();
    let mut last_error = record.last_error.clone();

    let mut model: ActiveModel = record.into();
    model.status = Set(state.as_str().to_string());
    model.updated_at = Set(Some(now.clone()));

    if state == ServerState::Running && installed_at.is_none() {
        installed_at = Some(now);
        model.installed_at = Set(installed_at.clone());
    } else if state.is_failure() {
        last_error = error
            .map(|e| truncate_chars(sanitize_text(e).trim(), MAX_ERROR_LEN))
            .filter(|e| !e.is_empty());
        model.last_error = Set(last_error.clone());
    }

    model.update(&txn).await?;
    txn.commit().await?;

    tracing::info!("Сервер {server_id}: статус {old_state} → {state}");

    Ok(StatusChange {
        old_state,
        new_state: state,
        installed_at,
        last_error,
    })
}

/// Сбросить переходные статусы всех серверов узла одним UPDATE.
///
/// `starting`/`stopping` становятся [`RESET_TARGET`], остальные не трогаются.
/// Возвращает число сброшенных серверов.
pub async fn reset_node_statuses(db: &DatabaseConnection, node_id: i32) -> Result<u64, AppError> {
    let transient = [ServerState::Starting.as_str(), ServerState::Stopping.as_str()];

    let result = servers::Entity::update_many()
        .col_expr(Column::Status, Expr::value(RESET_TARGET.as_str()))
        .col_expr(Column::UpdatedAt, Expr::value(Utc::now().to_rfc3339()))
        .filter(Column::NodeId.eq(node_id))
        .filter(Column::Status.is_in(transient))
        .exec(db)
        .await?;

    tracing::info!(
        "Узел {node_id}: сброшено статусов серверов: {}",
        result.rows_affected
    );
    Ok(result.rows_affected)
}
