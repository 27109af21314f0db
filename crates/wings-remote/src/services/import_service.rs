//! Результат импорта сервера, о котором сообщает демон.
//!
//! Колбэк может прийти повторно или вообще без активного импорта, поэтому оба
//! случая считаются успехом и ничего не меняют.

use crate::error::AppError;
use crate::services::activity_service;
use crate::services::sanitize::{sanitize_text, truncate_chars};
use crate::services::status_service::MAX_ERROR_LEN;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde_json::json;
use wings_entities::server_imports::{self, Column};
use wings_entities::servers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Pending,
    Importing,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ImportStatus::Pending => "pending",
            ImportStatus::Importing => "importing",
            ImportStatus::Completed => "completed",
            ImportStatus::Failed => "failed",
        }
    }

    const ACTIVE: [ImportStatus; 2] = [ImportStatus::Pending, ImportStatus::Importing];
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Активного импорта нет.
    NoActiveImport,
    /// Импорт уже завершён другим колбэком.
    AlreadyProcessed { import_id: i32 },
    Recorded { import_id: i32, status: ImportStatus },
}

/// Привести текст ошибки импорта к хранимому виду.
pub fn normalize_error(error: Option<&str>) -> Option<String> {
    error
        .map(|e| truncate_chars(sanitize_text(e).trim(), MAX_ERROR_LEN))
        .filter(|e| !e.is_empty())
}

/// Завершить последний активный импорт сервера.
///
/// Поиск, переход и запись в журнал выполняются в одной транзакции; сам переход
/// условный (`status IN (pending, importing)`), так что из двух одновременных
/// колбэков применится только один.
pub async fn record_import_outcome(
    db: &DatabaseConnection,
    server: &servers::Model,
    successful: bool,
    error: Option<&str>,
) -> Result<ImportOutcome, AppError> {
    let active: Vec<&str> = ImportStatus::ACTIVE.iter().map(|s| s.as_str()).collect();
    let txn = db.begin().await?;

    let Some(import) = server_imports::Entity::find()
        .filter(Column::ServerId.eq(server.id))
        .filter(Column::Status.is_in(active.clone()))
        .order_by_desc(Column::Id)
        .one(&txn)
        .await?
    else {
        txn.commit().await?;
        tracing::debug!("Сервер {}: нет активного импорта, колбэк пропущен", server.uuid);
        return Ok(ImportOutcome::NoActiveImport);
    };

    let status = if successful {
        ImportStatus::Completed
    } else {
        ImportStatus::Failed
    };
    let error = if successful {
        None
    } else {
        normalize_error(error)
    };

    let result = server_imports::Entity::update_many()
        .col_expr(Column::Status, Expr::value(status.as_str()))
        .col_expr(Column::Error, Expr::value(error.clone()))
        .col_expr(Column::CompletedAt, Expr::value(Utc::now().to_rfc3339()))
        .filter(Column::Id.eq(import.id))
        .filter(Column::Status.is_in(active))
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        txn.commit().await?;
        tracing::debug!(
            "Импорт {} сервера {} уже обработан",
            import.id,
            server.uuid
        );
        return Ok(ImportOutcome::AlreadyProcessed {
            import_id: import.id,
        });
    }

    let event = if successful {
        activity_service::SERVER_IMPORT_COMPLETED
    } else {
        activity_service::SERVER_IMPORT_FAILED
    };
    activity_service::record(
        &txn,
        server.id,
        server.node_id,
        event,
        json!({
            "successful": successful,
            "error": error,
            "import_id": import.id,
        }),
    )
    .await?;

    txn.commit().await?;

    tracing::info!("Сервер {}: импорт {} → {status}", server.uuid, import.id);
    Ok(ImportOutcome::Recorded {
        import_id: import.id,
        status,
    })
}

