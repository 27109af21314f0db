//! Журнал действий по серверу (`server_activities`).

use crate::error::AppError;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ConnectionTrait};
use serde_json::Value;
use wings_entities::server_activities;

pub const SERVER_IMPORT_COMPLETED: &str = "server_import_completed";
pub const SERVER_IMPORT_FAILED: &str = "server_import_failed";

/// Записать действие демона по серверу. Пользователя и IP у колбэков нет.
pub async fn record<C: ConnectionTrait>(
    db: &C,
    server_id: i32,
    node_id: i32,
    event: &str,
    metadata: Value,
) -> Result<server_activities::Model, AppError> {
    let row = server_activities::ActiveModel {
        server_id: Set(server_id),
        node_id: Set(node_id),
        user_id: Set(None),
        ip: Set(None),
        event: Set(event.to_string()),
        metadata: Set(Some(metadata.to_string())),
        timestamp: Set(Utc::now().to_rfc3339()),
        ..Default::default()
    };
    Ok(row.insert(db).await?)
}
