//! Типы ошибок удалённого API и единый конверт ответа `{success:false, message, error_code}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Сущность, которая не нашлась при обработке запроса демона.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    Server,
    Node,
    Allocation,
    Spell,
    Realm,
}

impl Missing {
    pub fn error_code(self) -> &'static str {
        match self {
            Missing::Server => "SERVER_NOT_FOUND",
            Missing::Node => "NODE_NOT_FOUND",
            Missing::Allocation => "ALLOCATION_NOT_FOUND",
            Missing::Spell => "SPELL_NOT_FOUND",
            Missing::Realm => "REALM_NOT_FOUND",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Missing::Server => "Server",
            Missing::Node => "Node",
            Missing::Allocation => "Allocation",
            Missing::Spell => "Spell",
            Missing::Realm => "Realm",
        }
    }
}

impl std::fmt::Display for Missing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} not found", self.label())
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    /// Неверные или отсутствующие учётные данные узла. Всегда 403.
    #[error("Invalid Wings authentication")]
    InvalidWingsAuth,

    /// Не найдено или принадлежит другому узлу. Снаружи эти случаи неразличимы.
    #[error("{0}")]
    NotFound(Missing),

    #[error("{message}")]
    Validation {
        code: &'static str,
        message: String,
    },

    #[error("Request body exceeds the size limit")]
    PayloadTooLarge,

    #[error("Failed to generate server configuration: {0}")]
    ConfigBuild(String),

    #[error("Database error: {0}")]
    Persistence(String),
}

impl AppError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidWingsAuth => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::ConfigBuild(_) | AppError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidWingsAuth => "INVALID_WINGS_AUTH",
            AppError::NotFound(missing) => missing.error_code(),
            AppError::Validation { code, .. } => code,
            AppError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            AppError::ConfigBuild(_) => "CONFIG_ERROR",
            AppError::Persistence(_) => "DATABASE_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Ошибка обработки запроса демона: {self}");
        }
        let body = json!({
            "success": false,
            "message": self.to_string(),
            "error_code": self.error_code(),
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(e: sea_orm::DbErr) -> Self {
        AppError::Persistence(e.to_string())
    }
}
