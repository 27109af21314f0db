//! Разбор тел колбэков демона.
//!
//! Тела читаются как байты и разбираются вручную: любая ошибка уходит демону в
//! стандартном конверте, а не текстом отказа экстрактора.

use crate::error::AppError;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use serde_json::{Map, Value};

/// Сырое тело запроса. Отказ буферизации (в том числе превышение лимита)
/// превращается в [`AppError`], чтобы демон получил JSON-конверт.
pub struct RawBody(pub Bytes);

impl<S> FromRequest<S> for RawBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Bytes::from_request(req, state).await {
            Ok(bytes) => Ok(RawBody(bytes)),
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Err(AppError::PayloadTooLarge)
            }
            Err(rejection) => Err(AppError::validation("INVALID_BODY", rejection.body_text())),
        }
    }
}

/// Разобрать тело как JSON-объект. Пустое тело, не-JSON и не-объект — `INVALID_JSON`.
pub fn json_object(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::validation(
            "INVALID_JSON",
            "Request body must be a JSON object",
        )),
        Err(e) => Err(AppError::validation(
            "INVALID_JSON",
            format!("Invalid JSON in request body: {e}"),
        )),
    }
}

/// Непустой JSON-объект: `{}` тоже считается отсутствующим телом.
pub fn non_empty_json_object(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    let map = json_object(body)?;
    if map.is_empty() {
        return Err(AppError::validation(
            "INVALID_JSON",
            "Request body must not be empty",
        ));
    }
    Ok(map)
}

/// То же, что [`json_object`], но для необязательного тела GET-колбэка.
pub fn optional_json_object(body: &[u8]) -> Option<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Логическое значение в том виде, в каком его присылают разные версии демона.
pub fn lenient_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => Some(lenient_bool_str(s)),
        _ => None,
    }
}

/// Истина для `1`/`true`/`yes`/`on` без учёта регистра.
pub fn lenient_bool_str(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Обязательное логическое поле.
pub fn required_bool(body: &Map<String, Value>, field: &str) -> Result<bool, AppError> {
    body.get(field)
        .filter(|v| !v.is_null())
        .and_then(lenient_bool)
        .ok_or_else(|| {
            AppError::validation("MISSING_FIELD", format!("Missing required field: {field}"))
        })
}

/// Необязательное логическое поле, по умолчанию `false`.
pub fn optional_bool(body: &Map<String, Value>, field: &str) -> bool {
    body.get(field).and_then(lenient_bool).unwrap_or(false)
}

/// Поле `error`: строка или null.
pub fn error_field(body: &Map<String, Value>) -> Result<Option<String>, AppError> {
    match body.get("error") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(AppError::validation(
            "INVALID_ERROR_FIELD",
            "Field 'error' must be a string or null",
        )),
    }
}

/// Сообщённое состояние контейнера и текст ошибки.
///
/// Принимаются оба формата демона: `{state}` и `{data: {new_state, error?}}`.
pub fn reported_state(body: &Map<String, Value>) -> Result<(String, Option<String>), AppError> {
    let data = body.get("data").and_then(Value::as_object);

    let state = body
        .get("state")
        .and_then(Value::as_str)
        .or_else(|| data.and_then(|d| d.get("new_state")).and_then(Value::as_str))
        .ok_or_else(|| AppError::validation("MISSING_STATE", "Missing or invalid state"))?;

    let error = data
        .and_then(|d| d.get("error"))
        .or_else(|| body.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok((state.to_string(), error))
}
