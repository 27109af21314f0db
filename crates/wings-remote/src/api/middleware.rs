//! Экстрактор аутентифицированного узла Wings.

use crate::api::AppState;
use crate::error::AppError;
use crate::services::node_auth;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use wings_entities::nodes;

/// Узел, чей демон прислал запрос.
pub struct WingsNode(pub nodes::Model);

impl FromRequestParts<AppState> for WingsNode {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (token_id, secret) = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(node_auth::parse_bearer)
            .ok_or(AppError::InvalidWingsAuth)?;

        let node = node_auth::authenticate(&state.db, token_id, secret).await?;
        Ok(WingsNode(node))
    }
}
