//! HTTP API: маршрутизация и состояние приложения.

pub mod middleware;
pub mod payload;
pub mod remote_routes;

use crate::events::EventSink;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use sea_orm::{ConnectionTrait, DatabaseConnection};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use url::Url;

/// Общее состояние приложения.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub events: Arc<dyn EventSink>,
    /// База для ссылок пагинации
    pub panel_url: Url,
    pub lenient_import_get: bool,
}

/// Построить маршрутизатор Axum.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/remote", remote_routes::routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health — проверка работоспособности.
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_ok = state.db.execute_unprepared("SELECT 1").await.is_ok();
    Json(serde_json::json!({
        "status": if db_ok { "ok" } else { "error" },
        "database": db_ok,
        "service": "wings-remote"
    }))
}
