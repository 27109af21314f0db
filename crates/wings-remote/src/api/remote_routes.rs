//! Маршруты удалённого API, которые вызывает демон Wings: дескрипторы, установка, импорт, статус.

use crate::api::middleware::WingsNode;
use crate::api::payload::{self, RawBody};
use crate::api::AppState;
use crate::error::{AppError, Missing};
use crate::events;
use crate::services::descriptor::{self, ServerDescriptor};
use crate::services::import_service::{self, ImportOutcome};
use crate::services::install_service::{self, InstallScript};
use crate::services::{catalog, node_auth, spell_config, status_service};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sea_orm::EntityTrait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use url::Url;
use wings_entities::{nodes, servers, spells};

pub const DEFAULT_PER_PAGE: u64 = 50;
pub const MAX_PER_PAGE: u64 = 500;

// ── Типы ответов ─────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RemoteServer {
    pub uuid: String,
    #[serde(flatten)]
    pub descriptor: ServerDescriptor,
}

#[derive(Debug, Serialize)]
pub struct ServersPage {
    pub data: Vec<RemoteServer>,
    pub links: PageLinks,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageLinks {
    pub first: String,
    pub last: String,
    pub prev: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageMeta {
    pub current_page: u64,
    pub from: u64,
    pub last_page: u64,
    pub links: Vec<MetaLink>,
    pub path: String,
    pub per_page: u64,
    pub to: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetaLink {
    pub url: Option<String>,
    pub label: String,
    pub active: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/servers", get(list_servers))
        .route("/servers/reset", post(reset_servers))
        .route("/servers/{uuid}", get(server_descriptor))
        .route(
            "/servers/{uuid}/install",
            get(install_script).post(install_completed),
        )
        .route(
            "/servers/{uuid}/import",
            get(import_status_compat).post(import_status),
        )
        .route(
            "/servers/{uuid}/container-status",
            get(container_status).post(update_container_status),
        )
        // Путь старых версий демона
        .route(
            "/servers/{uuid}/container/status",
            get(container_status).post(update_container_status),
        )
}

// ── Дескрипторы ──────────────────────────────────────────────────────────────

/// GET /api/remote/servers/{uuid} — полный дескриптор сервера.
async fn server_descriptor(
    State(state): State<AppState>,
    WingsNode(node): WingsNode,
    Path(uuid): Path<String>,
) -> Result<Response, AppError> {
    let server = node_auth::server_for_node(&state.db, &node, &uuid).await?;
    let ctx = catalog::load_context(&state.db, server).await?;
    let built = descriptor::build(&ctx);
    let bytes = descriptor::encode(&built)?;

    state.events.notify(
        events::SERVER_INFO_RETRIEVED,
        json!({
            "server": ctx.server,
            "node": ctx.node,
            "allocation": ctx.allocation,
            "spell": ctx.spell,
            "realm": ctx.realm,
            "config_logs": spell_config::config_logs(ctx.spell.config_logs.as_deref()),
        }),
    );

    Ok(([(header::CONTENT_TYPE, "application/json")], bytes).into_response())
}

/// GET /api/remote/servers — страница дескрипторов всех серверов узла.
async fn list_servers(
    State(state): State<AppState>,
    WingsNode(node): WingsNode,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<ServersPage>, AppError> {
    let (page, per_page) = page_window(
        query_number(&query, "page"),
        query_number(&query, "per_page"),
    );
    let search = query.get("search").map(String::as_str).unwrap_or_default();

    let (rows, total) = catalog::servers_page(&state.db, node.id, page, per_page, search).await?;

    let mut data = Vec::with_capacity(rows.len());
    for server in rows {
        if let Some(entry) = remote_server(&state, server).await? {
            data.push(entry);
        }
    }

    let (links, meta) = pagination(&state.panel_url, page, per_page, total);

    state.events.notify(
        events::SERVERS_REMOTE_RETRIEVED,
        json!({
            "node_id": node.id,
            "servers": data.iter().map(|s| s.uuid.as_str()).collect::<Vec<_>>(),
            "total": total,
        }),
    );

    Ok(Json(ServersPage { data, links, meta }))
}

/// Дескриптор для списка. Сервер с битыми связями пропускается, ошибки БД — нет.
async fn remote_server(
    state: &AppState,
    server: servers::Model,
) -> Result<Option<RemoteServer>, AppError> {
    let uuid = server.uuid.clone();
    let ctx = match catalog::load_context(&state.db, server).await {
        Ok(ctx) => ctx,
        Err(AppError::NotFound(missing)) => {
            tracing::warn!("Сервер {uuid} пропущен в списке: {missing}");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let built = descriptor::build(&ctx);
    if let Err(e) = descriptor::encode(&built) {
        tracing::warn!("Сервер {uuid} пропущен в списке: {e}");
        return Ok(None);
    }

    Ok(Some(RemoteServer {
        uuid,
        descriptor: built,
    }))
}

/// Номер и размер страницы в допустимых границах.
///
/// `per_page` ограничен `1..=MAX_PER_PAGE`, а `page` так, чтобы смещение
/// `(page - 1) * per_page` помещалось в `i64` для `OFFSET`.
pub fn page_window(page: Option<u64>, per_page: Option<u64>) -> (u64, u64) {
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let max_page = i64::MAX as u64 / per_page;
    let page = page.unwrap_or(1).clamp(1, max_page);
    (page, per_page)
}

fn query_number(query: &HashMap<String, String>, key: &str) -> Option<u64> {
    query.get(key).and_then(|v| v.trim().parse::<u64>().ok())
}

/// Ссылки и метаданные страницы.
pub fn pagination(panel_url: &Url, page: u64, per_page: u64, total: u64) -> (PageLinks, PageMeta) {
    let path = servers_path(panel_url);
    let last_page = total.div_ceil(per_page).max(1);
    let page_url = |n: u64| {
        let mut url = path.clone();
        url.query_pairs_mut().append_pair("page", &n.to_string());
        url.to_string()
    };

    let prev = (page > 1).then(|| page_url(page - 1));
    let next = (page < last_page).then(|| page_url(page + 1));

    let links = PageLinks {
        first: page_url(1),
        last: page_url(last_page),
        prev: prev.clone(),
        next: next.clone(),
    };

    let meta = PageMeta {
        current_page: page,
        from: page.saturating_sub(1).saturating_mul(per_page).saturating_add(1),
        last_page,
        links: vec![
            MetaLink {
                url: prev,
                label: "&laquo; Previous".to_string(),
                active: false,
            },
            MetaLink {
                url: Some(page_url(page)),
                label: page.to_string(),
                active: true,
            },
            MetaLink {
                url: next,
                label: "Next &raquo;".to_string(),
                active: false,
            },
        ],
        path: path.to_string(),
        per_page,
        to: page.saturating_mul(per_page).min(total),
        total,
    };

    (links, meta)
}

fn servers_path(panel_url: &Url) -> Url {
    let mut url = panel_url.clone();
    let path = format!("{}/api/remote/servers", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    url
}

// ── Установка ────────────────────────────────────────────────────────────────

/// GET /api/remote/servers/{uuid}/install — установочный скрипт.
async fn install_script(
    State(state): State<AppState>,
    WingsNode(node): WingsNode,
    Path(uuid): Path<String>,
) -> Result<Json<InstallScript>, AppError> {
    let server = node_auth::server_for_node(&state.db, &node, &uuid).await?;
    let spell = spells::Entity::find_by_id(server.spell_id)
        .one(&state.db)
        .await?
        .ok_or(AppError::NotFound(Missing::Spell))?;

    let script = install_service::install_script(&server, &spell);

    state.events.notify(
        events::SERVER_INSTALL_RETRIEVED,
        json!({
            "server_uuid": server.uuid,
            "node_id": node.id,
            "spell_id": spell.id,
            "container_image": script.container_image,
        }),
    );

    Ok(Json(script))
}

/// POST /api/remote/servers/{uuid}/install — результат установки.
async fn install_completed(
    State(state): State<AppState>,
    WingsNode(node): WingsNode,
    Path(uuid): Path<String>,
    RawBody(body): RawBody,
) -> Result<StatusCode, AppError> {
    let server = node_auth::server_for_node(&state.db, &node, &uuid).await?;

    let body = payload::non_empty_json_object(&body)?;
    let successful = payload::required_bool(&body, "successful")?;
    let reinstall = payload::optional_bool(&body, "reinstall");

    let outcome = install_service::record_install(&state.db, server.id, successful, reinstall).await?;

    state.events.notify(
        events::SERVER_INSTALL_COMPLETED,
        json!({
            "server_uuid": server.uuid,
            "node_id": node.id,
            "successful": successful,
            "reinstall": reinstall,
            "status": outcome.status.as_str(),
            "installed_at": outcome.installed_at,
        }),
    );

    Ok(StatusCode::NO_CONTENT)
}

// ── Импорт ───────────────────────────────────────────────────────────────────

/// POST /api/remote/servers/{uuid}/import — результат импорта.
async fn import_status(
    State(state): State<AppState>,
    WingsNode(node): WingsNode,
    Path(uuid): Path<String>,
    RawBody(body): RawBody,
) -> Result<Json<Value>, AppError> {
    let server = node_auth::server_for_node(&state.db, &node, &uuid).await?;

    let body = payload::json_object(&body)?;
    let successful = payload::required_bool(&body, "successful")?;
    let error = payload::error_field(&body)?;

    finish_import(&state, &node, &server, successful, error.as_deref()).await
}

/// GET /api/remote/servers/{uuid}/import — совместимость с демонами, шлющими статус через GET.
///
/// Статус берётся из query, затем из JSON-тела. Если его нет вовсе, последний
/// активный импорт считается успешным. Это эвристика, а не протокол: она
/// отключается флагом `lenient_import_get`.
async fn import_status_compat(
    State(state): State<AppState>,
    WingsNode(node): WingsNode,
    Path(uuid): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    RawBody(body): RawBody,
) -> Result<Json<Value>, AppError> {
    let server = node_auth::server_for_node(&state.db, &node, &uuid).await?;
    let body = payload::optional_json_object(&body);

    let successful = query
        .get("successful")
        .map(|s| payload::lenient_bool_str(s))
        .or_else(|| {
            body.as_ref()
                .and_then(|b| b.get("successful"))
                .and_then(payload::lenient_bool)
        });
    let error = query.get("error").cloned().or_else(|| {
        body.as_ref()
            .and_then(|b| b.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    match successful {
        Some(successful) => {
            finish_import(&state, &node, &server, successful, error.as_deref()).await
        }
        None if state.lenient_import_get => {
            tracing::warn!(
                "Сервер {}: GET-колбэк импорта без статуса, активный импорт считается успешным",
                server.uuid
            );
            finish_import(&state, &node, &server, true, None).await
        }
        None => Ok(Json(json!({
            "success": true,
            "message": "No import status supplied",
        }))),
    }
}

async fn finish_import(
    state: &AppState,
    node: &nodes::Model,
    server: &servers::Model,
    successful: bool,
    error: Option<&str>,
) -> Result<Json<Value>, AppError> {
    let outcome =
        import_service::record_import_outcome(&state.db, server, successful, error).await?;

    let message = match &outcome {
        ImportOutcome::NoActiveImport => "No active import found",
        ImportOutcome::AlreadyProcessed { .. } => "Import already processed",
        ImportOutcome::Recorded { .. } => "Import status updated",
    };

    if let ImportOutcome::Recorded { import_id, status } = outcome {
        state.events.notify(
            events::SERVER_IMPORT_STATUS,
            json!({
                "server_uuid": server.uuid,
                "node_id": node.id,
                "import_id": import_id,
                "status": status.as_str(),
                "successful": successful,
                "error": import_service::normalize_error(error).filter(|_| !successful),
            }),
        );
    }

    Ok(Json(json!({ "success": true, "message": message })))
}

// ── Статус контейнера ────────────────────────────────────────────────────────

/// POST /api/remote/servers/{uuid}/container-status — статус от демона.
async fn update_container_status(
    State(state): State<AppState>,
    WingsNode(node): WingsNode,
    Path(uuid): Path<String>,
    RawBody(body): RawBody,
) -> Result<Json<Value>, AppError> {
    let server = node_auth::server_for_node(&state.db, &node, &uuid).await?;

    let body = payload::json_object(&body)?;
    let (raw_state, error) = payload::reported_state(&body)?;
    let new_state = status_service::parse_reported(&raw_state)
        .ok_or_else(|| AppError::validation("INVALID_STATE", "Invalid state value"))?;

    let change =
        status_service::apply_reported_state(&state.db, server.id, new_state, error.as_deref())
            .await?;

    state.events.notify(
        events::SERVER_STATUS_UPDATED,
        json!({
            "server_uuid": server.uuid,
            "node_id": node.id,
            "old_state": change.old_state,
            "new_state": change.new_state.as_str(),
            "installed_at": change.installed_at,
            "last_error": change.last_error,
        }),
    );

    Ok(Json(json!({
        "success": true,
        "message": "Server status updated successfully",
        "state": change.new_state.as_str(),
        "server_uuid": server.uuid,
    })))
}

/// GET /api/remote/servers/{uuid}/container-status — сохранённый статус.
async fn container_status(
    State(state): State<AppState>,
    WingsNode(node): WingsNode,
    Path(uuid): Path<String>,
) -> Result<Json<Value>, AppError> {
    let server = node_auth::server_for_node(&state.db, &node, &uuid).await?;

    state.events.notify(
        events::SERVER_STATUS_RETRIEVED,
        json!({
            "server_uuid": server.uuid,
            "node_id": node.id,
            "state": server.status,
        }),
    );

    Ok(Json(json!({
        "success": true,
        "state": server.status,
        "server_uuid": server.uuid,
        "node_id": node.id,
    })))
}

/// POST /api/remote/servers/reset — сброс переходных статусов после перезапуска демона.
async fn reset_servers(
    State(state): State<AppState>,
    WingsNode(node): WingsNode,
) -> Result<Json<Value>, AppError> {
    let reset = status_service::reset_node_statuses(&state.db, node.id).await?;

    state.events.notify(
        events::SERVERS_RESET_COMPLETED,
        json!({
            "node_id": node.id,
            "reset": reset,
            "target_state": status_service::RESET_TARGET.as_str(),
        }),
    );

    Ok(Json(json!({
        "success": true,
        "message": "Server statuses reset",
        "reset": reset,
    })))
}
