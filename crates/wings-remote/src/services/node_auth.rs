//! Аутентификация узлов Wings и проверка принадлежности сервера узлу.

use crate::error::{AppError, Missing};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;
use wings_entities::{nodes, servers};

/// Хэш секрета демона (SHA-256 hex), в таком виде он лежит в `nodes.daemon_token_hash`.
pub fn hash_token(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Разобрать значение заголовка `Authorization: Bearer <token_id>.<token>`.
pub fn parse_bearer(header: &str) -> Option<(&str, &str)> {
    let token = header.strip_prefix("Bearer ")?.trim();
    let (token_id, secret) = token.split_once('.')?;
    if token_id.is_empty() || secret.is_empty() {
        return None;
    }
    Some((token_id, secret))
}

/// Найти узел по паре (token_id, секрет).
///
/// Любое несовпадение — `InvalidWingsAuth`, без уточнения, какая половина неверна.
pub async fn authenticate<C: ConnectionTrait>(
    db: &C,
    token_id: &str,
    token_secret: &str,
) -> Result<nodes::Model, AppError> {
    if token_id.is_empty() || token_secret.is_empty() {
        return Err(AppError::InvalidWingsAuth);
    }

    let node = nodes::Entity::find()
        .filter(nodes::Column::DaemonTokenId.eq(token_id))
        .one(db)
        .await?;

    let provided = hash_token(token_secret);
    match node {
        Some(node)
            if bool::from(
                provided
                    .as_bytes()
                    .ct_eq(node.daemon_token_hash.as_bytes()),
            ) =>
        {
            Ok(node)
        }
        Some(node) => {
            tracing::warn!("Неверный секрет демона для узла {} ({})", node.id, node.name);
            Err(AppError::InvalidWingsAuth)
        }
        None => {
            tracing::warn!("Неизвестный token_id демона: {token_id}");
            Err(AppError::InvalidWingsAuth)
        }
    }
}

/// Получить сервер по UUID, только если он принадлежит узлу.
///
/// Чужой сервер и несуществующий сервер дают одинаковый `SERVER_NOT_FOUND`.
pub async fn server_for_node<C: ConnectionTrait>(
    db: &C,
    node: &nodes::Model,
    uuid: &str,
) -> Result<servers::Model, AppError> {
    let uuid = Uuid::parse_str(uuid)
        .map_err(|_| AppError::NotFound(Missing::Server))?
        .to_string();

    servers::Entity::find()
        .filter(servers::Column::Uuid.eq(uuid))
        .filter(servers::Column::NodeId.eq(node.id))
        .one(db)
        .await?
        .ok_or(AppError::NotFound(Missing::Server))
}
