//! Entity для таблицы nodes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "nodes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub uuid: String,

    /// Отображаемое имя узла
    pub name: String,

    /// Локация, к которой привязан узел
    pub location_id: Option<i32>,

    /// Идентификатор токена демона (первая половина Bearer-токена)
    #[sea_orm(unique)]
    pub daemon_token_id: String,

    /// SHA-256 hex секрета демона; сам секрет не хранится
    #[serde(skip_serializing)]
    pub daemon_token_hash: String,

    /// Время создания (ISO-8601)
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
