//! Entity для таблицы server_activities (журнал действий по серверу).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "server_activities")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub server_id: i32,
    pub node_id: i32,

    /// Пусто для колбэков демона
    pub user_id: Option<i32>,
    pub ip: Option<String>,

    pub event: String,

    /// JSON с подробностями события
    #[sea_orm(column_type = "Text", nullable)]
    pub metadata: Option<String>,

    pub timestamp: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
