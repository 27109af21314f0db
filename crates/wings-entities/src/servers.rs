//! Entity для таблицы servers.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "servers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Публичный идентификатор сервера
    #[sea_orm(unique)]
    pub uuid: String,

    pub name: String,
    pub description: Option<String>,

    /// Узел-владелец; статус меняет только он
    pub node_id: i32,

    /// Основная пара ip:port
    pub allocation_id: i32,

    pub spell_id: i32,
    pub realm_id: i32,

    /// Память, МиБ (0 — без ограничения)
    pub memory: i64,
    pub swap: i64,
    pub disk: i64,
    pub cpu: i32,
    pub io: i32,

    /// Привязка к ядрам, например "0-1,4"
    pub threads: Option<String>,

    pub oom_disabled: bool,
    pub allocation_limit: Option<i32>,

    /// Текущий статус жизненного цикла
    pub status: String,

    /// Собственная команда запуска сервера
    #[sea_orm(column_type = "Text", nullable)]
    pub startup: Option<String>,

    /// Образ Docker, если spell не задаёт своих
    pub image: String,

    pub skip_scripts: bool,

    /// Время завершения установки (ISO-8601)
    pub installed_at: Option<String>,

    /// Последняя ошибка, о которой сообщил демон
    #[sea_orm(column_type = "Text", nullable)]
    pub last_error: Option<String>,

    pub updated_at: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
