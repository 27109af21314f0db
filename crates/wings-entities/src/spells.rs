//! Entity для таблицы spells (в терминах демона — egg).
//!
//! Поля `features`, `file_denylist`, `docker_images`, `config_*` хранятся
//! как непрозрачный JSON-текст и разбираются только при построении дескриптора.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "spells")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub uuid: String,

    pub realm_id: i32,
    pub name: String,
    pub author: Option<String>,

    /// Шаблон команды запуска
    #[sea_orm(column_type = "Text", nullable)]
    pub startup: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub features: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub file_denylist: Option<String>,

    /// Список образов Docker: массив или объект «метка → образ»
    #[sea_orm(column_type = "Text", nullable)]
    pub docker_images: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub config_files: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub config_startup: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub config_logs: Option<String>,

    /// Строка-команда либо JSON-объект `{type, value}`
    #[sea_orm(column_type = "Text", nullable)]
    pub config_stop: Option<String>,

    pub force_outgoing_ip: bool,

    pub script_container: Option<String>,
    pub script_entry: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub script_install: Option<String>,

    /// Установочный скрипт, унаследованный от другого spell; имеет приоритет над `script_*`
    pub copy_script_container: Option<String>,
    pub copy_script_entry: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub copy_script_install: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
