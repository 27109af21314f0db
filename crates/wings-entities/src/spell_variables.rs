//! Entity для таблицы spell_variables.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "spell_variables")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub spell_id: i32,
    pub name: String,

    /// Имя переменной окружения в контейнере
    pub env_variable: String,

    pub default_value: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
