//! Загрузка всех строк, нужных для дескриптора сервера.

use crate::error::{AppError, Missing};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
};
use std::collections::HashMap;
use wings_entities::{
    allocations, nodes, realms, server_variables, servers, spell_variables, spells,
};

/// Переменная окружения после применения значения сервера поверх значения spell.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedVariable {
    pub env_variable: String,
    pub value: String,
}

/// Сервер вместе со всеми связанными строками. Только для чтения.
#[derive(Debug, Clone)]
pub struct ServerContext {
    pub server: servers::Model,
    pub node: nodes::Model,
    pub allocation: allocations::Model,
    /// Все пары ip:port сервера, по возрастанию id
    pub allocations: Vec<allocations::Model>,
    pub spell: spells::Model,
    pub realm: realms::Model,
    pub variables: Vec<ResolvedVariable>,
}

/// Подтянуть узел, allocation, spell, realm и переменные сервера.
///
/// Каждая отсутствующая строка даёт свою 404-ошибку.
pub async fn load_context<C: ConnectionTrait>(
    db: &C,
    server: servers::Model,
) -> Result<ServerContext, AppError> {
    let node = nodes::Entity::find_by_id(server.node_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound(Missing::Node))?;

    let allocation = allocations::Entity::find_by_id(server.allocation_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound(Missing::Allocation))?;

    let spell = spells::Entity::find_by_id(server.spell_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound(Missing::Spell))?;

    let realm = realms::Entity::find_by_id(server.realm_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound(Missing::Realm))?;

    let allocations = allocations::Entity::find()
        .filter(allocations::Column::ServerId.eq(server.id))
        .order_by_asc(allocations::Column::Id)
        .all(db)
        .await?;

    let variables = resolve_variables(db, &server, &spell).await?;

    Ok(ServerContext {
        server,
        node,
        allocation,
        allocations,
        spell,
        realm,
        variables,
    })
}

async fn resolve_variables<C: ConnectionTrait>(
    db: &C,
    server: &servers::Model,
    spell: &spells::Model,
) -> Result<Vec<ResolvedVariable>, AppError> {
    let definitions = spell_variables::Entity::find()
        .filter(spell_variables::Column::SpellId.eq(spell.id))
        .order_by_asc(spell_variables::Column::Id)
        .all(db)
        .await?;

    let overrides: HashMap<i32, Option<String>> = server_variables::Entity::find()
        .filter(server_variables::Column::ServerId.eq(server.id))
        .all(db)
        .await?
        .into_iter()
        .map(|v| (v.variable_id, v.variable_value))
        .collect();

    Ok(definitions
        .into_iter()
        .map(|def| {
            let value = overrides
                .get(&def.id)
                .cloned()
                .flatten()
                .or(def.default_value)
                .unwrap_or_default();
            ResolvedVariable {
                env_variable: def.env_variable,
                value,
            }
        })
        .collect())
}

/// Одна страница серверов узла и общее количество подходящих строк.
pub async fn servers_page<C: ConnectionTrait>(
    db: &C,
    node_id: i32,
    page: u64,
    per_page: u64,
    search: &str,
) -> Result<(Vec<servers::Model>, u64), AppError> {
    let mut query = servers::Entity::find()
        .filter(servers::Column::NodeId.eq(node_id))
        .order_by_asc(servers::Column::Id);

    let search = search.trim();
    if !search.is_empty() {
        query = query.filter(
            Condition::any()
                .add(servers::Column::Name.contains(search))
                .add(servers::Column::Uuid.contains(search)),
        );
    }

    let paginator = query.paginate(db, per_page);
    let total = paginator.num_items().await?;
    let servers = paginator.fetch_page(page.saturating_sub(1)).await?;
    Ok((servers, total))
}
