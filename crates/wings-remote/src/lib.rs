//! Панельная сторона протокола Wings: удалённый API, который вызывают демоны узлов.

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod services;
pub mod tls;

#[cfg(test)]
mod tests;

use api::AppState;
use config::ServerConfig;
use events::TracingEventSink;
use sea_orm::{Database, DatabaseConnection};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use wings_migration::{Migrator, MigratorTrait};

/// Запустить удалённый API Wings.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    // 1. Подключение к БД
    info!("Подключение к базе данных: {}", config.db_url);
    let db: DatabaseConnection = Database::connect(&config.db_url).await?;

    // 2. Автоматические миграции
    info!("Выполнение миграций...");
    Migrator::up(&db, None).await?;

    // 3. Состояние приложения
    if config.lenient_import_get {
        info!("GET-колбэк импорта без статуса завершает активный импорт");
    }
    let state = AppState {
        db,
        events: Arc::new(TracingEventSink),
        panel_url: config.panel_url.clone(),
        lenient_import_get: config.lenient_import_get,
    };

    // 4. Маршрутизатор
    let app = api::build_router(state);

    // 5. Graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Получен сигнал завершения, останавливаю сервер...");
        let _ = shutdown_tx.send(true);
    });

    // 6. Запуск сервера
    info!("Удалённый API Wings запущен (панель: {})", config.panel_url);
    tls::serve(&config, app, shutdown_rx).await?;

    info!("Удалённый API Wings остановлен");
    Ok(())
}
