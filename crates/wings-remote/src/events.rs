//! Уведомления для наблюдателей (плагины, аудит). Реализация подставляется через `AppState`.

use serde_json::Value;

pub const SERVER_INFO_RETRIEVED: &str = "wings:server:info:retrieved";
pub const SERVERS_REMOTE_RETRIEVED: &str = "wings:servers:remote:retrieved";
pub const SERVER_INSTALL_RETRIEVED: &str = "wings:server:install:retrieved";
pub const SERVER_INSTALL_COMPLETED: &str = "wings:server:install:completed";
pub const SERVER_IMPORT_STATUS: &str = "wings:server:import:status";
pub const SERVER_STATUS_UPDATED: &str = "wings:server:status:updated";
pub const SERVER_STATUS_RETRIEVED: &str = "wings:server:status:retrieved";
pub const SERVERS_RESET_COMPLETED: &str = "wings:servers:reset:completed";

/// Приёмник событий. Вызывается после того, как изменение уже записано.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &str, payload: Value);
}

/// Приёмник по умолчанию: пишет события в журнал.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn notify(&self, event: &str, payload: Value) {
        tracing::debug!(event, %payload, "Событие Wings");
    }
}
