//! Бизнес-логика удалённого API: аутентификация узлов, дескрипторы, колбэки демона.

pub mod activity_service;
pub mod catalog;
pub mod descriptor;
pub mod import_service;
pub mod install_service;
pub mod node_auth;
pub mod sanitize;
pub mod spell_config;
pub mod status_service;
