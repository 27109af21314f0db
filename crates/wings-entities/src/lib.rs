//! Entity-модели таблиц панели, которые использует удалённый API Wings.

pub mod allocations;
pub mod nodes;
pub mod realms;
pub mod server_activities;
pub mod server_imports;
pub mod server_variables;
pub mod servers;
pub mod spell_variables;
pub mod spells;
