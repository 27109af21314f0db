//! Миграции схемы удалённого API Wings.

pub use sea_orm_migration::prelude::*;

mod m001_create_nodes;
mod m002_create_spells;
mod m003_create_servers;
mod m004_create_server_imports;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m001_create_nodes::Migration),
            Box::new(m002_create_spells::Migration),
            Box::new(m003_create_servers::Migration),
            Box::new(m004_create_server_imports::Migration),
        ]
    }
}
