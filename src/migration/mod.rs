pub use sea_orm_migration::prelude::*;

mod m20250501_000001_create_issue_scope_table;
mod m20250501_000002_create_issue_table;
mod m20250501_000003_create_link_table;
mod m20250501_000004_create_related_issue_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250501_000001_create_issue_scope_table::Migration),
            Box::new(m20250501_000002_create_issue_table::Migration),
            Box::new(m20250501_000003_create_link_table::Migration),
            Box::new(m20250501_000004_create_related_issue_table::Migration),
        ]
    }
}
