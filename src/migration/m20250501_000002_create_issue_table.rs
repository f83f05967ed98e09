use sea_orm::Schema;
use sea_orm_migration::prelude::*;
use crate::entity::issue::{Column, Entity};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {

    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let schema = Schema::new(manager.get_database_backend());
        manager
            .create_table(
                schema
                    .create_table_from_entity(Entity)
                    .if_not_exists()
                    .to_owned()
            )
            .await?;

        // list filters and bulk resolution both lead with namespace + state
        manager
            .create_index(
                Index::create()
                    .name("idx-issues-namespace-state")
                    .table(Entity)
                    .col(Column::Namespace)
                    .col(Column::State)
                    .if_not_exists()
                    .to_owned()
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-issues-detected_at")
                    .table(Entity)
                    .col(Column::DetectedAt)
                    .if_not_exists()
                    .to_owned()
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Entity).to_owned())
            .await
    }
}
