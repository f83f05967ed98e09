use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One edge of the issue relationship graph. Stored directed, queried undirected.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "related_issues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(indexed)]
    pub source_id: String,
    #[sea_orm(indexed)]
    pub target_id: String,
    /// Direction-free pair key; see [`edge_key`].
    #[sea_orm(unique)]
    pub edge_key: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::issue::Entity",
        from = "Column::SourceId",
        to = "super::issue::Column::Id"
    )]
    Source,

    #[sea_orm(
        belongs_to = "super::issue::Entity",
        from = "Column::TargetId",
        to = "super::issue::Column::Id"
    )]
    Target,
}

impl ActiveModelBehavior for ActiveModel {}

/// (A, B) and (B, A) map to the same key. The lower id is length-prefixed so
/// ids containing the separator cannot alias another pair.
pub fn edge_key(a: &str, b: &str) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{low}:{high}", low.len())
}
