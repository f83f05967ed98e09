use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveEnum, Set};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "issues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub severity: Severity,
    pub issue_type: IssueType,
    pub state: IssueState,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub namespace: String,
    #[sea_orm(unique)]
    pub scope_id: String,
    /// Duplicate-detection key. Only populated while the issue is active and
    /// matchable, so the unique index admits one live detection per scope.
    #[sea_orm(unique)]
    pub dedup_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[sea_orm(string_value = "info")]
    Info,

    #[sea_orm(string_value = "minor")]
    Minor,

    #[sea_orm(string_value = "major")]
    Major,

    #[sea_orm(string_value = "critical")]
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    #[sea_orm(string_value = "build")]
    Build,

    #[sea_orm(string_value = "test")]
    Test,

    #[sea_orm(string_value = "release")]
    Release,

    #[sea_orm(string_value = "dependency")]
    Dependency,

    #[sea_orm(string_value = "pipeline")]
    Pipeline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueState {
    #[default]
    #[sea_orm(string_value = "ACTIVE")]
    Active,

    #[sea_orm(string_value = "RESOLVED")]
    Resolved,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::issue_scope::Entity",
        from = "Column::ScopeId",
        to = "super::issue_scope::Column::Id"
    )]
    Scope,

    #[sea_orm(has_many = "super::link::Entity")]
    Link,
}

impl Related<super::issue_scope::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scope.def()
    }
}

impl Related<super::link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Link.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr> {
        let now = Utc::now();
        if insert {
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}

/// Hashes the components the duplicate resolver matches on.
pub fn dedup_key(namespace: &str, issue_type: IssueType, resource_type: &str, resource_name: &str) -> String {
    let kind = issue_type.to_value();
    let mut hasher = Sha256::new();
    for part in [namespace, kind.as_str(), resource_type, resource_name] {
        hasher.update(part.as_bytes());
        // separator keeps ("ab", "c") distinct from ("a", "bc")
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

/// The key an issue should carry given its state and scope, or `None` when
/// the duplicate resolver can never match it.
pub fn dedup_key_for(
    namespace: &str,
    issue_type: IssueType,
    state: IssueState,
    scope: &super::issue_scope::Model,
) -> Option<String> {
    if state != IssueState::Active || scope.resource_namespace != namespace {
        return None;
    }
    Some(dedup_key(namespace, issue_type, &scope.resource_type, &scope.resource_name))
}
