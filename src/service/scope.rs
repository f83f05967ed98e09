use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use sea_query::{Expr, Query};
use tracing::{info, instrument};
use crate::entity::issue::{self, Entity as IssueEntity, IssueState};
use crate::entity::issue_scope::{self, Entity as ScopeEntity};
use crate::model::{AppError, DbResultExt};
use super::IssueService;

impl IssueService {
    /// Resolves every active issue in `namespace` whose scope names the given
    /// resource, in a single statement. Returns how many rows changed.
    #[instrument(skip(self))]
    pub async fn resolve_issues_by_scope(
        &self,
        resource_type: &str,
        resource_name: &str,
        namespace: &str,
    ) -> Result<u64, AppError> {
        self.bounded("resolve_issues_by_scope", async {
            let now = Utc::now();

            let matching_scopes = Query::select()
                .column(issue_scope::Column::Id)
                .from(ScopeEntity)
                .and_where(issue_scope::Column::ResourceType.eq(resource_type))
                .and_where(issue_scope::Column::ResourceName.eq(resource_name))
                .to_owned();

            let result = IssueEntity::update_many()
                .col_expr(issue::Column::State, Expr::value(IssueState::Resolved))
                .col_expr(issue::Column::ResolvedAt, Expr::value(now))
                .col_expr(issue::Column::UpdatedAt, Expr::value(now))
                .col_expr(issue::Column::DedupKey, Expr::value(Option::<String>::None))
                .filter(issue::Column::State.eq(IssueState::Active))
                .filter(issue::Column::Namespace.eq(namespace))
                .filter(issue::Column::ScopeId.in_subquery(matching_scopes))
                .exec(&self.db)
                .await
                .during("resolve_issues_by_scope")?;

            let count = result.rows_affected;
            info!(resource_type, resource_name, namespace, count, "resolved issues by scope");

            Ok(count)
        })
        .await
    }
}
