use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, JoinType, QueryFilter, QuerySelect, RelationTrait};
use tracing::{info, instrument};
use crate::entity::issue::{self, Entity as IssueEntity, IssueState};
use crate::entity::issue_scope::{self, Entity as ScopeEntity};
use crate::model::{AppError, CreateIssueRequest, DbResultExt, DuplicateCheckResult, IssueSummary};
use super::IssueService;

/// First active issue with the candidate's namespace, type and resource.
///
/// The scope's resource namespace is compared against the candidate's *issue*
/// namespace, not the candidate scope's own namespace.
pub(crate) async fn find_duplicate<C: ConnectionTrait>(
    conn: &C,
    req: &CreateIssueRequest,
) -> Result<Option<issue::Model>, AppError> {
    let existing = IssueEntity::find()
        .join(JoinType::InnerJoin, issue::Relation::Scope.def())
        .filter(issue::Column::Namespace.eq(&req.namespace))
        .filter(issue::Column::IssueType.eq(req.issue_type))
        .filter(issue::Column::State.eq(IssueState::Active))
        .filter(issue_scope::Column::ResourceType.eq(&req.scope.resource_type))
        .filter(issue_scope::Column::ResourceName.eq(&req.scope.resource_name))
        .filter(issue_scope::Column::ResourceNamespace.eq(&req.namespace))
        .one(conn)
        .await
        .during("check_duplicate")?;

    if let Some(issue) = &existing {
        info!(existing_issue_id = %issue.id, "found duplicate");
    }

    Ok(existing)
}

impl IssueService {
    #[instrument(skip(self, req), fields(namespace = %req.namespace))]
    pub async fn check_for_duplicate(&self, req: &CreateIssueRequest) -> Result<DuplicateCheckResult, AppError> {
        self.bounded("check_duplicate", async {
            let Some(existing) = find_duplicate(&self.db, req).await? else {
                return Ok(DuplicateCheckResult { is_duplicate: false, existing_issue: None });
            };

            let scope = ScopeEntity::find_by_id(existing.scope_id.clone())
                .one(&self.db)
                .await
                .during_for("check_duplicate", &existing.id)?;

            Ok(DuplicateCheckResult {
                is_duplicate: true,
                existing_issue: Some(IssueSummary::new(&existing, scope.map(Into::into))),
            })
        })
        .await
    }
}
