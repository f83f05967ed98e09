use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    Set, SqlErr, TransactionTrait,
};
use tracing::{info, instrument, warn};
use crate::entity::issue::{self, Entity as IssueEntity, IssueState};
use crate::entity::issue_scope::{self, Entity as ScopeEntity};
use crate::entity::link::{self, Entity as LinkEntity};
use crate::entity::related_issue::{self, Entity as RelatedIssueEntity};
use crate::model::{
    AppError, CreateIssueRequest, DbResultExt, ErrorCode, IssueResponse, LinkRequest, UpdateIssueRequest,
};
use super::duplicate::find_duplicate;
use super::query::load_issue;
use super::{IdGenerator, IssueService};

const MAX_CREATE_ATTEMPTS: usize = 3;

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Merges a partial update onto `existing`. Only fields present in `req`
/// change; `updated_at` and the duplicate-detection key are kept in step.
///
/// Moving into `RESOLVED` from any other state stamps `resolved_at` with
/// `now`. An explicit `resolved_at` in the request always wins, and is the
/// only way the column is ever cleared.
pub fn apply_update(
    existing: &issue::Model,
    scope: &issue_scope::Model,
    req: &UpdateIssueRequest,
    now: DateTime<Utc>,
) -> issue::ActiveModel {
    let mut model: issue::ActiveModel = existing.clone().into();

    if let Some(title) = &req.title {
        model.title = Set(title.clone());
    }
    if let Some(description) = &req.description {
        model.description = Set(description.clone());
    }
    if let Some(severity) = req.severity {
        model.severity = Set(severity);
    }
    if let Some(issue_type) = req.issue_type {
        model.issue_type = Set(issue_type);
    }
    if let Some(state) = req.state {
        model.state = Set(state);
        if state == IssueState::Resolved && existing.state != IssueState::Resolved {
            model.resolved_at = Set(Some(now));
        }
    }
    if let Some(resolved_at) = req.resolved_at {
        model.resolved_at = Set(resolved_at);
    }

    let dedup_key = issue::dedup_key_for(
        &existing.namespace,
        req.issue_type.unwrap_or(existing.issue_type),
        req.state.unwrap_or(existing.state),
        scope,
    );
    if dedup_key != existing.dedup_key {
        model.dedup_key = Set(dedup_key);
    }

    model.updated_at = Set(now);
    model
}

async fn insert_links<C: ConnectionTrait>(
    conn: &C,
    ids: &dyn IdGenerator,
    issue_id: &str,
    links: &[LinkRequest],
) -> Result<(), AppError> {
    if links.is_empty() {
        return Ok(());
    }

    let models = links.iter().map(|l| link::ActiveModel {
        id: Set(ids.next_id()),
        title: Set(l.title.clone()),
        url: Set(l.url.clone()),
        issue_id: Set(issue_id.to_string()),
    });

    LinkEntity::insert_many(models)
        .exec_without_returning(conn)
        .await
        .during_for("insert_links", issue_id)?;

    Ok(())
}

enum Insertion {
    Created(String),
    /// A concurrent creator holds the duplicate-detection key.
    KeyTaken,
}

/// Issue, scope and links in one transaction.
async fn insert_new_issue(
    db: &DatabaseConnection,
    ids: &dyn IdGenerator,
    req: &CreateIssueRequest,
) -> Result<Insertion, AppError> {
    let now = Utc::now();
    let state = req.state.unwrap_or_default();
    let scope = issue_scope::Model {
        id: ids.next_id(),
        resource_type: req.scope.resource_type.clone(),
        resource_name: req.scope.resource_name.clone(),
        resource_namespace: req.resource_namespace().to_string(),
    };
    let issue_id = ids.next_id();
    let dedup_key = issue::dedup_key_for(&req.namespace, req.issue_type, state, &scope);

    let txn = db.begin().await.during("create_issue")?;

    issue_scope::ActiveModel {
        id: Set(scope.id.clone()),
        resource_type: Set(scope.resource_type),
        resource_name: Set(scope.resource_name),
        resource_namespace: Set(scope.resource_namespace),
    }
    .insert(&txn)
    .await
    .during_for("create_issue_scope", &issue_id)?;

    let inserted = issue::ActiveModel {
        id: Set(issue_id.clone()),
        title: Set(req.title.clone()),
        description: Set(req.description.clone()),
        severity: Set(req.severity),
        issue_type: Set(req.issue_type),
        state: Set(state),
        detected_at: Set(now),
        resolved_at: Set((state == IssueState::Resolved).then_some(now)),
        namespace: Set(req.namespace.clone()),
        scope_id: Set(scope.id),
        dedup_key: Set(dedup_key),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await;

    match inserted {
        Ok(_) => {}
        // dropping the transaction rolls the scope row back
        Err(err) if is_unique_violation(&err) => return Ok(Insertion::KeyTaken),
        Err(err) => return Err(AppError::persistence("create_issue", Some(&issue_id), err)),
    }

    insert_links(&txn, ids, &issue_id, &req.links).await?;

    txn.commit().await.during_for("create_issue", &issue_id)?;

    Ok(Insertion::Created(issue_id))
}

impl IssueService {
    /// Records a detection. A repeat detection of an active issue refreshes
    /// that issue instead of adding a row.
    #[instrument(skip(self, req), fields(namespace = %req.namespace, issue_type = ?req.issue_type))]
    pub async fn create_issue(&self, req: CreateIssueRequest) -> Result<IssueResponse, AppError> {
        self.bounded("create_issue", self.create_issue_unbounded(&req)).await
    }

    async fn create_issue_unbounded(&self, req: &CreateIssueRequest) -> Result<IssueResponse, AppError> {
        req.validate()?;

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            if let Some(existing) = find_duplicate(&self.db, req).await? {
                match self.update_issue_unbounded(&existing.id, req.as_refresh()).await {
                    // deleted between lookup and update
                    Err(err) if err.is_not_found() => {
                        warn!(attempt, existing_issue_id = %existing.id, "duplicate vanished, retrying");
                        continue;
                    }
                    result => return result,
                }
            }

            match insert_new_issue(&self.db, self.ids.as_ref(), req).await? {
                Insertion::Created(issue_id) => {
                    info!(issue_id = %issue_id, "created new issue");
                    return load_issue(&self.db, &issue_id).await;
                }
                Insertion::KeyTaken => {
                    warn!(attempt, "concurrent detection created this issue first, retrying");
                }
            }
        }

        Err(AppError::conflict(
            ErrorCode::DuplicateActiveIssue,
            format!(
                "{}/{} in {} kept colliding after {MAX_CREATE_ATTEMPTS} attempts",
                req.scope.resource_type, req.scope.resource_name, req.namespace
            ),
        ))
    }

    #[instrument(skip(self, req))]
    pub async fn update_issue(&self, id: &str, req: UpdateIssueRequest) -> Result<IssueResponse, AppError> {
        self.bounded("update_issue", self.update_issue_unbounded(id, req)).await
    }

    async fn update_issue_unbounded(&self, id: &str, req: UpdateIssueRequest) -> Result<IssueResponse, AppError> {
        req.validate()?;

        let txn = self.db.begin().await.during_for("update_issue", id)?;

        let existing = IssueEntity::find_by_id(id.to_string())
            .one(&txn)
            .await
            .during_for("update_issue", id)?
            .ok_or_else(|| AppError::issue_not_found(id))?;

        let scope = ScopeEntity::find_by_id(existing.scope_id.clone())
            .one(&txn)
            .await
            .and_then(|scope| {
                scope.ok_or_else(|| DbErr::RecordNotFound(format!("issue scope {}", existing.scope_id)))
            })
            .during_for("update_issue", id)?;

        apply_update(&existing, &scope, &req, Utc::now())
            .update(&txn)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    AppError::conflict(
                        ErrorCode::DuplicateActiveIssue,
                        format!("another active issue already covers the scope of {id}"),
                    )
                } else {
                    AppError::persistence("update_issue", Some(id), err)
                }
            })?;

        if let Some(links) = &req.links {
            LinkEntity::delete_many()
                .filter(link::Column::IssueId.eq(id))
                .exec(&txn)
                .await
                .during_for("delete_links", id)?;

            insert_links(&txn, self.ids.as_ref(), id, links).await?;
        }

        txn.commit().await.during_for("update_issue", id)?;

        info!(issue_id = %id, "updated issue");

        load_issue(&self.db, id).await
    }

    /// Removes the issue with its edges, links and scope.
    #[instrument(skip(self))]
    pub async fn delete_issue(&self, id: &str) -> Result<(), AppError> {
        self.bounded("delete_issue", async {
            let txn = self.db.begin().await.during_for("delete_issue", id)?;

            let issue = IssueEntity::find_by_id(id.to_string())
                .one(&txn)
                .await
                .during_for("delete_issue", id)?
                .ok_or_else(|| AppError::issue_not_found(id))?;

            let edges = RelatedIssueEntity::delete_many()
                .filter(
                    Condition::any()
                        .add(related_issue::Column::SourceId.eq(id))
                        .add(related_issue::Column::TargetId.eq(id)),
                )
                .exec(&txn)
                .await
                .during_for("delete_related_issues", id)?;

            LinkEntity::delete_many()
                .filter(link::Column::IssueId.eq(id))
                .exec(&txn)
                .await
                .during_for("delete_links", id)?;

            IssueEntity::delete_by_id(id.to_string())
                .exec(&txn)
                .await
                .during_for("delete_issue", id)?;

            ScopeEntity::delete_by_id(issue.scope_id.clone())
                .exec(&txn)
                .await
                .during_for("delete_issue_scope", id)?;

            txn.commit().await.during_for("delete_issue", id)?;

            info!(issue_id = %id, edges_removed = edges.rows_affected, "deleted issue");
            Ok(())
        })
        .await
    }
}
