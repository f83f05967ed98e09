use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set, SqlErr, TransactionTrait};
use tracing::{info, instrument};
use crate::entity::issue::Entity as IssueEntity;
use crate::entity::related_issue::{self, Entity as RelatedIssueEntity};
use crate::model::{AppError, DbResultExt, ErrorCode};
use super::IssueService;

/// Matches the edge between `a` and `b` in either direction.
fn either_direction(a: &str, b: &str) -> Condition {
    Condition::any()
        .add(
            Condition::all()
                .add(related_issue::Column::SourceId.eq(a))
                .add(related_issue::Column::TargetId.eq(b)),
        )
        .add(
            Condition::all()
                .add(related_issue::Column::SourceId.eq(b))
                .add(related_issue::Column::TargetId.eq(a)),
        )
}

fn duplicate_edge(source_id: &str, target_id: &str) -> AppError {
    AppError::conflict(
        ErrorCode::DuplicateRelationship,
        format!("{source_id} and {target_id} are already related"),
    )
}

impl IssueService {
    #[instrument(skip(self))]
    pub async fn add_related_issue(&self, source_id: &str, target_id: &str) -> Result<(), AppError> {
        if source_id == target_id {
            return Err(AppError::validation(ErrorCode::SelfRelation, source_id));
        }

        self.bounded("add_related_issue", async {
            let txn = self.db.begin().await.during("add_related_issue")?;

            for id in [source_id, target_id] {
                IssueEntity::find_by_id(id.to_string())
                    .one(&txn)
                    .await
                    .during_for("add_related_issue", id)?
                    .ok_or_else(|| AppError::issue_not_found(id))?;
            }

            let existing = RelatedIssueEntity::find()
                .filter(either_direction(source_id, target_id))
                .one(&txn)
                .await
                .during_for("add_related_issue", source_id)?;
            if existing.is_some() {
                return Err(duplicate_edge(source_id, target_id));
            }

            related_issue::ActiveModel {
                id: Set(self.ids.next_id()),
                source_id: Set(source_id.to_string()),
                target_id: Set(target_id.to_string()),
                edge_key: Set(related_issue::edge_key(source_id, target_id)),
            }
            .insert(&txn)
            .await
            .map_err(|err| match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => duplicate_edge(source_id, target_id),
                _ => AppError::persistence("add_related_issue", Some(source_id), err),
            })?;

            txn.commit().await.during_for("add_related_issue", source_id)?;

            info!(source_id, target_id, "added related issue");
            Ok(())
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn remove_related_issue(&self, source_id: &str, target_id: &str) -> Result<(), AppError> {
        self.bounded("remove_related_issue", async {
            let result = RelatedIssueEntity::delete_many()
                .filter(either_direction(source_id, target_id))
                .exec(&self.db)
                .await
                .during_for("remove_related_issue", source_id)?;

            if result.rows_affected == 0 {
                return Err(AppError::relationship_not_found(source_id, target_id));
            }

            info!(source_id, target_id, "removed related issue");
            Ok(())
        })
        .await
    }
}
