use std::collections::{HashMap, HashSet};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Select,
};
use sea_query::{Expr, SimpleExpr};
use tracing::instrument;
use crate::entity::issue::{self, Entity as IssueEntity};
use crate::entity::issue_scope::{self, Entity as ScopeEntity};
use crate::entity::link::{self, Entity as LinkEntity};
use crate::entity::related_issue::{self, Entity as RelatedIssueEntity};
use crate::model::{
    AppError, DbResultExt, IssuePage, IssueQueryFilters, IssueResponse, IssueSummary, LinkResponse,
    RelatedIssueResponse, ScopeResponse,
};
use super::IssueService;

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

const LIKE_ESCAPE: char = '!';

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// `LOWER(column) LIKE LOWER(pattern)`. Both sides fold case with the same
/// database rules.
fn lower_like(column: issue::Column, pattern: &str) -> SimpleExpr {
    Expr::cust_with_exprs(
        format!("LOWER($1) LIKE LOWER($2) ESCAPE '{LIKE_ESCAPE}'"),
        [Expr::col((IssueEntity, column)).into(), Expr::val(pattern).into()],
    )
}

/// Conjunction of every filter present. Pagination is left to the caller.
pub(crate) fn filtered_select(filters: &IssueQueryFilters) -> Select<IssueEntity> {
    let mut query = IssueEntity::find();

    if let Some(namespace) = non_empty(&filters.namespace) {
        query = query.filter(issue::Column::Namespace.eq(namespace));
    }
    if let Some(severity) = filters.severity {
        query = query.filter(issue::Column::Severity.eq(severity));
    }
    if let Some(issue_type) = filters.issue_type {
        query = query.filter(issue::Column::IssueType.eq(issue_type));
    }
    if let Some(state) = filters.state {
        query = query.filter(issue::Column::State.eq(state));
    }

    let resource_type = non_empty(&filters.resource_type);
    let resource_name = non_empty(&filters.resource_name);
    if resource_type.is_some() || resource_name.is_some() {
        query = query.join(JoinType::InnerJoin, issue::Relation::Scope.def());
        if let Some(resource_type) = resource_type {
            query = query.filter(issue_scope::Column::ResourceType.eq(resource_type));
        }
        if let Some(resource_name) = resource_name {
            query = query.filter(issue_scope::Column::ResourceName.eq(resource_name));
        }
    }

    if let Some(search) = non_empty(&filters.search) {
        let pattern = format!("%{}%", escape_like(search));
        query = query.filter(
            Condition::any()
                .add(lower_like(issue::Column::Title, &pattern))
                .add(lower_like(issue::Column::Description, &pattern)),
        );
    }

    query
}

/// Loads scope, links and both edge directions for each issue. Issues on the
/// far side of an edge get their scope and nothing further.
pub(crate) async fn hydrate<C: ConnectionTrait>(
    conn: &C,
    issues: Vec<issue::Model>,
) -> Result<Vec<IssueResponse>, AppError> {
    if issues.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = issues.iter().map(|i| i.id.clone()).collect();

    let edges = RelatedIssueEntity::find()
        .filter(
            Condition::any()
                .add(related_issue::Column::SourceId.is_in(ids.clone()))
                .add(related_issue::Column::TargetId.is_in(ids.clone())),
        )
        .order_by_asc(related_issue::Column::Id)
        .all(conn)
        .await
        .during("load_related_issues")?;

    let loaded: HashSet<&str> = ids.iter().map(String::as_str).collect();
    let neighbour_ids: HashSet<String> = edges
        .iter()
        .flat_map(|e| [e.source_id.clone(), e.target_id.clone()])
        .filter(|id| !loaded.contains(id.as_str()))
        .collect();

    let neighbours = if neighbour_ids.is_empty() {
        Vec::new()
    } else {
        IssueEntity::find()
            .filter(issue::Column::Id.is_in(neighbour_ids))
            .all(conn)
            .await
            .during("load_related_issues")?
    };

    let scope_ids: HashSet<String> = issues
        .iter()
        .chain(neighbours.iter())
        .map(|i| i.scope_id.clone())
        .collect();
    let scopes: HashMap<String, issue_scope::Model> = ScopeEntity::find()
        .filter(issue_scope::Column::Id.is_in(scope_ids))
        .all(conn)
        .await
        .during("load_scopes")?
        .into_iter()
        .map(|s| (s.id.clone(), s))
        .collect();

    let mut links: HashMap<String, Vec<LinkResponse>> = HashMap::new();
    for model in LinkEntity::find()
        .filter(link::Column::IssueId.is_in(ids.clone()))
        .order_by_asc(link::Column::Id)
        .all(conn)
        .await
        .during("load_links")?
    {
        links.entry(model.issue_id.clone()).or_default().push(model.into());
    }

    let scope_of = |model: &issue::Model| scopes.get(&model.scope_id).cloned().map(ScopeResponse::from);
    let summaries: HashMap<&str, IssueSummary> = issues
        .iter()
        .chain(neighbours.iter())
        .map(|i| (i.id.as_str(), IssueSummary::new(i, scope_of(i))))
        .collect();

    let mut related_from: HashMap<&str, Vec<RelatedIssueResponse>> = HashMap::new();
    let mut related_to: HashMap<&str, Vec<RelatedIssueResponse>> = HashMap::new();
    for edge in &edges {
        let view = |far: &str| RelatedIssueResponse {
            id: edge.id.clone(),
            source_id: edge.source_id.clone(),
            target_id: edge.target_id.clone(),
            issue: summaries.get(far).cloned(),
        };
        if loaded.contains(edge.source_id.as_str()) {
            related_from.entry(edge.source_id.as_str()).or_default().push(view(&edge.target_id));
        }
        if loaded.contains(edge.target_id.as_str()) {
            related_to.entry(edge.target_id.as_str()).or_default().push(view(&edge.source_id));
        }
    }

    let mut hydrated = Vec::with_capacity(issues.len());
    for model in &issues {
        let scope = scope_of(model);
        let mut response = IssueResponse::from(model.clone());
        response.scope = scope;
        response.links = links.remove(&model.id).unwrap_or_default();
        response.related_from = related_from.remove(model.id.as_str()).unwrap_or_default();
        response.related_to = related_to.remove(model.id.as_str()).unwrap_or_default();
        hydrated.push(response);
    }

    Ok(hydrated)
}

pub(crate) async fn load_issue<C: ConnectionTrait>(conn: &C, id: &str) -> Result<IssueResponse, AppError> {
    let model = IssueEntity::find_by_id(id.to_string())
        .one(conn)
        .await
        .during_for("find_issue", id)?
        .ok_or_else(|| AppError::issue_not_found(id))?;

    hydrate(conn, vec![model])
        .await?
        .pop()
        .ok_or_else(|| AppError::issue_not_found(id))
}

impl IssueService {
    #[instrument(skip(self))]
    pub async fn find_issue_by_id(&self, id: &str) -> Result<IssueResponse, AppError> {
        self.bounded("find_issue", load_issue(&self.db, id)).await
    }

    #[instrument(skip(self, filters))]
    pub async fn find_issues(&self, filters: IssueQueryFilters) -> Result<IssuePage, AppError> {
        self.bounded("find_issues", async {
            let limit = filters.limit();
            let offset = filters.offset();
            let query = filtered_select(&filters);

            let total = query
                .clone()
                .count(&self.db)
                .await
                .during("count_issues")?;

            let issues = query
                .order_by_desc(issue::Column::DetectedAt)
                .order_by_desc(issue::Column::Id)
                .offset(offset)
                .limit(limit)
                .all(&self.db)
                .await
                .during("find_issues")?;

            Ok(IssuePage {
                data: hydrate(&self.db, issues).await?,
                total,
                limit,
                offset,
            })
        })
        .await
    }
}
