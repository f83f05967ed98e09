use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use crate::entity::issue::{self, IssueState, IssueType, Severity};
use crate::entity::{issue_scope, link};
use crate::model::global_error::{AppError, ErrorCode};

pub const DEFAULT_PAGE_SIZE: u64 = 50;

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScopeRequest {
    pub resource_type: String,
    pub resource_name: String,
    // defaults to the issue namespace
    #[serde(default)]
    pub resource_namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateIssueRequest {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub issue_type: IssueType,
    #[serde(default)]
    pub state: Option<IssueState>,
    pub namespace: String,
    pub scope: ScopeRequest,
    #[serde(default)]
    pub links: Vec<LinkRequest>,
}

impl CreateIssueRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        require("title", &self.title)?;
        require("description", &self.description)?;
        require("namespace", &self.namespace)?;
        require("scope.resourceType", &self.scope.resource_type)?;
        require("scope.resourceName", &self.scope.resource_name)?;
        validate_links(&self.links)
    }

    /// Resource namespace after defaulting to the issue namespace.
    pub fn resource_namespace(&self) -> &str {
        match self.scope.resource_namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => &self.namespace,
        }
    }

    /// Update applied to an existing issue when this request turns out to be
    /// a repeat detection. State only travels when the caller set it.
    pub fn as_refresh(&self) -> UpdateIssueRequest {
        UpdateIssueRequest {
            title: Some(self.title.clone()),
            description: Some(self.description.clone()),
            severity: Some(self.severity),
            issue_type: Some(self.issue_type),
            state: self.state,
            resolved_at: None,
            links: None,
        }
    }
}

fn validate_links(links: &[LinkRequest]) -> Result<(), AppError> {
    for (index, link) in links.iter().enumerate() {
        require(&format!("links[{index}].title"), &link.title)?;
        require(&format!("links[{index}].url"), &link.url)?;
    }
    Ok(())
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(ErrorCode::ValidationError, format!("{field} is required")));
    }
    Ok(())
}

/// Partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIssueRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub issue_type: Option<IssueType>,
    #[serde(default)]
    pub state: Option<IssueState>,
    /// `Some(None)` is an explicit null and clears the resolution time.
    #[serde(default, deserialize_with = "explicit_null")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub resolved_at: Option<Option<DateTime<Utc>>>,
    /// `Some(vec![])` removes every link.
    #[serde(default)]
    pub links: Option<Vec<LinkRequest>>,
}

impl UpdateIssueRequest {
    /// Fields that are present follow the same rules as on creation.
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            require("title", title)?;
        }
        if let Some(description) = &self.description {
            require("description", description)?;
        }
        match &self.links {
            Some(links) => validate_links(links),
            None => Ok(()),
        }
    }
}

fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueQueryFilters {
    pub namespace: Option<String>,
    pub severity: Option<Severity>,
    pub issue_type: Option<IssueType>,
    pub state: Option<IssueState>,
    pub resource_type: Option<String>,
    pub resource_name: Option<String>,
    pub search: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl IssueQueryFilters {
    pub fn limit(&self) -> u64 {
        match self.limit {
            Some(limit) if limit > 0 => limit,
            _ => DEFAULT_PAGE_SIZE,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScopeResponse {
    pub id: String,
    pub resource_type: String,
    pub resource_name: String,
    pub resource_namespace: String,
}

impl From<issue_scope::Model> for ScopeResponse {
    fn from(model: issue_scope::Model) -> Self {
        Self {
            id: model.id,
            resource_type: model.resource_type,
            resource_name: model.resource_name,
            resource_namespace: model.resource_namespace,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LinkResponse {
    pub id: String,
    pub title: String,
    pub url: String,
    pub issue_id: String,
}

impl From<link::Model> for LinkResponse {
    fn from(model: link::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            url: model.url,
            issue_id: model.issue_id,
        }
    }
}

/// A related issue, loaded one level deep: its scope but not its own edges.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueSummary {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub issue_type: IssueType,
    pub state: IssueState,
    pub namespace: String,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub scope: Option<ScopeResponse>,
}

impl IssueSummary {
    pub fn new(model: &issue::Model, scope: Option<ScopeResponse>) -> Self {
        Self {
            id: model.id.clone(),
            title: model.title.clone(),
            severity: model.severity,
            issue_type: model.issue_type,
            state: model.state,
            namespace: model.namespace.clone(),
            detected_at: model.detected_at,
            resolved_at: model.resolved_at,
            scope,
        }
    }
}

/// An edge seen from one endpoint; `issue` is the endpoint on the far side.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelatedIssueResponse {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub issue: Option<IssueSummary>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub issue_type: IssueType,
    pub state: IssueState,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub namespace: String,
    pub scope_id: String,
    pub scope: Option<ScopeResponse>,
    pub links: Vec<LinkResponse>,
    pub related_from: Vec<RelatedIssueResponse>,
    pub related_to: Vec<RelatedIssueResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<issue::Model> for IssueResponse {
    fn from(model: issue::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            severity: model.severity,
            issue_type: model.issue_type,
            state: model.state,
            detected_at: model.detected_at,
            resolved_at: model.resolved_at,
            namespace: model.namespace,
            scope_id: model.scope_id,
            scope: None,
            links: Vec::new(),
            related_from: Vec::new(),
            related_to: Vec::new(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuePage {
    pub data: Vec<IssueResponse>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateCheckResult {
    pub is_duplicate: bool,
    pub existing_issue: Option<IssueSummary>,
}
