pub mod global_error;
pub mod issue;

pub use global_error::{AppError, DbResultExt, ErrorCode};
pub use issue::{
    CreateIssueRequest, DuplicateCheckResult, IssuePage, IssueQueryFilters, IssueResponse, IssueSummary,
    LinkRequest, LinkResponse, RelatedIssueResponse, ScopeRequest, ScopeResponse, UpdateIssueRequest,
};
