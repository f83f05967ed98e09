pub mod issue;
pub mod issue_scope;
pub mod link;
pub mod related_issue;
