//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use kite::entity::issue::{IssueType, Severity};
use kite::migration::{Migrator, MigratorTrait};
use kite::model::{CreateIssueRequest, LinkRequest, ScopeRequest};
use kite::IssueService;
use sea_orm::{ConnectOptions, Database};

/// Service over a private in-memory SQLite database with the schema applied.
pub async fn setup() -> IssueService {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    IssueService::new(db)
}

pub fn detection(namespace: &str, resource_name: &str) -> CreateIssueRequest {
    CreateIssueRequest {
        title: format!("Deployment {resource_name} unavailable"),
        description: "0/3 replicas ready".to_string(),
        severity: Severity::Major,
        issue_type: IssueType::Release,
        state: None,
        namespace: namespace.to_string(),
        scope: ScopeRequest {
            resource_type: "Deployment".to_string(),
            resource_name: resource_name.to_string(),
            resource_namespace: None,
        },
        links: vec![],
    }
}

pub fn link(title: &str) -> LinkRequest {
    LinkRequest {
        title: title.to_string(),
        url: format!("https://ci.example.com/{title}"),
    }
}
