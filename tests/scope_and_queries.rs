//! Bulk resolution by resource scope and filtered listing.

mod common;

use std::time::Duration;
use common::{detection, setup};
use kite::entity::issue::{IssueState, IssueType, Severity};
use kite::model::IssueQueryFilters;

#[tokio::test]
async fn resolve_by_scope_touches_only_active_matches_in_namespace() {
    let service = setup().await;
    let release = service.create_issue(detection("ns1", "foo")).await.unwrap();
    let mut test_kind = detection("ns1", "foo");
    test_kind.issue_type = IssueType::Test;
    let test_issue = service.create_issue(test_kind).await.unwrap();
    let mut build_kind = detection("ns1", "foo");
    build_kind.issue_type = IssueType::Build;
    let build_issue = service.create_issue(build_kind).await.unwrap();
    let other_namespace = service.create_issue(detection("ns2", "foo")).await.unwrap();
    let other_resource = service.create_issue(detection("ns1", "bar")).await.unwrap();

    let resolved = service.resolve_issues_by_scope("Deployment", "foo", "ns1").await.unwrap();
    assert_eq!(resolved, 3);

    for id in [&release.id, &test_issue.id, &build_issue.id] {
        let issue = service.find_issue_by_id(id).await.unwrap();
        assert_eq!(issue.state, IssueState::Resolved);
        assert!(issue.resolved_at.is_some());
    }
    for id in [&other_namespace.id, &other_resource.id] {
        let issue = service.find_issue_by_id(id).await.unwrap();
        assert_eq!(issue.state, IssueState::Active);
        assert!(issue.resolved_at.is_none());
    }

    let again = service.resolve_issues_by_scope("Deployment", "foo", "ns1").await.unwrap();
    assert_eq!(again, 0);
}

#[tokio::test]
async fn detection_after_bulk_resolution_opens_a_new_issue() {
    let service = setup().await;
    let first = service.create_issue(detection("ns1", "foo")).await.unwrap();
    service.resolve_issues_by_scope("Deployment", "foo", "ns1").await.unwrap();

    let second = service.create_issue(detection("ns1", "foo")).await.unwrap();

    assert_ne!(second.id, first.id);
    assert_eq!(second.state, IssueState::Active);
}

#[tokio::test]
async fn resolve_by_scope_with_no_match_is_zero() {
    let service = setup().await;
    service.create_issue(detection("ns1", "foo")).await.unwrap();

    let resolved = service.resolve_issues_by_scope("StatefulSet", "foo", "ns1").await.unwrap();

    assert_eq!(resolved, 0);
}

#[tokio::test]
async fn search_is_case_insensitive_over_title_and_description() {
    let service = setup().await;
    let mut by_title = detection("ns1", "api");
    by_title.title = "Request TIMEOUT on api".to_string();
    let by_title = service.create_issue(by_title).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    service.create_issue(detection("ns1", "cache")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let mut by_description = detection("ns1", "db");
    by_description.description = "connection Timeout after 30s".to_string();
    let by_description = service.create_issue(by_description).await.unwrap();

    let search = || IssueQueryFilters { search: Some("timeout".to_string()), ..Default::default() };

    let page = service.find_issues(search()).await.unwrap();
    assert_eq!(page.total, 2);
    let ids: Vec<_> = page.data.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec![by_description.id.as_str(), by_title.id.as_str()]);

    let truncated = service
        .find_issues(IssueQueryFilters { limit: Some(1), ..search() })
        .await
        .unwrap();
    assert_eq!(truncated.total, 2);
    assert_eq!(truncated.data.len(), 1);
    assert_eq!(truncated.data[0].id, by_description.id);
}

#[tokio::test]
async fn search_wildcards_match_literally() {
    let service = setup().await;
    let mut literal = detection("ns1", "api");
    literal.title = "rollout 100% stuck".to_string();
    let literal = service.create_issue(literal).await.unwrap();
    service.create_issue(detection("ns1", "db")).await.unwrap();

    let page = service
        .find_issues(IssueQueryFilters { search: Some("100%".to_string()), ..Default::default() })
        .await
        .unwrap();

    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].id, literal.id);
}

#[tokio::test]
async fn search_folds_case_the_same_way_on_both_sides() {
    let service = setup().await;
    let mut accented = detection("ns1", "api");
    accented.title = "ÉCHEC du déploiement".to_string();
    let accented = service.create_issue(accented).await.unwrap();
    service.create_issue(detection("ns1", "db")).await.unwrap();

    for term in ["ÉCHEC", "Échec DU"] {
        let page = service
            .find_issues(IssueQueryFilters { search: Some(term.to_string()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(page.total, 1, "search {term:?}");
        assert_eq!(page.data[0].id, accented.id);
    }
}

#[tokio::test]
async fn filters_combine_with_and() {
    let service = setup().await;
    let mut critical = detection("ns1", "api");
    critical.severity = Severity::Critical;
    let critical = service.create_issue(critical).await.unwrap();
    let mut critical_elsewhere = detection("ns2", "api");
    critical_elsewhere.severity = Severity::Critical;
    service.create_issue(critical_elsewhere).await.unwrap();
    service.create_issue(detection("ns1", "db")).await.unwrap();

    let page = service
        .find_issues(IssueQueryFilters {
            namespace: Some("ns1".to_string()),
            severity: Some(Severity::Critical),
            state: Some(IssueState::Active),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].id, critical.id);
    assert!(page.data[0].scope.is_some());
}

#[tokio::test]
async fn results_are_newest_first_and_paged() {
    let service = setup().await;
    let mut created = Vec::new();
    for name in ["a", "b", "c"] {
        created.push(service.create_issue(detection("ns1", name)).await.unwrap().id);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let page = service
        .find_issues(IssueQueryFilters { limit: Some(2), ..Default::default() })
        .await
        .unwrap();

    assert_eq!(page.total, 3);
    assert_eq!(page.limit, 2);
    assert_eq!(page.offset, 0);
    let ids: Vec<_> = page.data.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec![created[2].as_str(), created[1].as_str()]);

    let rest = service
        .find_issues(IssueQueryFilters { limit: Some(2), offset: Some(2), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(rest.total, 3);
    assert_eq!(rest.data.len(), 1);
    assert_eq!(rest.data[0].id, created[0]);
}

#[tokio::test]
async fn default_page_size_applies() {
    let service = setup().await;
    service.create_issue(detection("ns1", "foo")).await.unwrap();

    let page = service.find_issues(IssueQueryFilters::default()).await.unwrap();

    assert_eq!(page.limit, 50);
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn missing_issue_lookup_is_not_found() {
    let service = setup().await;

    let err = service.find_issue_by_id("missing").await.unwrap_err();

    assert!(err.is_not_found());
}
