//! Tests for the Gogs adapter.

use rstest::{fixture, rstest};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::{GogsService, ListCursor};
use crate::reconcile::{Change, UpdateSet};
use crate::service::{
    AccessToken, IssueError, IssueListing, IssueNumber, IssueService, PageCursor,
    RepositoryLocator, ServiceKind, ServiceSettings, StateFilter,
};
use crate::test_support::{sample_label, sample_milestone};

const REPO_PATH: &str = "/api/v1/repos/octo/repo";

fn service_for(server: &MockServer) -> GogsService {
    let settings = ServiceSettings {
        kind: ServiceKind::Gogs,
        locator: RepositoryLocator::parse(&format!("{}/octo/repo.git", server.uri()))
            .expect("locator should parse"),
        token: AccessToken::new("gogs-token").expect("token"),
    };
    GogsService::new(&settings).expect("service should build")
}

fn number(value: u64) -> IssueNumber {
    IssueNumber::new(value).expect("valid issue number")
}

fn issue_json(number: u64, state: &str) -> serde_json::Value {
    json!({
        "id": 100 + number,
        "number": number,
        "title": "Crash on start",
        "body": "Steps",
        "state": state,
        "user": { "id": 1, "username": "gogs", "full_name": "Gogs Admin", "email": "a@b.c" },
        "assignee": null,
        "milestone": null,
        "labels": [],
        "comments": 0,
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-01T00:00:00Z"
    })
}

#[fixture]
fn cleared_labels_and_milestone() -> UpdateSet {
    UpdateSet {
        milestone: Change::Cleared,
        labels: Change::Cleared,
        ..UpdateSet::default()
    }
}

#[tokio::test]
async fn fetch_sends_token_header_and_derives_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO_PATH}/issues/3")))
        .and(header("authorization", "token gogs-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(3, "open")))
        .expect(1)
        .mount(&server)
        .await;
    let service = service_for(&server);

    let issue = service.fetch(number(3)).await.expect("fetch should succeed");

    assert_eq!(issue.url, format!("{}/octo/repo/issues/3", server.uri()));
    assert_eq!(issue.author.map(|user| user.to_string()).as_deref(), Some("Gogs Admin (gogs) <a@b.c>"));
}

#[rstest]
#[tokio::test]
async fn update_patches_fields_then_clears_labels_with_warning(
    cleared_labels_and_milestone: UpdateSet,
) {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{REPO_PATH}/issues/3")))
        .and(body_json(json!({ "milestone": 0 })))
        .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(3, "open")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{REPO_PATH}/issues/3/labels")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    let service = service_for(&server);

    let updated = service
        .update(number(3), &cleared_labels_and_milestone)
        .await
        .expect("update should succeed");

    assert!(updated.issue.labels.is_empty());
    assert_eq!(updated.warnings.len(), 1, "label edits carry the limitation");
    assert!(updated.warnings.iter().all(|warning| warning.service == ServiceKind::Gogs));
}

#[tokio::test]
async fn label_only_update_puts_ids_and_fetches_issue() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path(format!("{REPO_PATH}/issues/3/labels")))
        .and(body_json(json!({ "labels": [7, 8] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 7, "name": "bug", "color": "ee0701" },
            { "id": 8, "name": "urgent", "color": "e11d21" }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{REPO_PATH}/issues/3")))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue_json(3, "open")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    let service = service_for(&server);

    let changes = UpdateSet {
        labels: Change::Set(vec![sample_label(7, "bug"), sample_label(8, "urgent")]),
        ..UpdateSet::default()
    };
    let updated = service
        .update(number(3), &changes)
        .await
        .expect("update should succeed");

    let names: Vec<&str> = updated.issue.labels.iter().map(|label| label.name.as_str()).collect();
    assert_eq!(names, vec!["bug", "urgent"]);
}

#[rstest]
#[tokio::test]
async fn label_failure_after_patch_is_partially_applied(cleared_labels_and_milestone: UpdateSet) {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{REPO_PATH}/issues/3")))
        .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(3, "open")))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{REPO_PATH}/issues/3/labels")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .mount(&server)
        .await;
    let service = service_for(&server);

    let error = service
        .update(number(3), &cleared_labels_and_milestone)
        .await
        .expect_err("labels call should fail");

    assert!(
        matches!(&error, IssueError::PartiallyApplied { completed, .. } if completed == "fields updated on #3"),
        "expected PartiallyApplied, got {error:?}"
    );
    assert!(matches!(error.root(), IssueError::Transport { .. }));
}

#[tokio::test]
async fn create_sends_username_and_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{REPO_PATH}/issues")))
        .and(body_json(json!({
            "title": "Crash on start",
            "body": "Steps",
            "milestone": 4,
            "labels": [7]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(issue_json(9, "open")))
        .expect(1)
        .mount(&server)
        .await;
    let service = service_for(&server);

    let new_issue = crate::service::NewIssue {
        title: "Crash on start".to_owned(),
        body: "Steps".to_owned(),
        assignee: None,
        milestone: Some(sample_milestone(4, "v1.0")),
        labels: vec![sample_label(7, "bug")],
    };
    let created = service.create(&new_issue).await.expect("create should succeed");

    assert_eq!(created.number, number(9));
}

#[tokio::test]
async fn listing_all_walks_open_then_closed_pages() {
    let server = MockServer::start().await;
    for (state, page, body) in [
        ("open", "1", json!([issue_json(1, "open")])),
        ("open", "2", json!([])),
        ("closed", "1", json!([issue_json(2, "closed")])),
        ("closed", "2", json!([])),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("{REPO_PATH}/issues")))
            .and(query_param("state", state))
            .and(query_param("page", page))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
    }
    let service = service_for(&server);

    let issues = IssueListing::new(&service, StateFilter::All)
        .collect_all()
        .await
        .expect("listing should succeed");

    let numbers: Vec<u64> = issues.iter().map(|issue| issue.number.get()).collect();
    assert_eq!(numbers, vec![1, 2]);
}

#[tokio::test]
async fn user_search_unwraps_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/search"))
        .and(query_param("q", "ali"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "data": [{ "id": 5, "username": "alice", "full_name": "", "email": "" }]
        })))
        .mount(&server)
        .await;
    let service = service_for(&server);

    let users = service.search_users("ali").await.expect("search should succeed");

    assert_eq!(users.first().map(|user| user.username.as_str()), Some("alice"));
}

#[rstest]
#[case::open("open:3", "open", 3)]
#[case::passthrough("in:progress:1", "in:progress", 1)]
fn cursors_parse(#[case] raw: &str, #[case] state: &str, #[case] page: u32) {
    let cursor = ListCursor::parse(&PageCursor::new(raw)).expect("cursor should parse");
    assert_eq!(cursor, ListCursor { state: state.to_owned(), page });
}

#[rstest]
fn malformed_cursor_is_rejected() {
    let result = ListCursor::parse(&PageCursor::new("open"));
    assert!(matches!(result, Err(IssueError::Validation { .. })));
}
