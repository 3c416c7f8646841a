//! Commands run through configuration, `connect`, and a mock Gogs server.

use git_issue::config::{CliOverrides, IssueConfig};
use git_issue::executor::{Command, Executor, MessageArgs, Phase};
use git_issue::render::{Action, RenderRecord};
use git_issue::service::{IssueError, IssueNumber, ServiceKind, connect};
use git_issue::test_support::{MapConfigStore, ScriptedEditor, VecSink};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ISSUE_PATH: &str = "/api/v1/repos/octo/repo/issues/3";

fn issue_json(state: &str) -> serde_json::Value {
    json!({
        "id": 103,
        "number": 3,
        "title": "Crash on start",
        "body": "Steps",
        "state": state,
        "user": { "id": 1, "username": "gogs" },
        "assignee": null,
        "milestone": null,
        "labels": [],
        "comments": 0,
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-01T00:00:00Z"
    })
}

fn config_for(server: &MockServer) -> MapConfigStore {
    MapConfigStore::new()
        .with("issue.service", "gogs")
        .with("issue.Gogs.url", &format!("{}/octo/repo.git", server.uri()))
        .with("issue.Gogs.token", "gogs-token")
}

fn no_env(_name: &str) -> Option<String> {
    None
}

fn number(value: u64) -> IssueNumber {
    IssueNumber::new(value).expect("valid issue number")
}

#[tokio::test]
async fn close_with_message_comments_then_transitions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ISSUE_PATH))
        .and(header("authorization", "token gogs-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue_json("open")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{ISSUE_PATH}/comments")))
        .and(body_json(json!({ "body": "Fixed in 1.2" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": 9,
            "body": "Fixed in 1.2",
            "user": { "id": 1, "username": "gogs" },
            "created_at": "2025-01-02T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(ISSUE_PATH))
        .and(body_json(json!({ "state": "closed" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(issue_json("closed")))
        .expect(1)
        .mount(&server)
        .await;

    let store = config_for(&server);
    let config = IssueConfig::load(&store, &no_env, &CliOverrides::default())
        .expect("configuration should load");
    let settings = config
        .resolve(|_| Ok(None))
        .expect("configuration should resolve");
    assert_eq!(settings.kind, ServiceKind::Gogs);
    let service = connect(&settings).expect("service should connect");

    let editor = ScriptedEditor::new();
    let mut sink = VecSink::default();
    let execution = Executor::new(service.as_ref(), &editor, &mut sink)
        .run(Command::Close {
            number: number(3),
            message: MessageArgs::inline("Fixed in 1.2"),
        })
        .await;

    execution.result.as_ref().expect("close should succeed");
    assert_eq!(
        execution.phases,
        vec![
            Phase::Validating,
            Phase::Fetching,
            Phase::Invoking,
            Phase::Rendering,
            Phase::Done
        ]
    );
    assert_eq!(
        sink.records,
        vec![RenderRecord::Outcome {
            action: Action::Closed,
            number: number(3),
            url: format!("{}/octo/repo/issues/3", server.uri()),
        }]
    );
}

#[tokio::test]
async fn rejected_token_is_an_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ISSUE_PATH))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "bad token" })),
        )
        .mount(&server)
        .await;

    let store = config_for(&server);
    let settings = IssueConfig::load(&store, &no_env, &CliOverrides::default())
        .and_then(|config| config.resolve(|_| Ok(None)))
        .expect("configuration should resolve");
    let service = connect(&settings).expect("service should connect");

    let editor = ScriptedEditor::new();
    let mut sink = VecSink::default();
    let execution = Executor::new(service.as_ref(), &editor, &mut sink)
        .run(Command::Reopen { number: number(3) })
        .await;

    assert!(
        matches!(execution.result, Err(IssueError::Authentication { .. })),
        "expected Authentication, got {:?}",
        execution.result
    );
    assert_eq!(execution.failed_in(), Some(Phase::Fetching));
}

#[tokio::test]
async fn jira_close_is_refused_after_the_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/issue/PROJ-3"))
        .and(header("authorization", "Basic YWxpY2U6c2VjcmV0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "key": "PROJ-3",
            "fields": { "summary": "Crash on start", "status": { "name": "Open" } }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let store = MapConfigStore::new()
        .with("issue.service", "jira")
        .with("issue.JIRA.url", &server.uri())
        .with("issue.JIRA.key", "PROJ")
        .with("issue.JIRA.token", "alice:secret");
    let settings = IssueConfig::load(&store, &no_env, &CliOverrides::default())
        .and_then(|config| config.resolve(|_| Ok(None)))
        .expect("configuration should resolve");
    let service = connect(&settings).expect("service should connect");

    let editor = ScriptedEditor::new();
    let mut sink = VecSink::default();
    let execution = Executor::new(service.as_ref(), &editor, &mut sink)
        .run(Command::Close {
            number: number(3),
            message: MessageArgs::inline("Won't fix"),
        })
        .await;

    assert!(
        matches!(execution.result, Err(IssueError::Validation { .. })),
        "expected Validation, got {:?}",
        execution.result
    );
    assert_eq!(execution.failed_in(), Some(Phase::Invoking));
    assert!(sink.records.is_empty());
}
