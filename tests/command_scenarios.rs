//! End-to-end command scenarios against the in-memory tracker.

use git_issue::executor::{Command, Executor, FieldArgs, MessageArgs};
use git_issue::reconcile::Change;
use git_issue::render::{Action, RenderRecord};
use git_issue::service::{IssueError, IssueNumber, IssueState};
use git_issue::test_support::{
    RecordingService, ScriptedEditor, ServiceCall, VecSink, sample_label, sample_milestone,
    sample_user,
};
use rstest::{fixture, rstest};

#[fixture]
fn tracker() -> RecordingService {
    RecordingService::default()
        .with_user(sample_user(10, "alice"))
        .with_label(sample_label(1, "bug"))
        .with_label(sample_label(2, "urgent"))
        .with_milestone(sample_milestone(3, "v1.0"))
}

fn number(value: u64) -> IssueNumber {
    IssueNumber::new(value).expect("valid issue number")
}

async fn run(service: &RecordingService, command: Command) -> (Result<(), IssueError>, VecSink) {
    let editor = ScriptedEditor::new();
    let mut sink = VecSink::default();
    let result = Executor::new(service, &editor, &mut sink)
        .run(command)
        .await
        .into_result();
    (result, sink)
}

fn fields(assignee: Option<&str>, milestone: Option<&str>, labels: &[&str]) -> FieldArgs {
    FieldArgs {
        assignee: assignee.map(ToOwned::to_owned),
        milestone: milestone.map(ToOwned::to_owned),
        labels: labels.iter().map(|label| (*label).to_owned()).collect(),
    }
}

#[rstest]
#[tokio::test]
async fn issue_lifecycle_makes_minimal_calls(tracker: RecordingService) {
    let (created, sink) = run(
        &tracker,
        Command::Create {
            message: MessageArgs::inline("Fix crash\nSteps..."),
            fields: fields(None, Some("v1.0"), &["bug", "urgent"]),
        },
    )
    .await;
    created.expect("create should succeed");
    assert!(matches!(
        sink.records.as_slice(),
        [RenderRecord::Outcome { action: Action::Created, number: created_number, .. }]
            if *created_number == number(1)
    ));
    let creates = tracker
        .mutations()
        .iter()
        .filter(|call| matches!(call, ServiceCall::Create(_)))
        .count();
    assert_eq!(creates, 1);
    assert!(
        tracker
            .calls()
            .iter()
            .all(|call| !matches!(call, ServiceCall::Update(..))),
        "labels are sent with the create call"
    );
    let created_issue = tracker.stored(number(1)).expect("issue should exist");
    assert_eq!(created_issue.title, "Fix crash");
    assert_eq!(created_issue.body, "Steps...");

    let (edited, _) = run(
        &tracker,
        Command::Edit {
            number: number(1),
            message: MessageArgs::skip(),
            fields: fields(None, Some("none"), &[]),
        },
    )
    .await;
    edited.expect("edit should succeed");
    let updates: Vec<ServiceCall> = tracker
        .mutations()
        .into_iter()
        .filter(|call| matches!(call, ServiceCall::Update(..)))
        .collect();
    assert!(
        matches!(
            updates.as_slice(),
            [ServiceCall::Update(_, changes)]
                if changes.milestone == Change::Cleared
                    && changes.changed_fields() == vec!["milestone"]
        ),
        "expected one milestone-only update, got {updates:?}"
    );
    let stored = tracker.stored(number(1)).expect("issue should exist");
    assert_eq!(stored.milestone, None);
    assert_eq!(stored.labels.len(), 2);

    let (retitled, _) = run(
        &tracker,
        Command::Edit {
            number: number(1),
            message: MessageArgs::inline("Fix crash on start"),
            fields: fields(None, None, &[]),
        },
    )
    .await;
    retitled.expect("edit should succeed");
    let retitled_issue = tracker.stored(number(1)).expect("issue should exist");
    assert_eq!(retitled_issue.title, "Fix crash on start");
    assert_eq!(retitled_issue.body, "Steps...");
}

#[rstest]
#[tokio::test]
async fn unknown_assignee_fails_before_any_mutation(tracker: RecordingService) {
    let (result, sink) = run(
        &tracker,
        Command::Create {
            message: MessageArgs::inline("Crash on start"),
            fields: fields(Some("nosuchuser"), None, &[]),
        },
    )
    .await;

    assert!(
        matches!(&result, Err(IssueError::NotFound { identifier, .. }) if identifier.contains("nosuchuser")),
        "expected NotFound, got {result:?}"
    );
    assert!(tracker.mutations().is_empty());
    assert!(sink.records.is_empty());
}

#[rstest]
#[tokio::test]
async fn close_then_reopen_restores_the_issue(tracker: RecordingService) {
    let (created, _) = run(
        &tracker,
        Command::Create {
            message: MessageArgs::inline("Crash on start"),
            fields: fields(Some("alice"), None, &["bug"]),
        },
    )
    .await;
    created.expect("create should succeed");
    let before = tracker.stored(number(1)).expect("issue should exist");

    let (closed, _) = run(
        &tracker,
        Command::Close {
            number: number(1),
            message: MessageArgs::skip(),
        },
    )
    .await;
    closed.expect("close should succeed");
    assert_eq!(
        tracker.stored(number(1)).map(|issue| issue.state),
        Some(IssueState::Closed)
    );

    let (reopened, _) = run(&tracker, Command::Reopen { number: number(1) }).await;
    reopened.expect("reopen should succeed");
    assert_eq!(tracker.stored(number(1)), Some(before));
}
