//! Unit tests for command execution.

use rstest::{fixture, rstest};

use super::{Command, CompletionKind, Executor, FieldArgs, MessageArgs, Phase};
use crate::message::SEPARATOR;
use crate::reconcile::Change;
use crate::render::{Action, RenderRecord};
use crate::service::{
    Comment, CommentKind, IssueError, IssueNumber, IssueState, StateFilter, TargetState,
};
use crate::test_support::{
    RecordingService, ScriptedEditor, ServiceCall, VecSink, sample_issue, sample_label,
    sample_milestone, sample_user,
};

fn number(value: u64) -> IssueNumber {
    IssueNumber::new(value).expect("valid issue number")
}

#[fixture]
fn tracker() -> RecordingService {
    let mut closed = sample_issue(2, "Old crash");
    closed.state = IssueState::Closed;
    let mut labelled = sample_issue(3, "Labelled");
    labelled.labels = vec![sample_label(1, "bug")];
    labelled.milestone = Some(sample_milestone(5, "v1.0"));

    RecordingService::default()
        .with_issue(sample_issue(1, "Crash on start"))
        .with_issue(closed)
        .with_issue(labelled)
        .with_user(sample_user(10, "alice"))
        .with_label(sample_label(1, "bug"))
        .with_label(sample_label(2, "urgent"))
        .with_milestone(sample_milestone(5, "v1.0"))
}

async fn run(
    service: &RecordingService,
    editor: &ScriptedEditor,
    command: Command,
) -> (super::Execution, VecSink) {
    let mut sink = VecSink::default();
    let execution = Executor::new(service, editor, &mut sink).run(command).await;
    (execution, sink)
}

#[rstest]
#[tokio::test]
async fn create_opens_blank_seed_and_reports_created(tracker: RecordingService) {
    let editor = ScriptedEditor::new().responding("New crash\nignored\nBody text");

    let (execution, sink) = run(
        &tracker,
        &editor,
        Command::Create {
            message: MessageArgs::default(),
            fields: FieldArgs::default(),
        },
    )
    .await;

    execution.result.as_ref().expect("create should succeed");
    assert_eq!(editor.seeds(), vec![format!("\n{SEPARATOR}\n")]);
    assert_eq!(
        execution.phases,
        vec![
            Phase::Validating,
            Phase::Reconciling,
            Phase::Invoking,
            Phase::Rendering,
            Phase::Done
        ]
    );
    let stored = tracker.stored(number(4)).expect("issue should be stored");
    assert_eq!(stored.title, "New crash");
    assert_eq!(stored.body, "Body text");
    assert!(matches!(
        sink.records.as_slice(),
        [RenderRecord::Outcome { action: Action::Created, .. }]
    ));
}

#[rstest]
#[tokio::test]
async fn create_rejects_empty_title_without_calling_provider(tracker: RecordingService) {
    let editor = ScriptedEditor::new().responding(&format!("   \n{SEPARATOR}\nbody"));

    let (execution, sink) = run(
        &tracker,
        &editor,
        Command::Create {
            message: MessageArgs::default(),
            fields: FieldArgs::default(),
        },
    )
    .await;

    assert_eq!(
        execution.result,
        Err(IssueError::validation("aborting due to empty issue title"))
    );
    assert_eq!(execution.failed_in(), Some(Phase::Validating));
    assert!(tracker.calls().is_empty());
    assert!(sink.records.is_empty());
}

#[rstest]
#[tokio::test]
async fn editor_failure_aborts_before_any_call(tracker: RecordingService) {
    let editor = ScriptedEditor::new().failing(IssueError::Editor {
        message: "vi exited with status 1".to_owned(),
    });

    let (execution, _) = run(
        &tracker,
        &editor,
        Command::Comment {
            number: number(1),
            message: MessageArgs::default(),
        },
    )
    .await;

    assert!(matches!(execution.result, Err(IssueError::Editor { .. })));
    assert!(tracker.calls().is_empty());
}

#[rstest]
#[tokio::test]
async fn message_and_no_message_conflict(tracker: RecordingService) {
    let editor = ScriptedEditor::new();
    let message = MessageArgs {
        message: Some("Title".to_owned()),
        no_message: true,
    };

    let (execution, _) = run(
        &tracker,
        &editor,
        Command::Edit {
            number: number(1),
            message,
            fields: FieldArgs::default(),
        },
    )
    .await;

    assert!(matches!(execution.result, Err(IssueError::Validation { .. })));
    assert!(tracker.calls().is_empty());
}

#[rstest]
#[tokio::test]
async fn edit_without_changes_skips_update(tracker: RecordingService) {
    let editor = ScriptedEditor::new();

    let (execution, sink) = run(
        &tracker,
        &editor,
        Command::Edit {
            number: number(3),
            message: MessageArgs::skip(),
            fields: FieldArgs {
                labels: vec!["bug".to_owned()],
                milestone: Some("v1.0".to_owned()),
                ..FieldArgs::default()
            },
        },
    )
    .await;

    execution.result.as_ref().expect("edit should succeed");
    assert!(tracker.mutations().is_empty());
    assert!(!execution.phases.contains(&Phase::Invoking));
    assert!(matches!(
        sink.records.as_slice(),
        [RenderRecord::Outcome { action: Action::Unchanged, .. }]
    ));
}

#[rstest]
#[tokio::test]
async fn edit_seeds_editor_with_current_text(tracker: RecordingService) {
    let editor = ScriptedEditor::new().responding(&format!("Crash at boot\n{SEPARATOR}\n"));

    let (execution, _) = run(
        &tracker,
        &editor,
        Command::Edit {
            number: number(1),
            message: MessageArgs::default(),
            fields: FieldArgs::default(),
        },
    )
    .await;

    execution.result.as_ref().expect("edit should succeed");
    assert_eq!(editor.seeds(), vec![format!("Crash on start\n{SEPARATOR}\n")]);
    let updates: Vec<ServiceCall> = tracker.mutations();
    assert!(matches!(
        updates.as_slice(),
        [ServiceCall::Update(_, changes)]
            if changes.title == Change::Set("Crash at boot".to_owned())
                && changes.body.is_unchanged()
    ));
}

#[rstest]
#[tokio::test]
async fn inline_title_only_edit_keeps_body(tracker: RecordingService) {
    let mut reported = sample_issue(1, "Crash on start");
    reported.body = "Steps to reproduce".to_owned();
    let service = tracker.with_issue(reported);
    let editor = ScriptedEditor::new();

    let (execution, _) = run(
        &service,
        &editor,
        Command::Edit {
            number: number(1),
            message: MessageArgs::inline("Crash at boot"),
            fields: FieldArgs::default(),
        },
    )
    .await;

    execution.result.as_ref().expect("edit should succeed");
    assert!(editor.seeds().is_empty(), "inline text never opens the editor");
    let updates = service.mutations();
    assert!(
        matches!(
            updates.as_slice(),
            [ServiceCall::Update(_, changes)] if changes.changed_fields() == vec!["title"]
        ),
        "expected a title-only update, got {updates:?}"
    );
    let stored = service.stored(number(1)).expect("issue should exist");
    assert_eq!(stored.title, "Crash at boot");
    assert_eq!(stored.body, "Steps to reproduce");
}

#[rstest]
#[case::single_body_line("Fix crash\nSteps...", "Steps...")]
#[case::blank_second_line("Fix crash\n\nSteps:\n1. run", "\nSteps:\n1. run")]
#[tokio::test]
async fn inline_create_keeps_every_body_line(
    tracker: RecordingService,
    #[case] text: &str,
    #[case] body: &str,
) {
    let editor = ScriptedEditor::new();

    let (execution, _) = run(
        &tracker,
        &editor,
        Command::Create {
            message: MessageArgs::inline(text),
            fields: FieldArgs::default(),
        },
    )
    .await;

    execution.result.as_ref().expect("create should succeed");
    let stored = tracker.stored(number(4)).expect("issue should be stored");
    assert_eq!(stored.title, "Fix crash");
    assert_eq!(stored.body, body);
}

#[rstest]
#[tokio::test]
async fn inline_edit_with_body_replaces_both(tracker: RecordingService) {
    let editor = ScriptedEditor::new();

    let (execution, _) = run(
        &tracker,
        &editor,
        Command::Edit {
            number: number(1),
            message: MessageArgs::inline("Fix crash\nSteps..."),
            fields: FieldArgs::default(),
        },
    )
    .await;

    execution.result.as_ref().expect("edit should succeed");
    let stored = tracker.stored(number(1)).expect("issue should exist");
    assert_eq!((stored.title.as_str(), stored.body.as_str()), ("Fix crash", "Steps..."));
}

#[rstest]
#[tokio::test]
async fn close_posts_comment_then_transitions(tracker: RecordingService) {
    let editor = ScriptedEditor::new();

    let (execution, sink) = run(
        &tracker,
        &editor,
        Command::Close {
            number: number(1),
            message: MessageArgs::inline("Fixed in 1.2"),
        },
    )
    .await;

    execution.result.as_ref().expect("close should succeed");
    assert_eq!(
        tracker.calls(),
        vec![
            ServiceCall::Fetch(number(1)),
            ServiceCall::Comment(number(1), "Fixed in 1.2".to_owned()),
            ServiceCall::Transition(number(1), TargetState::Closed),
        ]
    );
    assert!(matches!(
        sink.records.as_slice(),
        [RenderRecord::Outcome { action: Action::Closed, .. }]
    ));
}

#[rstest]
#[case::close_closed(
    Command::Close {
        number: IssueNumber::new(2).expect("number"),
        message: MessageArgs::skip(),
    },
    "issue #2 is not open"
)]
#[case::reopen_open(
    Command::Reopen { number: IssueNumber::new(1).expect("number") },
    "issue #1 is not closed"
)]
#[tokio::test]
async fn state_guard_blocks_wrong_transition(
    tracker: RecordingService,
    #[case] command: Command,
    #[case] expected: &str,
) {
    let editor = ScriptedEditor::new();

    let (execution, _) = run(&tracker, &editor, command).await;

    assert_eq!(execution.result, Err(IssueError::validation(expected)));
    assert_eq!(execution.failed_in(), Some(Phase::Fetching));
    assert!(tracker.mutations().is_empty());
}

#[rstest]
#[tokio::test]
async fn close_then_reopen_restores_open_issue(tracker: RecordingService) {
    let editor = ScriptedEditor::new();
    let before = tracker.stored(number(1)).expect("stored");

    for command in [
        Command::Close {
            number: number(1),
            message: MessageArgs::skip(),
        },
        Command::Reopen { number: number(1) },
    ] {
        let (execution, _) = run(&tracker, &editor, command).await;
        execution.result.as_ref().expect("transition should succeed");
    }

    assert_eq!(tracker.stored(number(1)), Some(before));
}

#[rstest]
#[tokio::test]
async fn show_quiet_drops_events(tracker: RecordingService) {
    let note = Comment {
        issue: number(1),
        id: Some(1),
        author: Some(sample_user(10, "alice")),
        body: "Seen on 1.1".to_owned(),
        created_at: None,
        kind: CommentKind::Note,
        url: None,
    };
    let event = Comment {
        kind: CommentKind::Event,
        body: "Added label bug".to_owned(),
        id: None,
        ..note.clone()
    };
    let service = tracker.with_comment(note.clone()).with_comment(event);
    let editor = ScriptedEditor::new();

    let (execution, sink) = run(
        &service,
        &editor,
        Command::Show {
            number: number(1),
            summary: false,
            quiet: true,
        },
    )
    .await;

    execution.result.as_ref().expect("show should succeed");
    assert!(matches!(
        sink.records.as_slice(),
        [
            RenderRecord::IssueDetail { summary: false, .. },
            RenderRecord::Comment(comment),
        ] if comment == &note
    ));
}

#[rstest]
#[tokio::test]
async fn show_summary_skips_comments(tracker: RecordingService) {
    let editor = ScriptedEditor::new();

    let (execution, sink) = run(
        &tracker,
        &editor,
        Command::Show {
            number: number(1),
            summary: true,
            quiet: false,
        },
    )
    .await;

    execution.result.as_ref().expect("show should succeed");
    assert_eq!(tracker.calls(), vec![ServiceCall::Fetch(number(1))]);
    assert_eq!(sink.records.len(), 1);
}

#[rstest]
#[tokio::test]
async fn list_streams_every_page(tracker: RecordingService) {
    let service = tracker.with_page_size(1);
    let editor = ScriptedEditor::new();

    let (execution, sink) = run(
        &service,
        &editor,
        Command::List {
            state: StateFilter::Open,
            oneline: true,
        },
    )
    .await;

    execution.result.as_ref().expect("list should succeed");
    let numbers: Vec<u64> = sink
        .records
        .iter()
        .filter_map(|record| match record {
            RenderRecord::ListItem { issue, oneline: true } => Some(issue.number.get()),
            _ => None,
        })
        .collect();
    assert_eq!(numbers, vec![1, 3]);
}

#[rstest]
#[case::issue(
    Some(7),
    true,
    RenderRecord::Url("https://tracker.test/octo/repo/issues/7".to_owned())
)]
#[case::list(
    None,
    false,
    RenderRecord::Browse("https://tracker.test/octo/repo/issues".to_owned())
)]
#[tokio::test]
async fn browse_builds_urls_without_network(
    tracker: RecordingService,
    #[case] issue: Option<u64>,
    #[case] url_only: bool,
    #[case] expected: RenderRecord,
) {
    let editor = ScriptedEditor::new();

    let (execution, sink) = run(
        &tracker,
        &editor,
        Command::Browse {
            number: issue.map(number),
            url_only,
        },
    )
    .await;

    execution.result.as_ref().expect("browse should succeed");
    assert!(tracker.calls().is_empty());
    assert_eq!(sink.records, vec![expected]);
}

#[rstest]
#[case::labels(CompletionKind::Labels, vec!["bug", "urgent"])]
#[case::milestones(CompletionKind::Milestones, vec!["v1.0"])]
#[case::states(CompletionKind::States, vec!["open", "closed", "all"])]
#[case::issues(CompletionKind::Issues, vec!["2"])]
#[tokio::test]
async fn complete_emits_candidates(
    tracker: RecordingService,
    #[case] kind: CompletionKind,
    #[case] expected: Vec<&str>,
) {
    let editor = ScriptedEditor::new();

    let (execution, sink) = run(
        &tracker,
        &editor,
        Command::Complete {
            kind,
            state: StateFilter::Closed,
        },
    )
    .await;

    execution.result.as_ref().expect("complete should succeed");
    let candidates: Vec<&str> = sink
        .records
        .iter()
        .filter_map(|record| match record {
            RenderRecord::Completion(candidate) => Some(candidate.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(candidates, expected);
}
