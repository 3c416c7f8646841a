//! In-memory fakes for exercising commands without a network, editor, or
//! terminal.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! integration tests in `tests/`.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::config::ConfigStore;
use crate::editor::Editor;
use crate::reconcile::{Change, UpdateSet};
use crate::render::{RenderRecord, RenderSink};
use crate::service::{
    Comment, CommentKind, Issue, IssueError, IssueNumber, IssuePage, IssueService, IssueState,
    Label, Milestone, NewIssue, PageCursor, ServiceKind, StateFilter, TargetState, Updated, User,
};

const TRACKER_URL: &str = "https://tracker.test/octo/repo";

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds an open issue with the given number and title.
///
/// # Panics
///
/// Panics when `number` is zero.
#[must_use]
pub fn sample_issue(number: u64, title: &str) -> Issue {
    #[expect(clippy::expect_used, reason = "test helper with caller-chosen numbers")]
    let issue_number = IssueNumber::new(number).expect("issue numbers start at 1");
    Issue {
        number: issue_number,
        title: title.to_owned(),
        body: String::new(),
        state: IssueState::Open,
        author: Some(sample_user(1, "octocat")),
        assignee: None,
        milestone: None,
        labels: Vec::new(),
        url: format!("{TRACKER_URL}/issues/{number}"),
        comment_count: 0,
        created_at: None,
        updated_at: None,
    }
}

/// Builds a user.
#[must_use]
pub fn sample_user(id: u64, username: &str) -> User {
    User {
        id,
        username: username.to_owned(),
        name: None,
        email: None,
    }
}

/// Builds a label with an id.
#[must_use]
pub fn sample_label(id: u64, name: &str) -> Label {
    Label {
        id: Some(id),
        name: name.to_owned(),
        color: None,
    }
}

/// Builds an open milestone.
#[must_use]
pub fn sample_milestone(id: u64, title: &str) -> Milestone {
    Milestone {
        id,
        number: Some(id),
        title: title.to_owned(),
        state: Some("open".to_owned()),
    }
}

/// A call received by [`RecordingService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    /// `create`.
    Create(NewIssue),
    /// `fetch`.
    Fetch(IssueNumber),
    /// `update`.
    Update(IssueNumber, UpdateSet),
    /// `transition`.
    Transition(IssueNumber, TargetState),
    /// `comment`.
    Comment(IssueNumber, String),
    /// `list_page`.
    ListPage(StateFilter, Option<PageCursor>),
    /// `comments`.
    Comments(IssueNumber),
    /// `search_users`.
    SearchUsers(String),
    /// `labels`.
    Labels,
    /// `milestones`.
    Milestones,
}

impl ServiceCall {
    /// Operation name, as used by [`RecordingService::fail_on`].
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Fetch(_) => "fetch",
            Self::Update(..) => "update",
            Self::Transition(..) => "transition",
            Self::Comment(..) => "comment",
            Self::ListPage(..) => "list_page",
            Self::Comments(_) => "comments",
            Self::SearchUsers(_) => "search_users",
            Self::Labels => "labels",
            Self::Milestones => "milestones",
        }
    }

    /// True for calls that change tracker state.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::Create(_) | Self::Update(..) | Self::Transition(..) | Self::Comment(..)
        )
    }
}

#[derive(Debug, Default)]
struct Tracker {
    issues: BTreeMap<IssueNumber, Issue>,
    comments: BTreeMap<IssueNumber, Vec<Comment>>,
    users: Vec<User>,
    labels: Vec<Label>,
    milestones: Vec<Milestone>,
    calls: Vec<ServiceCall>,
    failures: Vec<(&'static str, IssueError)>,
    next_comment_id: u64,
}

impl Tracker {
    fn record(&mut self, call: ServiceCall) -> Result<(), IssueError> {
        let name = call.name();
        self.calls.push(call);
        match self.failures.iter().position(|(failing, _)| *failing == name) {
            Some(index) => Err(self.failures.remove(index).1),
            None => Ok(()),
        }
    }

    fn issue_mut(&mut self, number: IssueNumber) -> Result<&mut Issue, IssueError> {
        self.issues
            .get_mut(&number)
            .ok_or_else(|| IssueError::not_found(number.to_string(), "Not Found"))
    }
}

/// In-memory tracker that records every call it receives.
#[derive(Debug)]
pub struct RecordingService {
    kind: ServiceKind,
    page_size: usize,
    tracker: Mutex<Tracker>,
}

impl Default for RecordingService {
    fn default() -> Self {
        Self::new(ServiceKind::GitHub)
    }
}

impl RecordingService {
    /// An empty tracker posing as `kind`.
    #[must_use]
    pub fn new(kind: ServiceKind) -> Self {
        Self {
            kind,
            page_size: 30,
            tracker: Mutex::new(Tracker::default()),
        }
    }

    /// Adds an existing issue.
    #[must_use]
    pub fn with_issue(self, issue: Issue) -> Self {
        locked(&self.tracker).issues.insert(issue.number, issue);
        self
    }

    /// Adds a user that `search_users` can find.
    #[must_use]
    pub fn with_user(self, user: User) -> Self {
        locked(&self.tracker).users.push(user);
        self
    }

    /// Adds a repository label.
    #[must_use]
    pub fn with_label(self, label: Label) -> Self {
        locked(&self.tracker).labels.push(label);
        self
    }

    /// Adds a repository milestone.
    #[must_use]
    pub fn with_milestone(self, milestone: Milestone) -> Self {
        locked(&self.tracker).milestones.push(milestone);
        self
    }

    /// Adds a comment to an existing issue's discussion.
    #[must_use]
    pub fn with_comment(self, comment: Comment) -> Self {
        locked(&self.tracker)
            .comments
            .entry(comment.issue)
            .or_default()
            .push(comment);
        self
    }

    /// Sets how many issues `list_page` returns per page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Makes the next call named `operation` fail with `error`.
    #[must_use]
    pub fn fail_on(self, operation: &'static str, error: IssueError) -> Self {
        locked(&self.tracker).failures.push((operation, error));
        self
    }

    /// Every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ServiceCall> {
        locked(&self.tracker).calls.clone()
    }

    /// Calls that change tracker state.
    #[must_use]
    pub fn mutations(&self) -> Vec<ServiceCall> {
        self.calls()
            .into_iter()
            .filter(ServiceCall::is_mutation)
            .collect()
    }

    /// Current stored copy of an issue.
    #[must_use]
    pub fn stored(&self, number: IssueNumber) -> Option<Issue> {
        locked(&self.tracker).issues.get(&number).cloned()
    }
}

#[async_trait]
impl IssueService for RecordingService {
    fn kind(&self) -> ServiceKind {
        self.kind
    }

    async fn create(&self, issue: &NewIssue) -> Result<Issue, IssueError> {
        let mut tracker = locked(&self.tracker);
        tracker.record(ServiceCall::Create(issue.clone()))?;

        let next = tracker
            .issues
            .keys()
            .next_back()
            .map_or(1, |number| number.get().saturating_add(1));
        let mut created = sample_issue(next, &issue.title);
        created.body.clone_from(&issue.body);
        created.assignee.clone_from(&issue.assignee);
        created.milestone.clone_from(&issue.milestone);
        created.labels.clone_from(&issue.labels);
        tracker.issues.insert(created.number, created.clone());
        Ok(created)
    }

    async fn fetch(&self, number: IssueNumber) -> Result<Issue, IssueError> {
        let mut tracker = locked(&self.tracker);
        tracker.record(ServiceCall::Fetch(number))?;
        tracker.issue_mut(number).map(|issue| issue.clone())
    }

    async fn update(
        &self,
        number: IssueNumber,
        changes: &UpdateSet,
    ) -> Result<Updated, IssueError> {
        let mut tracker = locked(&self.tracker);
        tracker.record(ServiceCall::Update(number, changes.clone()))?;
        let issue = tracker.issue_mut(number)?;

        if let Change::Set(title) = &changes.title {
            issue.title.clone_from(title);
        }
        match &changes.body {
            Change::Set(body) => issue.body.clone_from(body),
            Change::Cleared => issue.body.clear(),
            Change::Unchanged => {}
        }
        match &changes.assignee {
            Change::Set(user) => issue.assignee = Some(user.clone()),
            Change::Cleared => issue.assignee = None,
            Change::Unchanged => {}
        }
        match &changes.milestone {
            Change::Set(milestone) => issue.milestone = Some(milestone.clone()),
            Change::Cleared => issue.milestone = None,
            Change::Unchanged => {}
        }
        match &changes.labels {
            Change::Set(labels) => issue.labels.clone_from(labels),
            Change::Cleared => issue.labels.clear(),
            Change::Unchanged => {}
        }
        Ok(Updated::clean(issue.clone()))
    }

    async fn transition(
        &self,
        number: IssueNumber,
        target: TargetState,
    ) -> Result<Issue, IssueError> {
        let mut tracker = locked(&self.tracker);
        tracker.record(ServiceCall::Transition(number, target))?;
        let issue = tracker.issue_mut(number)?;
        issue.state = match target {
            TargetState::Open => IssueState::Open,
            TargetState::Closed => IssueState::Closed,
        };
        Ok(issue.clone())
    }

    async fn comment(&self, number: IssueNumber, body: &str) -> Result<Comment, IssueError> {
        let mut tracker = locked(&self.tracker);
        tracker.record(ServiceCall::Comment(number, body.to_owned()))?;
        let issue = tracker.issue_mut(number)?;
        issue.comment_count = issue.comment_count.saturating_add(1);

        tracker.next_comment_id = tracker.next_comment_id.saturating_add(1);
        let comment = Comment {
            issue: number,
            id: Some(tracker.next_comment_id),
            author: Some(sample_user(1, "octocat")),
            body: body.to_owned(),
            created_at: None,
            kind: CommentKind::Note,
            url: Some(format!(
                "{TRACKER_URL}/issues/{}#comment-{}",
                number.get(),
                tracker.next_comment_id
            )),
        };
        tracker.comments.entry(number).or_default().push(comment.clone());
        Ok(comment)
    }

    async fn list_page(
        &self,
        filter: StateFilter,
        cursor: Option<PageCursor>,
    ) -> Result<IssuePage, IssueError> {
        let mut tracker = locked(&self.tracker);
        tracker.record(ServiceCall::ListPage(filter.clone(), cursor.clone()))?;

        let offset = match &cursor {
            Some(token) => token
                .as_str()
                .parse::<usize>()
                .map_err(|_| IssueError::validation("invalid page cursor"))?,
            None => 0,
        };
        let matching: Vec<Issue> = tracker
            .issues
            .values()
            .filter(|issue| match &filter {
                StateFilter::All => true,
                StateFilter::Open => issue.state == IssueState::Open,
                StateFilter::Closed => issue.state == IssueState::Closed,
                StateFilter::Other(name) => issue.state.as_str() == name,
            })
            .cloned()
            .collect();

        let end = offset.saturating_add(self.page_size);
        let items: Vec<Issue> = matching
            .iter()
            .skip(offset)
            .take(self.page_size)
            .cloned()
            .collect();
        let next = (end < matching.len()).then(|| PageCursor::new(end.to_string()));
        Ok(IssuePage { items, next })
    }

    async fn comments(&self, number: IssueNumber) -> Result<Vec<Comment>, IssueError> {
        let mut tracker = locked(&self.tracker);
        tracker.record(ServiceCall::Comments(number))?;
        tracker.issue_mut(number)?;
        Ok(tracker.comments.get(&number).cloned().unwrap_or_default())
    }

    async fn search_users(&self, term: &str) -> Result<Vec<User>, IssueError> {
        let mut tracker = locked(&self.tracker);
        tracker.record(ServiceCall::SearchUsers(term.to_owned()))?;
        let needle = term.to_lowercase();
        Ok(tracker
            .users
            .iter()
            .filter(|user| user.username.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn labels(&self) -> Result<Vec<Label>, IssueError> {
        let mut tracker = locked(&self.tracker);
        tracker.record(ServiceCall::Labels)?;
        Ok(tracker.labels.clone())
    }

    async fn milestones(&self) -> Result<Vec<Milestone>, IssueError> {
        let mut tracker = locked(&self.tracker);
        tracker.record(ServiceCall::Milestones)?;
        Ok(tracker.milestones.clone())
    }

    async fn states(&self) -> Result<Vec<StateFilter>, IssueError> {
        Ok(vec![StateFilter::Open, StateFilter::Closed, StateFilter::All])
    }

    fn issue_url(&self, number: IssueNumber) -> String {
        format!("{TRACKER_URL}/issues/{}", number.get())
    }

    fn issues_url(&self) -> String {
        format!("{TRACKER_URL}/issues")
    }
}

/// Configuration store backed by a map.
#[derive(Debug, Clone, Default)]
pub struct MapConfigStore {
    values: BTreeMap<String, String>,
}

impl MapConfigStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one key.
    #[must_use]
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_owned(), value.to_owned());
        self
    }
}

impl ConfigStore for MapConfigStore {
    fn get(&self, key: &str) -> Result<Option<String>, IssueError> {
        Ok(self.values.get(key).cloned())
    }
}

/// Editor returning scripted responses in order and recording each seed.
#[derive(Debug, Default)]
pub struct ScriptedEditor {
    responses: Mutex<VecDeque<Result<String, IssueError>>>,
    seeds: Mutex<Vec<String>>,
}

impl ScriptedEditor {
    /// An editor with no responses; any edit fails as unavailable.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues text the "user" saves.
    #[must_use]
    pub fn responding(self, text: &str) -> Self {
        locked(&self.responses).push_back(Ok(text.to_owned()));
        self
    }

    /// Queues a failure.
    #[must_use]
    pub fn failing(self, error: IssueError) -> Self {
        locked(&self.responses).push_back(Err(error));
        self
    }

    /// Seeds the editor was opened with.
    #[must_use]
    pub fn seeds(&self) -> Vec<String> {
        locked(&self.seeds).clone()
    }
}

#[async_trait]
impl Editor for ScriptedEditor {
    async fn edit(&self, seed: &str) -> Result<String, IssueError> {
        locked(&self.seeds).push(seed.to_owned());
        locked(&self.responses)
            .pop_front()
            .unwrap_or_else(|| {
                Err(IssueError::Editor {
                    message: "no scripted editor response".to_owned(),
                })
            })
    }
}

/// Sink collecting every record in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VecSink {
    /// Records emitted so far.
    pub records: Vec<RenderRecord>,
}

impl RenderSink for VecSink {
    fn emit(&mut self, record: RenderRecord) -> Result<(), IssueError> {
        self.records.push(record);
        Ok(())
    }
}
