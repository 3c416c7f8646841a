//! Provider-independent issue service.
//!
//! [`IssueService`] is the one contract the command executor talks to. Each
//! backend implements the provider-specific calls; the provided methods
//! (`show`, `set_state`, and the `resolve_*` helpers) compose them the same
//! way for every provider.

mod error;
mod error_mapping;
mod github;
mod gitlab;
mod gogs;
mod jira;
mod locator;
mod model;
mod rest;

pub use error::{IssueError, ProviderLimitation};
pub use github::GitHubService;
pub use gitlab::GitLabService;
pub use gogs::GogsService;
pub use jira::JiraService;
pub use locator::{AccessToken, RepositoryLocator, ServiceKind};
pub use model::{
    Comment, CommentKind, Issue, IssueDetails, IssueNumber, IssuePage, IssueState, Label,
    Milestone, NewIssue, PageCursor, StateFilter, TargetState, Updated, User,
    merge_chronologically,
};

use async_trait::async_trait;
use tracing::debug;

use crate::reconcile::UpdateSet;

/// Everything an adapter needs to reach one repository's tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Backend to talk to.
    pub kind: ServiceKind,
    /// Repository host and path.
    pub locator: RepositoryLocator,
    /// API credential.
    pub token: AccessToken,
}

/// Operations every issue tracker backend supports.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IssueService: Send + Sync {
    /// Backend this service talks to.
    fn kind(&self) -> ServiceKind;

    /// Create an issue from fully resolved fields.
    async fn create(&self, issue: &NewIssue) -> Result<Issue, IssueError>;

    /// Fetch one issue.
    async fn fetch(&self, number: IssueNumber) -> Result<Issue, IssueError>;

    /// Apply the non-unchanged fields of `changes`.
    ///
    /// Implementations send only the changed fields and map cleared fields
    /// onto their own sentinels.
    async fn update(&self, number: IssueNumber, changes: &UpdateSet)
    -> Result<Updated, IssueError>;

    /// Move an issue into `target` without commenting.
    async fn transition(&self, number: IssueNumber, target: TargetState)
    -> Result<Issue, IssueError>;

    /// Add a comment.
    async fn comment(&self, number: IssueNumber, body: &str) -> Result<Comment, IssueError>;

    /// Fetch one page of issues; `cursor` is the `next` value of the
    /// previous page.
    async fn list_page(
        &self,
        filter: StateFilter,
        cursor: Option<PageCursor>,
    ) -> Result<IssuePage, IssueError>;

    /// Comments and events on an issue in chronological order.
    async fn comments(&self, number: IssueNumber) -> Result<Vec<Comment>, IssueError>;

    /// Users matching a search term.
    async fn search_users(&self, term: &str) -> Result<Vec<User>, IssueError>;

    /// Labels defined on the repository.
    async fn labels(&self) -> Result<Vec<Label>, IssueError>;

    /// Milestones defined on the repository.
    async fn milestones(&self) -> Result<Vec<Milestone>, IssueError>;

    /// State filters the provider accepts.
    async fn states(&self) -> Result<Vec<StateFilter>, IssueError>;

    /// Web URL of one issue.
    fn issue_url(&self, number: IssueNumber) -> String;

    /// Web URL of the issue list.
    fn issues_url(&self) -> String;

    /// An issue together with its comments.
    async fn show(&self, number: IssueNumber) -> Result<IssueDetails, IssueError> {
        let issue = self.fetch(number).await?;
        let comments = self.comments(number).await?;
        Ok(IssueDetails { issue, comments })
    }

    /// Posts `closing_message` (if any) and then moves the issue into
    /// `target`.
    ///
    /// # Errors
    ///
    /// A transition failure after the comment was posted is reported as
    /// [`IssueError::PartiallyApplied`].
    async fn set_state(
        &self,
        number: IssueNumber,
        target: TargetState,
        closing_message: Option<String>,
    ) -> Result<Issue, IssueError> {
        let Some(message) = closing_message else {
            return self.transition(number, target).await;
        };

        self.comment(number, &message).await?;
        debug!(issue = %number, "closing comment added");
        self.transition(number, target)
            .await
            .map_err(|error| error.after(format!("comment added to {number}")))
    }

    /// Resolves a user by exact username, or by a unique search hit.
    ///
    /// # Errors
    ///
    /// [`IssueError::NotFound`] when nothing matches and
    /// [`IssueError::Validation`] when several accounts match.
    async fn resolve_assignee(&self, term: &str) -> Result<User, IssueError> {
        let candidates = self.search_users(term).await?;
        if let Some(exact) = candidates.iter().find(|user| user.username == term) {
            return Ok(exact.clone());
        }

        match candidates.as_slice() {
            [] => Err(IssueError::not_found(
                format!("user {term}"),
                "no matching account",
            )),
            [single] => Ok(single.clone()),
            several => {
                let names: Vec<&str> = several.iter().map(|user| user.username.as_str()).collect();
                Err(IssueError::validation(format!(
                    "assignee {term} is ambiguous: {}",
                    names.join(", ")
                )))
            }
        }
    }

    /// Resolves a milestone by title.
    ///
    /// # Errors
    ///
    /// [`IssueError::NotFound`] when no milestone has that title.
    async fn resolve_milestone(&self, name: &str) -> Result<Milestone, IssueError> {
        self.milestones()
            .await?
            .into_iter()
            .find(|milestone| milestone.title == name)
            .ok_or_else(|| {
                IssueError::not_found(format!("milestone {name}"), "no milestone with that title")
            })
    }

    /// Resolves label names against the repository's labels, keeping the
    /// requested order and dropping duplicates.
    ///
    /// # Errors
    ///
    /// [`IssueError::NotFound`] naming every unknown label.
    async fn resolve_labels(&self, names: &[String]) -> Result<Vec<Label>, IssueError> {
        let available = self.labels().await?;
        let mut resolved: Vec<Label> = Vec::with_capacity(names.len());
        let mut missing: Vec<&str> = Vec::new();

        for name in names {
            if resolved.iter().any(|label| &label.name == name) {
                continue;
            }
            match available.iter().find(|label| &label.name == name) {
                Some(label) => resolved.push(label.clone()),
                None => missing.push(name.as_str()),
            }
        }

        if missing.is_empty() {
            Ok(resolved)
        } else {
            Err(IssueError::not_found(
                format!("label {}", missing.join(", ")),
                "no such label in the repository",
            ))
        }
    }
}

/// Lazy, finite walk over every page of a listing.
///
/// The listing only moves forward; once the last page was returned, or a
/// page failed, further calls yield `None`.
pub struct IssueListing<'service> {
    service: &'service dyn IssueService,
    filter: StateFilter,
    cursor: Option<PageCursor>,
    finished: bool,
}

impl<'service> IssueListing<'service> {
    /// Starts a listing at the first page.
    #[must_use]
    pub fn new(service: &'service dyn IssueService, filter: StateFilter) -> Self {
        Self {
            service,
            filter,
            cursor: None,
            finished: false,
        }
    }

    /// Fetches the next page, or `None` once the listing is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates the adapter's classified error; the listing is finished
    /// afterwards.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Issue>>, IssueError> {
        if self.finished {
            return Ok(None);
        }

        let outcome = self
            .service
            .list_page(self.filter.clone(), self.cursor.take())
            .await;
        match outcome {
            Ok(page) => {
                self.finished = page.next.is_none();
                self.cursor = page.next;
                Ok(Some(page.items))
            }
            Err(error) => {
                self.finished = true;
                Err(error)
            }
        }
    }

    /// Drains every remaining page.
    ///
    /// # Errors
    ///
    /// Propagates the first page failure.
    pub async fn collect_all(mut self) -> Result<Vec<Issue>, IssueError> {
        let mut issues = Vec::new();
        while let Some(page) = self.next_page().await? {
            issues.extend(page);
        }
        Ok(issues)
    }
}

/// Builds the adapter for the configured service.
///
/// # Errors
///
/// Returns [`IssueError::Configuration`] when the API client cannot be
/// constructed for the configured URL.
pub fn connect(settings: &ServiceSettings) -> Result<Box<dyn IssueService>, IssueError> {
    debug!(
        service = %settings.kind,
        repository = %settings.locator.full_name(),
        "connecting issue service"
    );
    let service: Box<dyn IssueService> = match settings.kind {
        ServiceKind::GitHub => Box::new(GitHubService::new(settings)?),
        ServiceKind::GitLab => Box::new(GitLabService::new(settings)?),
        ServiceKind::Gogs => Box::new(GogsService::new(settings)?),
        ServiceKind::Jira => Box::new(JiraService::new(settings)?),
    };
    Ok(service)
}
