//! Provider-neutral issue model.
//!
//! Adapters deserialise provider payloads into private `Api*` types and
//! convert them into these domain types, so nothing above the adapter layer
//! sees a provider's JSON shape.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};

use super::error::{IssueError, ProviderLimitation};

/// Issue number as shown to users (`#42`).
///
/// All supported providers use positive integers; GitLab numbers are the
/// project-scoped `iid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IssueNumber(u64);

impl IssueNumber {
    /// Wraps a positive issue number.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Validation`] for zero.
    pub fn new(value: u64) -> Result<Self, IssueError> {
        if value == 0 {
            return Err(IssueError::validation("issue number must be a positive integer"));
        }
        Ok(Self(value))
    }

    /// Parses `42` or `#42`.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Validation`] when the input is not a positive
    /// integer.
    pub fn parse(input: &str) -> Result<Self, IssueError> {
        let digits = input.trim().trim_start_matches('#');
        let value = digits.parse::<u64>().map_err(|_| {
            IssueError::validation(format!("invalid issue number: {input}"))
        })?;
        Self::new(value)
    }

    /// Returns the numeric value used in API paths.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for IssueNumber {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

/// Current state of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IssueState {
    /// Open (`open` on GitHub and Gogs, `opened` on GitLab).
    Open,
    /// Closed.
    Closed,
    /// Any other provider-defined state, passed through verbatim.
    Other(String),
}

impl IssueState {
    /// Maps a provider state string onto the neutral state.
    #[must_use]
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "open" | "opened" => Self::Open,
            "closed" => Self::Closed,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Display name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Other(name) => name.as_str(),
        }
    }
}

impl fmt::Display for IssueState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// State a `close` or `reopen` command moves an issue into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// Reopen a closed issue.
    Open,
    /// Close an open issue.
    Closed,
}

/// Filter applied when listing issues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum StateFilter {
    /// Open issues only.
    #[default]
    Open,
    /// Closed issues only.
    Closed,
    /// Every issue regardless of state.
    All,
    /// A provider-defined state name passed to the provider unchanged.
    Other(String),
}

impl StateFilter {
    /// Parses a user-supplied state name; unknown names pass through.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        match input.trim() {
            "open" => Self::Open,
            "closed" => Self::Closed,
            "all" => Self::All,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Display name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
            Self::Other(name) => name.as_str(),
        }
    }
}

impl fmt::Display for StateFilter {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A tracker account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    /// Provider user id.
    pub id: u64,
    /// Login name.
    pub username: String,
    /// Display name, when the provider returns one.
    pub name: Option<String>,
    /// Public email, when the provider returns one.
    pub email: Option<String>,
}

impl fmt::Display for User {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref().filter(|name| !name.is_empty()) {
            Some(name) => write!(formatter, "{name} ({})", self.username)?,
            None => formatter.write_str(&self.username)?,
        }
        if let Some(email) = self.email.as_deref().filter(|email| !email.is_empty()) {
            write!(formatter, " <{email}>")?;
        }
        Ok(())
    }
}

/// Issue label. Colour and id are opaque provider metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Label {
    /// Provider label id; GitLab issue payloads carry names only.
    pub id: Option<u64>,
    /// Label name.
    pub name: String,
    /// Hex colour as returned by the provider.
    pub color: Option<String>,
}

impl Label {
    /// Creates a label known only by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            color: None,
        }
    }
}

/// Milestone reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Milestone {
    /// Provider-wide milestone id.
    pub id: u64,
    /// Repository-scoped number (GitHub `number`, GitLab `iid`).
    pub number: Option<u64>,
    /// Milestone title; the name users type.
    pub title: String,
    /// Provider milestone state (`open`, `active`, `closed`, ...).
    pub state: Option<String>,
}

/// A tracker issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// Issue number.
    pub number: IssueNumber,
    /// Title.
    pub title: String,
    /// Markdown body, never transformed.
    pub body: String,
    /// Current state.
    pub state: IssueState,
    /// Account that opened the issue.
    pub author: Option<User>,
    /// Assigned account.
    pub assignee: Option<User>,
    /// Milestone the issue belongs to.
    pub milestone: Option<Milestone>,
    /// Labels attached to the issue.
    pub labels: Vec<Label>,
    /// Web URL.
    pub url: String,
    /// Number of discussion comments.
    pub comment_count: u64,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Issue {
    /// Label names as a set; label order is not significant.
    #[must_use]
    pub fn label_names(&self) -> BTreeSet<&str> {
        self.labels.iter().map(|label| label.name.as_str()).collect()
    }
}

/// Distinguishes free-text discussion from state-change markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentKind {
    /// A comment written by a user.
    Note,
    /// A provider-generated event (closed, labelled, renamed, ...).
    Event,
}

/// A comment or event on an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// Issue the comment belongs to.
    pub issue: IssueNumber,
    /// Provider comment id; events may have none.
    pub id: Option<u64>,
    /// Author, or the actor for events.
    pub author: Option<User>,
    /// Comment text or event description.
    pub body: String,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Note or event.
    pub kind: CommentKind,
    /// Web URL of the comment, when the provider exposes one.
    pub url: Option<String>,
}

/// Opaque continuation token for paged listings.
///
/// Each adapter defines its own format (a `Link` URL, a page number, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(String);

impl PageCursor {
    /// Wraps an adapter-defined token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the token.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuePage {
    /// Issues on this page.
    pub items: Vec<Issue>,
    /// Cursor for the following page; `None` on the last page.
    pub next: Option<PageCursor>,
}

/// A fully resolved issue to be created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewIssue {
    /// Title.
    pub title: String,
    /// Body.
    pub body: String,
    /// Resolved assignee.
    pub assignee: Option<User>,
    /// Resolved milestone.
    pub milestone: Option<Milestone>,
    /// Resolved labels.
    pub labels: Vec<Label>,
}

/// Result of an update together with any provider warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Updated {
    /// Issue as returned after the last call.
    pub issue: Issue,
    /// Known provider limitations hit during the update.
    pub warnings: Vec<ProviderLimitation>,
}

impl Updated {
    /// An update with no warnings.
    #[must_use]
    pub const fn clean(issue: Issue) -> Self {
        Self {
            issue,
            warnings: Vec::new(),
        }
    }
}

/// An issue with its comments and events in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDetails {
    /// The issue.
    pub issue: Issue,
    /// Comments and events.
    pub comments: Vec<Comment>,
}

/// Merges comment and event streams into one chronological sequence.
///
/// Items sharing a timestamp keep the order the provider returned them in.
/// Items without a timestamp follow every dated item, also in provider
/// order.
#[must_use]
pub fn merge_chronologically(mut notes: Vec<Comment>, events: Vec<Comment>) -> Vec<Comment> {
    notes.extend(events);
    notes.sort_by_key(|comment| (comment.created_at.is_none(), comment.created_at));
    notes
}

/// Upper-cases the first character, for event descriptions.
pub(super) fn capitalise(text: &str) -> String {
    let mut characters = text.chars();
    characters.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(characters).collect()
    })
}
