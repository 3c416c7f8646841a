//! Records produced by commands for display.
//!
//! The executor never formats text itself; it emits [`RenderRecord`]s in
//! order and a [`RenderSink`] decides how to present them.

use crate::service::{Comment, Issue, IssueError, IssueNumber, ProviderLimitation};

/// What a mutating command did to an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `create`.
    Created,
    /// `edit` with at least one changed field.
    Updated,
    /// `edit` where every requested value was already in place.
    Unchanged,
    /// `comment`.
    Commented,
    /// `close`.
    Closed,
    /// `reopen`.
    Reopened,
}

impl Action {
    /// Past-tense verb for display.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Commented => "commented on",
            Self::Closed => "closed",
            Self::Reopened => "reopened",
        }
    }
}

/// One renderable item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderRecord {
    /// Result of a mutating command.
    Outcome {
        /// What happened.
        action: Action,
        /// Issue the command acted on.
        number: IssueNumber,
        /// Web URL of the issue or new comment.
        url: String,
    },
    /// One row of `list`.
    ListItem {
        /// The issue.
        issue: Issue,
        /// Print the compact single-line form.
        oneline: bool,
    },
    /// Header block of `show`.
    IssueDetail {
        /// The issue.
        issue: Issue,
        /// Print header and comment count only.
        summary: bool,
    },
    /// One comment or event of `show`.
    Comment(Comment),
    /// A URL to print (`browse -u`).
    Url(String),
    /// A URL to open in a browser (`browse`).
    Browse(String),
    /// A provider limitation hit during an otherwise successful command.
    Warning(ProviderLimitation),
    /// One shell-completion candidate.
    Completion(String),
}

/// Destination for render records.
pub trait RenderSink: Send {
    /// Presents one record.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Io`] when output cannot be written.
    fn emit(&mut self, record: RenderRecord) -> Result<(), IssueError>;
}
