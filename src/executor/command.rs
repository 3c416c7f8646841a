//! Parsed commands handed to the executor.

use crate::message::Message;
use crate::reconcile::ChangeRequest;
use crate::service::{IssueError, IssueNumber, StateFilter};

/// Where a command's text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageSource {
    /// Open the editor.
    Editor,
    /// Text passed with `-m`.
    Inline(String),
    /// `-n`: no text at all.
    Skip,
}

/// The `-m` / `-n` pair as given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageArgs {
    /// `-m <text>`.
    pub message: Option<String>,
    /// `-n`.
    pub no_message: bool,
}

impl MessageArgs {
    /// Inline text.
    pub fn inline(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            no_message: false,
        }
    }

    /// No text.
    #[must_use]
    pub const fn skip() -> Self {
        Self {
            message: None,
            no_message: true,
        }
    }

    /// Decides where the text comes from.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Validation`] when both `-m` and `-n` are given.
    pub fn source(&self) -> Result<MessageSource, IssueError> {
        match (&self.message, self.no_message) {
            (Some(_), true) => Err(IssueError::validation(
                "--message and --no-message cannot be used together",
            )),
            (Some(text), false) => Ok(MessageSource::Inline(text.clone())),
            (None, true) => Ok(MessageSource::Skip),
            (None, false) => Ok(MessageSource::Editor),
        }
    }
}

/// Assignee, milestone and label options shared by `create` and `edit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldArgs {
    /// `-a`.
    pub assignee: Option<String>,
    /// `-s`.
    pub milestone: Option<String>,
    /// Repeated `-l`.
    pub labels: Vec<String>,
}

impl FieldArgs {
    /// Combines the options with an already composed message.
    pub(super) fn into_request(self, message: Option<Message>) -> ChangeRequest {
        ChangeRequest::from_options(message, self.assignee, self.milestone, self.labels)
    }
}

/// Candidate kinds for `complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    /// Issue numbers.
    Issues,
    /// Label names.
    Labels,
    /// Milestone titles.
    Milestones,
    /// State filter names.
    States,
}

/// One user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create an issue.
    Create {
        /// Title and body.
        message: MessageArgs,
        /// Assignee, milestone and labels.
        fields: FieldArgs,
    },
    /// Edit an issue.
    Edit {
        /// Issue to edit.
        number: IssueNumber,
        /// New title and body, or `-n` to keep them.
        message: MessageArgs,
        /// Assignee, milestone and labels.
        fields: FieldArgs,
    },
    /// Add a comment.
    Comment {
        /// Issue to comment on.
        number: IssueNumber,
        /// Comment text.
        message: MessageArgs,
    },
    /// Close an open issue, optionally with a comment.
    Close {
        /// Issue to close.
        number: IssueNumber,
        /// Closing comment, or `-n` for none.
        message: MessageArgs,
    },
    /// Reopen a closed issue.
    Reopen {
        /// Issue to reopen.
        number: IssueNumber,
    },
    /// Show an issue and its discussion.
    Show {
        /// Issue to show.
        number: IssueNumber,
        /// Header and comment count only.
        summary: bool,
        /// Comments without events.
        quiet: bool,
    },
    /// List issues.
    List {
        /// State filter.
        state: StateFilter,
        /// One line per issue.
        oneline: bool,
    },
    /// Open or print a web URL.
    Browse {
        /// Issue to browse; the issue list when absent.
        number: Option<IssueNumber>,
        /// Print instead of opening a browser.
        url_only: bool,
    },
    /// Print shell completion candidates.
    Complete {
        /// What to complete.
        kind: CompletionKind,
        /// State filter for issue candidates.
        state: StateFilter,
    },
}

impl Command {
    /// Subcommand name, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Edit { .. } => "edit",
            Self::Comment { .. } => "comment",
            Self::Close { .. } => "close",
            Self::Reopen { .. } => "reopen",
            Self::Show { .. } => "show",
            Self::List { .. } => "list",
            Self::Browse { .. } => "browse",
            Self::Complete { .. } => "complete",
        }
    }
}
