//! Turns requested changes into the smallest update a provider needs.
//!
//! A [`ChangeRequest`] holds what the user asked for, with names still
//! unresolved. Reconciliation resolves every name through the service
//! before anything is mutated, then drops fields that already hold the
//! requested value.

use std::collections::BTreeSet;

use tracing::debug;

use crate::message::Message;
use crate::service::{Issue, IssueError, IssueService, Label, Milestone, NewIssue, User};

/// Value users pass to clear assignee, milestone, or labels.
pub const NONE_SENTINEL: &str = "none";

/// Tri-state field change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Change<T> {
    /// Leave the field as it is.
    #[default]
    Unchanged,
    /// Remove the field's value.
    Cleared,
    /// Replace the field's value.
    Set(T),
}

impl<T> Change<T> {
    /// True when the field is left alone.
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    /// Borrows the carried value.
    #[must_use]
    pub const fn as_ref(&self) -> Change<&T> {
        match self {
            Self::Unchanged => Change::Unchanged,
            Self::Cleared => Change::Cleared,
            Self::Set(value) => Change::Set(value),
        }
    }
}

impl Change<String> {
    /// Interprets an optional command-line value: absent leaves the field
    /// alone and `none` clears it.
    #[must_use]
    pub fn from_option(value: Option<String>) -> Self {
        match value {
            None => Self::Unchanged,
            Some(text) if text == NONE_SENTINEL => Self::Cleared,
            Some(text) => Self::Set(text),
        }
    }
}

impl Change<Vec<String>> {
    /// Interprets repeated `-l` values: none given leaves labels alone and
    /// any `none` clears them.
    #[must_use]
    pub fn from_labels(names: Vec<String>) -> Self {
        if names.is_empty() {
            return Self::Unchanged;
        }
        if names.iter().any(|name| name == NONE_SENTINEL) {
            return Self::Cleared;
        }
        Self::Set(names)
    }
}

/// Changes requested for one command, with names not yet resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeRequest {
    /// New title and body.
    pub message: Option<Message>,
    /// Assignee username or search term.
    pub assignee: Change<String>,
    /// Milestone title.
    pub milestone: Change<String>,
    /// Label names.
    pub labels: Change<Vec<String>>,
}

impl ChangeRequest {
    /// Builds a request from command-line options.
    #[must_use]
    pub fn from_options(
        message: Option<Message>,
        assignee: Option<String>,
        milestone: Option<String>,
        labels: Vec<String>,
    ) -> Self {
        Self {
            message,
            assignee: Change::from_option(assignee),
            milestone: Change::from_option(milestone),
            labels: Change::from_labels(labels),
        }
    }
}

/// Reconciled field-level delta ready for submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSet {
    /// Title change; titles are never cleared.
    pub title: Change<String>,
    /// Body change.
    pub body: Change<String>,
    /// Assignee change.
    pub assignee: Change<User>,
    /// Milestone change.
    pub milestone: Change<Milestone>,
    /// Full replacement label set.
    pub labels: Change<Vec<Label>>,
}

impl UpdateSet {
    /// True when no field changes; no provider call is needed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_unchanged()
            && self.body.is_unchanged()
            && self.assignee.is_unchanged()
            && self.milestone.is_unchanged()
            && self.labels.is_unchanged()
    }

    /// Names of the fields that change, for logging.
    #[must_use]
    pub fn changed_fields(&self) -> Vec<&'static str> {
        [
            ("title", self.title.is_unchanged()),
            ("body", self.body.is_unchanged()),
            ("assignee", self.assignee.is_unchanged()),
            ("milestone", self.milestone.is_unchanged()),
            ("labels", self.labels.is_unchanged()),
        ]
        .into_iter()
        .filter_map(|(name, unchanged)| (!unchanged).then_some(name))
        .collect()
    }
}

/// Builds the fields of a new issue.
///
/// Creation is additive: `none` for any field means the issue is created
/// without it.
///
/// # Errors
///
/// Returns [`IssueError::Validation`] without a title and
/// [`IssueError::NotFound`] for names the provider does not know.
pub async fn reconcile_new(
    service: &dyn IssueService,
    request: ChangeRequest,
) -> Result<NewIssue, IssueError> {
    let Some(message) = request.message else {
        return Err(IssueError::validation("aborting due to empty issue title"));
    };

    let assignee = match request.assignee {
        Change::Set(term) => Some(service.resolve_assignee(&term).await?),
        Change::Unchanged | Change::Cleared => None,
    };
    let milestone = match request.milestone {
        Change::Set(name) => Some(service.resolve_milestone(&name).await?),
        Change::Unchanged | Change::Cleared => None,
    };
    let labels = match request.labels {
        Change::Set(names) => service.resolve_labels(&names).await?,
        Change::Unchanged | Change::Cleared => Vec::new(),
    };

    Ok(NewIssue {
        title: message.title,
        body: message.body.unwrap_or_default(),
        assignee,
        milestone,
        labels,
    })
}

/// Computes the minimal update that moves `current` to the requested
/// state.
///
/// Names equal to the current value are not looked up. Cleared fields are
/// always kept so an explicit `none` is honoured whatever the provider
/// reports.
///
/// # Errors
///
/// Returns [`IssueError::NotFound`] or [`IssueError::Validation`] from
/// name resolution; nothing has been mutated when this fails.
pub async fn reconcile_edit(
    service: &dyn IssueService,
    current: &Issue,
    request: ChangeRequest,
) -> Result<UpdateSet, IssueError> {
    let (title, body) = match request.message {
        Some(message) => (
            set_if_different(message.title, &current.title),
            message.body.map_or(Change::Unchanged, |body| {
                set_if_different(body, &current.body)
            }),
        ),
        None => (Change::Unchanged, Change::Unchanged),
    };

    let assignee = match request.assignee {
        Change::Unchanged => Change::Unchanged,
        Change::Cleared => Change::Cleared,
        Change::Set(term) => {
            let current_username = current.assignee.as_ref().map(|user| user.username.as_str());
            if current_username == Some(term.as_str()) {
                Change::Unchanged
            } else {
                let user = service.resolve_assignee(&term).await?;
                if current_username == Some(user.username.as_str()) {
                    Change::Unchanged
                } else {
                    Change::Set(user)
                }
            }
        }
    };

    let milestone = match request.milestone {
        Change::Unchanged => Change::Unchanged,
        Change::Cleared => Change::Cleared,
        Change::Set(name) => {
            let current_milestone = current.milestone.as_ref();
            if current_milestone.is_some_and(|milestone| milestone.title == name) {
                Change::Unchanged
            } else {
                let milestone = service.resolve_milestone(&name).await?;
                if current_milestone.is_some_and(|existing| existing.id == milestone.id) {
                    Change::Unchanged
                } else {
                    Change::Set(milestone)
                }
            }
        }
    };

    let labels = match request.labels {
        Change::Unchanged => Change::Unchanged,
        Change::Cleared => Change::Cleared,
        Change::Set(names) => {
            let requested: BTreeSet<&str> = names.iter().map(String::as_str).collect();
            if requested == current.label_names() {
                Change::Unchanged
            } else {
                Change::Set(service.resolve_labels(&names).await?)
            }
        }
    };

    let update = UpdateSet {
        title,
        body,
        assignee,
        milestone,
        labels,
    };
    debug!(issue = %current.number, fields = ?update.changed_fields(), "reconciled edit");
    Ok(update)
}

fn set_if_different(requested: String, current: &str) -> Change<String> {
    if requested == current {
        Change::Unchanged
    } else {
        Change::Set(requested)
    }
}
