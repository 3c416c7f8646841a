//! Error types exposed by the issue service layer.
//!
//! Adapters classify every provider failure into one of these variants at
//! the HTTP boundary. Callers format them; they never inspect raw status
//! codes.

use std::fmt;

use thiserror::Error;

use super::locator::ServiceKind;

/// Errors surfaced while resolving configuration or talking to a tracker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IssueError {
    /// The token was missing or rejected by the provider.
    #[error("authentication failed: {message}")]
    Authentication {
        /// Provider response or description of the missing credential.
        message: String,
    },

    /// An issue number, user, milestone, or label could not be found.
    #[error("{identifier} not found: {message}")]
    NotFound {
        /// The identifier the user supplied (for example `#42` or `nosuchuser`).
        identifier: String,
        /// Additional detail from the provider.
        message: String,
    },

    /// The request was rejected before or by the provider as invalid.
    #[error("{message}")]
    Validation {
        /// Human-readable reason.
        message: String,
    },

    /// Networking failed, the provider answered with a server error, or the
    /// response could not be decoded.
    #[error("transport error: {message}")]
    Transport {
        /// Transport-level error detail.
        message: String,
    },

    /// Configuration could not be loaded or is incomplete.
    #[error("configuration error: {message}")]
    Configuration {
        /// Details about the configuration failure.
        message: String,
    },

    /// The external editor could not be started or exited unsuccessfully.
    #[error("editor unavailable: {message}")]
    Editor {
        /// Details about the editor failure.
        message: String,
    },

    /// Local I/O failed.
    #[error("I/O error: {message}")]
    Io {
        /// Error detail from the underlying I/O operation.
        message: String,
    },

    /// A multi-call operation failed after an earlier call was applied.
    #[error("{source} (already applied: {completed})")]
    PartiallyApplied {
        /// Description of the call that succeeded before the failure.
        completed: String,
        /// The classified failure of the later call.
        source: Box<IssueError>,
    },
}

impl IssueError {
    /// Builds a [`IssueError::Validation`] from any displayable message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Builds a [`IssueError::NotFound`] for the given identifier.
    pub fn not_found(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    /// Builds a [`IssueError::Configuration`] from any displayable message.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wraps `self` as the failure that followed an already applied call.
    #[must_use]
    pub fn after(self, completed: impl Into<String>) -> Self {
        Self::PartiallyApplied {
            completed: completed.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost classified error, looking through
    /// [`IssueError::PartiallyApplied`].
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::PartiallyApplied { source, .. } => source.root(),
            other => other,
        }
    }
}

/// A known provider quirk hit during an otherwise successful operation.
///
/// Limitations are warnings: the result they accompany is the provider's
/// best effort and the command still succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderLimitation {
    /// Provider that exhibited the limitation.
    pub service: ServiceKind,
    /// Description shown to the user.
    pub message: String,
}

impl ProviderLimitation {
    /// Creates a limitation warning for `service`.
    pub fn new(service: ServiceKind, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderLimitation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.service, self.message)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{IssueError, ProviderLimitation};
    use crate::service::locator::ServiceKind;

    #[rstest]
    fn partially_applied_names_completed_call() {
        let error = IssueError::Transport {
            message: "connection reset".to_owned(),
        }
        .after("comment added to #4");

        assert_eq!(
            error.to_string(),
            "transport error: connection reset (already applied: comment added to #4)"
        );
        assert!(matches!(error.root(), IssueError::Transport { .. }));
    }

    #[rstest]
    fn not_found_leads_with_identifier() {
        let error = IssueError::not_found("user nosuchuser", "no matching account");
        assert_eq!(
            error.to_string(),
            "user nosuchuser not found: no matching account"
        );
    }

    #[rstest]
    fn limitation_displays_service() {
        let warning = ProviderLimitation::new(ServiceKind::Gogs, "labels may not stick");
        assert_eq!(warning.to_string(), "Gogs: labels may not stick");
    }
}
