//! git-issue library crate: one issue-tracking vocabulary for GitHub,
//! GitLab, Gogs, and JIRA.
//!
//! Configuration is read from git and resolved into
//! [`ServiceSettings`](service::ServiceSettings), which
//! [`connect`](service::connect) turns into an [`IssueService`] adapter.
//! The [`Executor`] runs one [`Command`] against that adapter, composing
//! messages through an [`Editor`](editor::Editor), reconciling requested
//! changes into a minimal update, and emitting
//! [`RenderRecord`](render::RenderRecord)s to a sink.

pub mod config;
pub mod editor;
pub mod executor;
pub mod message;
pub mod reconcile;
pub mod render;
pub mod service;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{CliOverrides, IssueConfig};
pub use executor::{Command, Execution, Executor, Phase};
pub use service::{IssueError, IssueService, ServiceKind, connect};
