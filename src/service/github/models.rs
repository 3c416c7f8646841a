//! GitHub REST payloads.
//!
//! Types prefixed with `Api` are deserialisation targets that convert into
//! the provider-neutral model.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::service::error::IssueError;
use crate::service::model::{
    Comment, CommentKind, Issue, IssueNumber, IssueState, Label, Milestone, User, capitalise,
};

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiUser {
    pub(super) id: u64,
    pub(super) login: String,
    #[serde(default)]
    pub(super) name: Option<String>,
    #[serde(default)]
    pub(super) email: Option<String>,
}

impl From<ApiUser> for User {
    fn from(value: ApiUser) -> Self {
        Self {
            id: value.id,
            username: value.login,
            name: value.name,
            email: value.email,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiLabel {
    #[serde(default)]
    pub(super) id: Option<u64>,
    pub(super) name: String,
    #[serde(default)]
    pub(super) color: Option<String>,
}

impl From<ApiLabel> for Label {
    fn from(value: ApiLabel) -> Self {
        Self {
            id: value.id,
            name: value.name,
            color: value.color,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiMilestone {
    pub(super) id: u64,
    pub(super) number: u64,
    pub(super) title: String,
    #[serde(default)]
    pub(super) state: Option<String>,
}

impl From<ApiMilestone> for Milestone {
    fn from(value: ApiMilestone) -> Self {
        Self {
            id: value.id,
            number: Some(value.number),
            title: value.title,
            state: value.state,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiIssue {
    pub(super) number: u64,
    pub(super) title: String,
    #[serde(default)]
    pub(super) body: Option<String>,
    pub(super) state: String,
    #[serde(default)]
    pub(super) user: Option<ApiUser>,
    #[serde(default)]
    pub(super) assignee: Option<ApiUser>,
    #[serde(default)]
    pub(super) milestone: Option<ApiMilestone>,
    #[serde(default)]
    pub(super) labels: Vec<ApiLabel>,
    pub(super) html_url: String,
    #[serde(default)]
    pub(super) comments: u64,
    #[serde(default)]
    pub(super) created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) updated_at: Option<DateTime<Utc>>,
    /// Present only when the "issue" is a pull request.
    #[serde(default)]
    pub(super) pull_request: Option<serde_json::Value>,
}

impl ApiIssue {
    pub(super) const fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

impl TryFrom<ApiIssue> for Issue {
    type Error = IssueError;

    fn try_from(value: ApiIssue) -> Result<Self, Self::Error> {
        Ok(Self {
            number: IssueNumber::new(value.number)?,
            title: value.title,
            body: value.body.unwrap_or_default(),
            state: IssueState::from_provider(&value.state),
            author: value.user.map(User::from),
            assignee: value.assignee.map(User::from),
            milestone: value.milestone.map(Milestone::from),
            labels: value.labels.into_iter().map(Label::from).collect(),
            url: value.html_url,
            comment_count: value.comments,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiComment {
    pub(super) id: u64,
    #[serde(default)]
    pub(super) body: Option<String>,
    #[serde(default)]
    pub(super) user: Option<ApiUser>,
    #[serde(default)]
    pub(super) created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) html_url: Option<String>,
}

impl ApiComment {
    pub(super) fn into_comment(self, issue: IssueNumber) -> Comment {
        Comment {
            issue,
            id: Some(self.id),
            author: self.user.map(User::from),
            body: self.body.unwrap_or_default(),
            created_at: self.created_at,
            kind: CommentKind::Note,
            url: self.html_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiNamed {
    #[serde(alias = "title")]
    pub(super) name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiRename {
    pub(super) from: String,
    pub(super) to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiEvent {
    #[serde(default)]
    pub(super) id: Option<u64>,
    pub(super) event: String,
    #[serde(default)]
    pub(super) actor: Option<ApiUser>,
    #[serde(default)]
    pub(super) created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) assignee: Option<ApiUser>,
    #[serde(default)]
    pub(super) label: Option<ApiNamed>,
    #[serde(default)]
    pub(super) milestone: Option<ApiNamed>,
    #[serde(default)]
    pub(super) rename: Option<ApiRename>,
    #[serde(default)]
    pub(super) commit_id: Option<String>,
}

/// Event types that carry no information worth showing.
const SILENT_EVENTS: [&str; 4] = ["subscribed", "unsubscribed", "mentioned", "base_ref_changed"];

impl ApiEvent {
    /// Converts the event into a comment, or `None` for noise events.
    pub(super) fn into_comment(self, issue: IssueNumber) -> Option<Comment> {
        if SILENT_EVENTS.contains(&self.event.as_str()) {
            return None;
        }
        let body = self.describe();
        Some(Comment {
            issue,
            id: self.id,
            author: self.actor.map(User::from),
            body,
            created_at: self.created_at,
            kind: CommentKind::Event,
            url: None,
        })
    }

    fn describe(&self) -> String {
        let assignee = || {
            self.assignee
                .as_ref()
                .map_or_else(String::new, |user| format!(" {}", user.login))
        };
        let label = || {
            self.label
                .as_ref()
                .map_or_else(String::new, |named| format!(" {}", named.name))
        };
        let milestone = || {
            self.milestone
                .as_ref()
                .map_or_else(String::new, |named| format!(" {}", named.name))
        };

        match self.event.as_str() {
            "closed" => "Closed this issue".to_owned(),
            "reopened" => "Reopened this issue".to_owned(),
            "assigned" => format!("Assigned{}", assignee()),
            "unassigned" => format!("Unassigned{}", assignee()),
            "labeled" => format!("Added label{}", label()),
            "unlabeled" => format!("Removed label{}", label()),
            "milestoned" => format!("Added to milestone{}", milestone()),
            "demilestoned" => format!("Removed from milestone{}", milestone()),
            "renamed" => self.rename.as_ref().map_or_else(
                || "Changed the title".to_owned(),
                |rename| format!("Changed the title from {} to {}", rename.from, rename.to),
            ),
            "locked" => "Locked the conversation".to_owned(),
            "unlocked" => "Unlocked the conversation".to_owned(),
            "referenced" => self.commit_id.as_deref().map_or_else(
                || "Referenced this issue".to_owned(),
                |commit| format!("Referenced this issue in commit {commit}"),
            ),
            other => capitalise(&other.replace('_', " ")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiUserSearch {
    #[serde(default)]
    pub(super) items: Vec<ApiUser>,
}
