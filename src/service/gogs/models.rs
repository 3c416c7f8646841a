//! Gogs REST payloads.
//!
//! Gogs issue payloads carry no web URL, so conversion takes the URL the
//! adapter derives from the repository location.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::service::error::IssueError;
use crate::service::model::{
    Comment, CommentKind, Issue, IssueNumber, IssueState, Label, Milestone, User,
};

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiUser {
    pub(super) id: u64,
    #[serde(alias = "login")]
    pub(super) username: String,
    #[serde(default)]
    pub(super) full_name: Option<String>,
    #[serde(default)]
    pub(super) email: Option<String>,
}

impl From<ApiUser> for User {
    fn from(value: ApiUser) -> Self {
        Self {
            id: value.id,
            username: value.username,
            name: value.full_name,
            email: value.email,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiLabel {
    pub(super) id: u64,
    pub(super) name: String,
    #[serde(default)]
    pub(super) color: Option<String>,
}

impl From<ApiLabel> for Label {
    fn from(value: ApiLabel) -> Self {
        Self {
            id: Some(value.id),
            name: value.name,
            color: value.color,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiMilestone {
    pub(super) id: u64,
    pub(super) title: String,
    #[serde(default)]
    pub(super) state: Option<String>,
}

impl From<ApiMilestone> for Milestone {
    fn from(value: ApiMilestone) -> Self {
        Self {
            id: value.id,
            number: None,
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
    #[serde(default)]
    pub(super) comments: u64,
    #[serde(default)]
    pub(super) created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) updated_at: Option<DateTime<Utc>>,
}

impl ApiIssue {
    pub(super) fn into_issue(self, url: String) -> Result<Issue, IssueError> {
        Ok(Issue {
            number: IssueNumber::new(self.number)?,
            title: self.title,
            body: self.body.unwrap_or_default(),
            state: IssueState::from_provider(&self.state),
            author: self.user.map(User::from),
            assignee: self.assignee.map(User::from),
            milestone: self.milestone.map(Milestone::from),
            labels: self.labels.into_iter().map(Label::from).collect(),
            url,
            comment_count: self.comments,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiComment {
    pub(super) id: u64,
    #[serde(default)]
    pub(super) body: String,
    #[serde(default)]
    pub(super) user: Option<ApiUser>,
    #[serde(default)]
    pub(super) html_url: Option<String>,
    #[serde(default)]
    pub(super) created_at: Option<DateTime<Utc>>,
}

impl ApiComment {
    pub(super) fn into_comment(self, issue: IssueNumber) -> Comment {
        Comment {
            issue,
            id: Some(self.id),
            author: self.user.map(User::from),
            body: self.body,
            created_at: self.created_at,
            kind: CommentKind::Note,
            url: self.html_url,
        }
    }
}

/// `GET /users/search` wraps its results.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiUserSearch {
    #[serde(default)]
    pub(super) data: Vec<ApiUser>,
}
