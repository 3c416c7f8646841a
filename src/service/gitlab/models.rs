//! GitLab REST payloads.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::service::error::IssueError;
use crate::service::model::{
    Comment, CommentKind, Issue, IssueNumber, IssueState, Label, Milestone, User, capitalise,
};

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiUser {
    pub(super) id: u64,
    pub(super) username: String,
    #[serde(default)]
    pub(super) name: Option<String>,
    #[serde(default)]
    pub(super) public_email: Option<String>,
}

impl From<ApiUser> for User {
    fn from(value: ApiUser) -> Self {
        Self {
            id: value.id,
            username: value.username,
            name: value.name,
            email: value.public_email,
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
            color: value
                .color
                .map(|color| color.trim_start_matches('#').to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiMilestone {
    pub(super) id: u64,
    #[serde(default)]
    pub(super) iid: Option<u64>,
    pub(super) title: String,
    #[serde(default)]
    pub(super) state: Option<String>,
}

impl From<ApiMilestone> for Milestone {
    fn from(value: ApiMilestone) -> Self {
        Self {
            id: value.id,
            number: value.iid,
            title: value.title,
            state: value.state,
        }
    }
}

/// Issue payload; labels arrive as plain names.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiIssue {
    pub(super) iid: u64,
    pub(super) title: String,
    #[serde(default)]
    pub(super) description: Option<String>,
    pub(super) state: String,
    #[serde(default)]
    pub(super) author: Option<ApiUser>,
    #[serde(default)]
    pub(super) assignee: Option<ApiUser>,
    #[serde(default)]
    pub(super) assignees: Vec<ApiUser>,
    #[serde(default)]
    pub(super) milestone: Option<ApiMilestone>,
    #[serde(default)]
    pub(super) labels: Vec<String>,
    pub(super) web_url: String,
    #[serde(default)]
    pub(super) user_notes_count: u64,
    #[serde(default)]
    pub(super) created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<ApiIssue> for Issue {
    type Error = IssueError;

    fn try_from(value: ApiIssue) -> Result<Self, Self::Error> {
        let assignee = value
            .assignee
            .or_else(|| value.assignees.into_iter().next());
        Ok(Self {
            number: IssueNumber::new(value.iid)?,
            title: value.title,
            body: value.description.unwrap_or_default(),
            state: IssueState::from_provider(&value.state),
            author: value.author.map(User::from),
            assignee: assignee.map(User::from),
            milestone: value.milestone.map(Milestone::from),
            labels: value.labels.into_iter().map(Label::named).collect(),
            url: value.web_url,
            comment_count: value.user_notes_count,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

/// A note; `system` notes record state changes rather than discussion.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiNote {
    pub(super) id: u64,
    #[serde(default)]
    pub(super) body: String,
    #[serde(default)]
    pub(super) author: Option<ApiUser>,
    #[serde(default)]
    pub(super) created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) system: bool,
}

impl ApiNote {
    pub(super) fn into_comment(self, issue: IssueNumber, issue_url: &str) -> Comment {
        let (kind, body) = if self.system {
            (CommentKind::Event, describe_system_note(&self.body))
        } else {
            (CommentKind::Note, self.body)
        };
        Comment {
            issue,
            id: Some(self.id),
            author: self.author.map(User::from),
            body,
            created_at: self.created_at,
            kind,
            url: Some(format!("{issue_url}#note_{}", self.id)),
        }
    }
}

/// Strips GitLab's diff markup (`{+new+}`, `{-old-}`, `**bold**`) and
/// capitalises the sentence.
fn describe_system_note(body: &str) -> String {
    let plain = ["{+", "+}", "{-", "-}", "**"]
        .into_iter()
        .fold(body.to_owned(), |text, marker| text.replace(marker, ""));
    capitalise(plain.trim())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::describe_system_note;

    #[rstest]
    #[case::plain("closed", "Closed")]
    #[case::title_change(
        "changed title from **{-Crash-}** to **{+Crash on start+}**",
        "Changed title from Crash to Crash on start"
    )]
    #[case::empty("", "")]
    fn system_notes_read_as_sentences(#[case] body: &str, #[case] expected: &str) {
        assert_eq!(describe_system_note(body), expected);
    }
}
