//! JIRA REST v2 payloads.
//!
//! JIRA identifies issues by `<KEY>-<n>` keys, users by name rather than a
//! numeric id, and writes timestamps with a colon-less UTC offset
//! (`2025-01-01T10:00:00.000+0000`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::service::error::IssueError;
use crate::service::model::{
    Comment, CommentKind, Issue, IssueNumber, IssueState, Label, Milestone, User,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    raw.map(|text| {
        DateTime::parse_from_str(&text, TIMESTAMP_FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(&text))
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    })
    .transpose()
}

/// Number part of an issue key such as `PROJ-12`.
pub(super) fn key_number(key: &str) -> Result<IssueNumber, IssueError> {
    key.rsplit_once('-')
        .and_then(|(_, digits)| digits.parse::<u64>().ok())
        .ok_or_else(|| IssueError::validation(format!("unexpected JIRA issue key: {key}")))
        .and_then(IssueNumber::new)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ApiUser {
    #[serde(default)]
    pub(super) name: Option<String>,
    #[serde(default)]
    pub(super) account_id: Option<String>,
    #[serde(default)]
    pub(super) display_name: Option<String>,
    #[serde(default)]
    pub(super) email_address: Option<String>,
}

impl From<ApiUser> for User {
    fn from(value: ApiUser) -> Self {
        Self {
            id: 0,
            username: value.name.or(value.account_id).unwrap_or_default(),
            name: value.display_name,
            email: value.email_address,
        }
    }
}

/// Workflow status; projects define their own names.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiStatus {
    pub(super) name: String,
}

impl ApiStatus {
    /// `Open` and `Closed` by name; any other status is kept verbatim.
    pub(super) fn state(self) -> IssueState {
        match self.name.to_ascii_lowercase().as_str() {
            "open" => IssueState::Open,
            "closed" => IssueState::Closed,
            _ => IssueState::Other(self.name),
        }
    }
}

/// Projects use components where other trackers use labels.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiComponent {
    #[serde(default)]
    pub(super) id: Option<String>,
    pub(super) name: String,
}

impl From<ApiComponent> for Label {
    fn from(value: ApiComponent) -> Self {
        Self {
            id: value.id.and_then(|id| id.parse().ok()),
            name: value.name,
            color: None,
        }
    }
}

/// Fix versions stand in for milestones.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiVersion {
    #[serde(default)]
    pub(super) id: Option<String>,
    pub(super) name: String,
    #[serde(default)]
    pub(super) released: bool,
}

impl From<ApiVersion> for Milestone {
    fn from(value: ApiVersion) -> Self {
        Self {
            id: value.id.and_then(|id| id.parse().ok()).unwrap_or_default(),
            number: None,
            title: value.name,
            state: Some(if value.released { "released" } else { "unreleased" }.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiComment {
    pub(super) id: String,
    #[serde(default)]
    pub(super) body: String,
    #[serde(default)]
    pub(super) author: Option<ApiUser>,
    #[serde(default, deserialize_with = "timestamp")]
    pub(super) created: Option<DateTime<Utc>>,
}

impl ApiComment {
    pub(super) fn into_comment(self, issue: IssueNumber, issue_url: &str) -> Comment {
        let url = format!("{issue_url}?focusedCommentId={}", self.id);
        Comment {
            issue,
            id: self.id.parse().ok(),
            author: self.author.map(User::from),
            body: self.body,
            created_at: self.created,
            kind: CommentKind::Note,
            url: Some(url),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct ApiCommentPage {
    #[serde(default)]
    pub(super) total: u64,
    #[serde(default)]
    pub(super) comments: Vec<ApiComment>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiChangeItem {
    pub(super) field: String,
    #[serde(default, rename = "fromString")]
    pub(super) from_text: Option<String>,
    #[serde(default, rename = "toString")]
    pub(super) to_text: Option<String>,
}

impl ApiChangeItem {
    fn describe(&self) -> String {
        let from = self.from_text.as_deref().filter(|text| !text.is_empty());
        let to = self.to_text.as_deref().filter(|text| !text.is_empty());
        let to_text = to.unwrap_or_default();
        match (self.field.as_str(), from, to) {
            ("status", Some(old), _) => format!("Moved this from {old} to {to_text}"),
            ("status", None, _) => format!("Moved this to {to_text}"),
            ("assignee", Some(old), _) => format!("Assignee changed from {old} to {to_text}"),
            ("assignee", None, _) => format!("Assignee changed to {to_text}"),
            ("summary", old, _) => {
                format!("Changed title from {} to {to_text}", old.unwrap_or_default())
            }
            ("description", Some(_), _) => "Updated description".to_owned(),
            ("description", None, _) => "Added description".to_owned(),
            ("labels", old, new) => [
                old.map(|name| format!("Removed label {name} from this")),
                new.map(|name| format!("Added label {name} to this")),
            ]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n"),
            ("resolution", Some(old), Some(new)) => {
                format!("Resolution changed from {old} to {new}")
            }
            ("resolution", Some(old), None) => format!("Removed resolution {old}"),
            ("resolution", None, _) => format!("Marked resolution as {to_text}"),
            ("priority", Some(old), Some(new)) => format!("Priority change from {old} to {new}"),
            ("priority", Some(old), None) => format!("Priority {old} removed"),
            ("priority", None, _) => format!("Priority {to_text} added"),
            ("issuetype", old, _) => format!(
                "Changed issue type from {} to {to_text}",
                old.unwrap_or_default()
            ),
            ("Component", Some(old), _) => format!("Removed from {old} component"),
            ("Component", None, _) => format!("Added to {to_text} component"),
            ("Fix Version", Some(old), Some(new)) => {
                format!("Changed milestone from {old} to {new}")
            }
            ("Fix Version", Some(old), None) => format!("Removed this from the {old} milestone"),
            ("Fix Version", None, _) => format!("Added this to the {to_text} milestone"),
            ("Sprint", Some(old), Some(new)) => format!("Sprint changed from {old} to {new}"),
            ("Sprint", Some(old), None) => format!("Removed this from the {old} sprint"),
            ("Sprint", None, _) => format!("Added this to the {to_text} sprint"),
            ("Link" | "RemoteIssueLink", old, new) => {
                old.or(new).unwrap_or_default().to_owned()
            }
            (field, old, new) => format!(
                "Changed {field} from {} to {}",
                old.unwrap_or("nothing"),
                new.unwrap_or("nothing")
            ),
        }
    }
}

/// One changelog entry; several field changes may share it.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiHistory {
    #[serde(default)]
    pub(super) author: Option<ApiUser>,
    #[serde(default, deserialize_with = "timestamp")]
    pub(super) created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) items: Vec<ApiChangeItem>,
}

impl ApiHistory {
    pub(super) fn into_event(self, issue: IssueNumber) -> Comment {
        let body = self
            .items
            .iter()
            .map(ApiChangeItem::describe)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Comment {
            issue,
            id: None,
            author: self.author.map(User::from),
            body,
            created_at: self.created,
            kind: CommentKind::Event,
            url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(super) struct ApiChangelog {
    #[serde(default)]
    pub(super) histories: Vec<ApiHistory>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ApiFields {
    #[serde(default)]
    pub(super) summary: String,
    #[serde(default)]
    pub(super) description: Option<String>,
    pub(super) status: ApiStatus,
    #[serde(default)]
    pub(super) reporter: Option<ApiUser>,
    #[serde(default)]
    pub(super) assignee: Option<ApiUser>,
    #[serde(default)]
    pub(super) components: Vec<ApiComponent>,
    #[serde(default)]
    pub(super) fix_versions: Vec<ApiVersion>,
    #[serde(default)]
    pub(super) comment: ApiCommentPage,
    #[serde(default, deserialize_with = "timestamp")]
    pub(super) created: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp")]
    pub(super) updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct ApiIssue {
    pub(super) key: String,
    pub(super) fields: ApiFields,
    #[serde(default)]
    pub(super) changelog: Option<ApiChangelog>,
}

impl ApiIssue {
    /// Converts the issue; the first fix version becomes the milestone.
    pub(super) fn into_issue(self, url: String) -> Result<Issue, IssueError> {
        let fields = self.fields;
        Ok(Issue {
            number: key_number(&self.key)?,
            title: fields.summary,
            body: fields.description.unwrap_or_default(),
            state: fields.status.state(),
            author: fields.reporter.map(User::from),
            assignee: fields.assignee.map(User::from),
            milestone: fields.fix_versions.into_iter().next().map(Milestone::from),
            labels: fields.components.into_iter().map(Label::from).collect(),
            url,
            comment_count: fields.comment.total,
            created_at: fields.created,
            updated_at: fields.updated,
        })
    }
}

/// `GET /search` result window.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ApiSearch {
    #[serde(default)]
    pub(super) start_at: u64,
    #[serde(default)]
    pub(super) max_results: u64,
    #[serde(default)]
    pub(super) total: u64,
    #[serde(default)]
    pub(super) issues: Vec<ApiIssue>,
}

impl ApiSearch {
    /// Offset of the following window, or `None` after the last one.
    pub(super) fn next_start(&self) -> Option<u64> {
        let returned = u64::try_from(self.issues.len()).unwrap_or(u64::MAX);
        let next = self.start_at.saturating_add(self.max_results.max(returned));
        (returned > 0 && next < self.total).then_some(next)
    }
}
