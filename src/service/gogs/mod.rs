//! Gogs adapter over the v1 REST API.
//!
//! Gogs ignores labels on `PATCH`, so label edits go through the issue's
//! labels endpoint as a second call. Listings page by number until an empty
//! page; `all` walks the open issues and then the closed ones.

mod models;

use async_trait::async_trait;
use http::Method;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::error::{IssueError, ProviderLimitation};
use super::model::{
    Comment, Issue, IssueNumber, IssuePage, Label, Milestone, NewIssue, PageCursor, StateFilter,
    TargetState, Updated, User,
};
use super::rest::RestClient;
use super::{IssueService, ServiceKind, ServiceSettings};
use crate::reconcile::{Change, UpdateSet};

use models::{ApiComment, ApiIssue, ApiLabel, ApiMilestone, ApiUserSearch};

const LABEL_LIMITATION: &str =
    "Gogs may ignore a label edit that repeats an earlier one; check the labels on the web page";

/// Gogs issue service.
pub struct GogsService {
    client: RestClient,
    repository: String,
    web_url: String,
}

/// Position in a listing: the state being walked and the next page number.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ListCursor {
    state: String,
    page: u32,
}

impl ListCursor {
    fn first(state: &str) -> Self {
        Self {
            state: state.to_owned(),
            page: 1,
        }
    }

    fn parse(cursor: &PageCursor) -> Result<Self, IssueError> {
        let invalid =
            || IssueError::validation(format!("invalid page cursor: {}", cursor.as_str()));
        let (state, page) = cursor.as_str().rsplit_once(':').ok_or_else(invalid)?;
        let number = page.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self {
            state: state.to_owned(),
            page: number,
        })
    }

    fn successor(&self) -> Self {
        Self {
            state: self.state.clone(),
            page: self.page.saturating_add(1),
        }
    }

    fn encode(&self) -> PageCursor {
        PageCursor::new(format!("{}:{}", self.state, self.page))
    }
}

impl GogsService {
    /// Builds a client for the configured repository.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] when the host cannot form a URL
    /// and [`IssueError::Authentication`] when the token is not a valid
    /// header value.
    pub fn new(settings: &ServiceSettings) -> Result<Self, IssueError> {
        let origin = settings.locator.origin()?;
        let api_base = format!("{}/api/v1", origin.as_str().trim_end_matches('/'));
        let client = RestClient::new(
            &api_base,
            "authorization",
            &format!("token {}", settings.token.value()),
        )?;
        Ok(Self {
            client,
            repository: settings.locator.full_name(),
            web_url: settings.locator.web_url()?,
        })
    }

    fn repo_path(&self, suffix: &str) -> String {
        format!("/repos/{}{suffix}", self.repository)
    }

    fn issue_path(&self, number: IssueNumber, suffix: &str) -> String {
        self.repo_path(&format!("/issues/{}{suffix}", number.get()))
    }

    fn repository_target(&self) -> String {
        format!("repository {}", self.repository)
    }

    fn convert(&self, issue: ApiIssue) -> Result<Issue, IssueError> {
        let url = IssueNumber::new(issue.number).map(|number| self.issue_url(number))?;
        issue.into_issue(url)
    }

    async fn patch_issue(&self, number: IssueNumber, body: &Value) -> Result<Issue, IssueError> {
        let updated: ApiIssue = self
            .client
            .send(
                Method::PATCH,
                &number.to_string(),
                &self.issue_path(number, ""),
                body,
            )
            .await?;
        self.convert(updated)
    }

    /// Replaces or clears the issue's labels and returns the labels now set.
    async fn apply_labels(
        &self,
        number: IssueNumber,
        labels: &Change<Vec<Label>>,
    ) -> Result<Vec<Label>, IssueError> {
        let target = number.to_string();
        let path = self.issue_path(number, "/labels");
        match labels {
            Change::Unchanged => Ok(Vec::new()),
            Change::Cleared => {
                self.client.delete(&target, &path).await?;
                Ok(Vec::new())
            }
            Change::Set(wanted) => {
                let ids = label_ids(wanted)?;
                let applied: Vec<ApiLabel> = self
                    .client
                    .send(Method::PUT, &target, &path, &json!({ "labels": ids }))
                    .await?;
                Ok(applied.into_iter().map(Label::from).collect())
            }
        }
    }
}

fn label_ids(labels: &[Label]) -> Result<Vec<u64>, IssueError> {
    labels
        .iter()
        .map(|label| {
            label.id.ok_or_else(|| {
                IssueError::validation(format!("label {} has no Gogs id", label.name))
            })
        })
        .collect()
}

fn create_payload(issue: &NewIssue) -> Result<Value, IssueError> {
    let mut body = Map::new();
    body.insert("title".to_owned(), json!(issue.title));
    body.insert("body".to_owned(), json!(issue.body));
    if let Some(user) = &issue.assignee {
        body.insert("assignee".to_owned(), json!(user.username));
    }
    if let Some(milestone) = &issue.milestone {
        body.insert("milestone".to_owned(), json!(milestone.id));
    }
    if !issue.labels.is_empty() {
        body.insert("labels".to_owned(), json!(label_ids(&issue.labels)?));
    }
    Ok(Value::Object(body))
}

/// Changed fields other than labels; cleared fields use `""` or `0`.
fn patch_payload(changes: &UpdateSet) -> Map<String, Value> {
    let mut body = Map::new();
    if let Change::Set(title) = &changes.title {
        body.insert("title".to_owned(), json!(title));
    }
    match &changes.body {
        Change::Set(text) => {
            body.insert("body".to_owned(), json!(text));
        }
        Change::Cleared => {
            body.insert("body".to_owned(), json!(""));
        }
        Change::Unchanged => {}
    }
    match &changes.assignee {
        Change::Set(user) => {
            body.insert("assignee".to_owned(), json!(user.username));
        }
        Change::Cleared => {
            body.insert("assignee".to_owned(), json!(""));
        }
        Change::Unchanged => {}
    }
    match &changes.milestone {
        Change::Set(milestone) => {
            body.insert("milestone".to_owned(), json!(milestone.id));
        }
        Change::Cleared => {
            body.insert("milestone".to_owned(), json!(0));
        }
        Change::Unchanged => {}
    }
    body
}

#[async_trait]
impl IssueService for GogsService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Gogs
    }

    async fn create(&self, issue: &NewIssue) -> Result<Issue, IssueError> {
        let created: ApiIssue = self
            .client
            .send(
                Method::POST,
                &self.repository_target(),
                &self.repo_path("/issues"),
                &create_payload(issue)?,
            )
            .await?;
        self.convert(created)
    }

    async fn fetch(&self, number: IssueNumber) -> Result<Issue, IssueError> {
        let issue: ApiIssue = self
            .client
            .get(&number.to_string(), &self.issue_path(number, ""), &[])
            .await?;
        self.convert(issue)
    }

    /// Sends a `PATCH` for the plain fields and, when labels changed, a
    /// second call to the labels endpoint.
    ///
    /// # Errors
    ///
    /// A labels failure after a successful `PATCH` is reported as
    /// [`IssueError::PartiallyApplied`].
    async fn update(
        &self,
        number: IssueNumber,
        changes: &UpdateSet,
    ) -> Result<Updated, IssueError> {
        debug!(issue = %number, fields = ?changes.changed_fields(), "updating Gogs issue");
        let fields = patch_payload(changes);
        let patched = if fields.is_empty() {
            None
        } else {
            Some(self.patch_issue(number, &Value::Object(fields)).await?)
        };

        if changes.labels.is_unchanged() {
            return match patched {
                Some(issue) => Ok(Updated::clean(issue)),
                None => self.fetch(number).await.map(Updated::clean),
            };
        }

        let labels = self
            .apply_labels(number, &changes.labels)
            .await
            .map_err(|error| {
                if patched.is_some() {
                    error.after(format!("fields updated on {number}"))
                } else {
                    error
                }
            })?;
        warn!(issue = %number, "{LABEL_LIMITATION}");

        let mut issue = match patched {
            Some(issue) => issue,
            None => self.fetch(number).await?,
        };
        issue.labels = labels;
        Ok(Updated {
            issue,
            warnings: vec![ProviderLimitation::new(ServiceKind::Gogs, LABEL_LIMITATION)],
        })
    }

    async fn transition(
        &self,
        number: IssueNumber,
        target: TargetState,
    ) -> Result<Issue, IssueError> {
        let state = match target {
            TargetState::Open => "open",
            TargetState::Closed => "closed",
        };
        self.patch_issue(number, &json!({ "state": state })).await
    }

    async fn comment(&self, number: IssueNumber, body: &str) -> Result<Comment, IssueError> {
        let created: ApiComment = self
            .client
            .send(
                Method::POST,
                &number.to_string(),
                &self.issue_path(number, "/comments"),
                &json!({ "body": body }),
            )
            .await?;
        Ok(created.into_comment(number))
    }

    async fn list_page(
        &self,
        filter: StateFilter,
        cursor: Option<PageCursor>,
    ) -> Result<IssuePage, IssueError> {
        let walk_all = filter == StateFilter::All;
        let position = match &cursor {
            Some(cursor) => ListCursor::parse(cursor)?,
            None if walk_all => ListCursor::first(StateFilter::Open.as_str()),
            None => ListCursor::first(filter.as_str()),
        };

        let issues: Vec<ApiIssue> = self
            .client
            .get(
                &self.repository_target(),
                &self.repo_path("/issues"),
                &[
                    ("state", position.state.clone()),
                    ("page", position.page.to_string()),
                ],
            )
            .await?;

        let next = if issues.is_empty() {
            (walk_all && position.state == StateFilter::Open.as_str())
                .then(|| ListCursor::first(StateFilter::Closed.as_str()).encode())
        } else {
            Some(position.successor().encode())
        };
        let items = issues
            .into_iter()
            .map(|issue| self.convert(issue))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IssuePage { items, next })
    }

    async fn comments(&self, number: IssueNumber) -> Result<Vec<Comment>, IssueError> {
        let comments: Vec<ApiComment> = self
            .client
            .get(
                &number.to_string(),
                &self.issue_path(number, "/comments"),
                &[],
            )
            .await?;
        Ok(comments
            .into_iter()
            .map(|comment| comment.into_comment(number))
            .collect())
    }

    async fn search_users(&self, term: &str) -> Result<Vec<User>, IssueError> {
        let found: ApiUserSearch = self
            .client
            .get(
                &format!("user {term}"),
                "/users/search",
                &[("q", term.to_owned())],
            )
            .await?;
        Ok(found.data.into_iter().map(User::from).collect())
    }

    async fn labels(&self) -> Result<Vec<Label>, IssueError> {
        let labels: Vec<ApiLabel> = self
            .client
            .get(&self.repository_target(), &self.repo_path("/labels"), &[])
            .await?;
        Ok(labels.into_iter().map(Label::from).collect())
    }

    async fn milestones(&self) -> Result<Vec<Milestone>, IssueError> {
        let milestones: Vec<ApiMilestone> = self
            .client
            .get(
                &self.repository_target(),
                &self.repo_path("/milestones"),
                &[("state", "all".to_owned())],
            )
            .await?;
        Ok(milestones.into_iter().map(Milestone::from).collect())
    }

    async fn states(&self) -> Result<Vec<StateFilter>, IssueError> {
        Ok(vec![StateFilter::Open, StateFilter::Closed, StateFilter::All])
    }

    fn issue_url(&self, number: IssueNumber) -> String {
        format!("{}/issues/{}", self.web_url, number.get())
    }

    fn issues_url(&self) -> String {
        format!("{}/issues", self.web_url)
    }
}

#[cfg(test)]
mod tests;
