//! GitHub and GitHub Enterprise adapter built on Octocrab.

mod models;

use async_trait::async_trait;
use http::Uri;
use octocrab::{Octocrab, Page};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::error::IssueError;
use super::error_mapping::map_octocrab_error;
use super::locator::{AccessToken, RepositoryLocator, ServiceKind};
use super::model::{
    Comment, Issue, IssueNumber, IssuePage, Label, Milestone, NewIssue, PageCursor, StateFilter,
    TargetState, Updated, User, merge_chronologically,
};
use super::{IssueService, ServiceSettings};
use crate::reconcile::{Change, UpdateSet};

use models::{ApiComment, ApiEvent, ApiIssue, ApiLabel, ApiMilestone, ApiUserSearch};

const PUBLIC_HOST: &str = "github.com";
const PUBLIC_API: &str = "https://api.github.com";
const PER_PAGE: &str = "50";

/// Octocrab-backed GitHub issue service.
pub struct GitHubService {
    client: Octocrab,
    repository: String,
    web_url: String,
}

impl GitHubService {
    /// Builds a client for the configured repository.
    ///
    /// `github.com` uses `api.github.com`; any other host is treated as
    /// GitHub Enterprise with its API under `/api/v3`.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] when the API URL is invalid or
    /// Octocrab fails to construct a client.
    pub fn new(settings: &ServiceSettings) -> Result<Self, IssueError> {
        let api_base = api_base(&settings.locator)?;
        let client = build_octocrab_client(&settings.token, &api_base)?;
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

    async fn all_pages<T: DeserializeOwned>(
        &self,
        target: &str,
        path: String,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, IssueError> {
        let first: Page<T> = self
            .client
            .get(path, Some(&query))
            .await
            .map_err(|error| map_octocrab_error(target, &error))?;
        self.client
            .all_pages(first)
            .await
            .map_err(|error| map_octocrab_error(target, &error))
    }

    async fn patch_issue(&self, number: IssueNumber, body: &Value) -> Result<Issue, IssueError> {
        let target = number.to_string();
        let updated: ApiIssue = self
            .client
            .patch(self.issue_path(number, ""), Some(body))
            .await
            .map_err(|error| map_octocrab_error(&target, &error))?;
        Issue::try_from(updated)
    }
}

/// Derives the REST API base from the repository location.
fn api_base(locator: &RepositoryLocator) -> Result<String, IssueError> {
    if locator.host() == PUBLIC_HOST && locator.port().is_none() {
        return Ok(PUBLIC_API.to_owned());
    }
    let origin = locator.origin()?;
    Ok(format!("{}/api/v3", origin.as_str().trim_end_matches('/')))
}

/// Builds an Octocrab client for the given token and API base URL.
///
/// A `user:token` credential is sent with basic authentication; anything
/// else is a personal access token.
fn build_octocrab_client(token: &AccessToken, api_base: &str) -> Result<Octocrab, IssueError> {
    let base_uri: Uri = api_base
        .parse::<Uri>()
        .map_err(|error| IssueError::configuration(format!("invalid API URL: {error}")))?;
    let builder = Octocrab::builder();
    let client = match token.basic_credentials() {
        Some((user, secret)) => builder
            .basic_auth(user.to_owned(), secret.to_owned())
            .base_uri(base_uri)
            .map_err(builder_error)?
            .build(),
        None => builder
            .personal_token(token.value())
            .base_uri(base_uri)
            .map_err(builder_error)?
            .build(),
    };
    client.map_err(builder_error)
}

fn builder_error(error: impl std::fmt::Display) -> IssueError {
    IssueError::configuration(format!("build client failed: {error}"))
}

fn create_payload(issue: &NewIssue) -> Value {
    let mut body = Map::new();
    body.insert("title".to_owned(), json!(issue.title));
    body.insert("body".to_owned(), json!(issue.body));
    if let Some(user) = &issue.assignee {
        body.insert("assignees".to_owned(), json!([user.username]));
    }
    if let Some(milestone) = &issue.milestone {
        body.insert("milestone".to_owned(), json!(milestone_number(milestone)));
    }
    if !issue.labels.is_empty() {
        body.insert("labels".to_owned(), json!(label_names(&issue.labels)));
    }
    Value::Object(body)
}

/// Only changed fields; cleared fields use `null` or an empty list.
fn update_payload(changes: &UpdateSet) -> Value {
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
            body.insert("assignees".to_owned(), json!([user.username]));
        }
        Change::Cleared => {
            body.insert("assignees".to_owned(), json!([]));
        }
        Change::Unchanged => {}
    }
    match &changes.milestone {
        Change::Set(milestone) => {
            body.insert("milestone".to_owned(), json!(milestone_number(milestone)));
        }
        Change::Cleared => {
            body.insert("milestone".to_owned(), Value::Null);
        }
        Change::Unchanged => {}
    }
    match &changes.labels {
        Change::Set(labels) => {
            body.insert("labels".to_owned(), json!(label_names(labels)));
        }
        Change::Cleared => {
            body.insert("labels".to_owned(), json!([]));
        }
        Change::Unchanged => {}
    }
    Value::Object(body)
}

fn milestone_number(milestone: &Milestone) -> u64 {
    milestone.number.unwrap_or(milestone.id)
}

fn label_names(labels: &[Label]) -> Vec<&str> {
    labels.iter().map(|label| label.name.as_str()).collect()
}

fn into_issue_page(page: Page<ApiIssue>) -> Result<IssuePage, IssueError> {
    let next = page.next.as_ref().map(|uri| PageCursor::new(uri.to_string()));
    let items = page
        .items
        .into_iter()
        .filter(|issue| !issue.is_pull_request())
        .map(Issue::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(IssuePage { items, next })
}

#[async_trait]
impl IssueService for GitHubService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::GitHub
    }

    async fn create(&self, issue: &NewIssue) -> Result<Issue, IssueError> {
        let target = self.repository_target();
        let created: ApiIssue = self
            .client
            .post(self.repo_path("/issues"), Some(&create_payload(issue)))
            .await
            .map_err(|error| map_octocrab_error(&target, &error))?;
        Issue::try_from(created)
    }

    async fn fetch(&self, number: IssueNumber) -> Result<Issue, IssueError> {
        let target = number.to_string();
        let issue: ApiIssue = self
            .client
            .get(self.issue_path(number, ""), None::<&()>)
            .await
            .map_err(|error| map_octocrab_error(&target, &error))?;
        Issue::try_from(issue)
    }

    async fn update(
        &self,
        number: IssueNumber,
        changes: &UpdateSet,
    ) -> Result<Updated, IssueError> {
        debug!(issue = %number, fields = ?changes.changed_fields(), "updating GitHub issue");
        let issue = self.patch_issue(number, &update_payload(changes)).await?;
        Ok(Updated::clean(issue))
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
        let target = number.to_string();
        let created: ApiComment = self
            .client
            .post(self.issue_path(number, "/comments"), Some(&json!({ "body": body })))
            .await
            .map_err(|error| map_octocrab_error(&target, &error))?;
        Ok(created.into_comment(number))
    }

    async fn list_page(
        &self,
        filter: StateFilter,
        cursor: Option<PageCursor>,
    ) -> Result<IssuePage, IssueError> {
        let target = self.repository_target();
        let Some(cursor) = cursor else {
            let query = [("state", filter.as_str()), ("per_page", PER_PAGE)];
            let page: Page<ApiIssue> = self
                .client
                .get(self.repo_path("/issues"), Some(&query))
                .await
                .map_err(|error| map_octocrab_error(&target, &error))?;
            return into_issue_page(page);
        };

        let next_uri = cursor
            .as_str()
            .parse::<Uri>()
            .map_err(|_| IssueError::validation("invalid page cursor"))?;
        let page: Option<Page<ApiIssue>> = self
            .client
            .get_page(&Some(next_uri))
            .await
            .map_err(|error| map_octocrab_error(&target, &error))?;
        page.map_or_else(
            || {
                Ok(IssuePage {
                    items: Vec::new(),
                    next: None,
                })
            },
            into_issue_page,
        )
    }

    async fn comments(&self, number: IssueNumber) -> Result<Vec<Comment>, IssueError> {
        let target = number.to_string();
        let query = [("per_page", PER_PAGE)];
        let notes: Vec<ApiComment> = self
            .all_pages(&target, self.issue_path(number, "/comments"), &query)
            .await?;
        let events: Vec<ApiEvent> = self
            .all_pages(&target, self.issue_path(number, "/events"), &query)
            .await?;

        Ok(merge_chronologically(
            notes
                .into_iter()
                .map(|note| note.into_comment(number))
                .collect(),
            events
                .into_iter()
                .filter_map(|event| event.into_comment(number))
                .collect(),
        ))
    }

    async fn search_users(&self, term: &str) -> Result<Vec<User>, IssueError> {
        let target = format!("user {term}");
        let found: ApiUserSearch = self
            .client
            .get("/search/users", Some(&[("q", term)]))
            .await
            .map_err(|error| map_octocrab_error(&target, &error))?;
        Ok(found.items.into_iter().map(User::from).collect())
    }

    async fn labels(&self) -> Result<Vec<Label>, IssueError> {
        let target = self.repository_target();
        let labels: Vec<ApiLabel> = self
            .all_pages(&target, self.repo_path("/labels"), &[("per_page", PER_PAGE)])
            .await?;
        Ok(labels.into_iter().map(Label::from).collect())
    }

    async fn milestones(&self) -> Result<Vec<Milestone>, IssueError> {
        let target = self.repository_target();
        let milestones: Vec<ApiMilestone> = self
            .all_pages(
                &target,
                self.repo_path("/milestones"),
                &[("state", "all"), ("per_page", PER_PAGE)],
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
