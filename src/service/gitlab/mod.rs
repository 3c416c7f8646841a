//! GitLab adapter over the v4 REST API.
//!
//! Issues are addressed by their project-scoped `iid`. Listings page with the
//! `X-Next-Page` header, so the cursor is a page number.

mod models;

use async_trait::async_trait;
use http::Method;
use serde_json::{Map, Value, json};
use tracing::debug;
use url::form_urlencoded;

use super::error::IssueError;
use super::model::{
    Comment, Issue, IssueNumber, IssuePage, Label, Milestone, NewIssue, PageCursor, StateFilter,
    TargetState, Updated, User,
};
use super::rest::{RestClient, header_to_string};
use super::{IssueService, ServiceKind, ServiceSettings};
use crate::reconcile::{Change, UpdateSet};

use models::{ApiIssue, ApiLabel, ApiMilestone, ApiNote, ApiUser};

const PER_PAGE: &str = "50";
const NEXT_PAGE_HEADER: &str = "x-next-page";

/// GitLab issue service.
pub struct GitLabService {
    client: RestClient,
    project: String,
    repository: String,
    web_url: String,
}

impl GitLabService {
    /// Builds a client for the configured project.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] when the host cannot form a URL
    /// and [`IssueError::Authentication`] when the token is not a valid
    /// header value.
    pub fn new(settings: &ServiceSettings) -> Result<Self, IssueError> {
        let origin = settings.locator.origin()?;
        let api_base = format!("{}/api/v4", origin.as_str().trim_end_matches('/'));
        let client = RestClient::new(&api_base, "private-token", settings.token.value())?;
        let encoded: String =
            form_urlencoded::byte_serialize(settings.locator.full_name().as_bytes()).collect();
        Ok(Self {
            client,
            project: format!("/projects/{encoded}"),
            repository: settings.locator.full_name(),
            web_url: settings.locator.web_url()?,
        })
    }

    fn project_path(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.project)
    }

    fn issue_path(&self, number: IssueNumber, suffix: &str) -> String {
        self.project_path(&format!("/issues/{}{suffix}", number.get()))
    }

    fn project_target(&self) -> String {
        format!("project {}", self.repository)
    }

    async fn put_issue(&self, number: IssueNumber, body: &Value) -> Result<Issue, IssueError> {
        let updated: ApiIssue = self
            .client
            .send(
                Method::PUT,
                &number.to_string(),
                &self.issue_path(number, ""),
                body,
            )
            .await?;
        Issue::try_from(updated)
    }

    /// Fetches every page of a project collection.
    async fn all_pages<T: serde::de::DeserializeOwned>(
        &self,
        target: &str,
        path: &str,
        extra: &[(&str, String)],
    ) -> Result<Vec<T>, IssueError> {
        let mut items = Vec::new();
        let mut page = "1".to_owned();
        loop {
            let mut query: Vec<(&str, String)> = extra.to_vec();
            query.push(("per_page", PER_PAGE.to_owned()));
            query.push(("page", page));
            let (batch, headers): (Vec<T>, _) =
                self.client.get_with_headers(target, path, &query).await?;
            items.extend(batch);
            match header_to_string(&headers, NEXT_PAGE_HEADER) {
                Some(next) => page = next,
                None => return Ok(items),
            }
        }
    }
}

/// GitLab names the open state `opened`; `all` is expressed by omitting the
/// parameter.
fn state_param(filter: &StateFilter) -> Option<String> {
    match filter {
        StateFilter::Open => Some("opened".to_owned()),
        StateFilter::Closed => Some("closed".to_owned()),
        StateFilter::All => None,
        StateFilter::Other(name) => Some(name.clone()),
    }
}

fn label_list(labels: &[Label]) -> String {
    labels
        .iter()
        .map(|label| label.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

fn create_payload(issue: &NewIssue) -> Value {
    let mut body = Map::new();
    body.insert("title".to_owned(), json!(issue.title));
    body.insert("description".to_owned(), json!(issue.body));
    if let Some(user) = &issue.assignee {
        body.insert("assignee_ids".to_owned(), json!([user.id]));
    }
    if let Some(milestone) = &issue.milestone {
        body.insert("milestone_id".to_owned(), json!(milestone.id));
    }
    if !issue.labels.is_empty() {
        body.insert("labels".to_owned(), json!(label_list(&issue.labels)));
    }
    Value::Object(body)
}

/// Only changed fields; cleared fields use `0`, `[]` or `""`.
fn update_payload(changes: &UpdateSet) -> Value {
    let mut body = Map::new();
    if let Change::Set(title) = &changes.title {
        body.insert("title".to_owned(), json!(title));
    }
    match &changes.body {
        Change::Set(text) => {
            body.insert("description".to_owned(), json!(text));
        }
        Change::Cleared => {
            body.insert("description".to_owned(), json!(""));
        }
        Change::Unchanged => {}
    }
    match &changes.assignee {
        Change::Set(user) => {
            body.insert("assignee_ids".to_owned(), json!([user.id]));
        }
        Change::Cleared => {
            body.insert("assignee_ids".to_owned(), json!([]));
        }
        Change::Unchanged => {}
    }
    match &changes.milestone {
        Change::Set(milestone) => {
            body.insert("milestone_id".to_owned(), json!(milestone.id));
        }
        Change::Cleared => {
            body.insert("milestone_id".to_owned(), json!(0));
        }
        Change::Unchanged => {}
    }
    match &changes.labels {
        Change::Set(labels) => {
            body.insert("labels".to_owned(), json!(label_list(labels)));
        }
        Change::Cleared => {
            body.insert("labels".to_owned(), json!(""));
        }
        Change::Unchanged => {}
    }
    Value::Object(body)
}

#[async_trait]
impl IssueService for GitLabService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::GitLab
    }

    async fn create(&self, issue: &NewIssue) -> Result<Issue, IssueError> {
        let created: ApiIssue = self
            .client
            .send(
                Method::POST,
                &self.project_target(),
                &self.project_path("/issues"),
                &create_payload(issue),
            )
            .await?;
        Issue::try_from(created)
    }

    async fn fetch(&self, number: IssueNumber) -> Result<Issue, IssueError> {
        let issue: ApiIssue = self
            .client
            .get(&number.to_string(), &self.issue_path(number, ""), &[])
            .await?;
        Issue::try_from(issue)
    }

    async fn update(
        &self,
        number: IssueNumber,
        changes: &UpdateSet,
    ) -> Result<Updated, IssueError> {
        debug!(issue = %number, fields = ?changes.changed_fields(), "updating GitLab issue");
        let issue = self.put_issue(number, &update_payload(changes)).await?;
        Ok(Updated::clean(issue))
    }

    async fn transition(
        &self,
        number: IssueNumber,
        target: TargetState,
    ) -> Result<Issue, IssueError> {
        let event = match target {
            TargetState::Open => "reopen",
            TargetState::Closed => "close",
        };
        self.put_issue(number, &json!({ "state_event": event })).await
    }

    async fn comment(&self, number: IssueNumber, body: &str) -> Result<Comment, IssueError> {
        let created: ApiNote = self
            .client
            .send(
                Method::POST,
                &number.to_string(),
                &self.issue_path(number, "/notes"),
                &json!({ "body": body }),
            )
            .await?;
        Ok(created.into_comment(number, &self.issue_url(number)))
    }

    async fn list_page(
        &self,
        filter: StateFilter,
        cursor: Option<PageCursor>,
    ) -> Result<IssuePage, IssueError> {
        let page = cursor.map_or_else(|| "1".to_owned(), |cursor| cursor.as_str().to_owned());
        let mut query = vec![
            ("scope", "all".to_owned()),
            ("per_page", PER_PAGE.to_owned()),
            ("page", page),
        ];
        if let Some(state) = state_param(&filter) {
            query.push(("state", state));
        }

        let (issues, headers): (Vec<ApiIssue>, _) = self
            .client
            .get_with_headers(&self.project_target(), &self.project_path("/issues"), &query)
            .await?;
        let items = issues
            .into_iter()
            .map(Issue::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let next = header_to_string(&headers, NEXT_PAGE_HEADER).map(PageCursor::new);
        Ok(IssuePage { items, next })
    }

    async fn comments(&self, number: IssueNumber) -> Result<Vec<Comment>, IssueError> {
        let query = [
            ("sort", "asc".to_owned()),
            ("order_by", "created_at".to_owned()),
        ];
        let notes: Vec<ApiNote> = self
            .all_pages(
                &number.to_string(),
                &self.issue_path(number, "/notes"),
                &query,
            )
            .await?;
        let issue_url = self.issue_url(number);
        Ok(notes
            .into_iter()
            .map(|note| note.into_comment(number, &issue_url))
            .collect())
    }

    async fn search_users(&self, term: &str) -> Result<Vec<User>, IssueError> {
        let users: Vec<ApiUser> = self
            .client
            .get(
                &format!("user {term}"),
                "/users",
                &[("search", term.to_owned())],
            )
            .await?;
        Ok(users.into_iter().map(User::from).collect())
    }

    async fn labels(&self) -> Result<Vec<Label>, IssueError> {
        let labels: Vec<ApiLabel> = self
            .all_pages(&self.project_target(), &self.project_path("/labels"), &[])
            .await?;
        Ok(labels.into_iter().map(Label::from).collect())
    }

    async fn milestones(&self) -> Result<Vec<Milestone>, IssueError> {
        let milestones: Vec<ApiMilestone> = self
            .all_pages(
                &self.project_target(),
                &self.project_path("/milestones"),
                &[],
            )
            .await?;
        Ok(milestones.into_iter().map(Milestone::from).collect())
    }

    async fn states(&self) -> Result<Vec<StateFilter>, IssueError> {
        Ok(vec![StateFilter::Open, StateFilter::Closed, StateFilter::All])
    }

    fn issue_url(&self, number: IssueNumber) -> String {
        format!("{}/-/issues/{}", self.web_url, number.get())
    }

    fn issues_url(&self) -> String {
        format!("{}/-/issues", self.web_url)
    }
}
