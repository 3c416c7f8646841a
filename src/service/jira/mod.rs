//! JIRA adapter over the REST v2 API.
//!
//! Issues are addressed as `<KEY>-<n>` within the project named by
//! `issue.JIRA.key`, so the neutral issue number is the key's numeric part.
//! Components stand in for labels and fix versions for milestones. Apart
//! from comments the adapter is read-only: creating, editing, closing, and
//! reopening fail with [`IssueError::Validation`] before any request.

mod models;

use async_trait::async_trait;
use http::Method;
use serde_json::json;
use tracing::debug;

use super::error::IssueError;
use super::model::{
    Comment, Issue, IssueNumber, IssuePage, IssueState, Label, Milestone, NewIssue, PageCursor,
    StateFilter, TargetState, Updated, User, merge_chronologically,
};
use super::rest::RestClient;
use super::{IssueService, ServiceKind, ServiceSettings};
use crate::reconcile::UpdateSet;

use models::{ApiComment, ApiComponent, ApiIssue, ApiSearch, ApiStatus, ApiUser, ApiVersion};

/// Fields requested for every issue.
const ISSUE_FIELDS: &str =
    "assignee,comment,created,description,components,reporter,status,summary,updated,fixVersions";

/// JIRA issue service.
pub struct JiraService {
    client: RestClient,
    project: String,
    web_base: String,
}

impl JiraService {
    /// Builds a client for the configured project.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Authentication`] unless the token has the
    /// `user:token` form and [`IssueError::Configuration`] when the server
    /// cannot form a URL.
    pub fn new(settings: &ServiceSettings) -> Result<Self, IssueError> {
        let Some((user, secret)) = settings.token.basic_credentials() else {
            return Err(IssueError::Authentication {
                message: "JIRA needs issue.JIRA.token in the form user:token".to_owned(),
            });
        };
        let locator = &settings.locator;
        let origin = locator.origin()?;
        let web_base = match locator.owner() {
            "" => origin.as_str().trim_end_matches('/').to_owned(),
            context => format!("{}/{context}", origin.as_str().trim_end_matches('/')),
        };
        let client = RestClient::with_basic_auth(&format!("{web_base}/rest/api/2"), user, secret)?;
        Ok(Self {
            client,
            project: locator.name().to_owned(),
            web_base,
        })
    }

    fn issue_key(&self, number: IssueNumber) -> String {
        format!("{}-{}", self.project, number.get())
    }

    fn project_target(&self) -> String {
        format!("project {}", self.project)
    }

    fn convert(&self, issue: ApiIssue) -> Result<Issue, IssueError> {
        let url = format!("{}/browse/{}", self.web_base, issue.key);
        issue.into_issue(url)
    }

    async fn fetch_raw(&self, number: IssueNumber) -> Result<ApiIssue, IssueError> {
        let key = self.issue_key(number);
        self.client
            .get(
                &key,
                &format!("/issue/{key}"),
                &[
                    ("fields", ISSUE_FIELDS.to_owned()),
                    ("expand", "changelog".to_owned()),
                ],
            )
            .await
    }

    fn read_only(&self, operation: &str) -> IssueError {
        IssueError::validation(format!(
            "{operation} is not supported for JIRA project {}",
            self.project
        ))
    }
}

/// JQL selecting the project's issues in `filter`.
fn search_jql(project: &str, filter: &StateFilter) -> String {
    let scope = format!("project = \"{project}\"");
    match filter {
        StateFilter::Open => format!("{scope} AND statusCategory != Done"),
        StateFilter::Closed => format!("{scope} AND statusCategory = Done"),
        StateFilter::All => scope,
        StateFilter::Other(status) => {
            format!("{scope} AND status = \"{}\"", status.replace('"', "\\\""))
        }
    }
}

#[async_trait]
impl IssueService for JiraService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Jira
    }

    async fn create(&self, _issue: &NewIssue) -> Result<Issue, IssueError> {
        Err(self.read_only("creating issues"))
    }

    async fn fetch(&self, number: IssueNumber) -> Result<Issue, IssueError> {
        let issue = self.fetch_raw(number).await?;
        self.convert(issue)
    }

    async fn update(
        &self,
        _number: IssueNumber,
        _changes: &UpdateSet,
    ) -> Result<Updated, IssueError> {
        Err(self.read_only("editing issues"))
    }

    async fn transition(
        &self,
        _number: IssueNumber,
        target: TargetState,
    ) -> Result<Issue, IssueError> {
        Err(self.read_only(transition_name(target)))
    }

    /// Refuses before posting any closing comment.
    async fn set_state(
        &self,
        _number: IssueNumber,
        target: TargetState,
        _closing_message: Option<String>,
    ) -> Result<Issue, IssueError> {
        Err(self.read_only(transition_name(target)))
    }

    async fn comment(&self, number: IssueNumber, body: &str) -> Result<Comment, IssueError> {
        let key = self.issue_key(number);
        let created: ApiComment = self
            .client
            .send(
                Method::POST,
                &key,
                &format!("/issue/{key}/comment"),
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
        let start_at = cursor.map_or_else(
            || "0".to_owned(),
            |position| position.as_str().to_owned(),
        );
        let search: ApiSearch = self
            .client
            .get(
                &self.project_target(),
                "/search",
                &[
                    ("jql", search_jql(&self.project, &filter)),
                    ("startAt", start_at),
                    ("fields", ISSUE_FIELDS.to_owned()),
                ],
            )
            .await?;

        let next = search
            .next_start()
            .map(|start| PageCursor::new(start.to_string()));
        let items = search
            .issues
            .into_iter()
            .map(|issue| self.convert(issue))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(IssuePage { items, next })
    }

    /// Comments from the issue payload merged with its changelog.
    async fn comments(&self, number: IssueNumber) -> Result<Vec<Comment>, IssueError> {
        let issue = self.fetch_raw(number).await?;
        let issue_url = self.issue_url(number);
        let notes = issue
            .fields
            .comment
            .comments
            .into_iter()
            .map(|comment| comment.into_comment(number, &issue_url))
            .collect();
        let events = issue
            .changelog
            .map(|changelog| changelog.histories)
            .unwrap_or_default()
            .into_iter()
            .map(|history| history.into_event(number))
            .filter(|event| !event.body.is_empty())
            .collect();
        Ok(merge_chronologically(notes, events))
    }

    async fn search_users(&self, term: &str) -> Result<Vec<User>, IssueError> {
        let found: Vec<ApiUser> = self
            .client
            .get(
                &format!("user {term}"),
                "/user/search",
                &[("username", term.to_owned())],
            )
            .await?;
        Ok(found.into_iter().map(User::from).collect())
    }

    async fn labels(&self) -> Result<Vec<Label>, IssueError> {
        #[derive(serde::Deserialize)]
        struct ApiProject {
            #[serde(default)]
            components: Vec<ApiComponent>,
        }

        let project: ApiProject = self
            .client
            .get(
                &self.project_target(),
                &format!("/project/{}", self.project),
                &[],
            )
            .await?;
        Ok(project.components.into_iter().map(Label::from).collect())
    }

    async fn milestones(&self) -> Result<Vec<Milestone>, IssueError> {
        let versions: Vec<ApiVersion> = self
            .client
            .get(
                &self.project_target(),
                &format!("/project/{}/versions", self.project),
                &[],
            )
            .await?;
        Ok(versions.into_iter().map(Milestone::from).collect())
    }

    /// `open`, `closed`, and `all`, then every other workflow status name.
    async fn states(&self) -> Result<Vec<StateFilter>, IssueError> {
        let statuses: Vec<ApiStatus> = self
            .client
            .get(&self.project_target(), "/status", &[])
            .await?;
        debug!(count = statuses.len(), "JIRA statuses");
        let mut states = vec![StateFilter::Open, StateFilter::Closed, StateFilter::All];
        for status in statuses {
            if let IssueState::Other(name) = status.state() {
                let filter = StateFilter::Other(name);
                if !states.contains(&filter) {
                    states.push(filter);
                }
            }
        }
        Ok(states)
    }

    fn issue_url(&self, number: IssueNumber) -> String {
        format!("{}/browse/{}", self.web_base, self.issue_key(number))
    }

    fn issues_url(&self) -> String {
        format!("{}/browse/{}", self.web_base, self.project)
    }
}

const fn transition_name(target: TargetState) -> &'static str {
    match target {
        TargetState::Open => "reopening issues",
        TargetState::Closed => "closing issues",
    }
}
