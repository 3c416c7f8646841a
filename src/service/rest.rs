//! Minimal JSON REST client shared by the GitLab, Gogs, and JIRA adapters.

use std::fmt;
use std::time::Duration;

use http::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::IssueError;
use super::error_mapping::{extract_message, map_http_error, map_reqwest_error};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const CLIENT_USER_AGENT: &str = concat!("git-issue/", env!("CARGO_PKG_VERSION"));

/// Credential sent with every request.
#[derive(Clone)]
enum Credential {
    Header(HeaderName, HeaderValue),
    Basic { user: String, secret: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header(name, _) => write!(formatter, "Header({name}: ***)"),
            Self::Basic { user, .. } => write!(formatter, "Basic({user}:***)"),
        }
    }
}

/// Authenticated client rooted at one API base URL.
#[derive(Debug, Clone)]
pub(super) struct RestClient {
    client: Client,
    api_base: String,
    credential: Credential,
}

impl RestClient {
    /// Builds a client sending `auth_header: auth_value` with every request.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Authentication`] when the credential is not a
    /// valid header value and [`IssueError::Configuration`] when the HTTP
    /// client cannot be built.
    pub(super) fn new(
        api_base: &str,
        auth_header: &'static str,
        auth_value: &str,
    ) -> Result<Self, IssueError> {
        let mut header_value =
            HeaderValue::from_str(auth_value).map_err(|_| IssueError::Authentication {
                message: "API token contains characters not allowed in a header".to_owned(),
            })?;
        header_value.set_sensitive(true);
        Self::with_credential(
            api_base,
            Credential::Header(HeaderName::from_static(auth_header), header_value),
        )
    }

    /// Builds a client using HTTP basic authentication.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] when the HTTP client cannot be
    /// built.
    pub(super) fn with_basic_auth(
        api_base: &str,
        user: &str,
        secret: &str,
    ) -> Result<Self, IssueError> {
        Self::with_credential(
            api_base,
            Credential::Basic {
                user: user.to_owned(),
                secret: secret.to_owned(),
            },
        )
    }

    fn with_credential(api_base: &str, credential: Credential) -> Result<Self, IssueError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|error| {
                IssueError::configuration(format!("failed to configure HTTP client: {error}"))
            })?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_owned(),
            credential,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let endpoint = format!("{}{path}", self.api_base);
        debug!(%method, %endpoint, "sending request");
        let request = self
            .client
            .request(method, endpoint)
            .header(USER_AGENT, CLIENT_USER_AGENT);
        match &self.credential {
            Credential::Header(name, value) => request.header(name.clone(), value.clone()),
            Credential::Basic { user, secret } => request.basic_auth(user, Some(secret)),
        }
    }

    /// `GET` returning the decoded body.
    pub(super) async fn get<T: DeserializeOwned>(
        &self,
        target: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, IssueError> {
        let (body, _) = self.get_with_headers(target, path, query).await?;
        Ok(body)
    }

    /// `GET` returning the decoded body and the response headers, for
    /// header-driven pagination.
    pub(super) async fn get_with_headers<T: DeserializeOwned>(
        &self,
        target: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<(T, HeaderMap), IssueError> {
        let response = execute(target, self.request(Method::GET, path).query(query)).await?;
        let headers = response.headers().clone();
        let body = response
            .json::<T>()
            .await
            .map_err(|error| map_reqwest_error(target, &error))?;
        Ok((body, headers))
    }

    /// Sends `body` as JSON with `method` and decodes the response.
    pub(super) async fn send<B, T>(
        &self,
        method: Method,
        target: &str,
        path: &str,
        body: &B,
    ) -> Result<T, IssueError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let response = execute(target, self.request(method, path).json(body)).await?;
        response
            .json::<T>()
            .await
            .map_err(|error| map_reqwest_error(target, &error))
    }

    /// `DELETE` with no request body.
    pub(super) async fn delete(&self, target: &str, path: &str) -> Result<(), IssueError> {
        execute(target, self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}

/// Sends the request and classifies any non-2xx status.
async fn execute(target: &str, request: RequestBuilder) -> Result<Response, IssueError> {
    let response = request
        .send()
        .await
        .map_err(|error| map_reqwest_error(target, &error))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .ok()
        .and_then(|body| extract_message(&body));
    Err(map_http_error(target, status, message))
}

/// Reads a header as a string.
pub(super) fn header_to_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|raw| raw.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}
