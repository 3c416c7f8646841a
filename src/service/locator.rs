//! Service identity, repository location, and credentials.
//!
//! A [`RepositoryLocator`] is parsed from either the configured
//! `issue.<Service>.url` or the URL of a git remote. Adapters derive their
//! API base and web URLs from it without further network calls.

use std::fmt;

use url::Url;

use super::error::IssueError;

/// The tracker backends this crate can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// GitHub and GitHub Enterprise.
    GitHub,
    /// GitLab (hosted or self-managed).
    GitLab,
    /// Gogs and API-compatible forks.
    Gogs,
    /// JIRA Server, read-only apart from comments.
    Jira,
}

impl ServiceKind {
    /// Every supported service, in display order.
    pub const ALL: [Self; 4] = [Self::GitHub, Self::GitLab, Self::Gogs, Self::Jira];

    /// Parses a configured service name, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] for unknown names.
    pub fn parse(name: &str) -> Result<Self, IssueError> {
        let trimmed = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.config_name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| IssueError::configuration(format!("invalid issue service: {trimmed}")))
    }

    /// Canonical name used in `issue.<Service>.*` configuration keys.
    #[must_use]
    pub const fn config_name(self) -> &'static str {
        match self {
            Self::GitHub => "GitHub",
            Self::GitLab => "GitLab",
            Self::Gogs => "Gogs",
            Self::Jira => "JIRA",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.config_name())
    }
}

/// Access token wrapper enforcing presence.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Validates that the token is non-empty and trims whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Authentication`] when the supplied string is blank.
    pub fn new(token: impl AsRef<str>) -> Result<Self, IssueError> {
        let trimmed = token.as_ref().trim();
        if trimmed.is_empty() {
            return Err(IssueError::Authentication {
                message: "API token is empty".to_owned(),
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Borrow the token value.
    #[must_use]
    pub const fn value(&self) -> &str {
        self.0.as_str()
    }

    /// Splits a `user:token` credential for HTTP basic authentication.
    #[must_use]
    pub fn basic_credentials(&self) -> Option<(&str, &str)> {
        self.0
            .split_once(':')
            .filter(|(user, secret)| !user.is_empty() && !secret.is_empty())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("AccessToken(***)")
    }
}

impl AsRef<str> for AccessToken {
    fn as_ref(&self) -> &str {
        self.value()
    }
}

/// Repository host and path derived from a remote or configured URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLocator {
    scheme: String,
    host: String,
    port: Option<u16>,
    owner: String,
    name: String,
}

impl RepositoryLocator {
    /// Parses a repository URL in any of the forms git accepts for remotes:
    ///
    /// - SCP-style SSH: `git@host:owner/repo.git`
    /// - SSH with protocol: `ssh://git@host:22/owner/repo.git`
    /// - HTTP(S): `https://host/owner/repo(.git)`
    ///
    /// The owner may contain several path segments (GitLab subgroups). SSH
    /// forms map to `https`; ports are kept only for HTTP(S) URLs.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] if no host, owner, and
    /// repository can be extracted.
    pub fn parse(input: &str) -> Result<Self, IssueError> {
        let trimmed = input.trim();
        try_parse_scp_style(trimmed)
            .or_else(|| try_parse_url_style(trimmed))
            .ok_or_else(|| {
                IssueError::configuration(format!("could not parse repository URL: {input}"))
            })
    }

    /// Locates a project on a tracker server, such as a JIRA project key.
    ///
    /// Any path on `server_url` is kept as the server's context path and
    /// becomes the owner; the project key becomes the name.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] when the URL has no HTTP(S)
    /// host or the project key is blank.
    pub fn for_project(server_url: &str, project: &str) -> Result<Self, IssueError> {
        let invalid =
            || IssueError::configuration(format!("could not parse server URL: {server_url}"));
        let parsed = Url::parse(server_url.trim()).map_err(|_| invalid())?;
        let scheme = match parsed.scheme() {
            "http" => "http",
            "https" => "https",
            _ => return Err(invalid()),
        };
        let host = parsed.host_str().filter(|host| !host.is_empty()).ok_or_else(invalid)?;
        let project = project.trim();
        if project.is_empty() {
            return Err(IssueError::configuration("project key is empty"));
        }

        Ok(Self {
            scheme: scheme.to_owned(),
            host: host.trim_start_matches('[').trim_end_matches(']').to_owned(),
            port: parsed.port(),
            owner: parsed.path().trim_matches('/').to_owned(),
            name: project.to_owned(),
        })
    }

    /// Returns a copy of this locator using plain `http`.
    #[must_use]
    pub fn with_plain_http(mut self) -> Self {
        self.scheme = "http".to_owned();
        self
    }

    /// URL scheme (`https` or `http`).
    #[must_use]
    pub const fn scheme(&self) -> &str {
        self.scheme.as_str()
    }

    /// Repository host.
    #[must_use]
    pub const fn host(&self) -> &str {
        self.host.as_str()
    }

    /// Explicit port, if the URL carried one.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Repository owner or namespace.
    #[must_use]
    pub const fn owner(&self) -> &str {
        self.owner.as_str()
    }

    /// Repository name without a `.git` suffix.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// `owner/name` path, or the name alone when there is no owner.
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.owner.is_empty() {
            return self.name.clone();
        }
        format!("{}/{}", self.owner, self.name)
    }

    /// Web origin, e.g. `https://gitlab.example.com:8443`.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] when the host cannot form a URL.
    pub fn origin(&self) -> Result<Url, IssueError> {
        let authority = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let mut origin = Url::parse(&format!("{}://{authority}", self.scheme))
            .map_err(|error| IssueError::configuration(format!("invalid host: {error}")))?;
        origin
            .set_port(self.port)
            .map_err(|()| IssueError::configuration("invalid port"))?;
        Ok(origin)
    }

    /// Web URL of the repository itself.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] when the host cannot form a URL.
    pub fn web_url(&self) -> Result<String, IssueError> {
        let origin = self.origin()?;
        Ok(format!(
            "{}/{}",
            origin.as_str().trim_end_matches('/'),
            self.full_name()
        ))
    }
}

/// Attempts to parse SCP-style SSH URL: `git@host:owner/repo.git`.
fn try_parse_scp_style(url: &str) -> Option<RepositoryLocator> {
    let at_pos = url.find('@')?;
    let colon_pos = url.find(':')?;

    if colon_pos <= at_pos {
        return None;
    }

    if url.get(colon_pos..colon_pos.saturating_add(3)) == Some("://") {
        return None;
    }

    let host = url.get(at_pos.saturating_add(1)..colon_pos)?;
    let path = url.get(colon_pos.saturating_add(1)..)?;

    locator_from_path("https", host, None, path)
}

/// Attempts to parse URL-style remote: `https://host/owner/repo.git`.
fn try_parse_url_style(url: &str) -> Option<RepositoryLocator> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let (scheme, port) = match parsed.scheme() {
        "http" => ("http", parsed.port()),
        "https" => ("https", parsed.port()),
        _ => ("https", None),
    };
    let path = parsed.path().strip_prefix('/')?;

    locator_from_path(scheme, host, port, path)
}

fn locator_from_path(
    scheme: &str,
    host: &str,
    port: Option<u16>,
    raw_path: &str,
) -> Option<RepositoryLocator> {
    let trimmed_path = raw_path.trim_matches('/');
    let (owner, repo_with_suffix) = trimmed_path.rsplit_once('/')?;
    let name = repo_with_suffix
        .strip_suffix(".git")
        .unwrap_or(repo_with_suffix);

    if host.is_empty() || owner.is_empty() || name.is_empty() {
        return None;
    }
    if owner.split('/').any(str::is_empty) {
        return None;
    }

    Some(RepositoryLocator {
        scheme: scheme.to_owned(),
        host: host.trim_start_matches('[').trim_end_matches(']').to_owned(),
        port,
        owner: owner.to_owned(),
        name: name.to_owned(),
    })
}
