//! Configuration resolved from git configuration, environment, and CLI.
//!
//! # Precedence
//!
//! Values are merged with ortho-config's layered approach, lowest to
//! highest:
//!
//! 1. **Defaults** – remote `origin`, HTTPS enabled
//! 2. **Git configuration** – `issue.service`, `issue.<Service>.url`,
//!    `issue.<Service>.token`, `issue.<Service>.remote`,
//!    `issue.<Service>.https`, `issue.JIRA.key`, and `core.editor`
//! 3. **Environment variables** – `GIT_ISSUE_SERVICE`, `GIT_ISSUE_URL`,
//!    `GIT_ISSUE_TOKEN`, `GIT_ISSUE_REMOTE`, `GIT_ISSUE_KEY`,
//!    `GIT_ISSUE_EDITOR`
//! 4. **Command-line arguments** – `--service` and `--remote`
//!
//! Per-service keys are read for the service chosen across all layers, so
//! `--service GitLab` picks up `issue.GitLab.token`.
//!
//! # Git configuration
//!
//! ```text
//! [issue]
//!     service = GitHub
//! [issue "GitHub"]
//!     token = !pass show github/token
//! ```

mod store;

pub use store::{ConfigStore, GitConfigStore, GitRepository, lookup};

use ortho_config::{MergeComposer, OrthoConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::service::{AccessToken, IssueError, RepositoryLocator, ServiceKind, ServiceSettings};

/// Default remote consulted for the repository URL.
pub const DEFAULT_REMOTE: &str = "origin";

const ENV_PREFIX: &str = "GIT_ISSUE_";

/// Merged configuration before it is validated into [`ServiceSettings`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(prefix = "GIT_ISSUE")]
pub struct IssueConfig {
    /// Tracker backend (`GitHub`, `GitLab`, `Gogs`, or `JIRA`).
    ///
    /// Can be provided via:
    /// - CLI: `--service <NAME>`
    /// - Environment: `GIT_ISSUE_SERVICE`
    /// - Git configuration: `issue.service`
    #[ortho_config()]
    pub service: Option<String>,

    /// Repository URL overriding the remote's URL.
    #[ortho_config()]
    pub url: Option<String>,

    /// API token; GitHub also accepts `user:token`.
    #[ortho_config()]
    pub token: Option<String>,

    /// Remote whose URL locates the repository.
    #[ortho_config()]
    pub remote: String,

    /// Use HTTPS for API and web URLs; `issue.<Service>.https = false`
    /// selects plain HTTP.
    #[ortho_config()]
    pub https: bool,

    /// JIRA project key; `url` is then the JIRA server.
    #[ortho_config()]
    pub key: Option<String>,

    /// Editor command for interactive messages.
    #[ortho_config()]
    pub editor: Option<String>,
}

impl Default for IssueConfig {
    fn default() -> Self {
        Self {
            service: None,
            url: None,
            token: None,
            remote: DEFAULT_REMOTE.to_owned(),
            https: true,
            key: None,
            editor: None,
        }
    }
}

/// Values given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    /// `--service`.
    pub service: Option<String>,
    /// `--remote`.
    pub remote: Option<String>,
}

impl IssueConfig {
    /// Merges every configuration layer.
    ///
    /// `lookup_env` is consulted for `GIT_ISSUE_*` variables.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] when the store or a `!` command
    /// fails, or the layers cannot be merged.
    pub fn load(
        store: &dyn ConfigStore,
        lookup_env: &dyn Fn(&str) -> Option<String>,
        cli: &CliOverrides,
    ) -> Result<Self, IssueError> {
        let environment = environment_layer(lookup_env);
        let service = cli
            .service
            .clone()
            .or_else(|| string_field(&environment, "service"))
            .map_or_else(|| lookup(store, "issue.service"), |name| Ok(Some(name)))?;

        let mut composer = MergeComposer::new();
        composer.push_defaults(to_layer(&Self::default())?);
        composer.push_file(git_layer(store, service.as_deref())?, None);
        composer.push_environment(Value::Object(environment));
        composer.push_cli(cli_layer(cli));

        Self::merge_from_layers(composer.layers())
            .map_err(|error| IssueError::configuration(error.to_string()))
    }

    /// Validates the merged configuration into adapter settings.
    ///
    /// `remote_url` returns the URL of the named git remote. It is only
    /// consulted when no `url` is configured.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] when the service or repository
    /// URL is missing or invalid and [`IssueError::Authentication`] when no
    /// token is configured.
    pub fn resolve(
        &self,
        remote_url: impl FnOnce(&str) -> Result<Option<String>, IssueError>,
    ) -> Result<ServiceSettings, IssueError> {
        let Some(service_name) = self.service.as_deref() else {
            return Err(IssueError::configuration(
                "no issue service configured (set issue.service)",
            ));
        };
        let kind = ServiceKind::parse(service_name)?;

        let repository_url = match self.url.clone() {
            Some(url) => url,
            None => remote_url(&self.remote)?.ok_or_else(|| {
                IssueError::configuration(format!(
                    "remote '{}' has no URL (set issue.{kind}.url)",
                    self.remote
                ))
            })?,
        };
        let parsed = match kind {
            ServiceKind::Jira => {
                let Some(key) = self.key.as_deref() else {
                    return Err(IssueError::configuration(
                        "no JIRA project key configured (set issue.JIRA.key)",
                    ));
                };
                RepositoryLocator::for_project(&repository_url, key)?
            }
            ServiceKind::GitHub | ServiceKind::GitLab | ServiceKind::Gogs => {
                RepositoryLocator::parse(&repository_url)?
            }
        };
        let locator = if self.https {
            parsed
        } else {
            parsed.with_plain_http()
        };

        let token = match self.token.as_deref() {
            Some(token) => AccessToken::new(token)?,
            None => {
                return Err(IssueError::Authentication {
                    message: format!("no API token configured (set issue.{kind}.token)"),
                });
            }
        };

        debug!(service = %kind, repository = %locator.full_name(), "configuration resolved");
        Ok(ServiceSettings {
            kind,
            locator,
            token,
        })
    }
}

fn to_layer(config: &IssueConfig) -> Result<Value, IssueError> {
    serde_json::to_value(config)
        .map_err(|error| IssueError::configuration(format!("invalid defaults: {error}")))
}

fn string_field(layer: &Map<String, Value>, key: &str) -> Option<String> {
    layer.get(key).and_then(Value::as_str).map(ToOwned::to_owned)
}

fn environment_layer(lookup_env: &dyn Fn(&str) -> Option<String>) -> Map<String, Value> {
    ["service", "url", "token", "remote", "key", "editor"]
        .into_iter()
        .filter_map(|field| {
            let variable = format!("{ENV_PREFIX}{}", field.to_uppercase());
            lookup_env(&variable).map(|value| (field.to_owned(), Value::String(value)))
        })
        .collect()
}

fn git_layer(store: &dyn ConfigStore, service: Option<&str>) -> Result<Value, IssueError> {
    let mut layer = Map::new();
    if let Some(name) = service {
        layer.insert("service".to_owned(), Value::String(name.to_owned()));

        // Per-service keys use the canonical spelling, whatever case the
        // service was given in.
        let section = ServiceKind::parse(name).map_or_else(|_| name.to_owned(), |kind| {
            kind.config_name().to_owned()
        });
        for field in ["url", "token", "remote", "key"] {
            if let Some(value) = lookup(store, &format!("issue.{section}.{field}"))? {
                layer.insert(field.to_owned(), Value::String(value));
            }
        }
        if let Some(value) = lookup(store, &format!("issue.{section}.https"))? {
            layer.insert("https".to_owned(), Value::Bool(parse_git_bool(&value)));
        }
    }
    if let Some(editor) = lookup(store, "core.editor")? {
        layer.insert("editor".to_owned(), Value::String(editor));
    }
    Ok(Value::Object(layer))
}

fn cli_layer(cli: &CliOverrides) -> Value {
    let mut layer = Map::new();
    if let Some(service) = &cli.service {
        layer.insert("service".to_owned(), Value::String(service.clone()));
    }
    if let Some(remote) = &cli.remote {
        layer.insert("remote".to_owned(), Value::String(remote.clone()));
    }
    Value::Object(layer)
}

/// Interprets a git boolean; only the explicit false spellings disable.
fn parse_git_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
