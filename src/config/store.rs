//! Key/value configuration backed by git configuration.
//!
//! Values beginning with `!` are shell commands; their trimmed standard
//! output is used as the value.

use std::path::Path;
use std::process::Command;

use camino::Utf8PathBuf;
use git2::{Config, ErrorCode, Repository};
use tracing::debug;

use crate::service::IssueError;

/// Read-only key/value store queried for `issue.*` settings.
pub trait ConfigStore {
    /// Raw value of `key`, or `None` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] when the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, IssueError>;
}

/// Reads `key` from `store`, running `!`-prefixed values as commands.
///
/// # Errors
///
/// Returns [`IssueError::Configuration`] when the store fails or a command
/// cannot be run or exits unsuccessfully.
pub fn lookup(store: &dyn ConfigStore, key: &str) -> Result<Option<String>, IssueError> {
    match store.get(key)? {
        Some(raw) => match raw.strip_prefix('!') {
            Some(command) => run_config_command(key, command).map(Some),
            None => Ok(Some(raw)),
        },
        None => Ok(None),
    }
}

fn run_config_command(key: &str, command: &str) -> Result<String, IssueError> {
    debug!(%key, "running configuration command");
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .output()
        .map_err(|error| {
            IssueError::configuration(format!("failed to run command for {key}: {error}"))
        })?;

    if !output.status.success() {
        return Err(IssueError::configuration(format!(
            "command for {key} exited with {}",
            output.status
        )));
    }

    let stdout = String::from_utf8(output.stdout).map_err(|_| {
        IssueError::configuration(format!("command for {key} printed invalid UTF-8"))
    })?;
    Ok(stdout.trim().to_owned())
}

/// Snapshot of the effective git configuration for a repository.
pub struct GitConfigStore {
    config: Config,
}

impl GitConfigStore {
    /// Wraps a configuration, taking a snapshot so reads are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] when the snapshot fails.
    pub fn new(mut config: Config) -> Result<Self, IssueError> {
        let snapshot = config.snapshot().map_err(git_error)?;
        Ok(Self { config: snapshot })
    }
}

impl ConfigStore for GitConfigStore {
    fn get(&self, key: &str) -> Result<Option<String>, IssueError> {
        match self.config.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(error) if error.code() == ErrorCode::NotFound => Ok(None),
            Err(error) => Err(git_error(error)),
        }
    }
}

/// The git repository the command runs in.
pub struct GitRepository {
    repository: Repository,
}

impl GitRepository {
    /// Searches upward from `start_path` for a repository.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] outside a repository.
    pub fn discover(start_path: &Path) -> Result<Self, IssueError> {
        let repository = Repository::discover(start_path).map_err(|error| {
            if error.code() == ErrorCode::NotFound {
                IssueError::configuration("not inside a Git repository")
            } else {
                git_error(error)
            }
        })?;
        Ok(Self { repository })
    }

    /// Effective configuration (system, global, and repository levels).
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] when git configuration cannot
    /// be read.
    pub fn config_store(&self) -> Result<GitConfigStore, IssueError> {
        GitConfigStore::new(self.repository.config().map_err(git_error)?)
    }

    /// URL of the named remote, or `None` when the remote has none.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] when the remote does not exist.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, IssueError> {
        let remote = self.repository.find_remote(name).map_err(|error| {
            if error.code() == ErrorCode::NotFound {
                IssueError::configuration(format!("remote '{name}' not found"))
            } else {
                git_error(error)
            }
        })?;
        Ok(remote.url().map(ToOwned::to_owned))
    }

    /// The `.git` directory, where the editor scratch file lives.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Configuration`] when the path is not UTF-8.
    pub fn git_dir(&self) -> Result<Utf8PathBuf, IssueError> {
        Utf8PathBuf::from_path_buf(self.repository.path().to_path_buf())
            .map_err(|path| {
                IssueError::configuration(format!(
                    "git directory is not valid UTF-8: {}",
                    path.display()
                ))
            })
    }
}

fn git_error(error: git2::Error) -> IssueError {
    IssueError::configuration(format!("git error: {}", error.message()))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rstest::rstest;
    use tempfile::TempDir;

    use super::{ConfigStore, GitRepository, lookup};
    use crate::service::IssueError;

    struct Fixed(BTreeMap<&'static str, &'static str>);

    impl ConfigStore for Fixed {
        fn get(&self, key: &str) -> Result<Option<String>, IssueError> {
            Ok(self.0.get(key).map(|value| (*value).to_owned()))
        }
    }

    #[rstest]
    #[case::plain("issue.GitHub.token", Some("ghp_plain"))]
    #[case::command("issue.GitLab.token", Some("from-command"))]
    #[case::missing("issue.Gogs.token", None)]
    fn lookup_expands_commands(#[case] key: &str, #[case] expected: Option<&str>) {
        let store = Fixed(BTreeMap::from([
            ("issue.GitHub.token", "ghp_plain"),
            ("issue.GitLab.token", "!printf '  from-command\\n'"),
        ]));

        let value = lookup(&store, key).expect("lookup should succeed");

        assert_eq!(value.as_deref(), expected);
    }

    #[rstest]
    fn failing_command_is_a_configuration_error() {
        let store = Fixed(BTreeMap::from([("issue.GitHub.token", "!exit 3")]));
        let result = lookup(&store, "issue.GitHub.token");
        assert!(
            matches!(result, Err(IssueError::Configuration { .. })),
            "expected Configuration error, got {result:?}"
        );
    }

    #[rstest]
    fn repository_reads_config_and_remotes() {
        let temp = TempDir::new().expect("temp dir");
        let repository = git2::Repository::init(temp.path()).expect("init repository");
        repository
            .remote("origin", "git@github.com:octo/repo.git")
            .expect("add remote");
        let mut config = repository.config().expect("repository config");
        config
            .set_str("issue.service", "GitHub")
            .expect("write config");

        let discovered = GitRepository::discover(temp.path()).expect("discover repository");
        let store = discovered.config_store().expect("config store");

        assert_eq!(
            store.get("issue.service").expect("read config").as_deref(),
            Some("GitHub")
        );
        assert_eq!(store.get("issue.GitHub.url").expect("read config"), None);
        assert_eq!(
            discovered.remote_url("origin").expect("origin").as_deref(),
            Some("git@github.com:octo/repo.git")
        );
        assert!(discovered.remote_url("upstream").is_err());
        assert!(discovered.git_dir().expect("git dir").ends_with(".git"));
    }
}
