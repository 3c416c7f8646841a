//! Interactive message capture through the user's editor.

use std::process::Command;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use tracing::debug;

use crate::service::IssueError;

/// Scratch file name, created in the git directory.
pub const MESSAGE_FILE: &str = "ISSUEMSG";

const FALLBACK_EDITOR: &str = "vi";

/// Opens an editor seeded with text and returns what the user saved.
#[async_trait]
pub trait Editor: Send + Sync {
    /// Edits `seed` interactively.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Editor`] when the editor cannot be started or
    /// fails, and [`IssueError::Io`] when the scratch file cannot be used.
    async fn edit(&self, seed: &str) -> Result<String, IssueError>;
}

/// Picks the editor command: configured `core.editor`, then `$VISUAL`,
/// then `$EDITOR`, then `vi`.
#[must_use]
pub fn editor_command(
    configured: Option<&str>,
    lookup_env: impl Fn(&str) -> Option<String>,
) -> String {
    let usable = |command: &String| !command.trim().is_empty();
    configured
        .map(ToOwned::to_owned)
        .filter(usable)
        .or_else(|| lookup_env("VISUAL").filter(usable))
        .or_else(|| lookup_env("EDITOR").filter(usable))
        .unwrap_or_else(|| FALLBACK_EDITOR.to_owned())
}

/// Runs an external editor through `sh` on a scratch file.
#[derive(Debug, Clone)]
pub struct ExternalEditor {
    command: String,
    scratch_dir: Utf8PathBuf,
}

impl ExternalEditor {
    /// Creates an editor running `command` with the scratch file placed in
    /// `scratch_dir`.
    pub fn new(command: impl Into<String>, scratch_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            command: command.into(),
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Path of the scratch file.
    #[must_use]
    pub fn message_path(&self) -> Utf8PathBuf {
        self.scratch_dir.join(MESSAGE_FILE)
    }

    fn open_dir(&self) -> Result<Dir, IssueError> {
        Dir::open_ambient_dir(&self.scratch_dir, ambient_authority()).map_err(|error| {
            IssueError::Io {
                message: format!("failed to open '{}': {error}", self.scratch_dir),
            }
        })
    }

    fn run(&self, path: &Utf8Path) -> Result<(), IssueError> {
        debug!(command = %self.command, %path, "launching editor");
        let status = Command::new("sh")
            .arg("-c")
            .arg(format!("{} \"$1\"", self.command))
            .arg("sh")
            .arg(path.as_str())
            .status()
            .map_err(|error| IssueError::Editor {
                message: format!("failed to start '{}': {error}", self.command),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(IssueError::Editor {
                message: format!("'{}' exited with {status}", self.command),
            })
        }
    }

    /// Writes the seed, waits for the editor, and reads the result back.
    fn edit_blocking(&self, seed: &str) -> Result<String, IssueError> {
        let dir = self.open_dir()?;
        dir.write(MESSAGE_FILE, seed).map_err(|error| IssueError::Io {
            message: format!("failed to write {MESSAGE_FILE}: {error}"),
        })?;

        let outcome = self.run(&self.message_path()).and_then(|()| {
            dir.read_to_string(MESSAGE_FILE)
                .map_err(|error| IssueError::Io {
                    message: format!("failed to read {MESSAGE_FILE}: {error}"),
                })
        });

        if let Err(error) = dir.remove_file(MESSAGE_FILE) {
            debug!(%error, "could not remove scratch file");
        }
        outcome
    }
}

#[async_trait]
impl Editor for ExternalEditor {
    /// Runs the editor on the blocking pool.
    async fn edit(&self, seed: &str) -> Result<String, IssueError> {
        let editor = self.clone();
        let seed = seed.to_owned();
        tokio::task::spawn_blocking(move || editor.edit_blocking(&seed))
            .await
            .map_err(|error| IssueError::Editor {
                message: format!("editor task failed: {error}"),
            })?
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::{Editor, ExternalEditor, MESSAGE_FILE, editor_command};
    use crate::service::IssueError;

    struct ScratchDir {
        _temp: TempDir,
        path: Utf8PathBuf,
    }

    #[fixture]
    fn scratch() -> ScratchDir {
        let temp = TempDir::new().expect("temp dir should be created");
        let path = Utf8PathBuf::from_path_buf(temp.path().to_path_buf())
            .expect("temp dir should be UTF-8");
        ScratchDir { _temp: temp, path }
    }

    #[rstest]
    #[case::configured(Some("nano"), "nano")]
    #[case::visual(None, "code -w")]
    fn editor_command_prefers_configuration(
        #[case] configured: Option<&str>,
        #[case] expected: &str,
    ) {
        let command = editor_command(configured, |name| match name {
            "VISUAL" => Some("code -w".to_owned()),
            "EDITOR" => Some("emacs".to_owned()),
            _ => None,
        });
        assert_eq!(command, expected);
    }

    #[rstest]
    fn editor_command_falls_back_to_vi() {
        assert_eq!(editor_command(None, |_| None), "vi");
    }

    #[rstest]
    #[tokio::test]
    async fn edit_returns_saved_text_and_removes_scratch_file(scratch: ScratchDir) {
        let editor = ExternalEditor::new("printf 'Title\\n--\\nBody' >", scratch.path.clone());

        let text = editor.edit("seed").await.expect("editor should succeed");

        assert_eq!(text, "Title\n--\nBody");
        assert!(!scratch.path.join(MESSAGE_FILE).exists());
    }

    #[rstest]
    #[tokio::test]
    async fn edit_passes_seed_through_untouched_editor(scratch: ScratchDir) {
        let editor = ExternalEditor::new("true", scratch.path.clone());
        let text = editor.edit("keep me\n").await.expect("editor should succeed");
        assert_eq!(text, "keep me\n");
    }

    #[rstest]
    #[tokio::test]
    async fn failing_editor_is_reported(scratch: ScratchDir) {
        let editor = ExternalEditor::new("false", scratch.path.clone());
        let result = editor.edit("seed").await;
        assert!(
            matches!(result, Err(IssueError::Editor { .. })),
            "expected Editor error, got {result:?}"
        );
        assert!(!scratch.path.join(MESSAGE_FILE).exists());
    }

    #[rstest]
    #[tokio::test]
    async fn runtime_keeps_serving_tasks_while_editor_is_open(scratch: ScratchDir) {
        let editor = ExternalEditor::new("sleep 1; true", scratch.path.clone());

        let first = tokio::select! {
            biased;
            _ = editor.edit("seed") => "editor",
            () = tokio::time::sleep(Duration::from_millis(50)) => "timer",
        };

        assert_eq!(first, "timer");
    }
}
