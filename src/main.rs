//! git-issue command-line entry point.

mod cli;

use std::env;
use std::io::{self, IsTerminal, Write};
use std::process::ExitCode;

use clap::Parser;
use git_issue::config::{CliOverrides, GitRepository, IssueConfig};
use git_issue::editor::{ExternalEditor, editor_command};
use git_issue::executor::{Command, Executor};
use git_issue::service::{IssueError, ServiceKind, ServiceSettings, connect};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::output::{Pager, TerminalSink, io_error, open_in_browser};
use crate::cli::{Cli, is_paged};

const EXIT_INTERRUPTED: u8 = 130;

/// An error with an optional hint for the user.
struct Failure {
    error: IssueError,
    hint: Option<String>,
}

impl Failure {
    fn for_service(error: IssueError, kind: ServiceKind) -> Self {
        let hint = matches!(error.root(), IssueError::Authentication { .. }).then(|| {
            let section = kind.config_name();
            format!(
                "check issue.{section}.token, issue.{section}.url, \
                 issue.{section}.remote and issue.{section}.https"
            )
        });
        Self { error, hint }
    }
}

impl From<IssueError> for Failure {
    fn from(error: IssueError) -> Self {
        Self { error, hint: None }
    }
}

/// Everything read from the repository before the command starts.
struct Session {
    settings: ServiceSettings,
    editor: ExternalEditor,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tokio::select! {
        biased;
        Ok(()) = tokio::signal::ctrl_c() => {
            debug!("interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        result = run(cli) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(failure) => report(&failure),
        },
    }
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), Failure> {
    let overrides = cli.overrides();
    let session = tokio::task::spawn_blocking(move || open_session(&overrides))
        .await
        .map_err(|error| {
            IssueError::configuration(format!("configuration task failed: {error}"))
        })?;
    let Session { settings, editor } = session?;
    let service = connect(&settings)?;

    let command = Command::from(cli.command);
    let mut pager = (is_paged(&command) && io::stdout().is_terminal())
        .then(Pager::spawn)
        .flatten();
    let out: Box<dyn Write + Send> = match pager.as_mut().and_then(Pager::input) {
        Some(pipe) => Box::new(pipe),
        None => Box::new(io::stdout()),
    };
    let mut sink = TerminalSink::new(out, io::stderr(), open_in_browser);

    let outcome = Executor::new(service.as_ref(), &editor, &mut sink)
        .run(command)
        .await
        .into_result()
        .map_err(|error| Failure::for_service(error, settings.kind));
    drop(sink);

    if let Some(pager) = pager {
        tokio::task::spawn_blocking(move || pager.wait())
            .await
            .map_err(|error| IssueError::Io {
                message: format!("pager task failed: {error}"),
            })??;
    }
    outcome
}

/// Reads git configuration, which may run `!` commands.
fn open_session(overrides: &CliOverrides) -> Result<Session, IssueError> {
    let lookup_env = |name: &str| env::var(name).ok();

    let cwd = env::current_dir().map_err(|error| io_error(&error))?;
    let repository = GitRepository::discover(&cwd)?;
    let store = repository.config_store()?;
    let config = IssueConfig::load(&store, &lookup_env, overrides)?;
    let settings = config.resolve(|remote| repository.remote_url(remote))?;
    let editor = ExternalEditor::new(
        editor_command(config.editor.as_deref(), lookup_env),
        repository.git_dir()?,
    );
    Ok(Session { settings, editor })
}

fn report(failure: &Failure) -> ExitCode {
    let mut stderr = io::stderr().lock();
    if writeln!(stderr, "error: {}", failure.error).is_err() {
        return ExitCode::FAILURE;
    }
    if let Some(hint) = &failure.hint
        && writeln!(stderr, "hint: {hint}").is_err()
    {
        return ExitCode::FAILURE;
    }
    ExitCode::FAILURE
}
