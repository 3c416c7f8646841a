//! Terminal presentation of render records.

use std::io::{self, Write};
use std::process::{Child, ChildStdin, Command, Stdio};

use chrono::{DateTime, Utc};
use git_issue::render::{RenderRecord, RenderSink};
use git_issue::service::{Comment, CommentKind, Issue, IssueError, Label};
use tracing::debug;

const INDENT: &str = "    ";

const PAGER: &str = "less";
const PAGER_ARGS: [&str; 4] = ["-F", "-R", "-X", "-K"];

/// Launches a browser on a URL.
pub type BrowserLauncher = fn(&str) -> Result<(), IssueError>;

/// Writes records as text: results to `out`, warnings to `err`.
pub struct TerminalSink<O, E> {
    out: O,
    err: E,
    browser: BrowserLauncher,
}

impl<O: Write + Send, E: Write + Send> TerminalSink<O, E> {
    /// Creates a sink writing to `out` and `err` and opening URLs with
    /// `browser`.
    pub const fn new(out: O, err: E, browser: BrowserLauncher) -> Self {
        Self { out, err, browser }
    }

    fn write_issue_detail(&mut self, issue: &Issue, summary: bool) -> io::Result<()> {
        let out = &mut self.out;
        writeln!(out, "issue {} [{}]: {}", issue.number, issue.state, issue.title)?;
        if let Some(author) = &issue.author {
            writeln!(out, "Author:    {author}")?;
        }
        if let Some(assignee) = &issue.assignee {
            writeln!(out, "Assignee:  {assignee}")?;
        }
        if let Some(milestone) = &issue.milestone {
            writeln!(out, "Milestone: {}", milestone.title)?;
        }
        if !issue.labels.is_empty() {
            writeln!(out, "Labels:    {}", label_list(&issue.labels))?;
        }
        if let Some(created_at) = issue.created_at {
            writeln!(out, "Date:      {}", timestamp(created_at))?;
        }
        writeln!(out, "URL:       {}", issue.url)?;

        if summary {
            return writeln!(out, "Comments:  {}", issue.comment_count);
        }
        if !issue.body.is_empty() {
            writeln!(out)?;
            write_indented(out, &issue.body)?;
        }
        Ok(())
    }

    fn write_comment(&mut self, comment: &Comment) -> io::Result<()> {
        let author = comment
            .author
            .as_ref()
            .map_or_else(|| "someone".to_owned(), |user| user.username.clone());
        let date = comment
            .created_at
            .map(|created_at| format!(" on {}", timestamp(created_at)))
            .unwrap_or_default();

        match comment.kind {
            CommentKind::Event => writeln!(self.out, "* {} (by {author}{date})", comment.body),
            CommentKind::Note => {
                writeln!(self.out)?;
                writeln!(self.out, "{author} commented{date}:")?;
                write_indented(&mut self.out, &comment.body)
            }
        }
    }

    fn write_record(&mut self, record: RenderRecord) -> io::Result<()> {
        match record {
            RenderRecord::Outcome {
                action,
                number,
                url,
            } => writeln!(self.out, "Issue {number} {}: {url}", action.verb()),
            RenderRecord::ListItem { issue, oneline } => {
                writeln!(self.out, "{}", list_line(&issue, oneline))
            }
            RenderRecord::IssueDetail { issue, summary } => {
                self.write_issue_detail(&issue, summary)
            }
            RenderRecord::Comment(comment) => self.write_comment(&comment),
            RenderRecord::Url(url) | RenderRecord::Completion(url) => {
                writeln!(self.out, "{url}")
            }
            RenderRecord::Warning(limitation) => writeln!(self.err, "warning: {limitation}"),
            RenderRecord::Browse(url) => {
                debug!(%url, "opening browser");
                (self.browser)(&url).map_err(io::Error::other)
            }
        }
    }
}

impl<O: Write + Send, E: Write + Send> RenderSink for TerminalSink<O, E> {
    /// A reader that went away early (a closed pager) is not an error.
    fn emit(&mut self, record: RenderRecord) -> Result<(), IssueError> {
        match self.write_record(record) {
            Err(error) if error.kind() == io::ErrorKind::BrokenPipe => {
                debug!("output closed by reader");
                Ok(())
            }
            other => other.map_err(|error| io_error(&error)),
        }
    }
}

/// `less -F -R -X -K` reading what the command prints.
pub struct Pager {
    child: Child,
}

impl Pager {
    /// Starts the pager, or returns `None` when it is not installed.
    #[must_use]
    pub fn spawn() -> Option<Self> {
        Self::spawn_program(PAGER, &PAGER_ARGS)
    }

    fn spawn_program(program: &str, args: &[&str]) -> Option<Self> {
        match Command::new(program).args(args).stdin(Stdio::piped()).spawn() {
            Ok(child) => Some(Self { child }),
            Err(error) => {
                debug!(%error, program, "pager unavailable");
                None
            }
        }
    }

    /// Takes the pipe into the pager; closing it ends the pager's input.
    pub const fn input(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    /// Waits until the user leaves the pager.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Io`] when the pager cannot be waited on.
    pub fn wait(mut self) -> Result<(), IssueError> {
        let status = self.child.wait().map_err(|error| io_error(&error))?;
        debug!(%status, "pager exited");
        Ok(())
    }
}

fn list_line(issue: &Issue, oneline: bool) -> String {
    if oneline {
        return format!("{} {}", issue.number, issue.title);
    }
    let mut line = format!("{} [{}] {}", issue.number, issue.state, issue.title);
    if !issue.labels.is_empty() {
        line.push_str(&format!(" ({})", label_list(&issue.labels)));
    }
    if let Some(assignee) = &issue.assignee {
        line.push_str(&format!(" @{}", assignee.username));
    }
    line
}

fn label_list(labels: &[Label]) -> String {
    labels
        .iter()
        .map(|label| label.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn write_indented<W: Write>(writer: &mut W, text: &str) -> io::Result<()> {
    for line in text.lines() {
        if line.is_empty() {
            writeln!(writer)?;
        } else {
            writeln!(writer, "{INDENT}{line}")?;
        }
    }
    Ok(())
}

/// Opens `url` with the platform's URL handler.
///
/// # Errors
///
/// Returns [`IssueError::Io`] when the handler cannot be started or exits
/// unsuccessfully.
pub fn open_in_browser(url: &str) -> Result<(), IssueError> {
    let status = browser_command(url)
        .status()
        .map_err(|error| IssueError::Io {
            message: format!("failed to launch a browser: {error}"),
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(IssueError::Io {
            message: format!("browser exited with {status}"),
        })
    }
}

fn browser_command(url: &str) -> Command {
    let mut command = if cfg!(target_os = "macos") {
        Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut start = Command::new("cmd");
        start.args(["/C", "start", ""]);
        start
    } else {
        Command::new("xdg-open")
    };
    command.arg(url);
    command
}

pub(crate) fn io_error(error: &io::Error) -> IssueError {
    IssueError::Io {
        message: error.to_string(),
    }
}
