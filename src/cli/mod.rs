//! Command-line parsing for the `git-issue` binary.
//!
//! Arguments are parsed with clap and converted into the library's
//! [`Command`]; everything after that is shared with the library tests.
//! Terminal presentation lives in [`output`].

pub mod output;

use std::convert::Infallible;

use clap::{Args, Parser, Subcommand, ValueEnum};
use git_issue::config::CliOverrides;
use git_issue::executor::{Command, CompletionKind, FieldArgs, MessageArgs};
use git_issue::service::{IssueError, IssueNumber, StateFilter};

/// Manage issues on GitHub, GitLab, Gogs, and JIRA from a git checkout.
#[derive(Debug, Parser)]
#[command(name = "git-issue", version)]
pub struct Cli {
    /// Log debug output to stderr.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Tracker backend, overriding `issue.service`.
    #[arg(long, global = true, value_name = "SERVICE")]
    pub service: Option<String>,

    /// Remote whose URL locates the repository.
    #[arg(long, global = true, value_name = "REMOTE")]
    pub remote: Option<String>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: IssueCommand,
}

impl Cli {
    /// Configuration values given on the command line.
    #[must_use]
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            service: self.service.clone(),
            remote: self.remote.clone(),
        }
    }
}

/// `-m` and `-n`.
#[derive(Debug, Clone, Default, Args)]
pub struct MessageOptions {
    /// Use MESSAGE instead of opening an editor.
    #[arg(short, long, value_name = "MESSAGE")]
    message: Option<String>,

    /// Do not ask for a message.
    #[arg(short = 'n', long)]
    no_message: bool,
}

impl From<MessageOptions> for MessageArgs {
    fn from(options: MessageOptions) -> Self {
        Self {
            message: options.message,
            no_message: options.no_message,
        }
    }
}

/// `-m` alone, for commands that always need text.
#[derive(Debug, Clone, Default, Args)]
pub struct TextOption {
    /// Use MESSAGE instead of opening an editor.
    #[arg(short, long, value_name = "MESSAGE")]
    message: Option<String>,
}

impl From<TextOption> for MessageArgs {
    fn from(option: TextOption) -> Self {
        Self {
            message: option.message,
            no_message: false,
        }
    }
}

/// `-a`, `-s`, and `-l`.
#[derive(Debug, Clone, Default, Args)]
pub struct FieldOptions {
    /// Assign to USER; `none` removes the assignee.
    #[arg(short, long, value_name = "USER")]
    assignee: Option<String>,

    /// Attach to MILESTONE; `none` removes the milestone.
    #[arg(short = 's', long, value_name = "MILESTONE")]
    milestone: Option<String>,

    /// Set labels; repeat for several, `none` removes all labels.
    #[arg(short, long = "label", value_name = "LABEL")]
    labels: Vec<String>,
}

impl From<FieldOptions> for FieldArgs {
    fn from(options: FieldOptions) -> Self {
        Self {
            assignee: options.assignee,
            milestone: options.milestone,
            labels: options.labels,
        }
    }
}

/// Shell completion candidate kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CompletionTarget {
    /// Issue numbers.
    Issues,
    /// Label names.
    Labels,
    /// Milestone titles.
    Milestones,
    /// State filter names.
    States,
}

impl From<CompletionTarget> for CompletionKind {
    fn from(target: CompletionTarget) -> Self {
        match target {
            CompletionTarget::Issues => Self::Issues,
            CompletionTarget::Labels => Self::Labels,
            CompletionTarget::Milestones => Self::Milestones,
            CompletionTarget::States => Self::States,
        }
    }
}

/// `git-issue` subcommands.
#[derive(Debug, Subcommand)]
pub enum IssueCommand {
    /// Create an issue.
    Create {
        /// Title and body.
        #[command(flatten)]
        message: TextOption,
        /// Assignee, milestone, and labels.
        #[command(flatten)]
        fields: FieldOptions,
    },
    /// Edit an issue's text, assignee, milestone, or labels.
    Edit {
        /// Issue number.
        #[arg(value_parser = issue_number)]
        number: IssueNumber,
        /// New title and body; `-n` keeps the current text.
        #[command(flatten)]
        message: MessageOptions,
        /// Assignee, milestone, and labels.
        #[command(flatten)]
        fields: FieldOptions,
    },
    /// Comment on an issue.
    Comment {
        /// Issue number.
        #[arg(value_parser = issue_number)]
        number: IssueNumber,
        /// Comment text.
        #[command(flatten)]
        message: TextOption,
    },
    /// Close an issue, optionally with a comment.
    Close {
        /// Issue number.
        #[arg(value_parser = issue_number)]
        number: IssueNumber,
        /// Closing comment; `-n` closes silently.
        #[command(flatten)]
        message: MessageOptions,
    },
    /// Reopen a closed issue.
    Reopen {
        /// Issue number.
        #[arg(value_parser = issue_number)]
        number: IssueNumber,
    },
    /// Show an issue with its comments and events.
    Show {
        /// Issue number.
        #[arg(value_parser = issue_number)]
        number: IssueNumber,
        /// Print the header and comment count only.
        #[arg(long)]
        summary: bool,
        /// Omit events.
        #[arg(short, long)]
        quiet: bool,
    },
    /// List issues.
    List {
        /// `open`, `closed`, `all`, or a provider state.
        #[arg(value_name = "STATE", default_value = "open", value_parser = state_filter)]
        state: StateFilter,
        /// One line per issue.
        #[arg(long)]
        oneline: bool,
    },
    /// Open an issue, or the issue list, in a browser.
    Browse {
        /// Issue number; the issue list when omitted.
        #[arg(value_parser = issue_number)]
        number: Option<IssueNumber>,
        /// Print the URL instead of opening it.
        #[arg(short, long)]
        url: bool,
    },
    /// Print shell completion candidates.
    Complete {
        /// What to complete.
        #[arg(value_enum)]
        kind: CompletionTarget,
        /// State filter for issue numbers.
        #[arg(
            long,
            value_name = "STATE",
            default_value = "open",
            value_parser = state_filter
        )]
        state: StateFilter,
    },
}

impl From<IssueCommand> for Command {
    fn from(command: IssueCommand) -> Self {
        match command {
            IssueCommand::Create { message, fields } => Self::Create {
                message: message.into(),
                fields: fields.into(),
            },
            IssueCommand::Edit {
                number,
                message,
                fields,
            } => Self::Edit {
                number,
                message: message.into(),
                fields: fields.into(),
            },
            IssueCommand::Comment { number, message } => Self::Comment {
                number,
                message: message.into(),
            },
            IssueCommand::Close { number, message } => Self::Close {
                number,
                message: message.into(),
            },
            IssueCommand::Reopen { number } => Self::Reopen { number },
            IssueCommand::Show {
                number,
                summary,
                quiet,
            } => Self::Show {
                number,
                summary,
                quiet,
            },
            IssueCommand::List { state, oneline } => Self::List { state, oneline },
            IssueCommand::Browse { number, url } => Self::Browse {
                number,
                url_only: url,
            },
            IssueCommand::Complete { kind, state } => Self::Complete {
                kind: kind.into(),
                state,
            },
        }
    }
}

/// Commands whose output is long enough to page.
#[must_use]
pub const fn is_paged(command: &Command) -> bool {
    matches!(command, Command::Show { .. } | Command::List { .. })
}

fn issue_number(raw: &str) -> Result<IssueNumber, IssueError> {
    IssueNumber::parse(raw)
}

fn state_filter(raw: &str) -> Result<StateFilter, Infallible> {
    Ok(StateFilter::parse(raw))
}
