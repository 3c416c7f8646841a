//! Runs one command against an issue service.
//!
//! Each command moves through a fixed sequence of [`Phase`]s. Provider
//! calls are awaited one at a time in a deterministic order, and results
//! leave as [`RenderRecord`]s; the executor never formats output itself.

mod command;

pub use command::{Command, CompletionKind, FieldArgs, MessageArgs, MessageSource};

use tracing::{debug, warn};

use crate::editor::Editor;
use crate::message::{Message, comment_text};
use crate::reconcile::{reconcile_edit, reconcile_new};
use crate::render::{Action, RenderRecord, RenderSink};
use crate::service::{
    CommentKind, Issue, IssueError, IssueListing, IssueNumber, IssueService, IssueState,
    StateFilter, TargetState,
};

/// Stage of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Checking arguments and composing messages.
    Validating,
    /// Reading the current issue.
    Fetching,
    /// Resolving names and computing the update.
    Reconciling,
    /// Calling the provider.
    Invoking,
    /// Emitting records.
    Rendering,
    /// Finished successfully.
    Done,
    /// Stopped by an error.
    Failed,
}

/// Report of one command run.
#[derive(Debug)]
pub struct Execution {
    /// Subcommand name.
    pub command: &'static str,
    /// Phases entered, in order.
    pub phases: Vec<Phase>,
    /// Final outcome.
    pub result: Result<(), IssueError>,
}

impl Execution {
    /// The phase that was active when the command failed.
    #[must_use]
    pub fn failed_in(&self) -> Option<Phase> {
        match self.phases.as_slice() {
            [.., last, Phase::Failed] => Some(*last),
            _ => None,
        }
    }

    /// Discards the report and keeps the outcome.
    ///
    /// # Errors
    ///
    /// Returns the error the command failed with.
    pub fn into_result(self) -> Result<(), IssueError> {
        self.result
    }
}

struct Progress {
    command: &'static str,
    phases: Vec<Phase>,
}

impl Progress {
    const fn new(command: &'static str) -> Self {
        Self {
            command,
            phases: Vec::new(),
        }
    }

    fn enter(&mut self, phase: Phase) {
        if self.phases.last() == Some(&phase) {
            return;
        }
        debug!(command = self.command, ?phase, "entering phase");
        self.phases.push(phase);
    }
}

/// Executes commands with one service, editor and sink.
pub struct Executor<'run> {
    service: &'run dyn IssueService,
    editor: &'run dyn Editor,
    sink: &'run mut dyn RenderSink,
}

impl<'run> Executor<'run> {
    /// Creates an executor.
    #[must_use]
    pub const fn new(
        service: &'run dyn IssueService,
        editor: &'run dyn Editor,
        sink: &'run mut dyn RenderSink,
    ) -> Self {
        Self {
            service,
            editor,
            sink,
        }
    }

    /// Runs `command` to completion.
    pub async fn run(&mut self, command: Command) -> Execution {
        let name = command.name();
        let mut progress = Progress::new(name);
        let result = self.dispatch(command, &mut progress).await;
        match &result {
            Ok(()) => progress.enter(Phase::Done),
            Err(error) => {
                debug!(command = name, %error, "command failed");
                progress.enter(Phase::Failed);
            }
        }
        Execution {
            command: name,
            phases: progress.phases,
            result,
        }
    }

    async fn dispatch(
        &mut self,
        command: Command,
        progress: &mut Progress,
    ) -> Result<(), IssueError> {
        progress.enter(Phase::Validating);
        match command {
            Command::Create { message, fields } => self.create(&message, fields, progress).await,
            Command::Edit {
                number,
                message,
                fields,
            } => self.edit(number, &message, fields, progress).await,
            Command::Comment { number, message } => {
                self.comment(number, &message, progress).await
            }
            Command::Close { number, message } => self.close(number, &message, progress).await,
            Command::Reopen { number } => self.reopen(number, progress).await,
            Command::Show {
                number,
                summary,
                quiet,
            } => self.show(number, summary, quiet, progress).await,
            Command::List { state, oneline } => self.list(state, oneline, progress).await,
            Command::Browse { number, url_only } => self.browse(number, url_only, progress),
            Command::Complete { kind, state } => self.complete(kind, state, progress).await,
        }
    }

    fn emit(&mut self, record: RenderRecord) -> Result<(), IssueError> {
        self.sink.emit(record)
    }

    fn outcome(
        &mut self,
        action: Action,
        number: IssueNumber,
        url: String,
    ) -> Result<(), IssueError> {
        self.emit(RenderRecord::Outcome {
            action,
            number,
            url,
        })
    }

    /// Title and body from `-m` or the editor seeded with `seed`.
    async fn compose(
        &self,
        source: MessageSource,
        seed: &str,
    ) -> Result<Option<Message>, IssueError> {
        match source {
            MessageSource::Skip => Ok(None),
            MessageSource::Inline(text) => Message::inline(&text).map(Some),
            MessageSource::Editor => Message::parse(&self.editor.edit(seed).await?).map(Some),
        }
    }

    /// Comment text from `-m` or an empty editor.
    async fn compose_comment(&self, source: MessageSource) -> Result<Option<String>, IssueError> {
        match source {
            MessageSource::Skip => Ok(None),
            MessageSource::Inline(text) => comment_text(&text).map(Some),
            MessageSource::Editor => comment_text(&self.editor.edit("").await?).map(Some),
        }
    }

    async fn create(
        &mut self,
        message: &MessageArgs,
        fields: FieldArgs,
        progress: &mut Progress,
    ) -> Result<(), IssueError> {
        let source = message.source()?;
        if source == MessageSource::Skip {
            return Err(IssueError::validation("a new issue needs a title"));
        }
        let composed = self.compose(source, &Message::blank_seed()).await?;

        progress.enter(Phase::Reconciling);
        let new_issue = reconcile_new(self.service, fields.into_request(composed)).await?;

        progress.enter(Phase::Invoking);
        let created = self.service.create(&new_issue).await?;

        progress.enter(Phase::Rendering);
        self.outcome(Action::Created, created.number, created.url)
    }

    async fn edit(
        &mut self,
        number: IssueNumber,
        message: &MessageArgs,
        fields: FieldArgs,
        progress: &mut Progress,
    ) -> Result<(), IssueError> {
        let source = message.source()?;

        progress.enter(Phase::Fetching);
        let current = self.service.fetch(number).await?;

        progress.enter(Phase::Reconciling);
        let seed = Message::new(current.title.as_str(), current.body.as_str()).to_seed();
        let composed = self.compose(source, &seed).await?;
        let changes = reconcile_edit(self.service, &current, fields.into_request(composed)).await?;

        if changes.is_empty() {
            debug!(issue = %number, "nothing to update");
            progress.enter(Phase::Rendering);
            return self.outcome(Action::Unchanged, number, current.url);
        }

        progress.enter(Phase::Invoking);
        let updated = self.service.update(number, &changes).await?;

        progress.enter(Phase::Rendering);
        for limitation in updated.warnings {
            warn!(issue = %number, %limitation, "provider limitation");
            self.emit(RenderRecord::Warning(limitation))?;
        }
        self.outcome(Action::Updated, number, updated.issue.url)
    }

    async fn comment(
        &mut self,
        number: IssueNumber,
        message: &MessageArgs,
        progress: &mut Progress,
    ) -> Result<(), IssueError> {
        let Some(body) = self.compose_comment(message.source()?).await? else {
            return Err(IssueError::validation("aborting due to empty message"));
        };

        progress.enter(Phase::Invoking);
        let comment = self.service.comment(number, &body).await?;

        progress.enter(Phase::Rendering);
        let url = comment
            .url
            .unwrap_or_else(|| self.service.issue_url(number));
        self.outcome(Action::Commented, number, url)
    }

    async fn close(
        &mut self,
        number: IssueNumber,
        message: &MessageArgs,
        progress: &mut Progress,
    ) -> Result<(), IssueError> {
        let source = message.source()?;

        progress.enter(Phase::Fetching);
        let current = self.service.fetch(number).await?;
        require_state(&current, &IssueState::Open)?;

        let closing_message = self.compose_comment(source).await?;

        progress.enter(Phase::Invoking);
        let closed = self
            .service
            .set_state(number, TargetState::Closed, closing_message)
            .await?;

        progress.enter(Phase::Rendering);
        self.outcome(Action::Closed, number, closed.url)
    }

    async fn reopen(
        &mut self,
        number: IssueNumber,
        progress: &mut Progress,
    ) -> Result<(), IssueError> {
        progress.enter(Phase::Fetching);
        let current = self.service.fetch(number).await?;
        require_state(&current, &IssueState::Closed)?;

        progress.enter(Phase::Invoking);
        let reopened = self
            .service
            .set_state(number, TargetState::Open, None)
            .await?;

        progress.enter(Phase::Rendering);
        self.outcome(Action::Reopened, number, reopened.url)
    }

    async fn show(
        &mut self,
        number: IssueNumber,
        summary: bool,
        quiet: bool,
        progress: &mut Progress,
    ) -> Result<(), IssueError> {
        progress.enter(Phase::Invoking);
        let (issue, comments) = if summary {
            (self.service.fetch(number).await?, Vec::new())
        } else {
            let details = self.service.show(number).await?;
            (details.issue, details.comments)
        };

        progress.enter(Phase::Rendering);
        self.emit(RenderRecord::IssueDetail { issue, summary })?;
        for comment in comments {
            if quiet && comment.kind == CommentKind::Event {
                continue;
            }
            self.emit(RenderRecord::Comment(comment))?;
        }
        Ok(())
    }

    async fn list(
        &mut self,
        state: StateFilter,
        oneline: bool,
        progress: &mut Progress,
    ) -> Result<(), IssueError> {
        let mut listing = IssueListing::new(self.service, state);
        loop {
            progress.enter(Phase::Invoking);
            let Some(page) = listing.next_page().await? else {
                return Ok(());
            };
            progress.enter(Phase::Rendering);
            for issue in page {
                self.emit(RenderRecord::ListItem { issue, oneline })?;
            }
        }
    }

    fn browse(
        &mut self,
        number: Option<IssueNumber>,
        url_only: bool,
        progress: &mut Progress,
    ) -> Result<(), IssueError> {
        progress.enter(Phase::Invoking);
        let url = number.map_or_else(
            || self.service.issues_url(),
            |issue| self.service.issue_url(issue),
        );

        progress.enter(Phase::Rendering);
        if url_only {
            self.emit(RenderRecord::Url(url))
        } else {
            self.emit(RenderRecord::Browse(url))
        }
    }

    async fn complete(
        &mut self,
        kind: CompletionKind,
        state: StateFilter,
        progress: &mut Progress,
    ) -> Result<(), IssueError> {
        progress.enter(Phase::Invoking);
        let candidates: Vec<String> = match kind {
            CompletionKind::Issues => IssueListing::new(self.service, state)
                .collect_all()
                .await?
                .into_iter()
                .map(|issue| issue.number.get().to_string())
                .collect(),
            CompletionKind::Labels => self
                .service
                .labels()
                .await?
                .into_iter()
                .map(|label| label.name)
                .collect(),
            CompletionKind::Milestones => self
                .service
                .milestones()
                .await?
                .into_iter()
                .map(|milestone| milestone.title)
                .collect(),
            CompletionKind::States => self
                .service
                .states()
                .await?
                .into_iter()
                .map(|filter| filter.as_str().to_owned())
                .collect(),
        };

        progress.enter(Phase::Rendering);
        for candidate in candidates {
            self.emit(RenderRecord::Completion(candidate))?;
        }
        Ok(())
    }
}

/// State guard for `close` and `reopen`.
fn require_state(issue: &Issue, expected: &IssueState) -> Result<(), IssueError> {
    if &issue.state == expected {
        return Ok(());
    }
    Err(IssueError::validation(format!(
        "issue {} is not {expected}",
        issue.number
    )))
}

#[cfg(test)]
mod tests;
