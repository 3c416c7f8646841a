//! Title/body message protocol for the editor and `-m`.
//!
//! An editor blob is a title line, a separator line that is discarded, and
//! a body made of everything after the second newline. Inline `-m` text has
//! no separator: the first line is the title and the rest is the body.

use crate::service::IssueError;

/// Line written between title and body in editor seeds.
pub const SEPARATOR: &str = "<!-- This line will be ignored! Title above, body below. -->";

/// An issue title and body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Title; never contains a newline.
    pub title: String,
    /// Body, kept byte-for-byte; `None` when the user gave a title only.
    pub body: Option<String>,
}

impl Message {
    /// Creates a message from parts.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: Some(body.into()),
        }
    }

    /// A message that leaves the body alone.
    #[must_use]
    pub fn title_only(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
        }
    }

    /// Splits `-m` text at its first newline.
    ///
    /// Nothing is discarded: every line after the title is body. Text
    /// with nothing after the first line carries no body.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Validation`] when the title is blank.
    pub fn inline(text: &str) -> Result<Self, IssueError> {
        let (title_line, body) = match text.split_once('\n') {
            Some((title_line, body)) => (title_line, Some(body).filter(|rest| !rest.is_empty())),
            None => (text, None),
        };
        let title = checked_title(title_line)?;
        Ok(Self {
            title: title.to_owned(),
            body: body.map(ToOwned::to_owned),
        })
    }

    /// Splits a blob into title and body.
    ///
    /// The second line is discarded whatever it contains. A trailing `\r`
    /// on the title line is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`IssueError::Validation`] when the title is blank.
    pub fn parse(blob: &str) -> Result<Self, IssueError> {
        let mut lines = blob.splitn(3, '\n');
        let title_line = lines.next().unwrap_or_default();
        let _separator = lines.next();
        let body = lines.next().unwrap_or_default();

        Ok(Self::new(checked_title(title_line)?, body))
    }

    /// Renders the blob an editor is seeded with.
    #[must_use]
    pub fn to_seed(&self) -> String {
        format!(
            "{}\n{SEPARATOR}\n{}",
            self.title,
            self.body.as_deref().unwrap_or_default()
        )
    }

    /// Seed for a new issue: empty title and body.
    #[must_use]
    pub fn blank_seed() -> String {
        Self::default().to_seed()
    }
}

fn checked_title(line: &str) -> Result<&str, IssueError> {
    let title = line.strip_suffix('\r').unwrap_or(line);
    if title.trim().is_empty() {
        return Err(IssueError::validation("aborting due to empty issue title"));
    }
    Ok(title)
}

/// Validates a comment or closing message, which is used whole.
///
/// # Errors
///
/// Returns [`IssueError::Validation`] when the text is blank.
pub fn comment_text(text: &str) -> Result<String, IssueError> {
    if text.trim().is_empty() {
        return Err(IssueError::validation("aborting due to empty message"));
    }
    Ok(text.to_owned())
}
