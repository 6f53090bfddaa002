//! Oracle cross-check against an independent reference parser
//!
//! The oracle (slang by default) parses the whole source file with the
//! error limit disabled. Its diagnostics are folded into one message per
//! error and compared by position with the record under test.

use crate::classifier::ClassifierState;
use crate::config::ToolConfig;
use crate::error::ToolError;
use crate::locator::Locator;
use crate::record::{CategoryTag, ErrorRecord};
use crate::tool::{excerpt, output_lines, run_tool};
use async_trait::async_trait;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Complaints about unknown or undeclared names follow from missing
/// includes and defines, not from the syntax under test
static UNDECLARED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"error:( \w*)*(unknown|undeclared)").unwrap());

/// Source of reference diagnostics for one file
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Raw diagnostic lines for the file at `source`
    async fn diagnostics(&self, source: &Path) -> Result<Vec<String>, ToolError>;
}

/// Runs the slang frontend and captures its stderr
#[derive(Debug, Clone)]
pub struct SlangOracle {
    tool: ToolConfig,
}

impl SlangOracle {
    pub fn new(tool: ToolConfig) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl Oracle for SlangOracle {
    async fn diagnostics(&self, source: &Path) -> Result<Vec<String>, ToolError> {
        let output = run_tool(&self.tool, [source]).await?;

        // slang exits non-zero whenever it finds errors; only a signal or an
        // empty stream means it did not do its job
        if output.status.code().is_none() || (!output.status.success() && output.stderr.is_empty())
        {
            let stream = if output.stderr.is_empty() {
                &output.stdout
            } else {
                &output.stderr
            };
            return Err(ToolError::Failed {
                program: self.tool.program.clone(),
                code: output.status.code(),
                stderr: excerpt(stream, 512),
            });
        }

        Ok(output_lines(&output.stderr))
    }
}

/// Fold diagnostic lines into one message per error.
///
/// A line mentioning `source_path` opens a new message; any other line is
/// a continuation (notes, source excerpts, carets) of the current one.
pub fn join_messages(lines: &[String], source_path: &str) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = String::new();

    for line in lines {
        if line.contains(source_path) {
            if !current.is_empty() {
                messages.push(std::mem::take(&mut current));
            }
            current.push_str(line);
        } else if !line.is_empty() {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        messages.push(current);
    }

    messages
}

/// Whether a message says something about syntax rather than missing names
pub fn is_important(message: &str) -> bool {
    !UNDECLARED_PATTERN.is_match(message)
}

/// The first oracle message that confirms `record`, if any.
///
/// A message confirms when it sits on the same line, within `tolerance`
/// columns of the record's start column, and is not a missing-name complaint.
pub fn find_confirmation<'a>(
    messages: &'a [String],
    record: &ErrorRecord,
    tolerance: usize,
) -> Option<&'a str> {
    messages
        .iter()
        .find(|message| {
            Locator::find(message).is_some_and(|loc| {
                loc.line == record.line
                    && loc.col_start.abs_diff(record.col_start) <= tolerance
                    && is_important(message)
            })
        })
        .map(String::as_str)
}

/// Apply an oracle result to a record.
///
/// On confirmation the record becomes `slang-verified-error` and the file
/// enters [`ClassifierState::SlangVerified`]. Otherwise nothing changes.
pub fn apply_verification(
    record: &mut ErrorRecord,
    state: &mut ClassifierState,
    messages: &[String],
    tolerance: usize,
) -> bool {
    match find_confirmation(messages, record, tolerance) {
        Some(message) => {
            tracing::debug!(
                source = %record.source_path,
                line = record.line,
                oracle = %message.lines().next().unwrap_or_default(),
                "Oracle confirmed error"
            );
            record.category = CategoryTag::SlangVerifiedError;
            *state = ClassifierState::SlangVerified;
            true
        }
        None => false,
    }
}
