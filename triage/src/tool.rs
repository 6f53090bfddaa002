//! External tool invocation with a hard timeout
//!
//! All tools are run with `tokio::process::Command`, `kill_on_drop`, and
//! `tokio::time::timeout(timeout_secs)`, so a hung parser costs one record,
//! not the run.

use crate::config::ToolConfig;
use crate::error::ToolError;
use std::ffi::OsStr;
use std::process::Output;
use std::time::Duration;

/// Run `tool` with its configured arguments followed by `extra`.
///
/// Returns the raw output whatever the exit status; callers decide which
/// statuses mean failure.
pub async fn run_tool<I, S>(tool: &ToolConfig, extra: I) -> Result<Output, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = tokio::process::Command::new(&tool.program);
    cmd.args(&tool.args).args(extra).kill_on_drop(true);

    // kill_on_drop only kills the direct child on timeout. The separate process
    // group keeps terminal signals aimed at us (Ctrl-C) away from the tool.
    #[cfg(unix)]
    cmd.process_group(0);

    let timeout_dur = Duration::from_secs(tool.timeout_secs);
    match tokio::time::timeout(timeout_dur, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(ToolError::Spawn {
            program: tool.program.clone(),
            message: e.to_string(),
        }),
        Err(_) => Err(ToolError::Timeout {
            program: tool.program.clone(),
            secs: tool.timeout_secs,
        }),
    }
}

/// Split captured bytes into lines, dropping the empty tail
pub fn output_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(str::to_string)
        .collect()
}

/// First line of `<program> --version`, for the report
pub async fn version_line(tool: &ToolConfig) -> Option<String> {
    let probe = ToolConfig {
        args: Vec::new(),
        ..tool.clone()
    };
    match run_tool(&probe, ["--version"]).await {
        Ok(output) if output.status.success() => output_lines(&output.stdout)
            .into_iter()
            .find(|l| !l.trim().is_empty()),
        Ok(output) => {
            tracing::warn!(
                program = %tool.program,
                code = ?output.status.code(),
                "Version probe failed"
            );
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Version probe failed");
            None
        }
    }
}

/// Truncate tool stderr for error messages
pub(crate) fn excerpt(bytes: &[u8], max: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
