//! Inclusion scan: is this file textually included somewhere else?
//!
//! A file that appears in an `include "<name>"` directive elsewhere in the
//! project is a fragment, and parsing it on its own is expected to fail.

use crate::config::ToolConfig;
use crate::error::ToolError;
use crate::tool::{excerpt, output_lines, run_tool};
use async_trait::async_trait;
use ignore::WalkBuilder;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Literal searched for when looking for includers of `file_name`
pub fn include_pattern(file_name: &str) -> String {
    format!("include \"{file_name}")
}

/// Corpus search for files including a given file name
#[async_trait]
pub trait InclusionScanner: Send + Sync {
    /// Matching lines under `root`; empty when nothing includes `file_name`
    async fn scan(&self, file_name: &str, root: &Path) -> Result<Vec<String>, ToolError>;
}

/// Searches with ripgrep
#[derive(Debug, Clone)]
pub struct RipgrepScanner {
    tool: ToolConfig,
}

impl RipgrepScanner {
    pub fn new(tool: ToolConfig) -> Self {
        Self { tool }
    }
}

#[async_trait]
impl InclusionScanner for RipgrepScanner {
    async fn scan(&self, file_name: &str, root: &Path) -> Result<Vec<String>, ToolError> {
        let pattern = include_pattern(file_name);
        let output = run_tool(
            &self.tool,
            [
                OsStr::new("--fixed-strings"),
                OsStr::new("--"),
                OsStr::new(&pattern),
                root.as_os_str(),
            ],
        )
        .await?;

        // rg: 0 = matches, 1 = no matches, anything else is an error
        match output.status.code() {
            Some(0) => Ok(output_lines(&output.stdout)
                .into_iter()
                .filter(|l| !l.is_empty())
                .collect()),
            Some(1) => Ok(Vec::new()),
            code => Err(ToolError::Failed {
                program: self.tool.program.clone(),
                code,
                stderr: excerpt(&output.stderr, 512),
            }),
        }
    }
}

/// In-process fallback for hosts without ripgrep.
///
/// Walks `root` with the same ignore rules ripgrep applies and reports
/// matches as `path:line:text`.
#[derive(Debug, Clone, Default)]
pub struct WalkScanner;

impl WalkScanner {
    fn scan_blocking(pattern: &str, root: &Path) -> Vec<String> {
        let mut hits = Vec::new();
        let walker = WalkBuilder::new(root).hidden(true).git_ignore(true).build();

        let mut files: Vec<PathBuf> = walker
            .flatten()
            .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
            .map(|e| e.into_path())
            .collect();
        files.sort();

        for path in files {
            // Binary or unreadable files cannot contain an include directive
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            let text = String::from_utf8_lossy(&bytes);
            for (idx, line) in text.lines().enumerate() {
                if line.contains(pattern) {
                    hits.push(format!("{}:{}:{}", path.display(), idx + 1, line));
                }
            }
        }
        hits
    }
}

#[async_trait]
impl InclusionScanner for WalkScanner {
    async fn scan(&self, file_name: &str, root: &Path) -> Result<Vec<String>, ToolError> {
        let pattern = include_pattern(file_name);
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || Self::scan_blocking(&pattern, &root))
            .await
            .map_err(|e| ToolError::Failed {
                program: "walk-scanner".to_string(),
                code: None,
                stderr: e.to_string(),
            })
    }
}
