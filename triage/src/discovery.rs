//! Log corpus layout
//!
//! The smoke-test logger writes one directory per project,
//! `<project>-nonzeros/`, holding one stderr capture per failing run named
//! `<exit code>-<source file name>_<tool>`. This module turns that layout
//! into classification jobs and resolves each log to a source file in the
//! project checkout.

use crate::error::{TriageError, TriageResult};
use ignore::WalkBuilder;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Suffix of per-project log directories
pub const NONZEROS_SUFFIX: &str = "-nonzeros";

/// Decoded log file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogName {
    pub exit_code: i32,
    /// Base name of the source file the run was about
    pub file_name: String,
    pub tool: String,
}

impl LogName {
    /// Exit code prefix of a log name; the rest of the name is not looked at
    pub fn exit_code(name: &str) -> TriageResult<i32> {
        name.split_once('-')
            .and_then(|(code, _)| code.parse().ok())
            .ok_or_else(|| TriageError::LogName {
                name: name.to_string(),
            })
    }

    pub fn parse(name: &str) -> TriageResult<Self> {
        let bad = || TriageError::LogName {
            name: name.to_string(),
        };
        let exit_code = Self::exit_code(name)?;
        let (_, rest) = name.split_once('-').ok_or_else(bad)?;
        let (file_name, tool) = rest.rsplit_once('_').ok_or_else(bad)?;
        if file_name.is_empty() || tool.is_empty() {
            return Err(bad());
        }
        Ok(Self {
            exit_code,
            file_name: file_name.to_string(),
            tool: tool.to_string(),
        })
    }

    /// Only syntax failures (exit 1) carry `path:line:col` diagnostics.
    ///
    /// Preprocessor logs use another format and project-level runs have no
    /// single source file.
    pub fn is_classifiable(&self) -> bool {
        self.exit_code == 1 && self.tool != "preprocessor" && !self.tool.contains("project")
    }
}

/// One failing run to classify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileJob {
    pub log_path: PathBuf,
    /// Source path relative to the checkout root
    pub source_path: String,
}

/// A project's log directory plus its checkout
#[derive(Debug, Clone)]
pub struct ProjectJob {
    pub name: String,
    pub checkout: PathBuf,
    pub files: Vec<FileJob>,
}

/// `<project>-nonzeros` directories under `root`, sorted case-insensitively
pub fn nonzero_dirs(root: &Path) -> TriageResult<Vec<(String, PathBuf)>> {
    let entries = std::fs::read_dir(root).map_err(|e| TriageError::io(root, e))?;
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TriageError::io(root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(project) = name.strip_suffix(NONZEROS_SUFFIX) {
            dirs.push((project.to_string(), path));
        }
    }
    dirs.sort_by_key(|(name, _)| name.to_lowercase());
    Ok(dirs)
}

/// All files of a checkout, relative to its root, sorted
pub fn checkout_files(checkout: &Path) -> Vec<String> {
    let walker = WalkBuilder::new(checkout)
        .hidden(true)
        .git_ignore(false)
        .build();

    let mut files: Vec<String> = walker
        .flatten()
        .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
        .filter_map(|e| {
            e.path()
                .strip_prefix(checkout)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}

/// Pick the checkout file a log refers to.
///
/// Candidates are files whose path contains `file_name`. When more than one
/// remains after preferring exact base-name matches, the log text has to
/// name the file as `<project>/<dirs>/<file>`; there is no guessing.
pub fn resolve_source(
    log_path: &Path,
    log_text: &str,
    project: &str,
    file_name: &str,
    checkout_files: &[String],
) -> TriageResult<String> {
    let candidates: Vec<&String> = checkout_files
        .iter()
        .filter(|f| f.contains(file_name))
        .collect();

    match candidates.as_slice() {
        [] => {
            return Err(TriageError::SourceNotFound {
                log: log_path.to_path_buf(),
                filename: file_name.to_string(),
            })
        }
        [only] => return Ok((*only).clone()),
        _ => {}
    }

    let exact: Vec<&&String> = candidates
        .iter()
        .filter(|f| f.rsplit('/').next() == Some(file_name))
        .collect();
    if let [only] = exact.as_slice() {
        return Ok((**only).clone());
    }

    if let Some(path) = embedded_path(log_text, project) {
        return Ok(path);
    }
    Err(TriageError::AmbiguousSource {
        log: log_path.to_path_buf(),
        filename: file_name.to_string(),
        candidates: candidates.len(),
    })
}

/// First `<project>/<dir>/.../<file>` path mentioned in the log, minus the project
fn embedded_path(log_text: &str, project: &str) -> Option<String> {
    let pattern = format!(r"{}(/[\w,:\-\.]+)+/[^:]+", regex::escape(project));
    let re = Regex::new(&pattern).ok()?;
    log_text.lines().find_map(|line| {
        re.find(line).map(|m| {
            m.as_str()
                .split('/')
                .skip(1)
                .collect::<Vec<_>>()
                .join("/")
        })
    })
}

/// Build the jobs for one project from its log directory
pub fn project_jobs(name: &str, log_dir: &Path, checkout: &Path) -> TriageResult<ProjectJob> {
    let files = checkout_files(checkout);

    let entries = std::fs::read_dir(log_dir).map_err(|e| TriageError::io(log_dir, e))?;
    let mut logs: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TriageError::io(log_dir, e))?;
        if entry.path().is_file() {
            logs.push(entry.path());
        }
    }
    logs.sort();

    let mut jobs = Vec::new();
    for log_path in logs {
        let log_file = log_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        // Only exit 1 names are required to carry `<file>_<tool>`
        let exit_code = LogName::exit_code(&log_file)?;
        if exit_code != 1 {
            tracing::debug!(log = %log_file, exit_code, "Skipping log");
            continue;
        }
        let log_name = LogName::parse(&log_file)?;
        if !log_name.is_classifiable() {
            tracing::debug!(log = %log_file, tool = %log_name.tool, "Skipping log");
            continue;
        }

        let text = read_lossy(&log_path)?;
        let source_path = resolve_source(&log_path, &text, name, &log_name.file_name, &files)?;
        jobs.push(FileJob {
            log_path,
            source_path,
        });
    }

    tracing::info!(project = name, logs = jobs.len(), "Discovered failing runs");
    Ok(ProjectJob {
        name: name.to_string(),
        checkout: checkout.to_path_buf(),
        files: jobs,
    })
}

/// Read a text file, replacing invalid UTF-8
pub fn read_lossy(path: &Path) -> TriageResult<String> {
    let bytes = std::fs::read(path).map_err(|e| TriageError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
