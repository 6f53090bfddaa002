//! Pipeline configuration
//!
//! Everything the classifier needs from the outside world is carried here:
//! external tool invocations, window sizes, and the per-project rules.
//! Defaults reproduce the smoke-test setup; a TOML file and a few
//! environment variables can override them.

use crate::error::{TriageError, TriageResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How to invoke one external tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Executable name or path
    pub program: String,
    /// Arguments placed before the per-call arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Maximum time per invocation (seconds)
    pub timeout_secs: u64,
}

/// Project identity plus the project-specific rules that apply to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Short name, matching the `<name>-nonzeros` log directory
    pub name: String,
    /// Clone URL
    pub url: String,
    /// Regex on the log line marking intentionally failing test inputs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub designed_to_fail_pattern: Option<String>,
    /// Literal diagnostic emitted by a deliberately failing preprocessor branch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failsafe_sentinel: Option<String>,
}

impl ProjectConfig {
    pub fn new(url: &str) -> Self {
        let name = url.rsplit('/').next().unwrap_or(url).to_string();
        Self {
            name,
            url: url.to_string(),
            designed_to_fail_pattern: None,
            failsafe_sentinel: None,
        }
    }

    pub fn with_designed_to_fail(mut self, pattern: &str) -> Self {
        self.designed_to_fail_pattern = Some(pattern.to_string());
        self
    }

    pub fn with_failsafe_sentinel(mut self, sentinel: &str) -> Self {
        self.failsafe_sentinel = Some(sentinel.to_string());
        self
    }
}

/// Top-level triage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// Reference parser used to confirm errors
    pub oracle: ToolConfig,
    /// Corpus search used to find files including a header
    pub scanner: ToolConfig,
    /// Maximum log files classified at once
    pub concurrency: usize,
    /// Allowed column distance between a log error and an oracle diagnostic
    pub column_tolerance: usize,
    /// Lines (ending at the error line) searched for a module declaration
    pub module_lookback: usize,
    /// Lines (ending at the error line) searched for a macro invocation
    pub macro_lookback: usize,
    /// Known projects
    pub projects: Vec<ProjectConfig>,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            oracle: ToolConfig {
                program: "slang".to_string(),
                args: vec!["--error-limit=0".to_string()],
                timeout_secs: 120,
            },
            scanner: ToolConfig {
                program: "rg".to_string(),
                args: Vec::new(),
                timeout_secs: 60,
            },
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            column_tolerance: 10,
            module_lookback: 30,
            macro_lookback: 2,
            projects: default_projects(),
        }
    }
}

impl TriageConfig {
    /// Load from a TOML file; missing keys fall back to defaults
    pub fn from_file(path: &Path) -> TriageResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| TriageError::io(path, e))?;
        toml::from_str(&text).map_err(|source| TriageError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `TRIAGE_*` environment overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(program) = var("TRIAGE_ORACLE") {
            self.oracle.program = program;
        }
        if let Some(args) = var("TRIAGE_ORACLE_ARGS") {
            match shlex::split(&args) {
                Some(args) => self.oracle.args = args,
                None => tracing::warn!(value = %args, "Ignoring unparsable TRIAGE_ORACLE_ARGS"),
            }
        }
        if let Some(program) = var("TRIAGE_SCANNER") {
            self.scanner.program = program;
        }
        if let Some(secs) = var("TRIAGE_TOOL_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.oracle.timeout_secs = secs;
            self.scanner.timeout_secs = secs;
        }
        self
    }

    /// Look up a configured project by name
    pub fn project(&self, name: &str) -> Option<&ProjectConfig> {
        self.projects.iter().find(|p| p.name == name)
    }
}

/// The smoke-test corpus, with the rules for ivtest and rsd
pub fn default_projects() -> Vec<ProjectConfig> {
    let mut projects: Vec<ProjectConfig> = [
        "https://github.com/lowRISC/ibex",
        "https://github.com/lowRISC/opentitan",
        "https://github.com/chipsalliance/sv-tests",
        "https://github.com/chipsalliance/Cores-VeeR-EH2",
        "https://github.com/chipsalliance/caliptra-rtl",
        "https://github.com/openhwgroup/cva6",
        "https://github.com/SymbiFlow/uvm",
        "https://github.com/taichi-ishitani/tnoc",
        "https://github.com/jamieiles/80x86",
        "https://github.com/SymbiFlow/XilinxUnisimLibrary",
        "https://github.com/black-parrot/black-parrot",
        "https://github.com/trivialmips/nontrivial-mips",
        "https://github.com/pulp-platform/axi",
        "https://github.com/syntacore/scr1",
        "https://github.com/olofk/serv",
        "https://github.com/bespoke-silicon-group/basejump_stl",
    ]
    .into_iter()
    .map(ProjectConfig::new)
    .collect();

    projects.push(
        ProjectConfig::new("https://github.com/steveicarus/ivtest")
            .with_designed_to_fail(r"ivtest/(\w+/)+.*(fail|error)\w*\.\w+"),
    );
    projects.push(
        ProjectConfig::new("https://github.com/rsd-devel/rsd").with_failsafe_sentinel("\"Error!\""),
    );
    projects.sort_by_key(|p| p.name.to_lowercase());
    projects
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = TriageConfig::default();
        assert_eq!(config.oracle.program, "slang");
        assert_eq!(config.oracle.args, vec!["--error-limit=0"]);
        assert_eq!(config.column_tolerance, 10);
        assert_eq!(config.module_lookback, 30);
        assert_eq!(config.macro_lookback, 2);
        assert_eq!(config.projects.len(), 18);
        assert!(config.concurrency >= 1);
    }

    #[test]
    fn test_project_rules_present() {
        let config = TriageConfig::default();
        let ivtest = config.project("ivtest").unwrap();
        assert!(ivtest.designed_to_fail_pattern.is_some());
        let rsd = config.project("rsd").unwrap();
        assert_eq!(rsd.failsafe_sentinel.as_deref(), Some("\"Error!\""));
        assert!(config.project("ibex").unwrap().failsafe_sentinel.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: TriageConfig = toml::from_str(
            r#"
            column_tolerance = 4

            [oracle]
            program = "/opt/slang/bin/slang"
            timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.column_tolerance, 4);
        assert_eq!(config.oracle.program, "/opt/slang/bin/slang");
        assert!(config.oracle.args.is_empty());
        assert_eq!(config.scanner.program, "rg");
        assert_eq!(config.projects.len(), 18);
    }

    #[test]
    fn test_overrides() {
        let vars = HashMap::from([
            ("TRIAGE_ORACLE", "slang-nightly"),
            ("TRIAGE_ORACLE_ARGS", "--error-limit=0 -I 'inc dir'"),
            ("TRIAGE_TOOL_TIMEOUT_SECS", "7"),
        ]);
        let lookup = |key: &str| vars.get(key).map(|v| v.to_string());
        let config = TriageConfig::default().with_overrides(lookup);
        assert_eq!(config.oracle.program, "slang-nightly");
        assert_eq!(config.oracle.args, vec!["--error-limit=0", "-I", "inc dir"]);
        assert_eq!(config.oracle.timeout_secs, 7);
        assert_eq!(config.scanner.timeout_secs, 7);
        assert_eq!(config.scanner.program, "rg");
    }
}
