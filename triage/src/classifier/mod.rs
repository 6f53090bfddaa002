//! Line classifier: pattern rules driven by a per-file state machine
//!
//! # Rule order
//!
//! ```text
//! unresolved_macro → slang_verified_cascade → preprocessor_token
//!   → endmodule_closes_region → macro_call_cascade
//!   → designed_to_fail → preprocessor_failsafe → likely_unhandled_macro_call
//! ```
//!
//! Rules are guarded overwrites applied in sequence, so a later rule may
//! replace what an earlier one assigned. The order is part of the contract;
//! see [`RuleEngine::rule_names`].

pub mod rules;
pub mod state;

pub use rules::{NamedRule, Rule, RuleEngine};
pub use state::ClassifierState;

use crate::config::{ProjectConfig, TriageConfig};
use crate::error::{TriageError, TriageResult};
use regex::Regex;

/// Project-specific rules, compiled once per project
#[derive(Debug, Clone)]
pub struct ProjectProfile {
    pub name: String,
    designed_to_fail: Option<Regex>,
    failsafe_sentinel: Option<String>,
}

impl ProjectProfile {
    /// Profile for a project with no special rules
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            designed_to_fail: None,
            failsafe_sentinel: None,
        }
    }

    pub fn from_config(project: &ProjectConfig) -> TriageResult<Self> {
        let designed_to_fail = project
            .designed_to_fail_pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| TriageError::InvalidPattern {
                    project: project.name.clone(),
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .transpose()?;

        Ok(Self {
            name: project.name.clone(),
            designed_to_fail,
            failsafe_sentinel: project.failsafe_sentinel.clone(),
        })
    }

    /// Profile for `name`, or a plain one when the project is not configured
    pub fn lookup(config: &TriageConfig, name: &str) -> TriageResult<Self> {
        match config.project(name) {
            Some(project) => Self::from_config(project),
            None => Ok(Self::plain(name)),
        }
    }

    /// Whether the log line points at an input that is meant to fail
    pub fn is_designed_to_fail(&self, line: &str) -> bool {
        self.designed_to_fail
            .as_ref()
            .is_some_and(|re| re.is_match(line))
    }

    /// Whether the log line carries the project's failsafe diagnostic
    pub fn hits_failsafe(&self, line: &str) -> bool {
        self.failsafe_sentinel
            .as_deref()
            .is_some_and(|sentinel| line.contains(sentinel))
    }
}

/// Everything a rule may look at besides the record and the state
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Source file the log refers to, one entry per line
    pub source: &'a [String],
    pub profile: &'a ProjectProfile,
    /// Window size for the module-declaration search
    pub module_lookback: usize,
    /// Window size for the macro-invocation search
    pub macro_lookback: usize,
}

impl<'a> RuleContext<'a> {
    pub fn new(source: &'a [String], profile: &'a ProjectProfile, config: &TriageConfig) -> Self {
        Self {
            source,
            profile,
            module_lookback: config.module_lookback,
            macro_lookback: config.macro_lookback,
        }
    }

    /// Up to `size` source lines ending with (and including) `line`
    pub fn window(&self, line: usize, size: usize) -> &'a [String] {
        let end = line.min(self.source.len());
        let start = line.saturating_sub(size).min(end);
        &self.source[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("line {i}")).collect()
    }

    #[test]
    fn test_window_ends_at_error_line() {
        let src = lines(50);
        let profile = ProjectProfile::plain("p");
        let ctx = RuleContext::new(&src, &profile, &TriageConfig::default());
        let w = ctx.window(41, 30);
        assert_eq!(w.len(), 30);
        assert_eq!(w.first().unwrap(), "line 12");
        assert_eq!(w.last().unwrap(), "line 41");
    }

    #[test]
    fn test_window_clamps() {
        let src = lines(5);
        let profile = ProjectProfile::plain("p");
        let ctx = RuleContext::new(&src, &profile, &TriageConfig::default());
        assert_eq!(ctx.window(2, 30).len(), 2);
        assert_eq!(ctx.window(99, 2).len(), 0);
        assert_eq!(ctx.window(0, 2).len(), 0);
    }

    #[test]
    fn test_profile_rules() {
        let config = TriageConfig::default();
        let ivtest = ProjectProfile::lookup(&config, "ivtest").unwrap();
        let failing = "ivtest/ivltests/br_gh_fail3.v:4:1: syntax error at token \"x\"";
        let passing = "ivtest/ivltests/good.v:4:1: syntax error";
        assert!(ivtest.is_designed_to_fail(failing));
        assert!(!ivtest.is_designed_to_fail(passing));

        let rsd = ProjectProfile::lookup(&config, "rsd").unwrap();
        assert!(rsd.hits_failsafe("x.sv:1:1: \"Error!\""));

        let unknown = ProjectProfile::lookup(&config, "not-configured").unwrap();
        assert!(!unknown.is_designed_to_fail("ivtest/a/fail.v"));
        assert!(!unknown.hits_failsafe("\"Error!\""));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let project = ProjectConfig::new("https://example.com/x").with_designed_to_fail("(");
        assert!(matches!(
            ProjectProfile::from_config(&project),
            Err(TriageError::InvalidPattern { .. })
        ));
    }
}
