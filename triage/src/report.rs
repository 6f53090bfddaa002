//! Triage Report: structured and Markdown output of a run

use crate::aggregate::ProjectSummary;
use crate::record::CategoryTag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Version string of one external tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolVersion {
    pub tool: String,
    /// `None` when the tool could not be probed
    pub version: Option<String>,
}

/// Complete result of a triage run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageReport {
    pub generated_at: DateTime<Utc>,
    pub projects: Vec<ProjectSummary>,
    #[serde(default)]
    pub tool_versions: Vec<ToolVersion>,
}

impl Default for TriageReport {
    fn default() -> Self {
        Self::new()
    }
}

impl TriageReport {
    pub fn new() -> Self {
        Self {
            generated_at: Utc::now(),
            projects: Vec::new(),
            tool_versions: Vec::new(),
        }
    }

    pub fn add_project(&mut self, summary: ProjectSummary) {
        self.projects.push(summary);
    }

    pub fn add_tool_version(&mut self, tool: impl Into<String>, version: Option<String>) {
        self.tool_versions.push(ToolVersion {
            tool: tool.into(),
            version,
        });
    }

    /// Records across all projects
    pub fn total(&self) -> usize {
        self.projects.iter().map(|p| p.total).sum()
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let undefined: usize = self
            .projects
            .iter()
            .map(|p| p.count(CategoryTag::Undefined))
            .sum();
        format!(
            "{} projects, {} errors, {} undefined",
            self.projects.len(),
            self.total(),
            undefined
        )
    }

    /// Render as Markdown
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# Smoke test result analysis\n");
        md.push_str(
            "Each non-zero exit of the smoke test saved the stderr of that run, one error \
             per line. Every error is classified into one of the categories below.\n\n",
        );
        md.push_str("Error categories:\n\n");
        for tag in CategoryTag::ALL {
            let _ = writeln!(md, " - `{}`: {}", tag, tag.description());
        }

        for project in &self.projects {
            let _ = writeln!(md, "\n# {}\n", project.project);
            md.push_str("| Name | Count |\n|:--- |:--- |\n");
            let _ = writeln!(md, "| All | {} |", project.total);
            for (tag, count) in project.nonzero() {
                let _ = writeln!(md, "| {tag} | {count} |");
            }
            if project.followups > 0 {
                let _ = writeln!(
                    md,
                    "\n{} errors need manual follow-up (external tool failure).",
                    project.followups
                );
            }
        }

        md.push_str("\n# Version info\n");
        if self.tool_versions.is_empty() {
            md.push_str("\nNo tool versions recorded.\n");
        }
        for tv in &self.tool_versions {
            let _ = writeln!(md, "\n## {}\n", tv.tool);
            match &tv.version {
                Some(v) => {
                    let _ = writeln!(md, "{v}");
                }
                None => {
                    let _ = writeln!(md, "{} version not available", tv.tool);
                }
            }
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::record::ErrorRecord;

    fn summary(project: &str, tags: &[CategoryTag]) -> ProjectSummary {
        let mut agg = Aggregator::new();
        agg.register(project);
        for tag in tags {
            let mut r = ErrorRecord::from_log_line(project, "a.sv", "a.sv:1:1: x").unwrap();
            r.category = *tag;
            agg.record(&r);
        }
        agg.summary(project).unwrap()
    }

    #[test]
    fn test_markdown_tables() {
        let mut report = TriageReport::new();
        report.add_project(summary(
            "ibex",
            &[CategoryTag::StandaloneHeader, CategoryTag::StandaloneHeader],
        ));
        report.add_project(summary("serv", &[]));
        report.add_tool_version("slang", Some("slang version 5.0.0".to_string()));
        report.add_tool_version("verible", None);

        let md = report.to_markdown();
        assert!(md.contains("# ibex"));
        assert!(md.contains("| All | 2 |"));
        assert!(md.contains("| standalone-header | 2 |"));
        assert!(md.contains("# serv"));
        assert!(md.contains("| All | 0 |"));
        assert!(!md.contains("| undefined |"));
        assert!(md.contains("slang version 5.0.0"));
        assert!(md.contains("verible version not available"));
        assert!(md.contains("`related-to-likely-unhandled-macro-call`"));
    }

    #[test]
    fn test_summary_and_json() {
        let mut report = TriageReport::new();
        report.add_project(summary("a", &[CategoryTag::Undefined, CategoryTag::UnresolvedMacro]));
        report.add_project(summary("b", &[CategoryTag::Undefined]));
        assert_eq!(report.total(), 3);
        assert_eq!(report.summary(), "2 projects, 3 errors, 2 undefined");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["projects"][0]["project"], "a");
        assert_eq!(json["projects"][0]["counts"][5][0], "unresolved-macro");
        assert_eq!(json["projects"][0]["counts"][5][1], 1);
    }
}
