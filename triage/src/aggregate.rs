//! Per-project category tallies and their consistency checks

use crate::error::{TriageError, TriageResult};
use crate::record::{CategoryTag, ErrorRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A cascade category may only appear once the category it follows has
const CASCADE_RULES: [(CategoryTag, CategoryTag); 3] = [
    (
        CategoryTag::RelatedToSlangValidatedError,
        CategoryTag::SlangVerifiedError,
    ),
    (
        CategoryTag::MiscPreprocessorRelated,
        CategoryTag::MiscPreprocessor,
    ),
    (
        CategoryTag::RelatedToLikelyUnhandledMacroCall,
        CategoryTag::LikelyUnhandledMacroCall,
    ),
];

/// Counts for one project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    /// Records absorbed
    pub total: usize,
    /// Records per category
    pub by_category: BTreeMap<CategoryTag, usize>,
    /// Records flagged for manual follow-up
    pub followups: usize,
}

impl CategoryCounts {
    pub fn count(&self, tag: CategoryTag) -> usize {
        self.by_category.get(&tag).copied().unwrap_or(0)
    }

    fn add(&mut self, record: &ErrorRecord) {
        self.total += 1;
        *self.by_category.entry(record.category).or_insert(0) += 1;
        if record.followup.is_some() {
            self.followups += 1;
        }
    }

    /// Every violated invariant, described
    pub fn violations(&self) -> Vec<String> {
        let mut found = Vec::new();

        let sum: usize = self.by_category.values().sum();
        if sum != self.total {
            found.push(format!(
                "category counts sum to {sum} but {} records were absorbed",
                self.total
            ));
        }

        for (derived, required) in CASCADE_RULES {
            if self.count(derived) > 0 && self.count(required) == 0 {
                found.push(format!(
                    "{} {derived} records without any {required}",
                    self.count(derived)
                ));
            }
        }

        found
    }
}

/// Single-writer reduction of classified records into per-project counts
#[derive(Debug, Default)]
pub struct Aggregator {
    projects: BTreeMap<String, CategoryCounts>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one record under its project
    pub fn record(&mut self, record: &ErrorRecord) {
        self.projects
            .entry(record.project.clone())
            .or_default()
            .add(record);
    }

    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a ErrorRecord>) {
        for record in records {
            self.record(record);
        }
    }

    /// Make sure `project` shows up even when it produced no records
    pub fn register(&mut self, project: &str) {
        self.projects.entry(project.to_string()).or_default();
    }

    pub fn counts(&self, project: &str) -> Option<&CategoryCounts> {
        self.projects.get(project)
    }

    pub fn total(&self, project: &str) -> usize {
        self.counts(project).map_or(0, |c| c.total)
    }

    pub fn count(&self, project: &str, tag: CategoryTag) -> usize {
        self.counts(project).map_or(0, |c| c.count(tag))
    }

    pub fn projects(&self) -> impl Iterator<Item = &str> {
        self.projects.keys().map(String::as_str)
    }

    /// Fail when the rule engine produced an inconsistent tally for `project`.
    ///
    /// A violation means the classifier itself is broken; the caller must not
    /// report the numbers.
    pub fn check_invariants(&self, project: &str) -> TriageResult<()> {
        let Some(counts) = self.counts(project) else {
            return Ok(());
        };
        let violations = counts.violations();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(TriageError::InvariantViolation {
                project: project.to_string(),
                detail: violations.join("; "),
            })
        }
    }

    /// Checked summary for one project
    pub fn summary(&self, project: &str) -> TriageResult<ProjectSummary> {
        self.check_invariants(project)?;
        let counts = self.counts(project).cloned().unwrap_or_default();
        Ok(ProjectSummary::new(project, counts))
    }
}

/// Final, invariant-checked numbers for one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project: String,
    pub total: usize,
    /// All categories, zero-filled, in report order
    pub counts: Vec<(CategoryTag, usize)>,
    pub followups: usize,
}

impl ProjectSummary {
    fn new(project: &str, counts: CategoryCounts) -> Self {
        Self {
            project: project.to_string(),
            total: counts.total,
            counts: CategoryTag::ALL
                .iter()
                .map(|tag| (*tag, counts.count(*tag)))
                .collect(),
            followups: counts.followups,
        }
    }

    pub fn count(&self, tag: CategoryTag) -> usize {
        self.counts
            .iter()
            .find(|(t, _)| *t == tag)
            .map_or(0, |(_, n)| *n)
    }

    /// Categories that actually occurred
    pub fn nonzero(&self) -> impl Iterator<Item = &(CategoryTag, usize)> {
        self.counts.iter().filter(|(_, n)| *n > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(project: &str, category: CategoryTag) -> ErrorRecord {
        let mut r = ErrorRecord::from_log_line(project, "a.sv", "a.sv:1:1: syntax error").unwrap();
        r.category = category;
        r
    }

    #[test]
    fn test_counts_sum_to_total() {
        let mut agg = Aggregator::new();
        agg.record(&rec("ibex", CategoryTag::Undefined));
        agg.record(&rec("ibex", CategoryTag::StandaloneHeader));
        agg.record(&rec("ibex", CategoryTag::StandaloneHeader));
        agg.record(&rec("axi", CategoryTag::UnresolvedMacro));

        assert_eq!(agg.total("ibex"), 3);
        assert_eq!(agg.count("ibex", CategoryTag::StandaloneHeader), 2);
        assert_eq!(agg.total("axi"), 1);
        assert_eq!(agg.total("missing"), 0);
        assert!(agg.check_invariants("ibex").is_ok());

        let summary = agg.summary("ibex").unwrap();
        assert_eq!(summary.counts.len(), CategoryTag::ALL.len());
        assert_eq!(
            summary.counts.iter().map(|(_, n)| n).sum::<usize>(),
            summary.total
        );
        assert_eq!(summary.nonzero().count(), 2);
    }

    #[test]
    fn test_cascade_without_root_is_violation() {
        for (derived, required) in CASCADE_RULES {
            let mut agg = Aggregator::new();
            agg.record(&rec("p", derived));
            let err = agg.check_invariants("p").unwrap_err();
            assert!(matches!(err, TriageError::InvariantViolation { .. }));
            assert!(agg.summary("p").is_err());

            agg.record(&rec("p", required));
            assert!(agg.check_invariants("p").is_ok());
        }
    }

    #[test]
    fn test_followups_counted() {
        let mut agg = Aggregator::new();
        let mut r = rec("p", CategoryTag::Undefined);
        r.followup = Some("slang timed out after 1s".to_string());
        agg.record(&r);
        agg.record(&rec("p", CategoryTag::Undefined));
        assert_eq!(agg.counts("p").unwrap().followups, 1);
    }

    #[test]
    fn test_registered_empty_project() {
        let mut agg = Aggregator::new();
        agg.register("serv");
        let summary = agg.summary("serv").unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(agg.projects().collect::<Vec<_>>(), vec!["serv"]);
    }

    #[test]
    fn test_tampered_counts_detected() {
        let counts = CategoryCounts {
            total: 3,
            by_category: [(CategoryTag::Undefined, 2)].into_iter().collect(),
            followups: 0,
        };
        assert_eq!(counts.violations().len(), 1);
    }
}
