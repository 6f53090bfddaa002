//! Triage pipeline: per-file classification and per-project fan-out
//!
//! ```text
//! log line → ErrorRecord → RuleEngine → (undefined?) InclusionScanner
//!                                     → (undefined?) Oracle → record
//! ```
//!
//! Lines of one file are processed strictly in order because the rules
//! share a [`ClassifierState`]. Files are independent: they are fanned out
//! over a `JoinSet` bounded by a semaphore, then reduced into the
//! [`Aggregator`] in discovery order by a single writer.

use crate::aggregate::{Aggregator, ProjectSummary};
use crate::classifier::{ClassifierState, ProjectProfile, RuleContext, RuleEngine};
use crate::config::TriageConfig;
use crate::discovery::{read_lossy, FileJob, ProjectJob};
use crate::error::{ToolError, TriageResult};
use crate::oracle::{apply_verification, join_messages, Oracle, SlangOracle};
use crate::record::{CategoryTag, ErrorRecord};
use crate::scanner::{InclusionScanner, RipgrepScanner};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Lazily fetched external-tool output, shared by all records of one file
#[derive(Debug, Default)]
enum Cached {
    #[default]
    Pending,
    Ready(Arc<Vec<String>>),
    Failed(ToolError),
}

/// Per-file caches so each tool runs at most once per source file
#[derive(Debug, Default)]
struct FileCache {
    scan: Cached,
    oracle: Cached,
    oracle_messages: Option<Arc<Vec<String>>>,
}

/// Classified records of one project plus their checked summary
#[derive(Debug, Clone)]
pub struct ProjectOutcome {
    pub records: Vec<ErrorRecord>,
    pub summary: ProjectSummary,
}

/// The classifier with its external tools
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<TriageConfig>,
    engine: RuleEngine,
    oracle: Arc<dyn Oracle>,
    scanner: Arc<dyn InclusionScanner>,
}

impl Pipeline {
    pub fn new(
        config: TriageConfig,
        oracle: Arc<dyn Oracle>,
        scanner: Arc<dyn InclusionScanner>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            engine: RuleEngine::standard(),
            oracle,
            scanner,
        }
    }

    /// Pipeline backed by slang and ripgrep as configured
    pub fn with_default_tools(config: TriageConfig) -> Self {
        let oracle = Arc::new(SlangOracle::new(config.oracle.clone()));
        let scanner = Arc::new(RipgrepScanner::new(config.scanner.clone()));
        Self::new(config, oracle, scanner)
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    /// Classify one failing run.
    ///
    /// `checkout` is the project root the scanner searches and the oracle
    /// resolves `source_path` against. State starts at `Normal` and is
    /// dropped on return.
    pub async fn classify_lines(
        &self,
        profile: &ProjectProfile,
        checkout: &Path,
        source_path: &str,
        source: &[String],
        log_lines: &[String],
    ) -> TriageResult<Vec<ErrorRecord>> {
        let ctx = RuleContext::new(source, profile, &self.config);
        let abs_source = checkout.join(source_path);
        let mut state = ClassifierState::Normal;
        let mut cache = FileCache::default();
        let mut records = Vec::with_capacity(log_lines.len());

        for line in log_lines {
            if line.trim().is_empty() {
                continue;
            }
            let mut record = ErrorRecord::from_log_line(&profile.name, source_path, line)?;
            self.engine.classify(&mut record, &mut state, &ctx);

            if record.category.is_undefined() {
                self.check_inclusion(&mut record, &mut cache, checkout).await;
            }
            if record.category.is_undefined() {
                self.check_oracle(&mut record, &mut state, &mut cache, &abs_source)
                    .await;
            }
            records.push(record);
        }

        Ok(records)
    }

    /// Read one log and its source from disk and classify it
    pub async fn classify_file(
        &self,
        profile: &ProjectProfile,
        checkout: &Path,
        job: &FileJob,
    ) -> TriageResult<Vec<ErrorRecord>> {
        let source: Vec<String> = read_lossy(&checkout.join(&job.source_path))?
            .lines()
            .map(str::to_string)
            .collect();
        let log_lines: Vec<String> = read_lossy(&job.log_path)?
            .lines()
            .map(str::to_string)
            .collect();

        let records = self
            .classify_lines(profile, checkout, &job.source_path, &source, &log_lines)
            .await?;
        tracing::debug!(
            log = %job.log_path.display(),
            source = %job.source_path,
            records = records.len(),
            "Classified log"
        );
        Ok(records)
    }

    /// Classify every failing run of a project and check its tally
    pub async fn classify_project(&self, job: &ProjectJob) -> TriageResult<ProjectOutcome> {
        let profile = Arc::new(ProjectProfile::lookup(&self.config, &job.name)?);
        let checkout = Arc::new(job.checkout.clone());
        let sem = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut join_set: JoinSet<(usize, TriageResult<Vec<ErrorRecord>>)> = JoinSet::new();

        for (idx, file) in job.files.iter().cloned().enumerate() {
            let pipeline = self.clone();
            let profile = profile.clone();
            let checkout = checkout.clone();
            let sem = sem.clone();

            join_set.spawn(async move {
                let _permit = sem.acquire_owned().await;
                let result = pipeline.classify_file(&profile, &checkout, &file).await;
                (idx, result)
            });
        }

        let mut per_file: Vec<Option<Vec<ErrorRecord>>> = vec![None; job.files.len()];
        while let Some(joined) = join_set.join_next().await {
            let (idx, result) = joined?;
            per_file[idx] = Some(result?);
        }

        let records: Vec<ErrorRecord> = per_file.into_iter().flatten().flatten().collect();

        let mut aggregator = Aggregator::new();
        aggregator.register(&job.name);
        aggregator.extend(&records);
        let summary = aggregator.summary(&job.name)?;

        tracing::info!(
            project = %job.name,
            total = summary.total,
            undefined = summary.count(CategoryTag::Undefined),
            verified = summary.count(CategoryTag::SlangVerifiedError),
            followups = summary.followups,
            "Project classified"
        );

        Ok(ProjectOutcome { records, summary })
    }

    async fn check_inclusion(&self, record: &mut ErrorRecord, cache: &mut FileCache, root: &Path) {
        if matches!(cache.scan, Cached::Pending) {
            cache.scan = match self.scanner.scan(record.file_name(), root).await {
                Ok(hits) => Cached::Ready(Arc::new(hits)),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        source = %record.source_path,
                        "Inclusion scan failed; leaving records for manual triage"
                    );
                    Cached::Failed(e)
                }
            };
        }

        match &cache.scan {
            Cached::Ready(hits) => {
                record.scan_output = Some(hits.clone());
                if !hits.is_empty() {
                    record.category = CategoryTag::StandaloneHeader;
                }
            }
            Cached::Failed(e) => record.followup = Some(e.to_string()),
            Cached::Pending => {}
        }
    }

    async fn check_oracle(
        &self,
        record: &mut ErrorRecord,
        state: &mut ClassifierState,
        cache: &mut FileCache,
        abs_source: &Path,
    ) {
        if matches!(cache.oracle, Cached::Pending) {
            cache.oracle = match self.oracle.diagnostics(abs_source).await {
                Ok(lines) => {
                    let source_key = abs_source.to_string_lossy();
                    cache.oracle_messages = Some(Arc::new(join_messages(&lines, &source_key)));
                    Cached::Ready(Arc::new(lines))
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        source = %record.source_path,
                        "Oracle failed; leaving records for manual triage"
                    );
                    Cached::Failed(e)
                }
            };
        }

        match (&cache.oracle, &cache.oracle_messages) {
            (Cached::Ready(raw), Some(messages)) => {
                record.oracle_output = Some(raw.clone());
                if apply_verification(record, state, messages, self.config.column_tolerance) {
                    // A confirmed record is settled even if the scan failed
                    record.followup = None;
                }
            }
            (Cached::Failed(e), _) => record.followup = Some(e.to_string()),
            _ => {}
        }
    }
}
