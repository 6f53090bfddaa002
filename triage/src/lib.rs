//! Smoke-test error log triage
//!
//! This library classifies every line of a failing parser run's stderr
//! into one root-cause category:
//! - Pattern rules plus a per-file state machine track cascading errors
//! - An inclusion scan spots header fragments that cannot parse alone
//! - An independent reference parser (slang) confirms real syntax faults
//!
//! Per-project tallies are checked for cross-category consistency before
//! they are reported.
//!
//! # Usage
//!
//! ```rust,ignore
//! use triage::{discovery, Pipeline, TriageConfig};
//!
//! let pipeline = Pipeline::with_default_tools(TriageConfig::default());
//! let job = discovery::project_jobs("ibex", &log_dir, &checkout)?;
//! let outcome = pipeline.classify_project(&job).await?;
//! println!("{} errors", outcome.summary.total);
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod aggregate;
pub mod classifier;
pub mod config;
pub mod discovery;
pub mod error;
pub mod locator;
pub mod oracle;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod scanner;
pub mod tool;

pub use aggregate::{Aggregator, CategoryCounts, ProjectSummary};
pub use classifier::{ClassifierState, ProjectProfile, RuleContext, RuleEngine};
pub use config::{ProjectConfig, ToolConfig, TriageConfig};
pub use error::{ToolError, TriageError, TriageResult};
pub use locator::Locator;
pub use oracle::{Oracle, SlangOracle};
pub use pipeline::{Pipeline, ProjectOutcome};
pub use record::{CategoryTag, ErrorRecord};
pub use report::{ToolVersion, TriageReport};
pub use scanner::{InclusionScanner, RipgrepScanner, WalkScanner};
