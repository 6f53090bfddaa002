//! Error records and the closed set of triage categories

use crate::error::TriageResult;
use crate::locator::Locator;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Root-cause category assigned to one log line
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryTag {
    /// No rule, scan or oracle check explained the error
    #[default]
    Undefined,
    /// The reference parser reports the same error
    SlangVerifiedError,
    /// Cascade after an oracle-verified error in the same file
    RelatedToSlangValidatedError,
    /// Macro call inside a module parameter list
    MacroCallInModuleParams,
    /// Cascade after a macro call in module parameters
    CausedByMacroCallInModuleParams,
    /// Macro identifier could not be expanded
    UnresolvedMacro,
    /// Intentionally failing test input
    TestDesignedToFail,
    /// Other preprocessor-token syntax error
    MiscPreprocessor,
    /// Cascade after a misc preprocessor error
    MiscPreprocessorRelated,
    /// Header that only parses when included elsewhere
    StandaloneHeader,
    /// Branch of an `ifdef` tree that fails on purpose
    HitPreprocessorFailsafe,
    /// Macro call right above the error likely dropped tokens
    LikelyUnhandledMacroCall,
    /// Cascade after a likely unhandled macro call
    RelatedToLikelyUnhandledMacroCall,
}

impl CategoryTag {
    /// Every tag, in report order
    pub const ALL: [CategoryTag; 13] = [
        Self::Undefined,
        Self::SlangVerifiedError,
        Self::RelatedToSlangValidatedError,
        Self::MacroCallInModuleParams,
        Self::CausedByMacroCallInModuleParams,
        Self::UnresolvedMacro,
        Self::TestDesignedToFail,
        Self::MiscPreprocessor,
        Self::MiscPreprocessorRelated,
        Self::StandaloneHeader,
        Self::HitPreprocessorFailsafe,
        Self::LikelyUnhandledMacroCall,
        Self::RelatedToLikelyUnhandledMacroCall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::SlangVerifiedError => "slang-verified-error",
            Self::RelatedToSlangValidatedError => "related-to-slang-validated-error",
            Self::MacroCallInModuleParams => "macro-call-in-module-params",
            Self::CausedByMacroCallInModuleParams => "caused-by-macro-call-in-module-params",
            Self::UnresolvedMacro => "unresolved-macro",
            Self::TestDesignedToFail => "test-designed-to-fail",
            Self::MiscPreprocessor => "misc-preprocessor",
            Self::MiscPreprocessorRelated => "misc-preprocessor-related",
            Self::StandaloneHeader => "standalone-header",
            Self::HitPreprocessorFailsafe => "hit-preprocessor-failsafe",
            Self::LikelyUnhandledMacroCall => "likely-unhandled-macro-call",
            Self::RelatedToLikelyUnhandledMacroCall => "related-to-likely-unhandled-macro-call",
        }
    }

    /// One-paragraph explanation used in the rendered report
    pub fn description(&self) -> &'static str {
        match self {
            Self::Undefined => "Errors that do not fit any criteria",
            Self::SlangVerifiedError => {
                "Errors that are also reported by slang, verifying their legitimacy"
            }
            Self::RelatedToSlangValidatedError => {
                "Errors that occurred after a slang-verified error; after a real syntax \
                 error many later tokens no longer fit"
            }
            Self::MacroCallInModuleParams => {
                "Errors caused by a macro call in a module parameter list, which usually \
                 hides delimiters from the parser"
            }
            Self::CausedByMacroCallInModuleParams => {
                "Syntax errors caused by tokens missing after a macro call in module parameters"
            }
            Self::UnresolvedMacro => "Errors caused by an unresolved macro call",
            Self::TestDesignedToFail => "Errors that are intentional, e.g. in ivtest",
            Self::MiscPreprocessor => {
                "Errors on preprocessor tokens not covered by the other categories"
            }
            Self::MiscPreprocessorRelated => {
                "Errors that likely appeared because of an earlier preprocessor problem"
            }
            Self::StandaloneHeader => {
                "Errors in a header file that should not be parsed outside of the file \
                 that includes it"
            }
            Self::HitPreprocessorFailsafe => {
                "A preprocessor ifdef/else decision tree selected a branch that fails on purpose"
            }
            Self::LikelyUnhandledMacroCall => {
                "A macro call right above the syntax error likely carried tokens that are \
                 missing now"
            }
            Self::RelatedToLikelyUnhandledMacroCall => {
                "Syntax errors that follow a likely unhandled macro call"
            }
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }
}

impl std::fmt::Display for CategoryTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One error occurrence from a failing run's log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Project the failing run belongs to
    pub project: String,
    /// Source path relative to the project checkout
    pub source_path: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// First column of the reported span
    pub col_start: usize,
    /// Last column of the reported span
    pub col_end: usize,
    /// Assigned category
    pub category: CategoryTag,
    /// The log line as captured
    pub raw_text: String,
    /// Oracle diagnostics consulted for this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oracle_output: Option<Arc<Vec<String>>>,
    /// Inclusion scan matches consulted for this record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_output: Option<Arc<Vec<String>>>,
    /// Why the record needs manual follow-up, if it does
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followup: Option<String>,
}

impl ErrorRecord {
    /// Build a record from one log line.
    ///
    /// Fails when the line has no locator; no record may exist without a position.
    pub fn from_log_line(
        project: impl Into<String>,
        source_path: impl Into<String>,
        raw_text: &str,
    ) -> TriageResult<Self> {
        let locator = Locator::extract(raw_text)?;
        Ok(Self {
            project: project.into(),
            source_path: source_path.into(),
            line: locator.line,
            col_start: locator.col_start,
            col_end: locator.col_end,
            category: CategoryTag::Undefined,
            raw_text: raw_text.trim_end_matches(['\r', '\n']).to_string(),
            oracle_output: None,
            scan_output: None,
            followup: None,
        })
    }

    /// Name of the source file without its directories
    pub fn file_name(&self) -> &str {
        self.source_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.source_path)
    }
}

impl std::fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} {}:{}:{}-{}: {}",
            self.category,
            self.project,
            self.source_path,
            self.line,
            self.col_start,
            self.col_end,
            self.raw_text
        )
    }
}
