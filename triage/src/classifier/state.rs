//! Per-file classifier state
//!
//! One value lives for the duration of one log file and remembers which
//! kind of damaged region the parser is currently in. It never crosses
//! file boundaries.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierState {
    /// No open region
    #[default]
    Normal,
    /// Inside a module whose parameter list was damaged by a macro call;
    /// closed by a syntax error on `endmodule`
    ModuleDefine,
    /// A previous line was confirmed by the oracle
    SlangVerified,
    /// A previous line failed on a non-directive preprocessor token
    MiscPreprocessor,
    /// A previous line sat right below a likely unhandled macro call
    MacroCallSyntax,
}

impl std::fmt::Display for ClassifierState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::ModuleDefine => write!(f, "module_define"),
            Self::SlangVerified => write!(f, "slang_verified"),
            Self::MiscPreprocessor => write!(f, "misc_preprocessor"),
            Self::MacroCallSyntax => write!(f, "macro_call_syntax"),
        }
    }
}
