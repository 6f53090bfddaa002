//! Ordered classification rules
//!
//! Each rule is a plain function that may overwrite the record's category
//! and advance the file's state. [`RuleEngine::classify`] runs all of them,
//! in order, on every line.

use super::{ClassifierState, RuleContext};
use crate::record::{CategoryTag, ErrorRecord};

/// Marker every generic parser syntax error carries
const SYNTAX_ERROR: &str = "syntax error at token";

/// Prefix of the quoted offending token
const SYNTAX_ERROR_TOKEN: &str = "syntax error at token \"";

/// Emitted when the preprocessor cannot expand a macro
const UNRESOLVED_MACRO: &str = "Error expanding macro identifier";

/// Closes a module whose parameter list was damaged
const ENDMODULE_ERROR: &str = "syntax error at token \"endmodule\"";

/// Preprocessor directives; a backtick token naming one of these is not a macro call
const DIRECTIVES: [&str; 5] = ["include", "define", "undef", "ifdef", "ifndef"];

/// Signature shared by all rules
pub type Rule = fn(&mut ErrorRecord, &mut ClassifierState, &RuleContext<'_>);

/// A rule with the name it is logged under
#[derive(Clone, Copy)]
pub struct NamedRule {
    pub name: &'static str,
    pub apply: Rule,
}

impl std::fmt::Debug for NamedRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedRule")
            .field("name", &self.name)
            .finish()
    }
}

/// Priority-ordered rule chain
#[derive(Debug, Clone)]
pub struct RuleEngine {
    rules: Vec<NamedRule>,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::standard()
    }
}

impl RuleEngine {
    /// The rule chain used for smoke-test triage
    pub fn standard() -> Self {
        let rules = vec![
            NamedRule {
                name: "unresolved_macro",
                apply: unresolved_macro,
            },
            NamedRule {
                name: "slang_verified_cascade",
                apply: slang_verified_cascade,
            },
            NamedRule {
                name: "preprocessor_token",
                apply: preprocessor_token,
            },
            NamedRule {
                name: "endmodule_closes_region",
                apply: endmodule_closes_region,
            },
            NamedRule {
                name: "macro_call_cascade",
                apply: macro_call_cascade,
            },
            NamedRule {
                name: "designed_to_fail",
                apply: designed_to_fail,
            },
            NamedRule {
                name: "preprocessor_failsafe",
                apply: preprocessor_failsafe,
            },
            NamedRule {
                name: "likely_unhandled_macro_call",
                apply: likely_unhandled_macro_call,
            },
        ];
        Self { rules }
    }

    /// Rule names in evaluation order
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// Run every rule on one record
    pub fn classify(
        &self,
        record: &mut ErrorRecord,
        state: &mut ClassifierState,
        ctx: &RuleContext<'_>,
    ) {
        for rule in &self.rules {
            let before = (record.category, *state);
            (rule.apply)(record, state, ctx);
            if before != (record.category, *state) {
                tracing::debug!(
                    rule = rule.name,
                    line = record.line,
                    category = %record.category,
                    state = %state,
                    "Rule fired"
                );
            }
        }
    }
}

// ============================================================================
// Line predicates
// ============================================================================

fn is_syntax_error(text: &str) -> bool {
    text.contains(SYNTAX_ERROR)
}

/// Everything after the opening quote of the offending token
fn offending_token(text: &str) -> Option<&str> {
    text.find(SYNTAX_ERROR_TOKEN)
        .map(|pos| &text[pos + SYNTAX_ERROR_TOKEN.len()..])
}

fn starts_with_directive(text: &str) -> bool {
    DIRECTIVES.iter().any(|d| text.starts_with(d))
}

/// Name following a backtick, when it names something other than a directive
fn macro_name(after_backtick: &str) -> Option<&str> {
    if after_backtick.is_empty() || starts_with_directive(after_backtick) {
        None
    } else {
        Some(after_backtick)
    }
}

/// Whether the offending token is a backtick macro call
fn is_macro_token(text: &str) -> bool {
    offending_token(text)
        .and_then(|token| token.strip_prefix('`'))
        .and_then(macro_name)
        .is_some()
}

/// Whether the offending token, taken as written, does not start with a directive.
///
/// A leading backtick is part of the token here, so `` `include `` counts.
fn is_non_directive_token(text: &str) -> bool {
    offending_token(text).and_then(macro_name).is_some()
}

fn contains_macro_call(line: &str) -> bool {
    line.match_indices('`')
        .any(|(pos, _)| macro_name(&line[pos + 1..]).is_some())
}

// ============================================================================
// Rules
// ============================================================================

fn unresolved_macro(record: &mut ErrorRecord, _: &mut ClassifierState, _: &RuleContext<'_>) {
    if record.raw_text.contains(UNRESOLVED_MACRO) {
        record.category = CategoryTag::UnresolvedMacro;
    }
}

fn slang_verified_cascade(
    record: &mut ErrorRecord,
    state: &mut ClassifierState,
    _: &RuleContext<'_>,
) {
    if *state == ClassifierState::SlangVerified {
        record.category = CategoryTag::RelatedToSlangValidatedError;
    }
}

/// Header shortcut, macro-call detection, and the two region cascades.
///
/// The branches are exclusive; the first that applies wins.
fn preprocessor_token(
    record: &mut ErrorRecord,
    state: &mut ClassifierState,
    ctx: &RuleContext<'_>,
) {
    let text = record.raw_text.as_str();

    if record.source_path.ends_with(".svh") && is_non_directive_token(text) {
        record.category = CategoryTag::StandaloneHeader;
    } else if is_macro_token(text) {
        let in_module = ctx
            .window(record.line, ctx.module_lookback)
            .iter()
            .any(|l| l.contains("module"));
        if in_module {
            *state = ClassifierState::ModuleDefine;
            record.category = CategoryTag::MacroCallInModuleParams;
        } else {
            *state = ClassifierState::MiscPreprocessor;
            record.category = CategoryTag::MiscPreprocessor;
        }
    } else if *state == ClassifierState::MiscPreprocessor && is_syntax_error(text) {
        record.category = CategoryTag::MiscPreprocessorRelated;
    } else if *state == ClassifierState::ModuleDefine && is_syntax_error(text) {
        record.category = CategoryTag::CausedByMacroCallInModuleParams;
    }
}

fn endmodule_closes_region(
    record: &mut ErrorRecord,
    state: &mut ClassifierState,
    _: &RuleContext<'_>,
) {
    if *state == ClassifierState::ModuleDefine && record.raw_text.contains(ENDMODULE_ERROR) {
        *state = ClassifierState::Normal;
    }
}

fn macro_call_cascade(record: &mut ErrorRecord, state: &mut ClassifierState, _: &RuleContext<'_>) {
    if *state == ClassifierState::MacroCallSyntax && is_syntax_error(&record.raw_text) {
        record.category = CategoryTag::RelatedToLikelyUnhandledMacroCall;
    }
}

fn designed_to_fail(record: &mut ErrorRecord, _: &mut ClassifierState, ctx: &RuleContext<'_>) {
    if ctx.profile.is_designed_to_fail(&record.raw_text) {
        record.category = CategoryTag::TestDesignedToFail;
    }
}

fn preprocessor_failsafe(record: &mut ErrorRecord, _: &mut ClassifierState, ctx: &RuleContext<'_>) {
    if ctx.profile.hits_failsafe(&record.raw_text) {
        record.category = CategoryTag::HitPreprocessorFailsafe;
    }
}

fn likely_unhandled_macro_call(
    record: &mut ErrorRecord,
    state: &mut ClassifierState,
    ctx: &RuleContext<'_>,
) {
    if !record.category.is_undefined() || !is_syntax_error(&record.raw_text) {
        return;
    }
    let macro_above = ctx
        .window(record.line, ctx.macro_lookback)
        .iter()
        .any(|l| contains_macro_call(l));
    if macro_above {
        record.category = CategoryTag::LikelyUnhandledMacroCall;
        *state = ClassifierState::MacroCallSyntax;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ProjectProfile;
    use crate::config::TriageConfig;

    fn classify(
        project: &str,
        path: &str,
        source: &[String],
        line: &str,
        state: &mut ClassifierState,
    ) -> CategoryTag {
        let config = TriageConfig::default();
        let profile = ProjectProfile::lookup(&config, project).unwrap();
        let ctx = RuleContext::new(source, &profile, &config);
        let mut record = ErrorRecord::from_log_line(project, path, line).unwrap();
        RuleEngine::standard().classify(&mut record, state, &ctx);
        record.category
    }

    fn plain_source(n: usize) -> Vec<String> {
        (0..n).map(|_| "assign a = b;".to_string()).collect()
    }

    #[test]
    fn test_rule_order() {
        assert_eq!(
            RuleEngine::standard().rule_names(),
            vec![
                "unresolved_macro",
                "slang_verified_cascade",
                "preprocessor_token",
                "endmodule_closes_region",
                "macro_call_cascade",
                "designed_to_fail",
                "preprocessor_failsafe",
                "likely_unhandled_macro_call",
            ]
        );
    }

    #[test]
    fn test_token_predicates() {
        assert!(is_macro_token("syntax error at token \"`FOO\""));
        assert!(!is_macro_token("syntax error at token \"`include\""));
        assert!(!is_macro_token("syntax error at token \"`ifdefx\""));
        assert!(!is_macro_token("syntax error at token \"x\""));
        assert!(is_non_directive_token("syntax error at token \"z\""));
        assert!(!is_non_directive_token("syntax error at token \"define\""));
        assert!(is_non_directive_token("syntax error at token \"`undef\""));
        assert!(!is_non_directive_token("syntax error at token \""));
        assert!(contains_macro_call("  `uvm_info(\"x\")"));
        assert!(!contains_macro_call("`include \"a.svh\""));
        assert!(!contains_macro_call("trailing tick `"));
    }

    #[test]
    fn test_plain_syntax_error_stays_undefined() {
        let mut state = ClassifierState::Normal;
        let cat = classify(
            "ibex",
            "foo.sv",
            &plain_source(20),
            "foo.sv:10:5: syntax error at token \"x\"",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::Undefined);
        assert_eq!(state, ClassifierState::Normal);
    }

    #[test]
    fn test_unresolved_macro() {
        let mut state = ClassifierState::Normal;
        let cat = classify(
            "ibex",
            "foo.sv",
            &plain_source(20),
            "foo.sv:3:1: Error expanding macro identifier, might not be defined before.",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::UnresolvedMacro);
    }

    #[test]
    fn test_slang_verified_cascade_overrides_unresolved() {
        let mut state = ClassifierState::SlangVerified;
        let cat = classify(
            "ibex",
            "foo.sv",
            &plain_source(20),
            "foo.sv:3:1: Error expanding macro identifier",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::RelatedToSlangValidatedError);
        assert_eq!(state, ClassifierState::SlangVerified);
    }

    #[test]
    fn test_header_shortcut() {
        let mut state = ClassifierState::Normal;
        let cat = classify(
            "ibex",
            "rtl/bar.svh",
            &plain_source(5),
            "rtl/bar.svh:3:1: syntax error at token \"z\"",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::StandaloneHeader);

        let cat = classify(
            "ibex",
            "rtl/bar.svh",
            &plain_source(5),
            "rtl/bar.svh:3:1: syntax error at token \"ifndef\"",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::Undefined);
    }

    #[test]
    fn test_header_shortcut_takes_backtick_directives() {
        let mut state = ClassifierState::Normal;
        let cat = classify(
            "ibex",
            "rtl/bar.svh",
            &plain_source(5),
            "rtl/bar.svh:3:1: syntax error at token \"`include\"",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::StandaloneHeader);
        assert_eq!(state, ClassifierState::Normal);

        // Outside a header the same token is a directive, not a macro call
        let cat = classify(
            "ibex",
            "rtl/bar.sv",
            &plain_source(5),
            "rtl/bar.sv:3:1: syntax error at token \"`include\"",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::Undefined);
    }

    #[test]
    fn test_macro_call_in_module_params_region() {
        let mut source = plain_source(60);
        source[20] = "module top #(".to_string();
        source[40] = "  `FOO(bar)".to_string();
        let mut state = ClassifierState::Normal;

        let cat = classify(
            "ibex",
            "top.sv",
            &source,
            "top.sv:41:3: syntax error at token \"`FOO\"",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::MacroCallInModuleParams);
        assert_eq!(state, ClassifierState::ModuleDefine);

        let cat = classify(
            "ibex",
            "top.sv",
            &source,
            "top.sv:45:1: syntax error at token \"logic\"",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::CausedByMacroCallInModuleParams);

        let cat = classify(
            "ibex",
            "top.sv",
            &source,
            "top.sv:50:1: syntax error at token \"endmodule\"",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::CausedByMacroCallInModuleParams);
        assert_eq!(state, ClassifierState::Normal);
    }

    #[test]
    fn test_macro_call_without_module_is_misc() {
        let mut source = plain_source(60);
        source[0] = "module top;".to_string();
        source[55] = "`BAR".to_string();
        let mut state = ClassifierState::Normal;

        let cat = classify(
            "ibex",
            "top.sv",
            &source,
            "top.sv:56:1: syntax error at token \"`BAR\"",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::MiscPreprocessor);
        assert_eq!(state, ClassifierState::MiscPreprocessor);

        let cat = classify(
            "ibex",
            "top.sv",
            &source,
            "top.sv:58:1: syntax error at token \";\"",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::MiscPreprocessorRelated);
    }

    #[test]
    fn test_likely_unhandled_macro_call_and_cascade() {
        let mut source = plain_source(20);
        source[8] = "  `uvm_object_utils(foo)".to_string();
        let mut state = ClassifierState::Normal;

        let cat = classify(
            "ibex",
            "pkg.sv",
            &source,
            "pkg.sv:10:1: syntax error at token \"function\"",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::LikelyUnhandledMacroCall);
        assert_eq!(state, ClassifierState::MacroCallSyntax);

        let cat = classify(
            "ibex",
            "pkg.sv",
            &source,
            "pkg.sv:18:1: syntax error at token \"endfunction\"",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::RelatedToLikelyUnhandledMacroCall);
    }

    #[test]
    fn test_macro_outside_window_is_ignored() {
        let mut source = plain_source(20);
        source[5] = "  `uvm_object_utils(foo)".to_string();
        let mut state = ClassifierState::Normal;
        let cat = classify(
            "ibex",
            "pkg.sv",
            &source,
            "pkg.sv:10:1: syntax error at token \"function\"",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::Undefined);
    }

    #[test]
    fn test_designed_to_fail_overrides_everything() {
        let mut state = ClassifierState::SlangVerified;
        let cat = classify(
            "ivtest",
            "ivltests/br_fail1.v",
            &plain_source(20),
            "ivtest/ivltests/br_fail1.v:4:2: syntax error at token \"y\"",
            &mut state,
        );
        assert_eq!(cat, CategoryTag::TestDesignedToFail);
    }

    #[test]
    fn test_failsafe_only_for_configured_project() {
        let line = "core.sv:7:1: syntax error at token \"Error!\" \"Error!\"";
        let mut state = ClassifierState::Normal;
        assert_eq!(
            classify("rsd", "core.sv", &plain_source(20), line, &mut state),
            CategoryTag::HitPreprocessorFailsafe
        );
        let mut state = ClassifierState::Normal;
        assert_eq!(
            classify("ibex", "core.sv", &plain_source(20), line, &mut state),
            CategoryTag::Undefined
        );
    }
}
