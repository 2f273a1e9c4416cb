//! String handling checks: writes into literals, char/string arithmetic and
//! suspicious string comparisons.

use ccheck_config::Severity;
use ccheck_core::astutils::is_token_written;
use ccheck_core::errors::ErrorLogger;
use ccheck_core::symbols::call_argument_tokens;
use ccheck_core::vfvalue::ValuePayload;
use if_chain::if_chain;

use crate::diagnostics::report;
use crate::{Check, CheckContext};

const CWE_BUFFER_OVERLAP: u16 = 628;
const CWE_POOR_QUALITY: u16 = 398;
const CWE_TYPE_ERROR: u16 = 665;
const CWE_WRITE_READONLY: u16 = 758;

pub struct CheckString;

impl Check for CheckString {
    fn name(&self) -> &'static str {
        "string"
    }

    fn run(&self, ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
        string_literal_write(ctx, logger);
        str_plus_char(ctx, logger);
        sprintf_overlapping_data(ctx, logger);
        check_suspicious_string_compare(ctx, logger);
    }
}

/// Writing into a string literal is undefined behaviour.
fn string_literal_write(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    for id in ctx.tokens.ids() {
        // direct write: "abc"[0] = 'x'
        let literal_written = ctx.tokens[id].is_string()
            && ctx.tokens[id]
                .ast_parent()
                .is_some_and(|p| ctx.tokens[p].str() == "[")
            && ctx.tokens[id]
                .ast_parent()
                .is_some_and(|p| is_token_written(ctx.tokens, ctx.settings, p));
        if literal_written {
            report(
                ctx,
                logger,
                id,
                Severity::Error,
                "stringLiteralWrite",
                "Modifying string literal directly or indirectly is undefined behaviour.",
                CWE_WRITE_READONLY,
            );
            continue;
        }
        // indirect: p = "abc"; p[0] = 'x'  -- p carries a symbolic value
        if_chain! {
            if ctx.tokens[id].var_id() != 0;
            if let Some(parent) = ctx.tokens[id].ast_parent();
            if ctx.tokens[parent].str() == "[";
            if is_token_written(ctx.tokens, ctx.settings, parent);
            if ctx.tokens[id].values().iter().any(|v| {
                matches!(v.payload, ValuePayload::Tok(lit) if ctx.tokens[lit].is_string())
                    && !v.is_impossible()
            });
            then {
                report(
                    ctx,
                    logger,
                    id,
                    Severity::Error,
                    "stringLiteralWrite",
                    "Modifying string literal directly or indirectly is undefined behaviour.",
                    CWE_WRITE_READONLY,
                );
            }
        }
    }
}

/// `"abc" + 'd'` does not concatenate.
fn str_plus_char(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    for id in ctx.tokens.ids() {
        if_chain! {
            if ctx.tokens[id].str() == "+";
            if ctx.tokens[id].is_binary_op();
            let op1 = ctx.tokens[id].ast_op1().unwrap();
            let op2 = ctx.tokens[id].ast_op2().unwrap();
            if ctx.tokens[op1].is_string();
            if ctx.tokens[op2].is_char_literal()
                || ctx.tokens[op2]
                    .value_type()
                    .is_some_and(|vt| {
                        vt.pointer == 0
                            && vt.kind == ccheck_core::symbols::ValueTypeKind::Char
                    });
            then {
                report(
                    ctx,
                    logger,
                    id,
                    Severity::Error,
                    "strPlusChar",
                    "Unusual pointer arithmetic. A value of type 'char' is added to a string literal.",
                    CWE_TYPE_ERROR,
                );
            }
        }
    }
}

/// `sprintf(buf, "...", buf)` — source and destination overlap.
fn sprintf_overlapping_data(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    for id in ctx.tokens.ids() {
        if !ctx.tokens.seq(id, &["sprintf", "("]) && !ctx.tokens.seq(id, &["snprintf", "("]) {
            continue;
        }
        let Some(open) = ctx.tokens.next(id) else { continue };
        let args = call_argument_tokens(ctx.tokens, open);
        let Some(&dest) = args.first() else { continue };
        let dest_id = ctx.tokens[dest].expr_id();
        if dest_id == 0 {
            continue;
        }
        let value_args_start = if ctx.tokens[id].str() == "snprintf" { 3 } else { 2 };
        for &arg in args.iter().skip(value_args_start) {
            if ctx.tokens[arg].expr_id() == dest_id {
                let name = ctx.tokens[dest].str().to_string();
                report(
                    ctx,
                    logger,
                    id,
                    Severity::Error,
                    "sprintfOverlappingData",
                    format!(
                        "Undefined behavior: Variable '{name}' is used as parameter and destination in sprintf()."
                    ),
                    CWE_BUFFER_OVERLAP,
                );
            }
        }
    }
}

/// `strcmp(x, x)` and comparisons of two literals are always constant.
fn check_suspicious_string_compare(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    if !ctx.settings.severity.is_enabled(Severity::Warning) {
        return;
    }
    for id in ctx.tokens.ids() {
        if !ctx.tokens.seq(id, &["strcmp", "("]) && !ctx.tokens.seq(id, &["strncmp", "("]) {
            continue;
        }
        let Some(open) = ctx.tokens.next(id) else { continue };
        let args = call_argument_tokens(ctx.tokens, open);
        if args.len() < 2 {
            continue;
        }
        let (a, b) = (args[0], args[1]);
        if ctx.tokens[a].is_string() && ctx.tokens[b].is_string() {
            report(
                ctx,
                logger,
                id,
                Severity::Warning,
                "staticStringCompare",
                "Unnecessary comparison of static strings.",
                CWE_POOR_QUALITY,
            );
        } else if ctx.tokens[a].expr_id() != 0 && ctx.tokens[a].expr_id() == ctx.tokens[b].expr_id()
        {
            report(
                ctx,
                logger,
                id,
                Severity::Warning,
                "stringCompare",
                "Comparison of identical string variables.",
                CWE_POOR_QUALITY,
            );
        }
    }
}
