//! Thread-safety checks: non-reentrant standard functions and static local
//! state.

use ccheck_config::Severity;
use ccheck_core::errors::ErrorLogger;

use crate::diagnostics::{report, report_inconclusive};
use crate::{Check, CheckContext};

const CWE_RACE: u16 = 663;

pub struct CheckThreadSafety;

impl Check for CheckThreadSafety {
    fn name(&self) -> &'static str {
        "threadsafety"
    }

    fn run(&self, ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
        non_reentrant_functions(ctx, logger);
        static_local_variables(ctx, logger);
    }
}

fn non_reentrant_functions(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    if !ctx.settings.severity.is_enabled(Severity::Portability) {
        return;
    }
    for id in ctx.tokens.ids() {
        let t = &ctx.tokens[id];
        if !t.is_name() || !ctx.tokens.is(ctx.tokens.next(id), "(") {
            continue;
        }
        if t.variable().is_some() || t.function().is_some() {
            continue;
        }
        if ctx.settings.library.is_nonreentrant(t.str()) {
            let name = t.str().to_string();
            report(
                ctx,
                logger,
                id,
                Severity::Portability,
                "nonreentrantFunctions",
                format!(
                    "Non reentrant function '{name}' called. For threadsafe applications it is recommended to use the reentrant replacement function '{name}_r'."
                ),
                CWE_RACE,
            );
        }
    }
}

fn static_local_variables(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    for slot in ctx.symbols.variable_list().iter().flatten() {
        let var = ctx.symbols.variable(*slot);
        if !var.is_static() || !var.is_local() || var.is_const() {
            continue;
        }
        // arguments and globals are out; only statics inside functions race
        let in_function = var.scope.is_some_and(|s| {
            ctx.symbols
                .scope_chain(s)
                .any(|sc| ctx.symbols.scope(sc).kind == ccheck_core::symbols::ScopeKind::Function)
        });
        if !in_function {
            continue;
        }
        let Some(name_tok) = var.name_tok else { continue };
        report_inconclusive(
            ctx,
            logger,
            name_tok,
            Severity::Warning,
            "threadsafety",
            format!(
                "Local static variable '{}' is not thread safe.",
                var.name
            ),
            CWE_RACE,
        );
    }
}
