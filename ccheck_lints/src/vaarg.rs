//! Variadic argument checks: correct parameter passed to `va_start()`,
//! missing `va_end()` and use of a `va_list` before `va_start()`.

use ccheck_config::Severity;
use ccheck_core::astutils::{find_lambda_end_token, find_next_token_from_break};
use ccheck_core::errors::ErrorLogger;
use ccheck_core::token::TokenId;
use if_chain::if_chain;

use crate::diagnostics::report;
use crate::{Check, CheckContext};

const CWE_RESOURCE_LIFETIME: u16 = 664;
const CWE_WRONG_ARGUMENT: u16 = 688;
const CWE_UNDEFINED_BEHAVIOUR: u16 = 758;

pub struct CheckVaarg;

impl Check for CheckVaarg {
    fn name(&self) -> &'static str {
        "vaarg"
    }

    fn run(&self, ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
        va_start_argument(ctx, logger);
        va_list_usage(ctx, logger);
    }
}

/// `va_start()` must name the last named argument of the function.
fn va_start_argument(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    for &scope_id in ctx.symbols.function_scopes() {
        let scope = ctx.symbols.scope(scope_id);
        let Some(function) = scope.function else { continue };
        let function = ctx.symbols.function(function);
        let (Some(body_start), Some(body_end)) = (scope.body_start, scope.body_end) else {
            continue;
        };
        let mut tok = body_start;
        while let Some(next) = ctx.tokens.next(tok) {
            if next >= body_end {
                break;
            }
            tok = next;
            if !ctx.tokens.seq(tok, &["va_start", "("]) {
                continue;
            }
            let Some(first_arg) = ctx.tokens.tok_at(tok, 2) else { continue };
            let Some(param2) = ctx.tokens.next_argument(first_arg) else { continue };
            if_chain! {
                if let Some(vid) = ctx.tokens[param2].variable();
                let var = ctx.symbols.variable(vid);
                then {
                    if var.is_reference() {
                        report(
                            ctx,
                            logger,
                            param2,
                            Severity::Error,
                            "va_start_referencePassed",
                            format!(
                                "Using reference '{}' as parameter for va_start() results in undefined behaviour.",
                                var.name
                            ),
                            CWE_UNDEFINED_BEHAVIOUR,
                        );
                    }
                    // the parameter must be the last named one
                    let named = function.arg_count();
                    if named > 0 && var.is_argument() && var.index + 1 < named {
                        let last = ctx
                            .symbols
                            .variable(function.argument_list[named - 1])
                            .name
                            .clone();
                        report(
                            ctx,
                            logger,
                            tok,
                            Severity::Warning,
                            "va_start_wrongParameter",
                            format!(
                                "'{}' given to va_start() is not last named argument of the function. Did you intend to pass '{last}'?",
                                var.name
                            ),
                            CWE_WRONG_ARGUMENT,
                        );
                    }
                }
            }
            if let Some(close) = ctx.tokens.link_at(tok, 1) {
                tok = close;
            }
        }
    }
}

/// Track open/closed state of every `va_list` variable.
fn va_list_usage(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    for slot in ctx.symbols.variable_list().iter().flatten() {
        let var = ctx.symbols.variable(*slot);
        if var.is_pointer() || var.is_reference() || var.is_array() {
            continue;
        }
        if var
            .type_start
            .map_or(true, |t| ctx.tokens[t].str() != "va_list")
        {
            continue;
        }
        if !var.is_local() && !var.is_argument() {
            continue;
        }
        let Some(name_tok) = var.name_tok else { continue };
        let Some(scope_end) = var.scope.and_then(|s| ctx.symbols.scope(s).body_end) else {
            continue;
        };
        let var_id = var.declaration_id;
        let var_name = var.name.clone();

        // a va_list passed as an argument arrives opened
        let mut open = var.is_argument();
        let mut exit_on_end_of_statement = false;

        let mut tok = name_tok;
        let mut last_tok = name_tok;
        while let Some(next) = ctx.tokens.next(tok) {
            if next >= scope_end {
                break;
            }
            tok = next;
            last_tok = tok;
            if let Some(lambda_end) = find_lambda_end_token(ctx.tokens, tok) {
                tok = lambda_end;
                continue;
            }
            if ctx.tokens.seq(tok, &["va_start", "("])
                && ctx.tokens.tok_at(tok, 2).is_some_and(|a| ctx.tokens[a].var_id() == var_id)
            {
                if open {
                    va_start_subsequent_calls_error(ctx, logger, tok, &var_name);
                }
                open = true;
                tok = ctx.tokens.link_at(tok, 1).unwrap_or(tok);
            } else if ctx.tokens.seq(tok, &["va_end", "("])
                && ctx.tokens.tok_at(tok, 2).is_some_and(|a| ctx.tokens[a].var_id() == var_id)
            {
                if !open {
                    va_list_used_before_started_error(ctx, logger, tok, &var_name);
                }
                open = false;
                tok = ctx.tokens.link_at(tok, 1).unwrap_or(tok);
            } else if ctx.tokens.seq(tok, &["va_copy", "("]) {
                let mut now_open = open;
                let close = ctx.tokens.link_at(tok, 1);
                // source is the last argument
                if close
                    .and_then(|c| ctx.tokens.prev(c))
                    .is_some_and(|a| ctx.tokens[a].var_id() == var_id)
                    && !open
                {
                    va_list_used_before_started_error(ctx, logger, tok, &var_name);
                }
                // destination is the first
                if ctx.tokens.tok_at(tok, 2).is_some_and(|a| ctx.tokens[a].var_id() == var_id) {
                    if open {
                        va_start_subsequent_calls_error(ctx, logger, tok, &var_name);
                    }
                    now_open = true;
                }
                open = now_open;
                tok = close.unwrap_or(tok);
            } else if matches!(ctx.tokens[tok].str(), "throw" | "return") {
                exit_on_end_of_statement = true;
            } else if ctx.tokens[tok].str() == "break" {
                match find_next_token_from_break(ctx.tokens, ctx.symbols, tok) {
                    Some(next) => tok = next,
                    None => return,
                }
            } else if ctx.tokens[tok].str() == "goto"
                || (ctx.tokens.is_cpp() && ctx.tokens[tok].str() == "try")
            {
                open = false;
                break;
            } else if !open && ctx.tokens[tok].var_id() == var_id {
                va_list_used_before_started_error(ctx, logger, tok, &var_name);
            } else if exit_on_end_of_statement && ctx.tokens[tok].str() == ";" {
                break;
            }
        }
        if open && !var.is_argument() {
            report(
                ctx,
                logger,
                last_tok,
                Severity::Error,
                "va_end_missing",
                format!("va_list '{var_name}' was opened but not closed by va_end()."),
                CWE_RESOURCE_LIFETIME,
            );
        }
    }
}

fn va_start_subsequent_calls_error(
    ctx: &CheckContext<'_>,
    logger: &mut dyn ErrorLogger,
    tok: TokenId,
    name: &str,
) {
    report(
        ctx,
        logger,
        tok,
        Severity::Error,
        "va_start_subsequentCalls",
        format!("va_start() or va_copy() called subsequently on '{name}' without va_end() in between."),
        CWE_RESOURCE_LIFETIME,
    );
}

fn va_list_used_before_started_error(
    ctx: &CheckContext<'_>,
    logger: &mut dyn ErrorLogger,
    tok: TokenId,
    name: &str,
) {
    report(
        ctx,
        logger,
        tok,
        Severity::Error,
        "va_list_usedBeforeStarted",
        format!("va_list '{name}' used before va_start() was called."),
        CWE_RESOURCE_LIFETIME,
    );
}
