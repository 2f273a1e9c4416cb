//! Auto-variable lifetime checks: returning or keeping pointers/references
//! to objects that die with the enclosing scope. Consumes the lifetime
//! values computed by value flow.

use ccheck_config::Severity;
use ccheck_core::astutils::{visit_ast_nodes, ChildrenToVisit};
use ccheck_core::errors::ErrorLogger;
use ccheck_core::token::TokenId;
use ccheck_core::vfvalue::Value;

use crate::diagnostics::{report_with_path, value_error_path};
use crate::{Check, CheckContext};

const CWE_RETURN_STACK_ADDRESS: u16 = 562;

pub struct CheckAutoVariables;

impl Check for CheckAutoVariables {
    fn name(&self) -> &'static str {
        "autovariables"
    }

    fn run(&self, ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
        return_dangling_lifetime(ctx, logger);
        dangling_lifetime_uses(ctx, logger);
    }
}

/// Is the lifetime value's referent an object that dies with the function?
fn refers_to_local(ctx: &CheckContext<'_>, value: &Value) -> Option<(TokenId, String)> {
    let referent = value.lifetime_token()?;
    let vid = ctx.tokens[referent].variable()?;
    let var = ctx.symbols.variable(vid);
    if (var.is_local() || var.is_argument()) && !var.is_static() && !var.is_reference() {
        return Some((referent, var.name.clone()));
    }
    None
}

fn return_dangling_lifetime(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    for id in ctx.tokens.ids() {
        if ctx.tokens[id].str() != "return" {
            continue;
        }
        let Some(operand) = ctx.tokens[id].ast_op1() else { continue };
        let mut finding: Option<(TokenId, Value, String)> = None;
        visit_ast_nodes(ctx.tokens, operand, &mut |tok| {
            for value in ctx.tokens[tok].values() {
                if !value.is_lifetime() || value.is_impossible() {
                    continue;
                }
                if let Some((_, name)) = refers_to_local(ctx, value) {
                    finding = Some((tok, value.clone(), name));
                    return ChildrenToVisit::Done;
                }
            }
            ChildrenToVisit::Op1AndOp2
        });
        if let Some((_tok, value, name)) = finding {
            let mut path = value_error_path(ctx, &value);
            path.push((
                ctx.tokens[id].location(),
                "Returning pointer to local variable".to_string(),
            ));
            report_with_path(
                ctx,
                logger,
                id,
                Severity::Error,
                "returnDanglingLifetime",
                format!(
                    "Returning pointer to local variable '{name}' that will be invalid when returning."
                ),
                CWE_RETURN_STACK_ADDRESS,
                path,
            );
        }
    }
}

/// A pointer value used after its referent's scope has ended.
fn dangling_lifetime_uses(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    for id in ctx.tokens.ids() {
        // only variable reads outside return statements
        if ctx.tokens[id].var_id() == 0 {
            continue;
        }
        for value in ctx.tokens[id].values() {
            if !value.is_lifetime() || value.is_impossible() || value.is_inconclusive() {
                continue;
            }
            let Some((referent, name)) = refers_to_local(ctx, value) else {
                continue;
            };
            let Some(referent_scope) = ctx.tokens[referent]
                .variable()
                .and_then(|v| ctx.symbols.variable(v).scope)
            else {
                continue;
            };
            let Some(scope_end) = ctx.symbols.scope(referent_scope).body_end else {
                continue;
            };
            if id > scope_end {
                let mut path = value_error_path(ctx, value);
                path.push((
                    ctx.tokens[id].location(),
                    format!("Using pointer to local variable '{name}'"),
                ));
                report_with_path(
                    ctx,
                    logger,
                    id,
                    Severity::Error,
                    "danglingLifetime",
                    format!(
                        "Using pointer to local variable '{name}' that is out of scope."
                    ),
                    CWE_RETURN_STACK_ADDRESS,
                    path,
                );
                break;
            }
        }
    }
}
