//! Class misuse checks: `memset` on non-trivial classes, `operator=`
//! conventions, and members the constructor leaves uninitialized.

use ccheck_config::Severity;
use ccheck_core::errors::ErrorLogger;
use ccheck_core::symbols::{FunctionKind, ScopeId, ValueTypeKind};
use if_chain::if_chain;

use crate::diagnostics::report;
use crate::{Check, CheckContext};

const CWE_UNINIT_MEMBER: u16 = 398;
const CWE_TYPE_CONFUSION: u16 = 665;
const CWE_OP_EQ: u16 = 398;

pub struct CheckClass;

impl Check for CheckClass {
    fn name(&self) -> &'static str {
        "class"
    }

    fn run(&self, ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
        check_memset(ctx, logger);
        check_operator_eq_ret_ref_this(ctx, logger);
        check_operator_eq_to_self(ctx, logger);
        check_constructors(ctx, logger);
    }
}

// ---------------------------------------------------------------------------
// memset on classes

fn check_memset(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    for id in ctx.tokens.ids() {
        if !ctx.tokens.seq(id, &["memset", "("]) {
            continue;
        }
        let Some(open) = ctx.tokens.next(id) else { continue };
        let args = ccheck_core::symbols::call_argument_tokens(ctx.tokens, open);
        let Some(&dest) = args.first() else { continue };
        // look through `&obj` and casts to the object
        let mut obj = dest;
        while ctx.tokens[obj].is_unary_op("&") || ctx.tokens[obj].is_cast() {
            match ctx.tokens[obj].ast_op1() {
                Some(op1) => obj = op1,
                None => break,
            }
        }
        let Some(type_scope) = ctx.tokens[obj]
            .value_type()
            .filter(|vt| vt.kind == ValueTypeKind::Record)
            .and_then(|vt| vt.type_scope)
        else {
            continue;
        };
        if ctx.symbols.has_virtual_function(type_scope) {
            report(
                ctx,
                logger,
                id,
                Severity::Error,
                "memsetClass",
                format!(
                    "Using 'memset' on class that contains a virtual function ('{}').",
                    ctx.symbols.scope(type_scope).class_name
                ),
                CWE_TYPE_CONFUSION,
            );
            continue;
        }
        if class_has_float_member(ctx, type_scope) {
            report(
                ctx,
                logger,
                id,
                Severity::Portability,
                "memsetClassFloat",
                format!(
                    "Using memset() on class '{}' which contains a floating point number.",
                    ctx.symbols.scope(type_scope).class_name
                ),
                CWE_UNINIT_MEMBER,
            );
        }
        if class_has_reference_member(ctx, type_scope) {
            report(
                ctx,
                logger,
                id,
                Severity::Error,
                "memsetClassReference",
                format!(
                    "Using 'memset' on class '{}' that contains a reference.",
                    ctx.symbols.scope(type_scope).class_name
                ),
                CWE_TYPE_CONFUSION,
            );
        }
    }
}

fn class_has_float_member(ctx: &CheckContext<'_>, scope: ScopeId) -> bool {
    ctx.symbols
        .scope(scope)
        .var_list
        .iter()
        .any(|&v| ctx.symbols.variable(v).is_float_type())
}

fn class_has_reference_member(ctx: &CheckContext<'_>, scope: ScopeId) -> bool {
    ctx.symbols
        .scope(scope)
        .var_list
        .iter()
        .any(|&v| ctx.symbols.variable(v).is_reference())
}

// ---------------------------------------------------------------------------
// operator= conventions

fn operator_eq_functions<'a>(
    ctx: &'a CheckContext<'a>,
) -> impl Iterator<Item = (ScopeId, ccheck_core::symbols::FunctionId)> + 'a {
    ctx.symbols
        .class_and_struct_scopes()
        .iter()
        .flat_map(move |&class_scope| {
            ctx.symbols
                .scope(class_scope)
                .function_list
                .iter()
                .filter(move |&&f| {
                    let f = ctx.symbols.function(f);
                    f.kind == FunctionKind::OperatorEqual && f.has_body()
                })
                .map(move |&f| (class_scope, f))
        })
}

/// `operator=` should end with `return *this;`.
fn check_operator_eq_ret_ref_this(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    for (_, fid) in operator_eq_functions(ctx) {
        let f = ctx.symbols.function(fid);
        let Some(body_scope) = f.function_scope else { continue };
        let scope = ctx.symbols.scope(body_scope);
        let (Some(start), Some(end)) = (scope.body_start, scope.body_end) else {
            continue;
        };
        let mut any_return = false;
        let mut all_return_this = true;
        let mut tok = start;
        while let Some(next) = ctx.tokens.next(tok) {
            if next >= end {
                break;
            }
            tok = next;
            if ctx.tokens[tok].str() != "return" {
                continue;
            }
            any_return = true;
            let returns_this = ctx.tokens[tok]
                .ast_op1()
                .is_some_and(|op| {
                    ctx.tokens[op].is_unary_op("*")
                        && ctx.tokens[op]
                            .ast_op1()
                            .is_some_and(|t| ctx.tokens[t].str() == "this")
                });
            if !returns_this {
                all_return_this = false;
            }
        }
        if !any_return || !all_return_this {
            let at = f.token_def.unwrap_or(start);
            report(
                ctx,
                logger,
                at,
                Severity::Style,
                "operatorEqRetRefThis",
                "'operator=' should return reference to 'this' instance.",
                CWE_OP_EQ,
            );
        }
    }
}

/// `operator=` that frees and reallocates members needs a self-assignment
/// guard.
fn check_operator_eq_to_self(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    for (class_scope, fid) in operator_eq_functions(ctx) {
        let f = ctx.symbols.function(fid);
        // only operator=(const T&) style signatures
        if f.arg_count() != 1 {
            continue;
        }
        let Some(body_scope) = f.function_scope else { continue };
        let scope = ctx.symbols.scope(body_scope);
        let (Some(start), Some(end)) = (scope.body_start, scope.body_end) else {
            continue;
        };
        let member_ids: Vec<u32> = ctx
            .symbols
            .scope(class_scope)
            .var_list
            .iter()
            .map(|&v| ctx.symbols.variable(v).declaration_id)
            .collect();

        let mut deletes_member = false;
        let mut has_self_check = false;
        let mut delete_tok = start;
        let mut tok = start;
        while let Some(next) = ctx.tokens.next(tok) {
            if next >= end {
                break;
            }
            tok = next;
            if_chain! {
                if ctx.tokens[tok].str() == "delete";
                if let Some(operand) = ctx.tokens[tok].ast_op1();
                if member_ids.contains(&ctx.tokens[operand].var_id());
                then {
                    deletes_member = true;
                    delete_tok = tok;
                }
            }
            // `if (this == &rhs)` or `if (&rhs != this)`
            if_chain! {
                if ctx.tokens[tok].is_comparison_op();
                if matches!(ctx.tokens[tok].str(), "==" | "!=");
                if let (Some(op1), Some(op2)) = (ctx.tokens[tok].ast_op1(), ctx.tokens[tok].ast_op2());
                if ctx.tokens[op1].str() == "this" || ctx.tokens[op2].str() == "this";
                if ctx.tokens[op1].is_unary_op("&") || ctx.tokens[op2].is_unary_op("&");
                then {
                    has_self_check = true;
                }
            }
        }
        if deletes_member && !has_self_check {
            report(
                ctx,
                logger,
                delete_tok,
                Severity::Warning,
                "operatorEqToSelf",
                "'operator=' should check for assignment to self to avoid problems with dynamic memory.",
                CWE_OP_EQ,
            );
        }
    }
}

// ---------------------------------------------------------------------------
// constructors leaving members uninitialized

fn check_constructors(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    if !ctx.settings.severity.is_enabled(Severity::Warning) {
        return;
    }
    for &class_scope in ctx.symbols.class_and_struct_scopes() {
        let scope = ctx.symbols.scope(class_scope);
        let class_name = scope.class_name.clone();
        let constructors: Vec<_> = scope
            .function_list
            .iter()
            .filter(|&&f| {
                let f = ctx.symbols.function(f);
                f.is_constructor() && f.has_body() && !f.is_default()
            })
            .copied()
            .collect();
        if constructors.is_empty() {
            continue;
        }
        // members that need initialization: plain data, not classes
        let members: Vec<_> = scope
            .var_list
            .iter()
            .filter(|&&v| {
                let var = ctx.symbols.variable(v);
                !var.is_static()
                    && !var.is_class()
                    && !var.is_init()
                    && var
                        .value_type
                        .as_ref()
                        .map_or(true, |vt| vt.kind != ValueTypeKind::Container)
            })
            .copied()
            .collect();
        for fid in constructors {
            let f = ctx.symbols.function(fid);
            let Some(body_scope) = f.function_scope else { continue };
            let body = ctx.symbols.scope(body_scope);
            let (Some(start), Some(end)) = (body.body_start, body.body_end) else {
                continue;
            };
            // everything between the argument list and the body end counts:
            // the member initializer list plus the body
            let init_start = f
                .arg_def
                .and_then(|open| ctx.tokens[open].link())
                .unwrap_or(start);
            for &member in &members {
                let var = ctx.symbols.variable(member);
                let var_id = var.declaration_id;
                let mut assigned = false;
                let mut tok = init_start;
                while let Some(next) = ctx.tokens.next(tok) {
                    if next >= end {
                        break;
                    }
                    tok = next;
                    if ctx.tokens[tok].var_id() == var_id {
                        assigned = true;
                        break;
                    }
                    // memset(this, ...) initializes everything
                    if ctx.tokens.seq(tok, &["memset", "("]) {
                        assigned = true;
                        break;
                    }
                }
                if !assigned {
                    let at = f.token_def.unwrap_or(start);
                    report(
                        ctx,
                        logger,
                        at,
                        Severity::Warning,
                        "uninitMemberVar",
                        format!(
                            "Member variable '{class_name}::{}' is not initialized in the constructor.",
                            var.name
                        ),
                        CWE_UNINIT_MEMBER,
                    );
                }
            }
        }
    }
}
