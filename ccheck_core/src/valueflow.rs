//! Value-flow driver: seeds the generic engines with values and lets them
//! propagate. Each pass is independent; an internal error in one seed skips
//! that seed's function and analysis continues.

use ccheck_config::Settings;

use crate::analyzer::{AnalyzerResult, Ctx};
use crate::astutils::{get_cond_tok, next_after_ast_rightmost_leaf};
use crate::errors::{AnalysisError, ErrorLogger};
use crate::forward::value_flow_generic_forward;
use crate::mathlib;
use crate::reverse::value_flow_generic_reverse;
use crate::symbols::{ScopeId, SymbolDatabase, ValueTypeKind};
use crate::token::{TokenId, TokenKind};
use crate::tokenlist::TokenList;
use crate::vf_analyzers::ExpressionAnalyzer;
use crate::vfvalue::{LifetimeKind, MoveKind, Value, ValueKind};

/// Forward propagation of `value` for the expression at `expr_tok`.
pub fn value_flow_forward(
    ctx: &mut Ctx<'_>,
    start: TokenId,
    end: TokenId,
    expr_tok: TokenId,
    value: Value,
) -> Result<AnalyzerResult, AnalysisError> {
    let analyzer = ExpressionAnalyzer::new(ctx.tokens, ctx.symbols, ctx.settings, expr_tok, value);
    value_flow_generic_forward(ctx, start, Some(end), analyzer)
}

/// Reverse propagation of `value` from `start` back to `end`.
pub fn value_flow_reverse(
    ctx: &mut Ctx<'_>,
    start: TokenId,
    end: Option<TokenId>,
    expr_tok: TokenId,
    value: Value,
) -> Result<(), AnalysisError> {
    let analyzer = ExpressionAnalyzer::new(ctx.tokens, ctx.symbols, ctx.settings, expr_tok, value);
    value_flow_generic_reverse(ctx, start, end, analyzer)
}

/// Run all value-flow passes over the translation unit.
pub fn run_value_flow(
    tokens: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    logger: &mut dyn ErrorLogger,
) -> Result<(), AnalysisError> {
    let mut ctx = Ctx {
        tokens,
        symbols,
        settings,
    };
    value_flow_literals(&mut ctx);
    value_flow_enumerators(&mut ctx);
    value_flow_assignments(&mut ctx, logger)?;
    value_flow_conditions(&mut ctx, logger)?;
    value_flow_uninit(&mut ctx, logger)?;
    value_flow_lifetimes(&mut ctx, logger)?;
    value_flow_move(&mut ctx, logger)?;
    value_flow_container_size(&mut ctx, logger)?;
    Ok(())
}

/// Route one seed's outcome: internal errors are reported and the seed is
/// dropped, termination propagates.
fn seeded<T>(
    result: Result<T, AnalysisError>,
    tokens: &TokenList,
    logger: &mut dyn ErrorLogger,
) -> Result<(), AnalysisError> {
    match result {
        Ok(_) => Ok(()),
        Err(AnalysisError::Terminated) => Err(AnalysisError::Terminated),
        Err(AnalysisError::Internal { token, reason }) => {
            let location = token.and_then(|t| tokens.get(t)).map(|t| t.location());
            logger.debug_message(location, "valueflow", &reason);
            Ok(())
        }
    }
}

fn value_flow_literals(ctx: &mut Ctx<'_>) {
    let ids: Vec<TokenId> = ctx.tokens.ids().collect();
    for id in ids {
        let t = &ctx.tokens[id];
        match t.kind() {
            TokenKind::Number => {
                if let Some(v) = mathlib::to_bigint(t.str()) {
                    crate::vf_analyzers::set_token_value(ctx.tokens, id, Value::known_int(v));
                }
            }
            TokenKind::Boolean => {
                let v = (t.str() == "true") as mathlib::Bigint;
                crate::vf_analyzers::set_token_value(ctx.tokens, id, Value::known_int(v));
            }
            TokenKind::Char => {
                if let Some(v) = mathlib::char_literal_value(t.str_value()) {
                    crate::vf_analyzers::set_token_value(ctx.tokens, id, Value::known_int(v));
                }
            }
            _ => {}
        }
    }
}

fn value_flow_enumerators(ctx: &mut Ctx<'_>) {
    let ids: Vec<TokenId> = ctx.tokens.ids().collect();
    for id in ids {
        if let Some(eid) = ctx.tokens[id].enumerator() {
            if let Some(v) = ctx.symbols.enumerator(eid).value {
                crate::vf_analyzers::set_token_value(ctx.tokens, id, Value::known_int(v));
            }
        }
    }
}

/// `x = <known>` seeds a forward pass on `x` after the assignment.
fn value_flow_assignments(
    ctx: &mut Ctx<'_>,
    logger: &mut dyn ErrorLogger,
) -> Result<(), AnalysisError> {
    let ids: Vec<TokenId> = ctx.tokens.ids().collect();
    for id in ids {
        let t = &ctx.tokens[id];
        if t.str() != "=" || !t.is_binary_op() || t.ast_parent().is_some() {
            continue;
        }
        let lhs = t.ast_op1().unwrap();
        let rhs = t.ast_op2().unwrap();
        if ctx.tokens[lhs].expr_id() == 0 {
            continue;
        }
        let Some(scope_end) = ctx.tokens[id]
            .scope()
            .and_then(|s| function_body_end(ctx.symbols, s))
        else {
            continue;
        };
        let Some(start) = next_after_ast_rightmost_leaf(ctx.tokens, id) else {
            continue;
        };
        let mut value = if let Some(v) = ctx.tokens[rhs].known_int_value() {
            Value::known_int(v)
        } else if ctx.tokens[rhs].var_id() != 0 || ctx.tokens[rhs].is_string() {
            // symbolic: lhs has the same value as rhs
            Value::tok(rhs)
        } else {
            continue;
        };
        value.push_path(id, format!("Assignment '{}'", crate::astutils::expression_string(ctx.tokens, id)));
        let result = value_flow_forward(ctx, start, scope_end, lhs, value);
        seeded(result, ctx.tokens, logger)?;
    }
    Ok(())
}

fn function_body_end(symbols: &SymbolDatabase, scope: ScopeId) -> Option<TokenId> {
    symbols
        .scope_chain(scope)
        .find(|&s| symbols.scope(s).kind == crate::symbols::ScopeKind::Function)
        .and_then(|s| symbols.scope(s).body_end)
}

/// `if (x == K)` seeds the then branch with `x == K`, `if (x != K)` the else
/// branch; the negated truth value flows into the opposite branch. A
/// possible value is also propagated backward from the condition.
fn value_flow_conditions(
    ctx: &mut Ctx<'_>,
    logger: &mut dyn ErrorLogger,
) -> Result<(), AnalysisError> {
    let ids: Vec<TokenId> = ctx.tokens.ids().collect();
    for id in ids {
        if ctx.tokens[id].str() != "if" || !ctx.tokens.is(ctx.tokens.next(id), "(") {
            continue;
        }
        let Some(cond) = get_cond_tok(ctx.tokens, id) else { continue };
        let Some(end_cond) = ctx.tokens.next(id).and_then(|p| ctx.tokens[p].link()) else {
            continue;
        };
        if !ctx.tokens.seq(end_cond, &[")", "{"]) {
            continue;
        }
        let Some(then_start) = ctx.tokens.next(end_cond) else { continue };
        let Some(then_end) = ctx.tokens[then_start].link() else { continue };

        let (expr, value, in_then) = match condition_value(ctx.tokens, cond) {
            Some(x) => x,
            None => continue,
        };
        let mut cond_value = value.clone();
        cond_value.depends_on(cond);
        cond_value.push_path(
            cond,
            format!(
                "Assuming that condition '{}' is not redundant",
                crate::astutils::expression_string(ctx.tokens, cond)
            ),
        );
        if in_then {
            let start = ctx.tokens.next(then_start).unwrap_or(then_start);
            let result = value_flow_forward(ctx, start, then_end, expr, cond_value.clone());
            seeded(result, ctx.tokens, logger)?;
        } else if ctx.tokens.seq(then_end, &["}", "else", "{"]) {
            let else_open = ctx.tokens.tok_at(then_end, 2).unwrap();
            if let (Some(start), Some(end)) =
                (ctx.tokens.next(else_open), ctx.tokens[else_open].link())
            {
                let result = value_flow_forward(ctx, start, end, expr, cond_value.clone());
                seeded(result, ctx.tokens, logger)?;
            }
        }
        // before the condition the value is possible
        let mut before = value;
        before.kind = ValueKind::Possible;
        before.depends_on(cond);
        let result = value_flow_reverse(ctx, id, None, expr, before);
        seeded(result, ctx.tokens, logger)?;
    }
    Ok(())
}

/// The `(expression, value, value-holds-in-then-branch)` of a condition.
fn condition_value(tokens: &TokenList, cond: TokenId) -> Option<(TokenId, Value, bool)> {
    let t = &tokens[cond];
    if t.is_binary_op() && matches!(t.str(), "==" | "!=") {
        let op1 = t.ast_op1().unwrap();
        let op2 = t.ast_op2().unwrap();
        let (expr, literal) = if tokens[op2].is_number() {
            (op1, op2)
        } else if tokens[op1].is_number() {
            (op2, op1)
        } else {
            return None;
        };
        if tokens[expr].expr_id() == 0 {
            return None;
        }
        let k = mathlib::to_bigint(tokens[literal].str())?;
        return Some((expr, Value::int(k), t.str() == "=="));
    }
    if t.is_unary_op("!") {
        let op1 = t.ast_op1().unwrap();
        if tokens[op1].expr_id() == 0 {
            return None;
        }
        return Some((op1, Value::int(0), true));
    }
    if t.var_id() != 0 {
        return Some((cond, Value::int(0), false));
    }
    None
}

/// Local variables declared without an initializer carry `Uninit` until the
/// first write.
fn value_flow_uninit(
    ctx: &mut Ctx<'_>,
    logger: &mut dyn ErrorLogger,
) -> Result<(), AnalysisError> {
    let count = ctx.symbols.variable_list().len();
    for var_id in 1..count {
        let Some(var) = ctx.symbols.variable_from_var_id(var_id as u32) else {
            continue;
        };
        if !var.is_local() || var.is_init() || var.is_static() || var.is_extern() {
            continue;
        }
        // partial initialization of arrays is not tracked
        if var.is_array() {
            continue;
        }
        // a class object runs its constructor
        if var.is_class() && var.value_type.as_ref().is_some_and(|vt| vt.kind == ValueTypeKind::Record) {
            continue;
        }
        if var.value_type.as_ref().is_some_and(|vt| vt.kind == ValueTypeKind::Container) {
            continue;
        }
        let Some(name_tok) = var.name_tok else { continue };
        let Some(scope_end) = var.scope.and_then(|s| ctx.symbols.scope(s).body_end) else {
            continue;
        };
        let Some(start) = ctx.tokens.next(name_tok) else { continue };
        let mut value = Value::uninit(0);
        value.kind = ValueKind::Known;
        value.push_path(name_tok, format!("Declaration of variable '{}'", var.name));
        let result = value_flow_forward(ctx, start, scope_end, name_tok, value);
        seeded(result, ctx.tokens, logger)?;
    }
    Ok(())
}

/// `&x`, references and iterators into locals get lifetime values.
fn value_flow_lifetimes(
    ctx: &mut Ctx<'_>,
    logger: &mut dyn ErrorLogger,
) -> Result<(), AnalysisError> {
    let ids: Vec<TokenId> = ctx.tokens.ids().collect();
    for id in ids {
        // address of a variable or of a member of a variable
        if ctx.tokens[id].is_unary_op("&") {
            let op1 = ctx.tokens[id].ast_op1().unwrap();
            let (referent, kind) = if ctx.tokens[op1].var_id() != 0 {
                (op1, LifetimeKind::Address)
            } else if matches!(ctx.tokens[op1].str(), "." | "->")
                && ctx.tokens[op1]
                    .ast_op1()
                    .is_some_and(|b| ctx.tokens[b].var_id() != 0)
            {
                (ctx.tokens[op1].ast_op1().unwrap(), LifetimeKind::SubObject)
            } else {
                continue;
            };
            let mut value = Value::lifetime(referent, kind);
            value.kind = ValueKind::Known;
            if let Some(decl) = ctx.tokens[referent]
                .variable()
                .and_then(|v| ctx.symbols.variable(v).name_tok)
            {
                value.push_path(decl, format!(
                    "Variable '{}' declared here",
                    ctx.tokens[referent].str()
                ));
            }
            value.push_path(id, format!(
                "Address of variable '{}' taken here",
                ctx.tokens[referent].str()
            ));
            crate::vf_analyzers::set_token_value(ctx.tokens, id, value.clone());
            // propagate through an assignment to a pointer
            propagate_lifetime_assignment(ctx, id, value, logger)?;
            continue;
        }
        // reference declarations: `int& r = x;`
        if ctx.tokens[id].str() == "=" && ctx.tokens[id].is_binary_op() {
            let lhs = ctx.tokens[id].ast_op1().unwrap();
            let rhs = ctx.tokens[id].ast_op2().unwrap();
            let lhs_is_ref = ctx.tokens[lhs]
                .variable()
                .is_some_and(|v| ctx.symbols.variable(v).is_reference());
            if lhs_is_ref && ctx.tokens[rhs].var_id() != 0 {
                let mut value = Value::lifetime(rhs, LifetimeKind::Object);
                value.kind = ValueKind::Known;
                value.push_path(id, format!(
                    "Variable '{}' bound to '{}' here",
                    ctx.tokens[lhs].str(),
                    ctx.tokens[rhs].str()
                ));
                propagate_lifetime_assignment(ctx, id, value, logger)?;
            }
            continue;
        }
        // container iterators: `v.begin()`
        if ctx.tokens[id].str() == "("
            && ctx.tokens[id]
                .ast_op1()
                .is_some_and(|callee| matches!(ctx.tokens[callee].str(), "." | "->"))
        {
            let callee = ctx.tokens[id].ast_op1().unwrap();
            let base = ctx.tokens[callee].ast_op1();
            let method = ctx.tokens[callee].ast_op2();
            let (Some(base), Some(method)) = (base, method) else { continue };
            if ctx.tokens[base].var_id() == 0 {
                continue;
            }
            let Some(container_key) = ctx.tokens[base]
                .value_type()
                .and_then(|vt| vt.container.clone())
            else {
                continue;
            };
            use ccheck_config::Yield;
            let yielded = ctx
                .settings
                .library
                .container(&container_key)
                .and_then(|c| c.yield_of(ctx.tokens[method].str()));
            let kind = match yielded {
                Some(Yield::BeginIterator | Yield::EndIterator) => LifetimeKind::Iterator,
                Some(Yield::Buffer | Yield::BufferNt) => LifetimeKind::Address,
                Some(Yield::Item) => LifetimeKind::SubObject,
                _ => continue,
            };
            let mut value = Value::lifetime(base, kind);
            value.kind = ValueKind::Known;
            value.push_path(id, format!(
                "Lifetime is bound to container '{}' here",
                ctx.tokens[base].str()
            ));
            crate::vf_analyzers::set_token_value(ctx.tokens, id, value);
        }
    }
    Ok(())
}

/// When a lifetime value is produced on the RHS of an assignment, track the
/// assigned pointer forward.
fn propagate_lifetime_assignment(
    ctx: &mut Ctx<'_>,
    tok: TokenId,
    value: Value,
    logger: &mut dyn ErrorLogger,
) -> Result<(), AnalysisError> {
    // find the enclosing simple assignment
    let mut cur = tok;
    let assign = loop {
        match ctx.tokens[cur].ast_parent() {
            Some(p) if ctx.tokens[p].str() == "=" && ctx.tokens[p].is_binary_op() => break Some(p),
            Some(p) if ctx.tokens[p].is_cast() || ctx.tokens[p].str() == "," => cur = p,
            _ => break None,
        }
    };
    let Some(assign) = assign else {
        // `=` itself was passed for reference binding
        if ctx.tokens[tok].str() == "=" {
            return propagate_from_assign(ctx, tok, value, logger);
        }
        return Ok(());
    };
    propagate_from_assign(ctx, assign, value, logger)
}

fn propagate_from_assign(
    ctx: &mut Ctx<'_>,
    assign: TokenId,
    value: Value,
    logger: &mut dyn ErrorLogger,
) -> Result<(), AnalysisError> {
    let Some(lhs) = ctx.tokens[assign].ast_op1() else { return Ok(()) };
    if ctx.tokens[lhs].expr_id() == 0 {
        return Ok(());
    }
    let Some(scope_end) = ctx.tokens[assign]
        .scope()
        .and_then(|s| function_body_end(ctx.symbols, s))
    else {
        return Ok(());
    };
    let Some(start) = next_after_ast_rightmost_leaf(ctx.tokens, assign) else {
        return Ok(());
    };
    let result = value_flow_forward(ctx, start, scope_end, lhs, value);
    seeded(result, ctx.tokens, logger)
}

/// `std::move(x)` marks later reads of `x`.
fn value_flow_move(
    ctx: &mut Ctx<'_>,
    logger: &mut dyn ErrorLogger,
) -> Result<(), AnalysisError> {
    let ids: Vec<TokenId> = ctx.tokens.ids().collect();
    for id in ids {
        let t = &ctx.tokens[id];
        if t.str() != "(" || t.ast_op1().is_none() {
            continue;
        }
        let callee = t.ast_op1().unwrap();
        let callee_name = if ctx.tokens[callee].str() == "::" {
            ctx.tokens[callee]
                .ast_op2()
                .map(|n| ctx.tokens[n].str().to_string())
        } else {
            Some(ctx.tokens[callee].str().to_string())
        };
        let kind = match callee_name.as_deref() {
            Some("move") => MoveKind::Moved,
            Some("forward") => MoveKind::Forwarded,
            _ => continue,
        };
        let Some(arg) = t.ast_op2().filter(|&a| ctx.tokens[a].var_id() != 0) else {
            continue;
        };
        let Some(scope_end) = ctx.tokens[id]
            .scope()
            .and_then(|s| function_body_end(ctx.symbols, s))
        else {
            continue;
        };
        let Some(start) = next_after_ast_rightmost_leaf(ctx.tokens, id) else {
            continue;
        };
        let mut value = Value::moved(kind);
        value.kind = ValueKind::Known;
        value.push_path(id, format!("Calling std::{}", if kind == MoveKind::Moved { "move" } else { "forward" }));
        let result = value_flow_forward(ctx, start, scope_end, arg, value);
        seeded(result, ctx.tokens, logger)?;
    }
    Ok(())
}

/// Default-constructed containers are empty.
fn value_flow_container_size(
    ctx: &mut Ctx<'_>,
    logger: &mut dyn ErrorLogger,
) -> Result<(), AnalysisError> {
    let count = ctx.symbols.variable_list().len();
    for var_id in 1..count {
        let Some(var) = ctx.symbols.variable_from_var_id(var_id as u32) else {
            continue;
        };
        if !var.is_local() || var.is_init() {
            continue;
        }
        if var
            .value_type
            .as_ref()
            .map_or(true, |vt| vt.kind != ValueTypeKind::Container)
        {
            continue;
        }
        let Some(name_tok) = var.name_tok else { continue };
        let Some(scope_end) = var.scope.and_then(|s| ctx.symbols.scope(s).body_end) else {
            continue;
        };
        let Some(start) = ctx.tokens.next(name_tok) else { continue };
        let mut value = Value::container_size(0);
        value.kind = ValueKind::Known;
        value.push_path(name_tok, format!("Container '{}' is empty", var.name));
        let result = value_flow_forward(ctx, start, scope_end, name_tok, value);
        seeded(result, ctx.tokens, logger)?;
    }
    Ok(())
}
