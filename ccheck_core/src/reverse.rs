//! Generic reverse traversal: walks backward from a seed to the function
//! start. An assignment seen on the way spawns a forward pass on its other
//! side so known values stay coherent; the spawned pass never mutates the
//! outer reverse state.

use ccheck_config::Settings;

use crate::analyzer::{Action, Analyzer, Assume, Ctx, Direction, Evaluate};
use crate::astutils::{
    ast_is_lhs, ast_is_rhs, expression_string, get_cond_tok_from_end, is_const_expression,
    is_unevaluated_context, next_after_ast_rightmost_leaf, previous_before_ast_leftmost_leaf,
    visit_ast_nodes, ChildrenToVisit,
};
use crate::errors::AnalysisError;
use crate::forward::{value_flow_generic_forward, value_flow_generic_forward_recursive};
use crate::mathlib::Bigint;
use crate::symbols::{FunctionId, ScopeKind};
use crate::token::TokenId;

pub struct ReverseTraversal<A: Analyzer + Clone> {
    pub analyzer: A,
}

impl<A: Analyzer + Clone> ReverseTraversal<A> {
    pub fn new(analyzer: A) -> Self {
        ReverseTraversal { analyzer }
    }

    fn eval_cond(&self, ctx: &Ctx<'_>, tok: TokenId) -> (bool, bool) {
        let result: Vec<Bigint> =
            self.analyzer
                .evaluate(ctx, Evaluate::Integral, Some(tok), None);
        let check_then = result.iter().any(|&x| x == 1);
        let check_else = result.iter().any(|&x| x == 0);
        (check_then, check_else)
    }

    fn update(&mut self, ctx: &mut Ctx<'_>, tok: TokenId) -> bool {
        let action = self.analyzer.analyze(ctx, tok, Direction::Reverse);
        if action.is_inconclusive() && !self.analyzer.lower_to_inconclusive() {
            return false;
        }
        if action.is_invalid() {
            return false;
        }
        if !action.is_none() {
            self.analyzer.update(ctx, tok, action, Direction::Reverse);
        }
        true
    }

    fn update_recursive(&mut self, ctx: &mut Ctx<'_>, start: TokenId) -> bool {
        let mut continue_b = true;
        let mut work = vec![start];
        while let Some(tok) = work.pop() {
            let mut parent = ctx.tokens[tok].ast_parent();
            while parent.is_some_and(|p| ctx.tokens[p].str() == ":") {
                parent = ctx.tokens[parent.unwrap()].ast_parent();
            }
            if self.is_unevaluated_operand(ctx, tok) || self.is_dead_code(ctx, tok, parent).is_some()
            {
                continue;
            }
            continue_b &= self.update(ctx, tok);
            if !continue_b {
                return false;
            }
            if let Some(op2) = ctx.tokens[tok].ast_op2() {
                work.push(op2);
            }
            if let Some(op1) = ctx.tokens[tok].ast_op1() {
                work.push(op1);
            }
        }
        continue_b
    }

    fn is_unevaluated_operand(&self, ctx: &Ctx<'_>, tok: TokenId) -> bool {
        // inside sizeof(...)/decltype(...)
        let mut cur = Some(tok);
        let mut guard = 0;
        while let Some(t) = cur {
            guard += 1;
            if guard > 200 {
                return false;
            }
            if ctx.tokens[t].str() == "(" && is_unevaluated_context(ctx.tokens, ctx.tokens.prev(t))
            {
                return true;
            }
            cur = ctx.tokens[t].ast_parent();
        }
        false
    }

    fn analyze_recursive(&self, ctx: &Ctx<'_>, start: TokenId) -> Action {
        let mut result = Action::NONE;
        visit_ast_nodes(ctx.tokens, start, &mut |tok| {
            result |= self.analyzer.analyze(ctx, tok, Direction::Reverse);
            if result.is_modified() {
                return ChildrenToVisit::Done;
            }
            ChildrenToVisit::Op1AndOp2
        });
        result
    }

    fn analyze_range(&self, ctx: &Ctx<'_>, start: TokenId, end: TokenId) -> Action {
        let mut result = Action::NONE;
        let mut cur = start;
        while cur != end {
            let action = self.analyzer.analyze(ctx, cur, Direction::Reverse);
            if action.is_modified() {
                return action;
            }
            result |= action;
            match ctx.tokens.next(cur) {
                Some(next) => cur = next,
                None => break,
            }
        }
        result
    }

    /// If `tok` sits on a dead side of `?:`/`&&`/`||`, the token to jump to.
    fn is_dead_code(
        &self,
        ctx: &Ctx<'_>,
        tok: TokenId,
        end: Option<TokenId>,
    ) -> Option<TokenId> {
        let mut op_side = 0;
        let mut cur = tok;
        let mut guard = 0;
        while let Some(parent) = ctx.tokens[cur].ast_parent() {
            guard += 1;
            if guard > 200 {
                return None;
            }
            if Some(cur) == end {
                break;
            }
            if ctx.tokens[parent].str() == ":" {
                if ast_is_lhs(ctx.tokens, cur) {
                    op_side = 1;
                } else if ast_is_rhs(ctx.tokens, cur) {
                    op_side = 2;
                } else {
                    op_side = 0;
                }
            }
            if ctx.tokens[parent].ast_op2() != Some(cur) {
                cur = parent;
                continue;
            }
            let mut cond_parent = parent;
            if ctx.tokens[cond_parent].str() == ":" {
                match ctx.tokens[cond_parent].ast_parent() {
                    Some(p) => cond_parent = p,
                    None => {
                        cur = parent;
                        continue;
                    }
                }
            }
            if !matches!(ctx.tokens[cond_parent].str(), "||" | "&&" | "?") {
                cur = parent;
                continue;
            }
            let Some(cond_tok) = ctx.tokens[cond_parent].ast_op1() else {
                cur = parent;
                continue;
            };
            let (check_then, check_else) = self.eval_cond(ctx, cond_tok);
            if ctx.tokens[cond_parent].str() == "?" {
                if check_else && op_side == 1 {
                    return Some(cond_parent);
                }
                if check_then && op_side == 2 {
                    return Some(cond_parent);
                }
            }
            if !check_then && ctx.tokens[cond_parent].str() == "&&" {
                return Some(cond_parent);
            }
            if !check_else && ctx.tokens[cond_parent].str() == "||" {
                return Some(cond_parent);
            }
            cur = parent;
        }
        None
    }

    pub fn traverse(
        &mut self,
        ctx: &mut Ctx<'_>,
        start: TokenId,
        end: Option<TokenId>,
    ) -> Result<(), AnalysisError> {
        if Some(start) == end {
            return Ok(());
        }
        let mut last_index = start.0;
        let mut cur = start;
        loop {
            let Some(tok) = ctx.tokens.prev(cur) else { break };
            if end.is_some_and(|e| tok <= e) {
                break;
            }
            if tok.0 >= last_index {
                return Err(AnalysisError::internal(tok, "cyclic reverse analysis"));
            }
            last_index = tok.0;

            // function (or lambda) start: handle constructor initializers
            if ctx.tokens[tok].str() == "{"
                && ctx.tokens[tok].scope().is_some_and(|s| {
                    matches!(
                        ctx.symbols.scope(s).kind,
                        ScopeKind::Function | ScopeKind::Lambda
                    ) && ctx.symbols.scope(s).body_start == Some(tok)
                })
            {
                let function = ctx.tokens[tok]
                    .scope()
                    .and_then(|s| ctx.symbols.scope(s).function);
                if let Some(init_start) = function.and_then(|f| {
                    constructor_initializer_start(ctx, f)
                }) {
                    self.traverse(ctx, tok, Some(init_start))?;
                }
                break;
            }
            if matches!(ctx.tokens[tok].str(), "return" | "break" | "continue") {
                break;
            }
            if ctx.tokens[tok].is_name() && ctx.tokens.is(ctx.tokens.next(tok), ":") {
                break;
            }
            if ctx.tokens[tok].str() == ":" {
                cur = tok;
                continue;
            }
            // evaluate LHS of assignment before RHS
            if let Some(assign_tok) = assign_expr(ctx, tok) {
                if ctx.tokens[assign_tok].ast_op1().is_none()
                    || ctx.tokens[assign_tok].ast_op2().is_none()
                {
                    break;
                }
                let mut assign_top = assign_tok;
                let mut continue_b = true;
                while ctx.tokens[assign_top].is_assignment_op() {
                    let op1 = ctx.tokens[assign_top].ast_op1().unwrap();
                    if !ctx.tokens[op1].is_assignment_op() {
                        continue_b &= self.update_recursive(ctx, op1);
                    }
                    match ctx.tokens[assign_top].ast_parent() {
                        Some(parent) => assign_top = parent,
                        None => break,
                    }
                }
                // assignment in dead code
                if let Some(parent) = self.is_dead_code(ctx, assign_tok, None) {
                    cur = parent;
                    continue;
                }
                // simple assignment
                let top_parent = ctx.tokens[assign_tok].ast_parent();
                if ctx.tokens[assign_tok].str() == "="
                    && (top_parent == Some(assign_top) || assign_tok == assign_top)
                {
                    let op1 = ctx.tokens[assign_tok].ast_op1().unwrap();
                    let op2 = ctx.tokens[assign_tok].ast_op2().unwrap();
                    let rhs_action = self.analyze_recursive(ctx, op2);
                    let lhs_action = self.analyze_recursive(ctx, op1);
                    if rhs_action.is_read()
                        && !lhs_action.is_invalid()
                        && ctx.tokens[op1].expr_id() > 0
                    {
                        let info =
                            format!("Assignment from '{}'", expression_string(ctx.tokens, op2));
                        if let Some(a) = self.analyzer.reanalyze(ctx, op1, &info) {
                            let scope_end = ctx.tokens[op2]
                                .scope()
                                .and_then(|s| ctx.symbols.scope(s).body_end);
                            if let Some(start_tok) =
                                next_after_ast_rightmost_leaf(ctx.tokens, op2)
                            {
                                value_flow_generic_forward(ctx, start_tok, scope_end, a)?;
                            }
                        }
                    } else if lhs_action.matches()
                        && !ctx.tokens[op2].has_known_int_value()
                        && ctx.tokens[op2].expr_id() > 0
                        && is_const_expression(ctx.tokens, ctx.settings, op2)
                    {
                        let info =
                            format!("Assignment to '{}'", expression_string(ctx.tokens, op1));
                        if let Some(a) = self.analyzer.reanalyze(ctx, op2, &info) {
                            let scope_end = ctx.tokens[op2]
                                .scope()
                                .and_then(|s| ctx.symbols.scope(s).body_end);
                            if let Some(start_tok) =
                                next_after_ast_rightmost_leaf(ctx.tokens, op2)
                            {
                                value_flow_generic_forward(ctx, start_tok, scope_end, a.clone())?;
                            }
                            if let Some(prev) = ctx.tokens.prev(op1) {
                                value_flow_generic_reverse(ctx, prev, end, a)?;
                            }
                        }
                    }
                }
                if !continue_b {
                    break;
                }
                let op2_top = ctx.tokens[assign_top].ast_op2();
                match op2_top {
                    Some(op2_top) => {
                        if !self.update_recursive(ctx, op2_top) {
                            break;
                        }
                    }
                    None => break,
                }
                match previous_before_ast_leftmost_leaf(ctx.tokens, assign_top) {
                    Some(before) => {
                        cur = match ctx.tokens.next(before) {
                            Some(n) => n,
                            None => break,
                        };
                        continue;
                    }
                    None => break,
                }
            }
            if ctx.tokens[tok].str() == ")" && !self.is_reverse_unevaluated(ctx, tok) {
                if let Some(open) = ctx.tokens[tok].link() {
                    if ctx.tokens[open].ast_parent().is_some() || ctx.tokens[open].ast_op1().is_some() {
                        let top = ctx.tokens.ast_top(open);
                        if !self.update_recursive(ctx, top) {
                            break;
                        }
                        if let Some(before) = previous_before_ast_leftmost_leaf(ctx.tokens, top) {
                            if before < tok {
                                cur = match ctx.tokens.next(before) {
                                    Some(n) => n,
                                    None => break,
                                };
                                continue;
                            }
                        }
                    }
                }
                cur = tok;
                continue;
            }
            if ctx.tokens[tok].str() == "}" && ctx.tokens[tok].link().is_some() {
                let Some(cond_tok) = get_cond_tok_from_end(ctx.tokens, tok) else {
                    break;
                };
                let cond_action = self.analyze_recursive(ctx, cond_tok);
                let cond_top = ctx.tokens.ast_top(cond_tok);
                let in_loop = ctx.tokens
                    .prev(cond_top)
                    .is_some_and(|p| matches!(ctx.tokens[p].str(), "for" | "while"));
                // evaluate the condition of for/while loops first
                if in_loop {
                    let open = ctx.tokens[tok].link().unwrap();
                    if ctx.tokens.find_simple_match(open, "goto", tok).is_some()
                        || ctx.tokens.find_simple_match(open, "break", tok).is_some()
                    {
                        break;
                    }
                    if cond_action.is_modified() {
                        break;
                    }
                    self.spawn_forward_recursive(ctx, cond_tok)?;
                }
                let has_else = ctx.tokens[tok]
                    .link()
                    .and_then(|open| ctx.tokens.tok_at(open, -2))
                    .is_some_and(|t| ctx.tokens.seq(t, &["}", "else", "{"]));
                let then_end = if has_else {
                    ctx.tokens.tok_at(ctx.tokens[tok].link().unwrap(), -2).unwrap()
                } else {
                    tok
                };
                let then_action = ctx.tokens[then_end]
                    .link()
                    .map_or(Action::NONE, |open| self.analyze_range(ctx, open, then_end));
                let else_action = if has_else {
                    ctx.tokens[tok]
                        .link()
                        .map_or(Action::NONE, |open| self.analyze_range(ctx, open, tok))
                } else {
                    Action::NONE
                };
                if then_action.is_modified() && in_loop {
                    break;
                }
                if then_action.is_modified() && !else_action.is_modified() {
                    self.analyzer.assume(ctx, Some(cond_tok), has_else, Assume::NONE);
                } else if else_action.is_modified() && !then_action.is_modified() {
                    self.analyzer.assume(ctx, Some(cond_tok), !has_else, Assume::NONE);
                } else if then_action.is_idempotent()
                    || else_action.is_idempotent()
                    || then_action.is_read()
                    || else_action.is_read()
                {
                    // bail to avoid over-constraining
                    break;
                }
                if then_action.is_invalid() || else_action.is_invalid() {
                    break;
                }
                if !then_action.is_modified() && !else_action.is_modified() {
                    self.spawn_forward_recursive(ctx, cond_tok)?;
                } else if cond_action.is_read() {
                    break;
                }
                if cond_action.is_modified() {
                    break;
                }
                cur = cond_top;
                continue;
            }
            if ctx.tokens[tok].str() == "{" && ctx.tokens[tok].link().is_some() {
                let is_loop_body = ctx.tokens.prev(tok).is_some_and(|p| {
                    ctx.tokens[p].str() == "do"
                        || (ctx.tokens[p].str() == ")"
                            && ctx.tokens[p]
                                .link()
                                .and_then(|o| ctx.tokens.prev(o))
                                .is_some_and(|k| matches!(ctx.tokens[k].str(), "for" | "while")))
                });
                if is_loop_body {
                    let end_block = ctx.tokens[tok].link().unwrap();
                    if self.analyze_range(ctx, tok, end_block).is_modified() {
                        break;
                    }
                }
                if let Some(cond_tok) =
                    ctx.tokens[tok].link().and_then(|e| get_cond_tok_from_end(ctx.tokens, e))
                {
                    let r = self.spawn_forward_recursive(ctx, cond_tok)?;
                    if r.is_modified() {
                        break;
                    }
                }
                let mut jump = tok;
                if ctx.tokens
                    .tok_at(tok, -2)
                    .is_some_and(|t| ctx.tokens.seq(t, &["}", "else", "{"]))
                {
                    jump = ctx.tokens.link_at(tok, -2).unwrap_or(jump);
                }
                if ctx.tokens.prev(jump).is_some_and(|p| ctx.tokens[p].str() == ")") {
                    if let Some(open) = ctx.tokens.prev(jump).and_then(|p| ctx.tokens[p].link()) {
                        jump = open;
                    }
                }
                cur = jump;
                continue;
            }
            if let Some(skip_to) = self.reverse_unevaluated_start(ctx, tok) {
                cur = skip_to;
                continue;
            }
            if let Some(parent) = self.is_dead_code(ctx, tok, None) {
                cur = parent;
                continue;
            }
            if ctx.tokens[tok].str() == "case" {
                let mut scope = ctx.tokens[tok].scope();
                while let Some(s) = scope {
                    if ctx.symbols.scope(s).kind == ScopeKind::Switch {
                        break;
                    }
                    scope = ctx.symbols.scope(s).nested_in;
                }
                let Some(switch_scope) = scope.filter(|&s| {
                    ctx.symbols.scope(s).kind == ScopeKind::Switch
                }) else {
                    break;
                };
                match ctx.symbols.scope(switch_scope).body_start {
                    Some(body_start) => {
                        cur = body_start;
                        continue;
                    }
                    None => break,
                }
            }
            if !self.update(ctx, tok) {
                break;
            }
            cur = tok;
        }
        Ok(())
    }

    /// Forward pass over the condition. Token updates stick; the spawned
    /// pass works on a copy and never mutates this traversal's state.
    fn spawn_forward_recursive(
        &mut self,
        ctx: &mut Ctx<'_>,
        tok: TokenId,
    ) -> Result<Action, AnalysisError> {
        let analyzer = self.analyzer.clone();
        let result = value_flow_generic_forward_recursive(ctx, tok, analyzer)?;
        Ok(result.action)
    }

    fn is_reverse_unevaluated(&self, ctx: &Ctx<'_>, tok: TokenId) -> bool {
        self.reverse_unevaluated_start(ctx, tok).is_some()
    }

    /// For a closing `)`/`>` of an unevaluated context, where to jump.
    fn reverse_unevaluated_start(&self, ctx: &Ctx<'_>, tok: TokenId) -> Option<TokenId> {
        if !matches!(ctx.tokens[tok].str(), ")" | ">") {
            return None;
        }
        let open = ctx.tokens[tok].link()?;
        if is_unevaluated_context(ctx.tokens, ctx.tokens.prev(open)) {
            return ctx.tokens.prev(open);
        }
        if ctx.tokens[open].str() == "<" {
            return Some(open);
        }
        None
    }
}

fn assign_expr(ctx: &Ctx<'_>, tok: TokenId) -> Option<TokenId> {
    let mut cur = tok;
    if matches!(ctx.tokens[cur].str(), ")" | "}") {
        cur = ctx.tokens[cur].link()?;
    }
    loop {
        let parent = ctx.tokens[cur].ast_parent()?;
        let is_rhs = ctx.tokens[parent].ast_op2() == Some(cur);
        if !is_rhs && ctx.tokens[parent].is_binary_op() {
            return None;
        }
        if ctx.tokens[parent].is_assignment_op() {
            return Some(parent);
        }
        cur = parent;
    }
}

fn constructor_initializer_start(ctx: &Ctx<'_>, function: FunctionId) -> Option<TokenId> {
    let f = ctx.symbols.function(function);
    if !f.is_constructor() {
        return None;
    }
    let close = f.arg_def.and_then(|open| ctx.tokens[open].link())?;
    ctx.tokens
        .next(close)
        .filter(|&n| ctx.tokens[n].str() == ":")
}

/// Run the analyzer backward from `start` (exclusive) to `end`.
pub fn value_flow_generic_reverse<A: Analyzer + Clone>(
    ctx: &mut Ctx<'_>,
    start: TokenId,
    end: Option<TokenId>,
    analyzer: A,
) -> Result<(), AnalysisError> {
    if Settings::terminated() {
        return Err(AnalysisError::Terminated);
    }
    if analyzer.invalid() {
        return Ok(());
    }
    let mut rt = ReverseTraversal::new(analyzer);
    rt.traverse(ctx, start, end)
}
