//! Generic forward traversal: walks tokens in source order from a seed,
//! asking the analyzer what to do at each token; handles branches, loops,
//! switch, try, lambdas and short-circuit evaluation.

use ccheck_config::Settings;
use smallvec::SmallVec;

use crate::analyzer::{Action, Analyzer, AnalyzerResult, Assume, Ctx, Direction, Evaluate, Terminate};
use crate::astutils::{
    expr_start_end, find_lambda_end_token, find_next_token_from_break, get_cond_tok,
    get_cond_tok_from_end, get_init_tok, get_step_tok, get_step_tok_from_end, is_escape_function,
    is_expression_changed, is_return_scope, is_token_written, is_unevaluated_context,
    next_after_ast_rightmost_leaf, visit_ast_nodes, ChildrenToVisit,
};
use crate::errors::AnalysisError;
use crate::mathlib::Bigint;
use crate::token::TokenId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Progress {
    Continue,
    Break,
    Skip,
}

#[derive(Clone, Copy)]
enum Visit {
    Update,
    Analyze,
}

type Step = Result<Progress, AnalysisError>;

#[derive(Clone)]
pub struct ForwardTraversal<A: Analyzer + Clone> {
    pub analyzer: A,
    pub actions: Action,
    pub terminate: Terminate,
    analyze_only: bool,
    analyze_terminate: bool,
    /// collected result of an analyze-mode traversal
    analyze_result: Action,
    loop_ends: SmallVec<[TokenId; 8]>,
}

struct Branch {
    end_block: Option<TokenId>,
    action: Action,
    check: bool,
    escape: bool,
    escape_unknown: bool,
    active: bool,
}

impl Branch {
    fn new(end_block: Option<TokenId>) -> Self {
        Branch {
            end_block,
            action: Action::NONE,
            check: false,
            escape: false,
            escape_unknown: false,
            active: false,
        }
    }

    fn is_escape(&self) -> bool {
        self.escape || self.escape_unknown
    }

    fn is_conclusive_escape(&self) -> bool {
        self.escape && !self.escape_unknown
    }

    fn is_modified(&self) -> bool {
        self.action.is_modified() && !self.is_conclusive_escape()
    }

    fn is_inconclusive(&self) -> bool {
        self.action.is_inconclusive() && !self.is_conclusive_escape()
    }

    fn is_dead(&self) -> bool {
        self.action.is_modified() || self.action.is_inconclusive() || self.is_escape()
    }
}

impl<A: Analyzer + Clone> ForwardTraversal<A> {
    pub fn new(analyzer: A) -> Self {
        ForwardTraversal {
            analyzer,
            actions: Action::NONE,
            terminate: Terminate::None,
            analyze_only: false,
            analyze_terminate: false,
            analyze_result: Action::NONE,
            loop_ends: SmallVec::new(),
        }
    }

    fn brk(&mut self, t: Terminate) -> Step {
        if (!self.analyze_only || self.analyze_terminate) && t != Terminate::None {
            self.terminate = t;
        }
        Ok(Progress::Break)
    }

    fn stop_updates(&mut self) -> bool {
        self.analyze_only = true;
        self.actions.is_modified()
    }

    fn eval_cond(&self, ctx: &Ctx<'_>, tok: Option<TokenId>, context: Option<TokenId>) -> (bool, bool) {
        let Some(tok) = tok else { return (false, false) };
        let result: Vec<Bigint> = self.analyzer.evaluate(ctx, Evaluate::Integral, Some(tok), context);
        let check_then = result.iter().any(|&x| x != 0);
        let check_else = result.iter().any(|&x| x == 0);
        (check_then, check_else)
    }

    fn is_condition_true(&self, ctx: &Ctx<'_>, tok: Option<TokenId>, context: Option<TokenId>) -> bool {
        self.eval_cond(ctx, tok, context).0
    }

    // -- per-token visit ----------------------------------------------------

    fn apply(&mut self, ctx: &mut Ctx<'_>, tok: TokenId, visit: Visit) -> Step {
        match visit {
            Visit::Update => self.update_token(ctx, tok),
            Visit::Analyze => {
                let action = self.analyzer.analyze(ctx, tok, Direction::Forward);
                self.analyze_result |= action;
                if action.is_modified() || action.is_inconclusive() {
                    return self.brk(Terminate::None);
                }
                Ok(Progress::Continue)
            }
        }
    }

    fn update_token(&mut self, ctx: &mut Ctx<'_>, tok: TokenId) -> Step {
        let action = self.analyzer.analyze(ctx, tok, Direction::Forward);
        self.actions |= action;
        if !action.is_none() && !self.analyze_only {
            self.analyzer.update(ctx, tok, action, Direction::Forward);
        }
        if action.is_inconclusive() && !self.analyzer.lower_to_inconclusive() {
            return self.brk(Terminate::Inconclusive);
        }
        if action.is_invalid() {
            return self.brk(Terminate::Modified);
        }
        if action.is_write() && !action.is_read() {
            // analysis of this write continues separately
            return self.brk(Terminate::Modified);
        }
        Ok(Progress::Continue)
    }

    // -- expression traversal ----------------------------------------------

    fn traverse_tok(
        &mut self,
        ctx: &mut Ctx<'_>,
        tok: TokenId,
        visit: Visit,
        traverse_unknown: bool,
        out: &mut Option<TokenId>,
    ) -> Step {
        let text = ctx.tokens[tok].str().to_string();
        if matches!(text.as_str(), "asm" | "goto") {
            return self.brk(Terminate::Bail);
        }
        if matches!(text.as_str(), "setjmp" | "longjmp") && ctx.tokens.is(ctx.tokens.next(tok), "(") {
            // traverse the parameters before escaping
            let args = ctx.tokens.next(tok).and_then(|p| ctx.tokens.ast_op2(p));
            self.traverse_recursive(ctx, args, visit, traverse_unknown, 0)?;
            return self.brk(Terminate::Bail);
        }
        if text == "continue" {
            match self.loop_ends.last() {
                None => return self.brk(Terminate::Escape),
                // jump to the loop end so the step expression still runs
                Some(&end) => *out = Some(end),
            }
        } else if matches!(text.as_str(), "return" | "throw") {
            let op2 = ctx.tokens.ast_op2(tok);
            let op1 = ctx.tokens.ast_op1(tok);
            self.traverse_recursive(ctx, op2, visit, traverse_unknown, 0)?;
            self.traverse_recursive(ctx, op1, visit, traverse_unknown, 0)?;
            return self.brk(Terminate::Escape);
        } else if is_escape_function(ctx.tokens, ctx.settings, tok) {
            let args = ctx.tokens.next(tok).and_then(|p| ctx.tokens.ast_op2(p));
            self.traverse_recursive(ctx, args, visit, traverse_unknown, 0)?;
            return self.brk(Terminate::Escape);
        } else if is_unevaluated_context(ctx.tokens, ctx.tokens.prev(tok)) {
            *out = ctx.tokens[tok].link();
            return Ok(Progress::Skip);
        } else if ctx.tokens[tok].is_binary_op()
            && matches!(text.as_str(), "?" | "&&" | "||")
        {
            if self.traverse_conditional(ctx, tok, visit, traverse_unknown)? == Progress::Break {
                return self.brk(Terminate::None);
            }
            *out = next_after_ast_rightmost_leaf(ctx.tokens, tok);
            return Ok(Progress::Skip);
        } else if let Some(lambda_end) = find_lambda_end_token(ctx.tokens, tok) {
            // skip lambdas; bail if the body modifies the expression
            if self.check_scope_forked(ctx, lambda_end)?.is_modified() {
                return self.brk(Terminate::Bail);
            }
            *out = ctx.tokens.next(lambda_end);
        } else if text == "{"
            && ctx.tokens[tok]
                .scope()
                .is_some_and(|s| ctx.symbols.scope(s).is_class_or_struct())
        {
            *out = ctx.tokens[tok].link();
        } else {
            return self.apply(ctx, tok, visit);
        }
        Ok(Progress::Continue)
    }

    fn traverse_recursive(
        &mut self,
        ctx: &mut Ctx<'_>,
        tok: Option<TokenId>,
        visit: Visit,
        traverse_unknown: bool,
        recursion: u32,
    ) -> Step {
        let Some(tok) = tok else { return Ok(Progress::Continue) };
        if recursion > 1000 {
            return Ok(Progress::Skip);
        }
        let mut first_op = ctx.tokens.ast_op1(tok);
        let mut second_op = ctx.tokens.ast_op2(tok);
        // evaluate RHS of assignment before LHS, arguments before the call
        if ctx.tokens[tok].is_assignment_op()
            || second_op.is_none()
            || is_function_call(ctx, tok)
        {
            std::mem::swap(&mut first_op, &mut second_op);
        }
        if self.traverse_recursive(ctx, first_op, visit, traverse_unknown, recursion + 1)?
            == Progress::Break
        {
            return self.brk(Terminate::None);
        }
        let p = if ctx.tokens[tok].is_assignment_op() {
            Progress::Continue
        } else {
            let mut out = None;
            self.traverse_tok(ctx, tok, visit, traverse_unknown, &mut out)?
        };
        if p == Progress::Break {
            return self.brk(Terminate::None);
        }
        if p == Progress::Continue
            && self.traverse_recursive(ctx, second_op, visit, traverse_unknown, recursion + 1)?
                == Progress::Break
        {
            return self.brk(Terminate::None);
        }
        if ctx.tokens[tok].is_assignment_op() {
            let mut out = None;
            if self.traverse_tok(ctx, tok, visit, traverse_unknown, &mut out)? == Progress::Break {
                return self.brk(Terminate::None);
            }
        }
        Ok(Progress::Continue)
    }

    fn traverse_conditional(
        &mut self,
        ctx: &mut Ctx<'_>,
        tok: TokenId,
        visit: Visit,
        traverse_unknown: bool,
    ) -> Step {
        let cond_tok = ctx.tokens.ast_op1(tok);
        let child_tok = ctx.tokens.ast_op2(tok);
        let (Some(cond_tok), Some(child_tok)) = (cond_tok, child_tok) else {
            return Ok(Progress::Continue);
        };
        let (mut check_then, mut check_else) = self.eval_cond(ctx, Some(cond_tok), None);
        if !check_then && !check_else {
            if !traverse_unknown
                && self.analyzer.stop_on_condition(ctx, cond_tok)
                && self.stop_updates()
            {
                return Ok(Progress::Continue);
            }
            check_then = true;
            check_else = true;
        }
        let text = ctx.tokens[tok].str().to_string();
        if ctx.tokens[child_tok].str() == ":" {
            let then_tok = ctx.tokens.ast_op1(child_tok);
            let else_tok = ctx.tokens.ast_op2(child_tok);
            if check_then
                && self.traverse_recursive(ctx, then_tok, visit, traverse_unknown, 0)?
                    == Progress::Break
            {
                return self.brk(Terminate::None);
            }
            if check_else
                && self.traverse_recursive(ctx, else_tok, visit, traverse_unknown, 0)?
                    == Progress::Break
            {
                return self.brk(Terminate::None);
            }
        } else {
            if !check_then && text == "&&" {
                return Ok(Progress::Continue);
            }
            if !check_else && text == "||" {
                return Ok(Progress::Continue);
            }
            if self.traverse_recursive(ctx, Some(child_tok), visit, traverse_unknown, 0)?
                == Progress::Break
            {
                return self.brk(Terminate::None);
            }
        }
        Ok(Progress::Continue)
    }

    fn update_tok(&mut self, ctx: &mut Ctx<'_>, tok: TokenId, out: &mut Option<TokenId>) -> Step {
        self.traverse_tok(ctx, tok, Visit::Update, false, out)
    }

    fn update_recursive(&mut self, ctx: &mut Ctx<'_>, tok: Option<TokenId>) -> Step {
        self.traverse_recursive(ctx, tok, Visit::Update, false, 0)
    }

    fn analyze_recursive(&mut self, ctx: &mut Ctx<'_>, tok: Option<TokenId>) -> Result<Action, AnalysisError> {
        self.analyze_result = Action::NONE;
        self.traverse_recursive(ctx, tok, Visit::Analyze, true, 0)?;
        Ok(self.analyze_result)
    }

    fn analyze_range(&self, ctx: &Ctx<'_>, start: TokenId, end: TokenId) -> Action {
        let mut result = Action::NONE;
        let mut cur = start;
        while cur != end {
            let action = self.analyzer.analyze(ctx, cur, Direction::Forward);
            if action.is_modified() || action.is_inconclusive() {
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

    // -- forking ------------------------------------------------------------

    fn fork(&self, analyze: bool) -> Self {
        let mut ft = self.clone();
        if analyze {
            ft.analyze_only = true;
            ft.analyze_terminate = true;
        }
        ft.actions = Action::NONE;
        ft.terminate = Terminate::None;
        ft
    }

    fn try_fork_scope(&self, ctx: &Ctx<'_>, end_block: TokenId, modified: bool) -> Option<Self> {
        if self.analyzer.update_scope(ctx, end_block, modified) {
            return Some(self.fork(false));
        }
        None
    }

    fn try_fork_update_scope(
        &self,
        ctx: &mut Ctx<'_>,
        end_block: TokenId,
        modified: bool,
    ) -> Result<Option<Self>, AnalysisError> {
        let mut forked = self.try_fork_scope(ctx, end_block, modified);
        if let Some(ft) = forked.as_mut() {
            ft.update_scope_range(ctx, end_block)?;
        }
        Ok(forked)
    }

    fn analyze_scope(&self, ctx: &Ctx<'_>, end_block: TokenId) -> Action {
        let Some(start) = ctx.tokens[end_block].link() else {
            return Action::NONE;
        };
        self.analyze_range(ctx, start, end_block)
    }

    /// Analysis-only probe of a scope, forking to update when needed (used
    /// for lambda bodies).
    fn check_scope_forked(&mut self, ctx: &mut Ctx<'_>, end_block: TokenId) -> Result<Action, AnalysisError> {
        let action = self.analyze_scope(ctx, end_block);
        self.try_fork_update_scope(ctx, end_block, action.is_modified())?;
        Ok(action)
    }

    fn check_branch(&mut self, ctx: &mut Ctx<'_>, branch: &mut Branch) -> Result<bool, AnalysisError> {
        let Some(end_block) = branch.end_block else { return Ok(false) };
        let action = self.analyze_scope(ctx, end_block);
        branch.action = action;
        let forked = self.try_fork_update_scope(ctx, end_block, action.is_modified())?;
        let bail = has_goto(ctx, end_block);
        if !action.is_modified() && !bail {
            match forked {
                Some(ft) => {
                    if ft.terminate == Terminate::Escape {
                        branch.escape = true;
                        branch.escape_unknown = false;
                    }
                }
                None => {
                    // look inside for a conditional escape
                    if !branch.escape && has_inner_return_scope(ctx, end_block) {
                        let mut probe = self.fork(true);
                        probe.update_scope_range(ctx, end_block)?;
                        if probe.terminate == Terminate::Escape {
                            branch.escape = true;
                            branch.escape_unknown = false;
                        }
                    }
                }
            }
        }
        Ok(bail)
    }

    fn reenters_loop(
        &self,
        ctx: &mut Ctx<'_>,
        end_block: TokenId,
        cond_tok: Option<TokenId>,
        step_tok: Option<TokenId>,
    ) -> Result<bool, AnalysisError> {
        let Some(cond_tok) = cond_tok else { return Ok(true) };
        if ctx.tokens[cond_tok].str() == ":" {
            return Ok(true);
        }
        let mut step_changes_cond = false;
        if let Some(step_tok) = step_tok {
            let (start, end) = expr_start_end(ctx.tokens, step_tok);
            if let Some(after) = ctx.tokens.next(end) {
                step_changes_cond =
                    is_expression_changed(ctx.tokens, ctx.settings, cond_tok, start, after);
            }
        }
        let body_changes_cond = ctx.tokens[end_block].link().is_some_and(|open| {
            is_expression_changed(ctx.tokens, ctx.settings, cond_tok, open, end_block)
        });
        let mut cond_changed = false;
        visit_ast_nodes(ctx.tokens, cond_tok, &mut |t| {
            if is_token_written(ctx.tokens, ctx.settings, t) {
                cond_changed = true;
                return ChildrenToVisit::Done;
            }
            ChildrenToVisit::Op1AndOp2
        });
        if !(step_changes_cond || body_changes_cond || cond_changed) {
            return Ok(true);
        }
        let mut ft = self.fork(true);
        ft.update_scope_range(ctx, end_block)?;
        Ok(ft.is_condition_true(ctx, Some(cond_tok), None) && body_changes_cond)
    }

    // -- loops --------------------------------------------------------------

    fn update_inner_loop(
        &mut self,
        ctx: &mut Ctx<'_>,
        end_block: TokenId,
        step_tok: Option<TokenId>,
        cond_tok: Option<TokenId>,
    ) -> Step {
        self.loop_ends.push(end_block);
        let result = self.update_inner_loop_impl(ctx, end_block, step_tok, cond_tok);
        self.loop_ends.pop();
        result
    }

    fn update_inner_loop_impl(
        &mut self,
        ctx: &mut Ctx<'_>,
        end_block: TokenId,
        step_tok: Option<TokenId>,
        cond_tok: Option<TokenId>,
    ) -> Step {
        if self.update_scope_range(ctx, end_block)? == Progress::Break {
            return self.brk(Terminate::None);
        }
        if step_tok.is_some() && self.update_recursive(ctx, step_tok)? == Progress::Break {
            return self.brk(Terminate::None);
        }
        if let Some(cond) = cond_tok {
            if ctx.tokens[cond].str() != ":"
                && self.update_recursive(ctx, Some(cond))? == Progress::Break
            {
                return self.brk(Terminate::None);
            }
        }
        Ok(Progress::Continue)
    }

    #[allow(clippy::too_many_arguments)]
    fn update_loop(
        &mut self,
        ctx: &mut Ctx<'_>,
        end_token: Option<TokenId>,
        end_block: TokenId,
        cond_tok: Option<TokenId>,
        init_tok: Option<TokenId>,
        step_tok: Option<TokenId>,
        exit: bool,
    ) -> Step {
        if init_tok.is_some() && self.update_recursive(ctx, init_tok)? == Progress::Break {
            return self.brk(Terminate::None);
        }
        let is_do_while = cond_tok.is_some_and(|c| end_block < c);
        let mut check_then = true;
        let mut check_else = false;
        if let Some(cond) = cond_tok {
            if ctx.tokens[cond].str() != ":" {
                let context = if is_do_while {
                    ctx.tokens.prev(end_block)
                } else {
                    None
                };
                let (t, e) = self.eval_cond(ctx, Some(cond), context);
                check_then = t;
                check_else = e;
            }
        }
        // exiting a do while(false)
        if check_else && exit {
            if has_jump(ctx, end_block) {
                if !self.analyzer.lower_to_possible() {
                    return self.brk(Terminate::Bail);
                }
                if self.analyzer.is_conditional() && self.stop_updates() {
                    return self.brk(Terminate::Conditional);
                }
            }
            return Ok(Progress::Continue);
        }
        let body_analysis = self.analyze_scope(ctx, end_block);
        let mut all_analysis = body_analysis;
        let mut cond_analysis = Action::NONE;
        if let Some(cond) = cond_tok {
            cond_analysis = self.fork(true).analyze_recursive(ctx, Some(cond))?;
            all_analysis |= cond_analysis;
        }
        if let Some(step) = step_tok {
            all_analysis |= self.fork(true).analyze_recursive(ctx, Some(step))?;
        }
        self.actions |= all_analysis;
        // do while(false) is not really a loop
        if check_else && is_do_while {
            let known_cond = cond_tok.is_some_and(|c| ctx.tokens[c].has_known_int_value());
            if known_cond
                || (!body_analysis.is_modified()
                    && !cond_analysis.is_modified()
                    && cond_analysis.is_read())
            {
                if let Some(open) = ctx.tokens[end_block].link() {
                    if self.update_range(ctx, open, Some(end_block), 20)? == Progress::Break {
                        return self.brk(Terminate::None);
                    }
                }
                return self.update_recursive(ctx, cond_tok);
            }
        }
        if all_analysis.is_inconclusive() {
            if !self.analyzer.lower_to_inconclusive() {
                return self.brk(Terminate::Bail);
            }
        } else if all_analysis.is_modified() || (exit && all_analysis.is_idempotent()) {
            if !self.analyzer.lower_to_possible() {
                return self.brk(Terminate::Bail);
            }
        }

        if let Some(cond) = cond_tok {
            if ctx.tokens[cond].str() != ":"
                && (!is_do_while || (!body_analysis.is_modified() && !body_analysis.is_idempotent()))
                && self.update_recursive(ctx, Some(cond))? == Progress::Break
            {
                return self.brk(Terminate::None);
            }
        }
        if !check_then && !check_else && !is_do_while {
            if let Some(cond) = cond_tok {
                if self.analyzer.stop_on_condition(ctx, cond) && self.stop_updates() {
                    return self.brk(Terminate::Conditional);
                }
            }
        }
        // condition is false: the loop body never runs
        if check_else {
            return Ok(Progress::Continue);
        }
        if check_then || is_do_while {
            // re-entering, so assume the condition is true inside
            if exit {
                self.analyzer
                    .assume(ctx, cond_tok, true, Assume::QUIET | Assume::ABSOLUTE);
            }
            if self.update_inner_loop(ctx, end_block, step_tok, cond_tok)? == Progress::Break {
                return self.brk(Terminate::None);
            }
            // if the loop re-enters the value could be modified again
            if all_analysis.is_modified()
                && self.reenters_loop(ctx, end_block, cond_tok, step_tok)?
            {
                return self.brk(Terminate::Bail);
            }
            if all_analysis.is_incremental() {
                return self.brk(Terminate::Bail);
            }
        } else if all_analysis.is_modified() {
            let forked = self.try_fork_scope(ctx, end_block, true);
            let mut fork_continue = true;
            let mut forks: Vec<Self> = forked.into_iter().collect();
            for ft in &mut forks {
                if cond_tok.is_some() {
                    ft.analyzer.assume(ctx, cond_tok, false, Assume::QUIET);
                }
                if ft.update_inner_loop(ctx, end_block, step_tok, cond_tok)? == Progress::Break {
                    fork_continue = false;
                }
            }
            if all_analysis.is_modified() || !fork_continue {
                let Some(cond) = cond_tok else {
                    return self.brk(Terminate::Bail);
                };
                if self.analyzer.is_conditional() && self.stop_updates() {
                    return self.brk(Terminate::Conditional);
                }
                self.analyzer.assume(ctx, Some(cond), false, Assume::NONE);
            }
            if fork_continue {
                for ft in &mut forks {
                    if !ft.actions.is_incremental() {
                        ft.update_range(ctx, end_block, end_token, 20)?;
                    }
                }
            }
            if all_analysis.is_incremental() {
                return self.brk(Terminate::Bail);
            }
        } else {
            if self.update_inner_loop(ctx, end_block, step_tok, cond_tok)? == Progress::Break {
                return Ok(Progress::Break);
            }
            if all_analysis.is_incremental() {
                return self.brk(Terminate::Bail);
            }
        }
        Ok(Progress::Continue)
    }

    fn update_loop_exit(
        &mut self,
        ctx: &mut Ctx<'_>,
        end_token: Option<TokenId>,
        end_block: TokenId,
        cond_tok: Option<TokenId>,
        step_tok: Option<TokenId>,
    ) -> Step {
        self.update_loop(ctx, end_token, end_block, cond_tok, None, step_tok, true)
    }

    fn update_scope_range(&mut self, ctx: &mut Ctx<'_>, end_block: TokenId) -> Step {
        let Some(start) = ctx.tokens[end_block].link() else {
            return self.brk(Terminate::None);
        };
        self.update_range(ctx, start, Some(end_block), 20)
    }

    // -- the main walk ------------------------------------------------------

    pub fn update_range(
        &mut self,
        ctx: &mut Ctx<'_>,
        start: TokenId,
        end: Option<TokenId>,
        depth: i32,
    ) -> Step {
        if depth < 0 {
            return self.brk(Terminate::Bail);
        }
        let mut last_index: Option<u32> = None;
        let mut tok = start;
        loop {
            if let Some(end) = end {
                if tok >= end {
                    break;
                }
            } else if tok.index() >= ctx.tokens.len() {
                break;
            }
            if last_index.is_some_and(|i| tok.0 <= i) {
                return Err(AnalysisError::internal(tok, "cyclic forward analysis"));
            }
            last_index = Some(tok.0);

            let mut next: Option<TokenId> = None;
            if ctx.tokens[tok].link().is_some() {
                // skip casts and template arguments
                let t = &ctx.tokens[tok];
                if t.str() == "(" && t.ast_op2().is_none() && t.is_cast() {
                    tok = ctx.tokens[tok].link().unwrap();
                    match self.advance(ctx, tok, end)? {
                        Some(n) => {
                            tok = n;
                            continue;
                        }
                        None => break,
                    }
                }
                if t.str() == "<" {
                    tok = ctx.tokens[tok].link().unwrap();
                    match self.advance(ctx, tok, end)? {
                        Some(n) => {
                            tok = n;
                            continue;
                        }
                        None => break,
                    }
                }
            }

            // evaluate RHS of assignments before the LHS
            if let Some(assign_tok) = assign_expr(ctx, tok) {
                if self.update_recursive(ctx, Some(assign_tok))? == Progress::Break {
                    return self.brk(Terminate::None);
                }
                match next_after_ast_rightmost_leaf(ctx.tokens, assign_tok) {
                    Some(n) => tok = n,
                    None => return self.brk(Terminate::None),
                }
                last_index = Some(tok.0.saturating_sub(1));
                continue;
            } else if ctx.tokens.seq(tok, &[")", "{"])
                && ctx.tokens[tok]
                    .link()
                    .and_then(|open| ctx.tokens.prev(open))
                    .is_some_and(|p| matches!(ctx.tokens[p].str(), "for" | "while"))
                && !ctx.tokens[tok]
                    .link()
                    .and_then(|open| ctx.tokens.ast_op2(open))
                    .is_some_and(|c| ctx.tokens[c].str() == ":")
            {
                // in the middle of a loop structure
                return self.brk(Terminate::Bail);
            } else if ctx.tokens[tok].str() == ";" && ctx.tokens[tok].ast_parent().is_some() {
                let top = ctx.tokens.ast_top(tok);
                let top_prev = ctx.tokens.prev(top);
                if top_prev.is_some_and(|p| matches!(ctx.tokens[p].str(), "for" | "while"))
                    && ctx.tokens[top].link().is_some()
                    && ctx.tokens.seq(ctx.tokens[top].link().unwrap(), &[")", "{"])
                {
                    let end_cond = ctx.tokens[top].link().unwrap();
                    let end_block = ctx.tokens.link_at(end_cond, 1);
                    let cond_tok = get_cond_tok(ctx.tokens, top);
                    let step_tok = get_step_tok(ctx.tokens, top);
                    let op2 = ctx.tokens.ast_op2(tok);
                    if op2 != cond_tok && !op2.is_some_and(|o| ctx.tokens[o].str() == ";") {
                        return self.brk(Terminate::Bail);
                    }
                    let Some(end_block) = end_block else {
                        return self.brk(Terminate::Bail);
                    };
                    if self.update_loop(ctx, end, end_block, cond_tok, None, step_tok, false)?
                        == Progress::Break
                    {
                        return self.brk(Terminate::None);
                    }
                }
            } else if ctx.tokens[tok].str() == "break" {
                let Some(scope_end) = find_next_token_from_break(ctx.tokens, ctx.symbols, tok)
                else {
                    return self.brk(Terminate::None);
                };
                if end.is_some_and(|e| scope_end >= e) {
                    return self.brk(Terminate::Escape);
                }
                if !self.analyzer.lower_to_possible() {
                    return self.brk(Terminate::Bail);
                }
                // resume after the loop/switch end
                tok = scope_end;
                last_index = Some(tok.0.saturating_sub(1));
            } else if ctx.tokens[tok].variable().is_none()
                && ((ctx.tokens[tok].is_name()
                    && !ctx.tokens[tok].is_keyword()
                    && ctx.tokens.is(ctx.tokens.next(tok), ":"))
                    || ctx.tokens[tok].str() == "case")
            {
                if !self.analyzer.lower_to_possible() {
                    return self.brk(Terminate::Bail);
                }
            } else if ctx.tokens[tok].str() == "}" && ctx.tokens[tok].link().is_some() {
                match self.update_block_end(ctx, tok, end, depth)? {
                    BlockEnd::Continue(next_tok) => {
                        tok = next_tok;
                        last_index = Some(tok.0.saturating_sub(1));
                        match self.advance(ctx, tok, end)? {
                            Some(n) => {
                                tok = n;
                                last_index = Some(tok.0.saturating_sub(1));
                                continue;
                            }
                            None => break,
                        }
                    }
                    BlockEnd::Break(t) => return self.brk(t),
                }
            } else if ctx.tokens[tok].is_control_flow_keyword()
                && matches!(ctx.tokens[tok].str(), "if" | "while" | "for")
                && ctx.tokens.is(ctx.tokens.next(tok), "(")
                && ctx.tokens
                    .next(tok)
                    .and_then(|p| ctx.tokens[p].link())
                    .is_some_and(|close| ctx.tokens.seq(close, &[")", "{"]))
            {
                match self.update_control_structure(ctx, tok, end, depth)? {
                    ControlFlow::Continue(next_tok) => {
                        tok = next_tok;
                        last_index = Some(tok.0.saturating_sub(1));
                        match self.advance(ctx, tok, end)? {
                            Some(n) => {
                                tok = n;
                                last_index = Some(tok.0.saturating_sub(1));
                                continue;
                            }
                            None => break,
                        }
                    }
                    ControlFlow::Break(t) => return self.brk(t),
                }
            } else if ctx.tokens.seq(tok, &["try", "{"]) {
                let open = ctx.tokens.next(tok).unwrap();
                let mut end_block = ctx.tokens[open].link().unwrap();
                let mut try_traversal = self.fork(false);
                try_traversal.update_range(ctx, open, Some(end_block), depth - 1)?;
                let mut bail = try_traversal.actions.is_modified();
                if bail {
                    return self.brk(Terminate::None);
                }
                while ctx.tokens.seq(end_block, &["}", "catch", "("]) {
                    let catch_open = ctx.tokens.tok_at(end_block, 2).unwrap();
                    let Some(end_catch) = ctx.tokens[catch_open].link() else {
                        return self.brk(Terminate::None);
                    };
                    if !ctx.tokens.seq(end_catch, &[")", "{"]) {
                        return self.brk(Terminate::None);
                    }
                    let Some(block) = ctx.tokens.link_at(end_catch, 1) else {
                        return self.brk(Terminate::None);
                    };
                    end_block = block;
                    let mut ft = self.fork(false);
                    // any statement in try may have thrown; run from try start
                    ft.update_scope_range(ctx, end_block)?;
                    bail |= ft.terminate != Terminate::None || ft.actions.is_modified();
                }
                if bail {
                    return self.brk(Terminate::None);
                }
                tok = end_block;
            } else if ctx.tokens.seq(tok, &["do", "{"]) {
                let open = ctx.tokens.next(tok).unwrap();
                let end_block = ctx.tokens[open].link().unwrap();
                let cond_tok = if ctx.tokens.seq(end_block, &["}", "while", "("]) {
                    ctx.tokens
                        .tok_at(end_block, 2)
                        .and_then(|p| ctx.tokens.ast_op2(p))
                } else {
                    None
                };
                if self.update_loop(ctx, end, end_block, cond_tok, None, None, false)?
                    == Progress::Break
                {
                    return self.brk(Terminate::None);
                }
                if cond_tok.is_some() {
                    match ctx.tokens.link_at(end_block, 2).and_then(|c| ctx.tokens.next(c)) {
                        Some(after) => tok = after,
                        None => break,
                    }
                    last_index = Some(tok.0.saturating_sub(1));
                    if let Some(end) = end {
                        if tok >= end {
                            break;
                        }
                    }
                    continue;
                }
                tok = end_block;
            } else if matches!(ctx.tokens[tok].str(), "assert" | "ASSERT")
                && ctx.tokens.is(ctx.tokens.next(tok), "(")
            {
                let cond_tok = ctx.tokens.next(tok).and_then(|p| ctx.tokens.ast_op2(p));
                let (check_then, check_else) = self.eval_cond(ctx, cond_tok, None);
                if check_else {
                    return self.brk(Terminate::None);
                }
                if !check_then {
                    self.analyzer
                        .assume(ctx, cond_tok, true, Assume::QUIET | Assume::ABSOLUTE);
                }
                // skip the asserted expression
                if let Some(close) = ctx.tokens.link_at(tok, 1) {
                    tok = close;
                }
            } else if ctx.tokens.seq(tok, &["switch", "("]) {
                let cond_paren = ctx.tokens.next(tok).unwrap();
                let cond_tok = ctx.tokens.ast_op2(cond_paren);
                if self.update_recursive(ctx, cond_tok)? == Progress::Break {
                    return self.brk(Terminate::None);
                }
                match self.update_switch(ctx, tok, depth)? {
                    Some(after) => {
                        tok = after;
                        last_index = Some(tok.0.saturating_sub(1));
                        if !self.analyzer.lower_to_possible() {
                            return self.brk(Terminate::Bail);
                        }
                        if let Some(end) = end {
                            if tok >= end {
                                break;
                            }
                        }
                        continue;
                    }
                    None => return self.brk(Terminate::None),
                }
            } else if let Some(call_tok) = call_expr(ctx, tok) {
                let callee = ctx.tokens.ast_op1(call_tok);
                if start != call_tok
                    && tok != call_tok
                    && self.update_recursive(ctx, callee)? == Progress::Break
                {
                    return self.brk(Terminate::None);
                }
                // an unknown macro may hide anything: traverse as a range
                let close = ctx.tokens[call_tok].link();
                let after_open = ctx.tokens.next(call_tok);
                if let (Some(close), Some(after_open)) = (close, after_open) {
                    if after_open != close
                        && self.update_range(ctx, after_open, Some(close), depth - 1)?
                            == Progress::Break
                    {
                        return self.brk(Terminate::None);
                    }
                }
                let mut out = None;
                if self.update_tok(ctx, call_tok, &mut out)? == Progress::Break {
                    return self.brk(Terminate::None);
                }
                match close {
                    Some(close) => tok = close,
                    None => return self.brk(Terminate::None),
                }
            } else {
                let mut out = None;
                if self.update_tok(ctx, tok, &mut out)? == Progress::Break {
                    return self.brk(Terminate::None);
                }
                if let Some(next_tok) = out {
                    match end {
                        Some(e) if next_tok >= e => return Ok(Progress::Continue),
                        _ => {
                            next = ctx.tokens.prev(next_tok);
                        }
                    }
                }
            }
            if let Some(n) = next {
                tok = n;
                last_index = Some(tok.0.saturating_sub(1));
            }
            match self.advance(ctx, tok, end)? {
                Some(n) => tok = n,
                None => break,
            }
        }
        Ok(Progress::Continue)
    }

    fn advance(
        &self,
        ctx: &Ctx<'_>,
        tok: TokenId,
        _end: Option<TokenId>,
    ) -> Result<Option<TokenId>, AnalysisError> {
        Ok(ctx.tokens.next(tok))
    }

    /// `}` handling: conditional block exits, else jumps, do-while tails.
    fn update_block_end(
        &mut self,
        ctx: &mut Ctx<'_>,
        tok: TokenId,
        end: Option<TokenId>,
        _depth: i32,
    ) -> Result<BlockEnd, AnalysisError> {
        let Some(scope_id) = ctx.tokens[tok].scope() else {
            return Ok(BlockEnd::Break(Terminate::None));
        };
        let open = ctx.tokens[tok].link().unwrap();
        let before_open = ctx.tokens.prev(open);
        let scope_kind = ctx.symbols.scope(scope_id).kind;
        if before_open.is_some_and(|p| matches!(ctx.tokens[p].str(), ")" | "else")) {
            let in_else = before_open.is_some_and(|p| ctx.tokens[p].str() == "else");
            let in_loop = !in_else
                && before_open
                    .and_then(|p| ctx.tokens[p].link())
                    .and_then(|o| ctx.tokens.prev(o))
                    .is_some_and(|k| matches!(ctx.tokens[k].str(), "while" | "for"));
            let Some(cond_tok) = get_cond_tok_from_end(ctx.tokens, tok) else {
                return Ok(BlockEnd::Break(Terminate::None));
            };
            if !ctx.tokens[cond_tok].has_known_int_value() || in_loop {
                if !self.analyzer.lower_to_possible() {
                    return Ok(BlockEnd::Break(Terminate::Bail));
                }
            } else if ctx.tokens[cond_tok].known_int_value() == Some(in_else as Bigint) {
                return Ok(BlockEnd::Break(Terminate::None));
            }
            if in_loop {
                let step_tok = get_step_tok_from_end(ctx.tokens, tok);
                let mut check_else = self.eval_cond(ctx, Some(cond_tok), None).1;
                if step_tok.is_some() && !check_else {
                    if self.update_recursive(ctx, step_tok)? == Progress::Break {
                        return Ok(BlockEnd::Break(Terminate::None));
                    }
                    if self.update_recursive(ctx, Some(cond_tok))? == Progress::Break {
                        return Ok(BlockEnd::Break(Terminate::None));
                    }
                    // reevaluate the condition after the step ran
                    check_else = self.eval_cond(ctx, Some(cond_tok), None).1;
                }
                if !check_else
                    && self.update_loop_exit(ctx, end, tok, Some(cond_tok), step_tok)?
                        == Progress::Break
                {
                    return Ok(BlockEnd::Break(Terminate::None));
                }
            }
            self.analyzer
                .assume(ctx, Some(cond_tok), !in_else, Assume::QUIET);
            let mut cur = tok;
            if ctx.tokens.seq(tok, &["}", "else", "{"]) {
                match ctx.tokens.link_at(tok, 2) {
                    Some(else_end) => cur = else_end,
                    None => return Ok(BlockEnd::Break(Terminate::None)),
                }
            }
            return Ok(BlockEnd::Continue(cur));
        }
        match scope_kind {
            crate::symbols::ScopeKind::Try => {
                if !self.analyzer.lower_to_possible() {
                    return Ok(BlockEnd::Break(Terminate::Bail));
                }
                Ok(BlockEnd::Continue(tok))
            }
            crate::symbols::ScopeKind::Lambda => Ok(BlockEnd::Break(Terminate::None)),
            crate::symbols::ScopeKind::Do => {
                if ctx.tokens.seq(tok, &["}", "while", "("]) {
                    let cond = ctx.tokens
                        .tok_at(tok, 2)
                        .and_then(|p| ctx.tokens.ast_op2(p));
                    if self.update_loop_exit(ctx, end, tok, cond, None)? == Progress::Break {
                        return Ok(BlockEnd::Break(Terminate::None));
                    }
                    match ctx.tokens.link_at(tok, 2) {
                        Some(close) => Ok(BlockEnd::Continue(close)),
                        None => Ok(BlockEnd::Break(Terminate::None)),
                    }
                } else {
                    Ok(BlockEnd::Continue(tok))
                }
            }
            _ => {
                if ctx.tokens.seq(ctx.tokens.next(tok), &["else", "{"]) {
                    match ctx.tokens.next(tok).and_then(|e| ctx.tokens.link_at(e, 1)) {
                        Some(else_end) => Ok(BlockEnd::Continue(else_end)),
                        None => Ok(BlockEnd::Break(Terminate::None)),
                    }
                } else {
                    Ok(BlockEnd::Continue(tok))
                }
            }
        }
    }

    /// `if (...) { ... } [else { ... }]` and loop heads.
    fn update_control_structure(
        &mut self,
        ctx: &mut Ctx<'_>,
        tok: TokenId,
        end: Option<TokenId>,
        depth: i32,
    ) -> Result<ControlFlow, AnalysisError> {
        let end_cond = ctx.tokens.next(tok).and_then(|p| ctx.tokens[p].link()).unwrap();
        let end_block = ctx.tokens.link_at(end_cond, 1).unwrap();
        let cond_tok = get_cond_tok(ctx.tokens, tok);
        let init_tok = get_init_tok(ctx.tokens, tok);
        if init_tok.is_some() && self.update_recursive(ctx, init_tok)? == Progress::Break {
            return Ok(ControlFlow::Break(Terminate::None));
        }
        if matches!(ctx.tokens[tok].str(), "for" | "while") {
            // for-range loop
            if cond_tok.is_some_and(|c| ctx.tokens[c].str() == ":") {
                let con_tok = cond_tok.and_then(|c| ctx.tokens.ast_op2(c));
                if con_tok.is_some() && self.update_recursive(ctx, con_tok)? == Progress::Break {
                    return Ok(ControlFlow::Break(Terminate::None));
                }
                let mut is_empty = false;
                let result =
                    self.analyzer
                        .evaluate(ctx, Evaluate::ContainerEmpty, con_tok, None);
                if result.is_empty() {
                    self.analyzer
                        .assume(ctx, con_tok, false, Assume::CONTAINER_EMPTY);
                } else {
                    is_empty = result[0] != 0;
                }
                if !is_empty
                    && self.update_loop(ctx, end, end_block, cond_tok, None, None, false)?
                        == Progress::Break
                {
                    return Ok(ControlFlow::Break(Terminate::None));
                }
            } else {
                let step_tok = get_step_tok(ctx.tokens, tok);
                // init was already evaluated
                if self.update_loop(ctx, end, end_block, cond_tok, None, step_tok, false)?
                    == Progress::Break
                {
                    return Ok(ControlFlow::Break(Terminate::None));
                }
            }
            return Ok(ControlFlow::Continue(end_block));
        }
        // if
        if self.update_recursive(ctx, cond_tok)? == Progress::Break {
            return Ok(ControlFlow::Break(Terminate::None));
        }
        let mut then_branch = Branch::new(Some(end_block));
        let has_else = ctx.tokens.seq(end_block, &["}", "else", "{"]);
        let mut else_branch = Branch::new(if has_else {
            ctx.tokens.link_at(end_block, 2)
        } else {
            None
        });
        let (check_then, check_else) = self.eval_cond(ctx, cond_tok, None);
        then_branch.check = check_then;
        else_branch.check = check_else;
        if !check_then && !check_else {
            if let Some(cond) = cond_tok {
                if self.analyzer.stop_on_condition(ctx, cond) && self.stop_updates() {
                    return Ok(ControlFlow::Break(Terminate::Conditional));
                }
            }
        }
        let mut bail = false;

        // then block
        let mut unknown_tok = None;
        then_branch.escape =
            is_return_scope(ctx.tokens, ctx.settings, end_block, &mut unknown_tok);
        then_branch.escape_unknown = unknown_tok.is_some();
        if then_branch.check {
            then_branch.active = true;
            let then_start = ctx.tokens.next(end_cond).unwrap();
            if self.update_range(ctx, then_start, Some(end_block), depth - 1)? == Progress::Break {
                return Ok(ControlFlow::Break(Terminate::None));
            }
        } else if !else_branch.check {
            then_branch.active = true;
            if self.check_branch(ctx, &mut then_branch)? {
                bail = true;
            }
        }
        // else block
        let mut after = end_block;
        if has_else {
            let else_end = else_branch.end_block.unwrap();
            let mut unknown_tok = None;
            else_branch.escape =
                is_return_scope(ctx.tokens, ctx.settings, else_end, &mut unknown_tok);
            else_branch.escape_unknown = unknown_tok.is_some();
            if else_branch.check {
                else_branch.active = true;
                let else_start = ctx.tokens.tok_at(end_block, 2).unwrap();
                if self.update_range(ctx, else_start, Some(else_end), depth - 1)? == Progress::Break
                {
                    return Ok(ControlFlow::Break(Terminate::None));
                }
            } else if !then_branch.check {
                else_branch.active = true;
                if self.check_branch(ctx, &mut else_branch)? {
                    bail = true;
                }
            }
            after = else_end;
        }
        if then_branch.active {
            self.actions |= then_branch.action;
        }
        if else_branch.active {
            self.actions |= else_branch.action;
        }
        if bail {
            return Ok(ControlFlow::Break(Terminate::Bail));
        }
        if then_branch.is_dead() && else_branch.is_dead() {
            if then_branch.is_modified() && else_branch.is_modified() {
                return Ok(ControlFlow::Break(Terminate::Modified));
            }
            if then_branch.is_conclusive_escape() && else_branch.is_conclusive_escape() {
                return Ok(ControlFlow::Break(Terminate::Escape));
            }
            return Ok(ControlFlow::Break(Terminate::Bail));
        }
        // conditional return
        if then_branch.active && then_branch.is_escape() && !has_else {
            if !then_branch.is_conclusive_escape() {
                if !self.analyzer.lower_to_inconclusive() {
                    return Ok(ControlFlow::Break(Terminate::Bail));
                }
            } else if then_branch.check {
                return Ok(ControlFlow::Break(Terminate::None));
            } else {
                if self.analyzer.is_conditional() && self.stop_updates() {
                    return Ok(ControlFlow::Break(Terminate::Conditional));
                }
                self.analyzer.assume(ctx, cond_tok, false, Assume::NONE);
            }
        }
        if then_branch.is_inconclusive() || else_branch.is_inconclusive() {
            if !self.analyzer.lower_to_inconclusive() {
                return Ok(ControlFlow::Break(Terminate::Bail));
            }
        } else if then_branch.is_modified() || else_branch.is_modified() {
            if !has_else && self.analyzer.is_conditional() && self.stop_updates() {
                return Ok(ControlFlow::Break(Terminate::Conditional));
            }
            if !self.analyzer.lower_to_possible() {
                return Ok(ControlFlow::Break(Terminate::Bail));
            }
            self.analyzer
                .assume(ctx, cond_tok, else_branch.is_modified(), Assume::NONE);
        }
        Ok(ControlFlow::Continue(after))
    }

    /// Switch: fork once per case label under the assumption that this case
    /// was taken; analysis continues after the switch with lowered values.
    fn update_switch(
        &mut self,
        ctx: &mut Ctx<'_>,
        switch_tok: TokenId,
        depth: i32,
    ) -> Result<Option<TokenId>, AnalysisError> {
        let end_cond = ctx.tokens.next(switch_tok).and_then(|p| ctx.tokens[p].link());
        let Some(end_cond) = end_cond else { return Ok(None) };
        if !ctx.tokens.seq(end_cond, &[")", "{"]) {
            return Ok(None);
        }
        let Some(end_block) = ctx.tokens.link_at(end_cond, 1) else {
            return Ok(None);
        };
        let cond_tok = ctx.tokens
            .next(switch_tok)
            .and_then(|p| ctx.tokens.ast_op2(p));
        let cond_values: Vec<Bigint> =
            self.analyzer.evaluate(ctx, Evaluate::Integral, cond_tok, None);

        // collect the case labels of this switch body
        let mut labels: Vec<(TokenId, Option<Bigint>)> = Vec::new();
        let mut cur = end_cond;
        while let Some(next) = ctx.tokens.next(cur) {
            if next >= end_block {
                break;
            }
            cur = next;
            match ctx.tokens[cur].str() {
                "case" => {
                    let value_tok = ctx.tokens.next(cur);
                    let value = value_tok.and_then(|v| {
                        crate::mathlib::to_bigint(ctx.tokens[v].str())
                            .or_else(|| ctx.tokens[v].known_int_value())
                    });
                    labels.push((cur, value));
                }
                "default" => labels.push((cur, None)),
                "{" | "(" | "[" => {
                    if let Some(link) = ctx.tokens[cur].link() {
                        cur = link;
                    }
                }
                _ => {}
            }
        }
        for (label, value) in labels {
            // a case whose value contradicts the known condition is dead
            if let (Some(v), false) = (value, cond_values.is_empty()) {
                if !cond_values.contains(&v) {
                    continue;
                }
            }
            let mut label_end = label;
            while ctx.tokens[label_end].str() != ":" {
                match ctx.tokens.next(label_end) {
                    Some(n) if n < end_block => label_end = n,
                    _ => break,
                }
            }
            let Some(body_start) = ctx.tokens.next(label_end) else { continue };
            let mut ft = self.fork(false);
            ft.analyzer.lower_to_possible();
            ft.update_range(ctx, body_start, Some(end_block), depth - 1)?;
            self.actions |= ft.actions;
        }
        Ok(Some(end_block))
    }
}

enum BlockEnd {
    Continue(TokenId),
    Break(Terminate),
}

enum ControlFlow {
    Continue(TokenId),
    Break(Terminate),
}

fn is_function_call(ctx: &Ctx<'_>, tok: TokenId) -> bool {
    let t = &ctx.tokens[tok];
    if t.str() != "(" || t.is_cast() || !t.is_binary_op() {
        return false;
    }
    if t.link().is_some_and(|close| ctx.tokens.seq(close, &[")", "{"])) {
        return false;
    }
    if is_unevaluated_context(ctx.tokens, ctx.tokens.prev(tok)) {
        return false;
    }
    ctx.tokens
        .prev(tok)
        .is_some_and(|p| ctx.tokens[p].is_name() || matches!(ctx.tokens[p].str(), ")" | "]" | ">"))
}

fn assign_expr(ctx: &Ctx<'_>, tok: TokenId) -> Option<TokenId> {
    let mut cur = tok;
    while let Some(parent) = ctx.tokens[cur].ast_parent() {
        if ctx.tokens[parent].ast_op1() != Some(cur) {
            break;
        }
        if ctx.tokens[parent].is_assignment_op() {
            return Some(parent);
        }
        cur = parent;
    }
    None
}

fn call_expr(ctx: &Ctx<'_>, tok: TokenId) -> Option<TokenId> {
    let mut cur = tok;
    while let Some(parent) = ctx.tokens[cur].ast_parent() {
        if ctx.tokens[parent].ast_op1() != Some(cur) {
            break;
        }
        if !(ctx.tokens[cur].is_name() || matches!(ctx.tokens[cur].str(), "::" | "<" | ".")) {
            break;
        }
        if ctx.tokens[cur].str() == "<" && ctx.tokens[cur].link().is_none() {
            break;
        }
        cur = parent;
    }
    if is_function_call(ctx, cur) {
        Some(cur)
    } else {
        None
    }
}

fn has_goto(ctx: &Ctx<'_>, end_block: TokenId) -> bool {
    ctx.tokens[end_block]
        .link()
        .and_then(|open| ctx.tokens.find_simple_match(open, "goto", end_block))
        .is_some()
}

fn has_jump(ctx: &Ctx<'_>, end_block: TokenId) -> bool {
    ctx.tokens[end_block].link().is_some_and(|open| {
        ctx.tokens.find_simple_match(open, "goto", end_block).is_some()
            || ctx.tokens.find_simple_match(open, "break", end_block).is_some()
    })
}

fn has_inner_return_scope(ctx: &Ctx<'_>, end_block: TokenId) -> bool {
    let Some(open) = ctx.tokens[end_block].link() else { return false };
    let mut cur = end_block;
    while let Some(prev) = ctx.tokens.prev(cur) {
        if prev <= open {
            break;
        }
        cur = prev;
        if ctx.tokens[cur].str() == "}" {
            let mut unknown = None;
            if is_return_scope(ctx.tokens, ctx.settings, cur, &mut unknown) {
                return true;
            }
        }
    }
    false
}

/// Run the analyzer forward over `start..end`.
pub fn value_flow_generic_forward<A: Analyzer + Clone>(
    ctx: &mut Ctx<'_>,
    start: TokenId,
    end: Option<TokenId>,
    analyzer: A,
) -> Result<AnalyzerResult, AnalysisError> {
    if Settings::terminated() {
        return Err(AnalysisError::Terminated);
    }
    if analyzer.invalid() {
        return Ok(AnalyzerResult::new(Action::NONE, Terminate::Bail));
    }
    let mut ft = ForwardTraversal::new(analyzer);
    ft.update_range(ctx, start, end, 20)?;
    Ok(AnalyzerResult::new(ft.actions, ft.terminate))
}

/// Run the analyzer over a single expression tree.
pub fn value_flow_generic_forward_recursive<A: Analyzer + Clone>(
    ctx: &mut Ctx<'_>,
    top: TokenId,
    analyzer: A,
) -> Result<AnalyzerResult, AnalysisError> {
    if Settings::terminated() {
        return Err(AnalysisError::Terminated);
    }
    if analyzer.invalid() {
        return Ok(AnalyzerResult::new(Action::NONE, Terminate::Bail));
    }
    let mut ft = ForwardTraversal::new(analyzer);
    ft.update_recursive(ctx, Some(top))?;
    Ok(AnalyzerResult::new(ft.actions, ft.terminate))
}
