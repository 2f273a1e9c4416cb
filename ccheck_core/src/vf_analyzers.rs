//! Concrete `Analyzer` implementations: the single-expression tracker, the
//! opposite-expression tracker, the member-expression tracker with partial
//! reads, and the multi-variable joint tracker. Factories return [`ValuePtr`]
//! handles.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ccheck_config::Settings;

use crate::analyzer::{Action, Analyzer, Assume, Ctx, Direction, Evaluate, ValuePtr};
use crate::astutils::{expression_string, is_token_written, visit_ast_nodes, ChildrenToVisit};
use crate::mathlib::Bigint;
use crate::symbols::SymbolDatabase;
use crate::token::{TokenId, TokenKind};
use crate::tokenlist::TokenList;
use crate::vfvalue::{Value, ValueKind, ValuePayload};

/// Attach `value` to `tok` and derive values for parent expressions whose
/// other operand is known.
pub fn set_token_value(tokens: &mut TokenList, tok: TokenId, value: Value) {
    tokens.add_value(tok, value.clone());
    let Some(parent) = tokens[tok].ast_parent() else { return };
    // casts and parentheses pass the value through
    if tokens[parent].str() == "(" && tokens[parent].is_cast() {
        set_token_value(tokens, parent, value);
        return;
    }
    let Some(int_value) = value.int_value() else { return };
    let text = tokens[parent].str().to_string();
    if text == "!" {
        let mut v = value.clone();
        v.payload = ValuePayload::Int((int_value == 0) as Bigint);
        set_token_value(tokens, parent, v);
        return;
    }
    if !tokens[parent].is_binary_op() {
        return;
    }
    let op1 = tokens[parent].ast_op1().unwrap();
    let op2 = tokens[parent].ast_op2().unwrap();
    let sibling = if op1 == tok { op2 } else { op1 };
    let Some(sibling_value) = tokens[sibling].known_int_value().or_else(|| {
        tokens[sibling]
            .values()
            .iter()
            .find(|v| v.is_int() && !v.is_impossible())
            .and_then(|v| v.int_value())
    }) else {
        return;
    };
    let (a, b) = if op1 == tok {
        (int_value, sibling_value)
    } else {
        (sibling_value, int_value)
    };
    let Some(result) = compute_binary(&text, a, b) else { return };
    let mut v = value;
    v.payload = ValuePayload::Int(result);
    set_token_value(tokens, parent, v);
}

pub(crate) fn compute_binary(op: &str, a: Bigint, b: Bigint) -> Option<Bigint> {
    Some(match op {
        "+" => a.checked_add(b)?,
        "-" => a.checked_sub(b)?,
        "*" => a.checked_mul(b)?,
        "/" => a.checked_div(b)?,
        "%" => a.checked_rem(b)?,
        "&" => a & b,
        "|" => a | b,
        "^" => a ^ b,
        "<<" => a.checked_shl(u32::try_from(b).ok()?)?,
        ">>" => a.checked_shr(u32::try_from(b).ok()?)?,
        "==" => (a == b) as Bigint,
        "!=" => (a != b) as Bigint,
        "<" => (a < b) as Bigint,
        "<=" => (a <= b) as Bigint,
        ">" => (a > b) as Bigint,
        ">=" => (a >= b) as Bigint,
        "&&" => ((a != 0) && (b != 0)) as Bigint,
        "||" => ((a != 0) || (b != 0)) as Bigint,
        _ => return None,
    })
}

/// Tracks one expression identity (by expression id) and carries one value
/// through the traversal.
#[derive(Clone)]
pub struct ExpressionAnalyzer {
    expr: TokenId,
    expr_id: u32,
    value: Value,
    /// variables the expression reads; writes to them invalidate
    dependencies: Vec<u32>,
    /// true when the expression only involves local variables
    local: bool,
    certainty_inconclusive: bool,
}

impl ExpressionAnalyzer {
    pub fn new(
        tokens: &TokenList,
        symbols: &SymbolDatabase,
        settings: &Settings,
        expr: TokenId,
        mut value: Value,
    ) -> Self {
        let expr_id = tokens[expr].expr_id();
        if value.var_id == 0 {
            value.var_id = tokens[expr].var_id();
        }
        let mut dependencies = Vec::new();
        let mut local = true;
        visit_ast_nodes(tokens, expr, &mut |t| {
            let var_id = tokens[t].var_id();
            if var_id != 0 {
                dependencies.push(var_id);
                if let Some(var) = symbols.variable_from_var_id(var_id) {
                    if !(var.is_local() || var.is_argument()) {
                        local = false;
                    }
                    if var.is_reference() || var.is_static() || var.is_volatile() {
                        local = false;
                    }
                }
            }
            ChildrenToVisit::Op1AndOp2
        });
        ExpressionAnalyzer {
            expr,
            expr_id,
            value,
            dependencies,
            local,
            certainty_inconclusive: settings.certainty_inconclusive,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    fn is_match(&self, ctx: &Ctx<'_>, tok: TokenId) -> bool {
        self.expr_id != 0 && ctx.tokens[tok].expr_id() == self.expr_id
    }

    fn eval_int(&self, ctx: &Ctx<'_>, tok: TokenId, depth: u32) -> Vec<Bigint> {
        if depth > 32 {
            return Vec::new();
        }
        if self.is_match(ctx, tok) {
            if let Some(v) = self.value.int_value() {
                if !self.value.is_impossible() {
                    return vec![v];
                }
            }
        }
        let t = &ctx.tokens[tok];
        if let Some(v) = t.known_int_value() {
            return vec![v];
        }
        if t.is_number() {
            return crate::mathlib::to_bigint(t.str()).into_iter().collect();
        }
        if t.kind() == TokenKind::Boolean {
            return vec![(t.str() == "true") as Bigint];
        }
        if t.is_unary_op("!") {
            return self
                .eval_int(ctx, t.ast_op1().unwrap(), depth + 1)
                .into_iter()
                .map(|v| (v == 0) as Bigint)
                .collect();
        }
        if t.is_unary_op("-") {
            return self
                .eval_int(ctx, t.ast_op1().unwrap(), depth + 1)
                .into_iter()
                .filter_map(|v| v.checked_neg())
                .collect();
        }
        if t.is_binary_op() && (t.is_comparison_op() || t.is_arithmetical_op() || matches!(t.str(), "&&" | "||")) {
            let lhs = self.eval_int(ctx, t.ast_op1().unwrap(), depth + 1);
            let rhs = self.eval_int(ctx, t.ast_op2().unwrap(), depth + 1);
            let mut out = Vec::new();
            for &a in lhs.iter().take(4) {
                for &b in rhs.iter().take(4) {
                    if let Some(v) = compute_binary(t.str(), a, b) {
                        if !out.contains(&v) {
                            out.push(v);
                        }
                    }
                }
            }
            return out;
        }
        // fall back to attached values
        let mut out = Vec::new();
        for v in t.values() {
            if v.is_impossible() || v.is_inconclusive() {
                continue;
            }
            if let Some(i) = v.int_value() {
                if v.is_int() && !out.contains(&i) {
                    out.push(i);
                }
            }
        }
        out
    }
}

impl Analyzer for ExpressionAnalyzer {
    fn analyze(&self, ctx: &Ctx<'_>, tok: TokenId, _dir: Direction) -> Action {
        if self.is_match(ctx, tok) {
            let mut action = Action::MATCH | Action::READ;
            if is_token_written(ctx.tokens, ctx.settings, tok) {
                let parent = ctx.tokens[tok].ast_parent();
                let compound = parent.is_some_and(|p| {
                    (ctx.tokens[p].is_assignment_op() && ctx.tokens[p].str() != "=")
                        || ctx.tokens[p].kind() == TokenKind::IncDec
                });
                if compound {
                    action |= Action::WRITE | Action::INCREMENTAL;
                } else {
                    action = Action::MATCH | Action::WRITE;
                }
            }
            return action;
        }
        let t = &ctx.tokens[tok];
        if t.var_id() != 0
            && self.dependencies.contains(&t.var_id())
            && is_token_written(ctx.tokens, ctx.settings, tok)
        {
            return Action::INVALID;
        }
        // unknown function calls may modify anything that is not local
        if !self.local
            && t.str() == "("
            && !t.is_cast()
            && t.ast_op1().is_some_and(|callee| {
                ctx.tokens[callee].is_name()
                    && ctx.tokens[callee].function().is_none()
                    && ctx.settings.library.is_unknown_function(ctx.tokens[callee].str())
            })
        {
            return Action::INVALID;
        }
        Action::NONE
    }

    fn update(&mut self, ctx: &mut Ctx<'_>, tok: TokenId, action: Action, _dir: Direction) {
        if !action.matches() {
            return;
        }
        if action.is_write() && !action.is_incremental() {
            // the value does not survive a plain write
            return;
        }
        set_token_value(ctx.tokens, tok, self.value.clone());
    }

    fn evaluate(
        &self,
        ctx: &Ctx<'_>,
        eval: Evaluate,
        tok: Option<TokenId>,
        _context_tok: Option<TokenId>,
    ) -> Vec<Bigint> {
        let Some(tok) = tok else { return Vec::new() };
        match eval {
            Evaluate::Integral => self.eval_int(ctx, tok, 0),
            Evaluate::ContainerEmpty => {
                if self.is_match(ctx, tok) {
                    if let ValuePayload::ContainerSize(size) = self.value.payload {
                        return vec![(size == 0) as Bigint];
                    }
                }
                Vec::new()
            }
        }
    }

    fn lower_to_possible(&mut self) -> bool {
        if self.value.is_impossible() {
            return false;
        }
        self.value.lower_to(ValueKind::Possible);
        true
    }

    fn lower_to_inconclusive(&mut self) -> bool {
        if !self.certainty_inconclusive || self.value.is_impossible() {
            return false;
        }
        self.value.kind = ValueKind::Inconclusive;
        true
    }

    fn update_scope(&self, _ctx: &Ctx<'_>, _end_block: TokenId, modified: bool) -> bool {
        !modified || (self.value.is_possible() && !self.is_conditional())
    }

    fn is_conditional(&self) -> bool {
        self.value.cond_tok.is_some()
    }

    fn stop_on_condition(&self, _ctx: &Ctx<'_>, _cond_tok: TokenId) -> bool {
        self.is_conditional()
    }

    fn assume(&mut self, ctx: &mut Ctx<'_>, tok: Option<TokenId>, state: bool, flags: Assume) {
        let Some(tok) = tok else { return };
        if !flags.get(Assume::QUIET) {
            let which = if state { "true" } else { "false" };
            let cond = expression_string(ctx.tokens, tok);
            self.value
                .push_path(tok, format!("Assuming condition '{cond}' is {which}"));
        }
        if !flags.get(Assume::ABSOLUTE) {
            self.value.depends_on(tok);
        }
        // a condition directly over the tracked expression narrows the value
        let t = &ctx.tokens[tok];
        if t.is_binary_op() && matches!(t.str(), "==" | "!=") {
            let op1 = t.ast_op1().unwrap();
            let op2 = t.ast_op2().unwrap();
            let (matched, other) = if self.is_match(ctx, op1) {
                (Some(op1), op2)
            } else if self.is_match(ctx, op2) {
                (Some(op2), op1)
            } else {
                (None, op1)
            };
            if matched.is_some() {
                if let Some(k) = ctx.tokens[other]
                    .known_int_value()
                    .or_else(|| crate::mathlib::to_bigint(ctx.tokens[other].str()))
                {
                    let equals = (t.str() == "==") == state;
                    if equals {
                        self.value.payload = ValuePayload::Int(k);
                    }
                }
            }
        } else if self.is_match(ctx, tok) && !state {
            // assuming `!expr`
            if self.value.is_int() {
                self.value.payload = ValuePayload::Int(0);
            }
        }
    }

    fn reanalyze(&self, ctx: &Ctx<'_>, tok: TokenId, msg: &str) -> Option<ValuePtr> {
        if ctx.tokens[tok].expr_id() == 0 {
            return None;
        }
        let mut value = self.value.clone();
        if !msg.is_empty() {
            value.push_path(tok, msg);
        }
        let mut analyzer = self.clone();
        analyzer.expr = tok;
        analyzer.expr_id = ctx.tokens[tok].expr_id();
        analyzer.value = value;
        Some(ValuePtr::new(analyzer))
    }

    fn invalid(&self) -> bool {
        self.expr_id == 0
    }

    fn clone_box(&self) -> Box<dyn Analyzer> {
        Box::new(self.clone())
    }
}

/// Fires on the logical negation of the tracked expression.
#[derive(Clone)]
pub struct OppositeExpressionAnalyzer {
    inner: ExpressionAnalyzer,
    is_not: bool,
}

fn opposite_comparison(op: &str) -> Option<&'static str> {
    Some(match op {
        "==" => "!=",
        "!=" => "==",
        "<" => ">=",
        ">" => "<=",
        "<=" => ">",
        ">=" => "<",
        _ => return None,
    })
}

impl OppositeExpressionAnalyzer {
    fn is_opposite(&self, ctx: &Ctx<'_>, tok: TokenId) -> bool {
        let t = &ctx.tokens[tok];
        // `!expr`
        if t.is_unary_op("!") {
            if let Some(op1) = t.ast_op1() {
                return self.inner.is_match(ctx, op1);
            }
        }
        // flipped comparison over the same operands
        let expr = &ctx.tokens[self.inner.expr];
        if t.is_comparison_op() && expr.is_comparison_op() {
            if let (Some(a1), Some(a2), Some(b1), Some(b2)) =
                (t.ast_op1(), t.ast_op2(), expr.ast_op1(), expr.ast_op2())
            {
                let same_operands = ctx.tokens[a1].expr_id() != 0
                    && ctx.tokens[a1].expr_id() == ctx.tokens[b1].expr_id()
                    && ctx.tokens[a2].expr_id() != 0
                    && ctx.tokens[a2].expr_id() == ctx.tokens[b2].expr_id();
                if same_operands {
                    return opposite_comparison(expr.str()) == Some(t.str());
                }
            }
        }
        false
    }
}

impl Analyzer for OppositeExpressionAnalyzer {
    fn analyze(&self, ctx: &Ctx<'_>, tok: TokenId, dir: Direction) -> Action {
        if self.is_opposite(ctx, tok) {
            return Action::MATCH | Action::READ;
        }
        let mut action = self.inner.analyze(ctx, tok, dir);
        if self.is_not {
            // occurrences of the expression itself are only dependencies
            action.set(Action::MATCH, false);
        }
        action
    }

    fn update(&mut self, ctx: &mut Ctx<'_>, tok: TokenId, action: Action, _dir: Direction) {
        if action.matches() && self.is_opposite(ctx, tok) {
            set_token_value(ctx.tokens, tok, self.inner.value.clone());
        }
    }

    fn evaluate(
        &self,
        ctx: &Ctx<'_>,
        eval: Evaluate,
        tok: Option<TokenId>,
        context_tok: Option<TokenId>,
    ) -> Vec<Bigint> {
        self.inner.evaluate(ctx, eval, tok, context_tok)
    }

    fn lower_to_possible(&mut self) -> bool {
        self.inner.lower_to_possible()
    }

    fn lower_to_inconclusive(&mut self) -> bool {
        self.inner.lower_to_inconclusive()
    }

    fn update_scope(&self, ctx: &Ctx<'_>, end_block: TokenId, modified: bool) -> bool {
        self.inner.update_scope(ctx, end_block, modified)
    }

    fn is_conditional(&self) -> bool {
        self.inner.is_conditional()
    }

    fn stop_on_condition(&self, ctx: &Ctx<'_>, cond_tok: TokenId) -> bool {
        self.inner.stop_on_condition(ctx, cond_tok)
    }

    fn assume(&mut self, ctx: &mut Ctx<'_>, tok: Option<TokenId>, state: bool, flags: Assume) {
        self.inner.assume(ctx, tok, state, flags);
    }

    fn reanalyze(&self, _ctx: &Ctx<'_>, _tok: TokenId, _msg: &str) -> Option<ValuePtr> {
        None
    }

    fn invalid(&self) -> bool {
        self.inner.invalid()
    }

    fn clone_box(&self) -> Box<dyn Analyzer> {
        Box::new(self.clone())
    }
}

/// Shared partial-read collection for member analysis.
pub type PartialReadContainer = Rc<RefCell<Vec<(TokenId, Value)>>>;

/// Tracks `base.member`; reads of sibling members do not invalidate.
#[derive(Clone)]
pub struct MemberExpressionAnalyzer {
    inner: ExpressionAnalyzer,
    member_name: String,
    partial_reads: PartialReadContainer,
}

impl Analyzer for MemberExpressionAnalyzer {
    fn analyze(&self, ctx: &Ctx<'_>, tok: TokenId, dir: Direction) -> Action {
        // a member access on the tracked base
        let t = &ctx.tokens[tok];
        if matches!(t.str(), "." | "->") && t.is_binary_op() {
            let base = t.ast_op1().unwrap();
            let member = t.ast_op2().unwrap();
            if self.inner.is_match(ctx, base) {
                if ctx.tokens[member].str() == self.member_name {
                    let mut action = Action::MATCH | Action::READ;
                    if is_token_written(ctx.tokens, ctx.settings, tok) {
                        action = Action::MATCH | Action::WRITE;
                    }
                    return action;
                }
                // sibling member: a partial read only
                return Action::READ | Action::IDEMPOTENT;
            }
        }
        // writes to the whole base object invalidate member knowledge
        if self.inner.is_match(ctx, tok) && is_token_written(ctx.tokens, ctx.settings, tok) {
            return Action::INVALID;
        }
        self.inner.analyze(ctx, tok, dir)
    }

    fn update(&mut self, ctx: &mut Ctx<'_>, tok: TokenId, action: Action, _dir: Direction) {
        if !action.matches() {
            if action.is_read() && action.is_idempotent() {
                self.partial_reads
                    .borrow_mut()
                    .push((tok, self.inner.value.clone()));
            }
            return;
        }
        if action.is_write() {
            return;
        }
        set_token_value(ctx.tokens, tok, self.inner.value.clone());
    }

    fn evaluate(
        &self,
        ctx: &Ctx<'_>,
        eval: Evaluate,
        tok: Option<TokenId>,
        context_tok: Option<TokenId>,
    ) -> Vec<Bigint> {
        self.inner.evaluate(ctx, eval, tok, context_tok)
    }

    fn lower_to_possible(&mut self) -> bool {
        self.inner.lower_to_possible()
    }

    fn lower_to_inconclusive(&mut self) -> bool {
        self.inner.lower_to_inconclusive()
    }

    fn update_scope(&self, ctx: &Ctx<'_>, end_block: TokenId, modified: bool) -> bool {
        self.inner.update_scope(ctx, end_block, modified)
    }

    fn is_conditional(&self) -> bool {
        self.inner.is_conditional()
    }

    fn stop_on_condition(&self, ctx: &Ctx<'_>, cond_tok: TokenId) -> bool {
        self.inner.stop_on_condition(ctx, cond_tok)
    }

    fn assume(&mut self, ctx: &mut Ctx<'_>, tok: Option<TokenId>, state: bool, flags: Assume) {
        self.inner.assume(ctx, tok, state, flags);
    }

    fn reanalyze(&self, _ctx: &Ctx<'_>, _tok: TokenId, _msg: &str) -> Option<ValuePtr> {
        None
    }

    fn invalid(&self) -> bool {
        self.inner.invalid()
    }

    fn clone_box(&self) -> Box<dyn Analyzer> {
        Box::new(self.clone())
    }
}

/// Joins several variables into one assumption (correlated conditions such
/// as `if (a < b && b < c)`).
#[derive(Clone)]
pub struct MultiValueFlowAnalyzer {
    values: HashMap<u32, Value>,
    certainty_inconclusive: bool,
}

impl MultiValueFlowAnalyzer {
    pub fn new(values: HashMap<u32, Value>, settings: &Settings) -> Self {
        MultiValueFlowAnalyzer {
            values,
            certainty_inconclusive: settings.certainty_inconclusive,
        }
    }
}

impl Analyzer for MultiValueFlowAnalyzer {
    fn analyze(&self, ctx: &Ctx<'_>, tok: TokenId, _dir: Direction) -> Action {
        let var_id = ctx.tokens[tok].var_id();
        if var_id == 0 {
            return Action::NONE;
        }
        if self.values.contains_key(&var_id) {
            if is_token_written(ctx.tokens, ctx.settings, tok) {
                return Action::MATCH | Action::WRITE;
            }
            return Action::MATCH | Action::READ;
        }
        Action::NONE
    }

    fn update(&mut self, ctx: &mut Ctx<'_>, tok: TokenId, action: Action, _dir: Direction) {
        if !action.matches() || action.is_write() {
            return;
        }
        let var_id = ctx.tokens[tok].var_id();
        if let Some(value) = self.values.get(&var_id) {
            set_token_value(ctx.tokens, tok, value.clone());
        }
    }

    fn evaluate(
        &self,
        ctx: &Ctx<'_>,
        eval: Evaluate,
        tok: Option<TokenId>,
        _context_tok: Option<TokenId>,
    ) -> Vec<Bigint> {
        if eval != Evaluate::Integral {
            return Vec::new();
        }
        let Some(tok) = tok else { return Vec::new() };
        let var_id = ctx.tokens[tok].var_id();
        if let Some(value) = self.values.get(&var_id) {
            if let Some(v) = value.int_value() {
                if !value.is_impossible() {
                    return vec![v];
                }
            }
        }
        if let Some(v) = ctx.tokens[tok].known_int_value() {
            return vec![v];
        }
        Vec::new()
    }

    fn lower_to_possible(&mut self) -> bool {
        for value in self.values.values_mut() {
            if value.is_impossible() {
                return false;
            }
            value.lower_to(ValueKind::Possible);
        }
        true
    }

    fn lower_to_inconclusive(&mut self) -> bool {
        if !self.certainty_inconclusive {
            return false;
        }
        for value in self.values.values_mut() {
            if value.is_impossible() {
                return false;
            }
            value.kind = ValueKind::Inconclusive;
        }
        true
    }

    fn update_scope(&self, _ctx: &Ctx<'_>, _end_block: TokenId, modified: bool) -> bool {
        !modified
    }

    fn is_conditional(&self) -> bool {
        self.values.values().any(|v| v.cond_tok.is_some())
    }

    fn stop_on_condition(&self, _ctx: &Ctx<'_>, _cond_tok: TokenId) -> bool {
        self.is_conditional()
    }

    fn assume(&mut self, _ctx: &mut Ctx<'_>, tok: Option<TokenId>, _state: bool, flags: Assume) {
        let Some(tok) = tok else { return };
        if !flags.get(Assume::ABSOLUTE) {
            for value in self.values.values_mut() {
                value.depends_on(tok);
            }
        }
    }

    fn reanalyze(&self, _ctx: &Ctx<'_>, _tok: TokenId, _msg: &str) -> Option<ValuePtr> {
        None
    }

    fn clone_box(&self) -> Box<dyn Analyzer> {
        Box::new(self.clone())
    }
}

// -- factories ---------------------------------------------------------------

pub fn make_analyzer(
    tokens: &TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    expr_tok: TokenId,
    value: Value,
) -> ValuePtr {
    ValuePtr::new(ExpressionAnalyzer::new(tokens, symbols, settings, expr_tok, value))
}

pub fn make_reverse_analyzer(
    tokens: &TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    expr_tok: TokenId,
    value: Value,
) -> ValuePtr {
    ValuePtr::new(ExpressionAnalyzer::new(tokens, symbols, settings, expr_tok, value))
}

pub fn make_same_expression_analyzer(
    tokens: &TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    expr_tok: TokenId,
    value: Value,
) -> ValuePtr {
    ValuePtr::new(ExpressionAnalyzer::new(tokens, symbols, settings, expr_tok, value))
}

pub fn make_opposite_expression_analyzer(
    tokens: &TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    is_not: bool,
    expr_tok: TokenId,
    value: Value,
) -> ValuePtr {
    ValuePtr::new(OppositeExpressionAnalyzer {
        inner: ExpressionAnalyzer::new(tokens, symbols, settings, expr_tok, value),
        is_not,
    })
}

pub fn make_member_expression_analyzer(
    tokens: &TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    member_name: &str,
    expr_tok: TokenId,
    value: Value,
    partial_reads: &PartialReadContainer,
) -> ValuePtr {
    ValuePtr::new(MemberExpressionAnalyzer {
        inner: ExpressionAnalyzer::new(tokens, symbols, settings, expr_tok, value),
        member_name: member_name.to_string(),
        partial_reads: Rc::clone(partial_reads),
    })
}

pub fn make_multi_value_flow_analyzer(
    values: HashMap<u32, Value>,
    settings: &Settings,
) -> ValuePtr {
    ValuePtr::new(MultiValueFlowAnalyzer::new(values, settings))
}
