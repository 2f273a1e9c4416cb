//! AST and token-range helpers shared by the engines and the checks.

use ccheck_config::Settings;

use crate::symbols::{ScopeKind, SymbolDatabase};
use crate::token::TokenId;
use crate::tokenlist::TokenList;

pub fn precedes(a: TokenId, b: TokenId) -> bool {
    a < b
}

/// `tok` succeeds `end` (or `end` is absent).
pub fn succeeds(tok: Option<TokenId>, end: Option<TokenId>) -> bool {
    match (tok, end) {
        (Some(t), Some(e)) => t > e,
        (Some(_), None) => true,
        _ => false,
    }
}

pub fn ast_is_lhs(tokens: &TokenList, tok: TokenId) -> bool {
    tokens[tok]
        .ast_parent()
        .is_some_and(|p| tokens[p].ast_op1() == Some(tok))
}

pub fn ast_is_rhs(tokens: &TokenList, tok: TokenId) -> bool {
    tokens[tok]
        .ast_parent()
        .is_some_and(|p| tokens[p].ast_op2() == Some(tok))
}

/// The operand of `sizeof`/`decltype`/`typeid`/... is not executed.
pub fn is_unevaluated_context(tokens: &TokenList, tok: Option<TokenId>) -> bool {
    tok.is_some_and(|t| {
        matches!(
            tokens[t].str(),
            "sizeof" | "decltype" | "typeid" | "noexcept" | "alignof" | "_Alignof" | "__alignof__"
        )
    })
}

/// First and last token position covered by an expression tree, with linked
/// delimiters expanded to their partner.
pub fn expr_start_end(tokens: &TokenList, tok: TokenId) -> (TokenId, TokenId) {
    let mut min = tok;
    let mut max = tok;
    let mut stack = vec![tok];
    let mut guard = 0;
    while let Some(t) = stack.pop() {
        guard += 1;
        if guard > 10_000 {
            break;
        }
        let covered = [Some(t), tokens[t].link()];
        for c in covered.into_iter().flatten() {
            if c < min {
                min = c;
            }
            if c > max {
                max = c;
            }
        }
        if let Some(op1) = tokens[t].ast_op1() {
            stack.push(op1);
        }
        if let Some(op2) = tokens[t].ast_op2() {
            stack.push(op2);
        }
    }
    (min, max)
}

/// The token after the end of the expression rooted at `tok`.
pub fn next_after_ast_rightmost_leaf(tokens: &TokenList, tok: TokenId) -> Option<TokenId> {
    let (_, end) = expr_start_end(tokens, tok);
    tokens.next(end)
}

pub fn previous_before_ast_leftmost_leaf(tokens: &TokenList, tok: TokenId) -> Option<TokenId> {
    let (start, _) = expr_start_end(tokens, tok);
    tokens.prev(start)
}

/// Condition of `if (...)`, `while (...)`, `for (...)` given the keyword or
/// the `(` itself. Range-for yields the `:` token.
pub fn get_cond_tok(tokens: &TokenList, tok: TokenId) -> Option<TokenId> {
    let paren = if tokens[tok].str() == "(" {
        tok
    } else {
        tokens.next(tok).filter(|&n| tokens[n].str() == "(")?
    };
    let op2 = tokens.ast_op2(paren)?;
    if tokens[op2].str() == ";" {
        let sc2 = tokens.ast_op2(op2)?;
        if tokens[sc2].str() == ";" {
            return tokens.ast_op1(sc2);
        }
        return None;
    }
    Some(op2)
}

pub fn get_init_tok(tokens: &TokenList, tok: TokenId) -> Option<TokenId> {
    let paren = tokens.next(tok).filter(|&n| tokens[n].str() == "(")?;
    let op2 = tokens.ast_op2(paren)?;
    if tokens[op2].str() == ";" {
        return tokens.ast_op1(op2);
    }
    None
}

pub fn get_step_tok(tokens: &TokenList, tok: TokenId) -> Option<TokenId> {
    let paren = if tokens[tok].str() == "(" {
        tok
    } else {
        tokens.next(tok).filter(|&n| tokens[n].str() == "(")?
    };
    let op2 = tokens.ast_op2(paren)?;
    if tokens[op2].str() == ";" {
        let sc2 = tokens.ast_op2(op2)?;
        if tokens[sc2].str() == ";" {
            return tokens.ast_op2(sc2);
        }
    }
    None
}

/// Condition of the block that ends at `end_block` (`}`), walking through
/// `} else {` to the matching `if`.
pub fn get_cond_tok_from_end(tokens: &TokenList, end_block: TokenId) -> Option<TokenId> {
    let open = tokens[end_block].link()?;
    let prev = tokens.prev(open)?;
    if tokens[prev].str() == ")" {
        let paren = tokens[prev].link()?;
        return get_cond_tok(tokens, paren);
    }
    if tokens[prev].str() == "else" {
        let then_end = tokens.prev(prev)?;
        if tokens[then_end].str() == "}" {
            return get_cond_tok_from_end(tokens, then_end);
        }
    }
    None
}

pub fn get_step_tok_from_end(tokens: &TokenList, end_block: TokenId) -> Option<TokenId> {
    if tokens[end_block].str() != "}" {
        return None;
    }
    let open = tokens[end_block].link()?;
    let prev = tokens.prev(open)?;
    if tokens[prev].str() != ")" {
        return None;
    }
    get_step_tok(tokens, tokens[prev].link()?)
}

/// If `tok` begins a lambda, the `}` ending its body.
pub fn find_lambda_end_token(tokens: &TokenList, tok: TokenId) -> Option<TokenId> {
    if tokens[tok].str() != "[" {
        return None;
    }
    let capture_end = tokens[tok].link()?;
    let mut cur = tokens.next(capture_end)?;
    if tokens[cur].str() == "(" {
        cur = tokens.next(tokens[cur].link()?)?;
    }
    // trailing specifiers / return type
    let mut guard = 0;
    while tokens[cur].str() != "{" {
        if matches!(tokens[cur].str(), ";" | ")" | "]" | "}" | "=" | ",") {
            return None;
        }
        cur = tokens.next(cur)?;
        guard += 1;
        if guard > 40 {
            return None;
        }
    }
    tokens[cur].link()
}

/// Does the block ending at `end_block` always leave the enclosing function
/// (return/throw/goto or a configured noreturn call)? `unknown_ftok` is set
/// when an unknown function ends the block and the answer is uncertain.
pub fn is_return_scope(
    tokens: &TokenList,
    settings: &Settings,
    end_block: TokenId,
    unknown_ftok: &mut Option<TokenId>,
) -> bool {
    if tokens[end_block].str() != "}" {
        return false;
    }
    let Some(open) = tokens[end_block].link() else { return false };
    // find the start of the last statement of the block
    let mut last = match tokens.prev(end_block) {
        Some(t) if t > open => t,
        _ => return false,
    };
    if tokens[last].str() == ";" {
        last = match tokens.prev(last) {
            Some(t) if t > open => t,
            _ => return false,
        };
    }
    // inner block: `{ ... { return; } }`
    if tokens[last].str() == "}" {
        return is_return_scope(tokens, settings, last, unknown_ftok);
    }
    let mut start = last;
    while let Some(prev) = tokens.prev(start) {
        if prev <= open || matches!(tokens[prev].str(), ";" | "{" | "}" | ":") {
            break;
        }
        start = prev;
    }
    match tokens[start].str() {
        "return" | "throw" | "goto" => true,
        name if tokens[start].is_name() && tokens.is(tokens.next(start), "(") => {
            if settings.library.is_noreturn(name) {
                return true;
            }
            if tokens[start].function().is_none() && settings.library.is_unknown_function(name) {
                *unknown_ftok = Some(start);
            }
            false
        }
        _ => false,
    }
}

/// A call to a function that never returns.
pub fn is_escape_function(tokens: &TokenList, settings: &Settings, tok: TokenId) -> bool {
    tokens[tok].is_name()
        && tokens.is(tokens.next(tok), "(")
        && settings.library.is_noreturn(tokens[tok].str())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildrenToVisit {
    None,
    Op1,
    Op2,
    Op1AndOp2,
    Done,
}

/// Visit the expression tree rooted at `start`, pre-order.
pub fn visit_ast_nodes<F>(tokens: &TokenList, start: TokenId, f: &mut F)
where
    F: FnMut(TokenId) -> ChildrenToVisit,
{
    let mut stack = vec![start];
    let mut guard = 0;
    while let Some(tok) = stack.pop() {
        guard += 1;
        if guard > 10_000 {
            return;
        }
        match f(tok) {
            ChildrenToVisit::Done => return,
            ChildrenToVisit::None => {}
            ChildrenToVisit::Op1 => {
                if let Some(op1) = tokens[tok].ast_op1() {
                    stack.push(op1);
                }
            }
            ChildrenToVisit::Op2 => {
                if let Some(op2) = tokens[tok].ast_op2() {
                    stack.push(op2);
                }
            }
            ChildrenToVisit::Op1AndOp2 => {
                if let Some(op2) = tokens[tok].ast_op2() {
                    stack.push(op2);
                }
                if let Some(op1) = tokens[tok].ast_op1() {
                    stack.push(op1);
                }
            }
        }
    }
}

/// Is the value at `tok` written to where it stands (assignment target,
/// increment, address passed to an unknown function, non-const method)?
pub fn is_token_written(tokens: &TokenList, settings: &Settings, tok: TokenId) -> bool {
    let mut cur = tok;
    let mut parent = tokens[cur].ast_parent();
    // climb through member chains on the left side; a subscript write goes
    // to the pointee, not the variable itself
    while let Some(p) = parent {
        match tokens[p].str() {
            "." | "->" | "::" if tokens[p].ast_op1() == Some(cur) || tokens[p].str() == "." => {
                cur = p;
                parent = tokens[p].ast_parent();
            }
            _ => break,
        }
    }
    let Some(p) = parent else { return false };
    if tokens[p].is_assignment_op() && tokens[p].ast_op1() == Some(cur) {
        return true;
    }
    if tokens[p].kind() == crate::token::TokenKind::IncDec {
        return true;
    }
    if tokens[p].is_unary_op("&") {
        // address taken: written if it flows into a call
        let mut q = tokens[p].ast_parent();
        while let Some(t) = q {
            if tokens[t].str() == "(" && tokens[t].ast_op1().is_some() {
                return !call_is_const(tokens, settings, t);
            }
            q = tokens[t].ast_parent();
        }
        return false;
    }
    // member call on the object: `obj.modify()`
    if matches!(tokens[p].str(), "." | "->") && tokens[p].ast_op1() == Some(cur) {
        if let Some(call) = tokens[p].ast_parent().filter(|&c| tokens[c].str() == "(") {
            let method = tokens[p].ast_op2();
            if let Some(method) = method {
                let name = tokens[method].str();
                // container yields read; actions and unknown methods write
                for (_, container) in settings_containers(settings) {
                    if container.yield_of(name).is_some() {
                        return false;
                    }
                    if container.action_of(name).is_some() {
                        return true;
                    }
                }
                let _ = call;
                return true;
            }
        }
    }
    // passed by reference to an unknown function
    if reference_argument_of_unknown_call(tokens, settings, tok) {
        return true;
    }
    false
}

fn settings_containers(
    settings: &Settings,
) -> impl Iterator<Item = (&'static str, &ccheck_config::Container)> {
    ["vector", "string", "list"]
        .into_iter()
        .filter_map(move |name| settings.library.container(name).map(|c| (name, c)))
}

fn call_is_const(tokens: &TokenList, settings: &Settings, call: TokenId) -> bool {
    let Some(callee) = tokens[call].ast_op1() else { return false };
    tokens[callee].is_name() && settings.library.is_function_const(tokens[callee].str(), true)
}

fn reference_argument_of_unknown_call(
    tokens: &TokenList,
    settings: &Settings,
    tok: TokenId,
) -> bool {
    let mut cur = tok;
    while let Some(p) = tokens[cur].ast_parent() {
        if tokens[p].str() == "(" && tokens[p].ast_op1().is_some() && tokens[p].ast_op1() != Some(cur) {
            if call_is_const(tokens, settings, p) {
                return false;
            }
            // a pointer or reference can be modified through the call
            let vt = tokens[tok].value_type();
            return vt.map_or(false, |vt| {
                vt.pointer > 0 || vt.reference != crate::symbols::RefKind::None
            });
        }
        if matches!(tokens[p].str(), ";" | "{" | "}") {
            return false;
        }
        cur = p;
    }
    false
}

/// Any token in `start..end` writes to the expression (matched by expression
/// id or by the variables it uses).
pub fn is_expression_changed(
    tokens: &TokenList,
    settings: &Settings,
    expr: TokenId,
    start: TokenId,
    end: TokenId,
) -> bool {
    let expr_id = tokens[expr].expr_id();
    let mut var_ids = Vec::new();
    visit_ast_nodes(tokens, expr, &mut |t| {
        if tokens[t].var_id() != 0 {
            var_ids.push(tokens[t].var_id());
        }
        ChildrenToVisit::Op1AndOp2
    });
    let mut cur = start;
    while cur < end {
        let t = &tokens[cur];
        let hit = (expr_id != 0 && t.expr_id() == expr_id)
            || (t.var_id() != 0 && var_ids.contains(&t.var_id()));
        if hit && is_token_written(tokens, settings, cur) {
            return true;
        }
        match tokens.next(cur) {
            Some(next) => cur = next,
            None => break,
        }
    }
    false
}

/// No side effects anywhere in the expression tree.
pub fn is_const_expression(tokens: &TokenList, settings: &Settings, expr: TokenId) -> bool {
    let mut constant = true;
    visit_ast_nodes(tokens, expr, &mut |t| {
        if tokens[t].is_assignment_op() || tokens[t].kind() == crate::token::TokenKind::IncDec {
            constant = false;
            return ChildrenToVisit::Done;
        }
        if tokens[t].str() == "(" && tokens[t].ast_op1().is_some() && !tokens[t].is_cast() {
            let known_const = call_is_const(tokens, settings, t);
            if !known_const {
                constant = false;
                return ChildrenToVisit::Done;
            }
        }
        ChildrenToVisit::Op1AndOp2
    });
    constant
}

/// Where execution continues after `break`: the token after the end of the
/// innermost loop or switch.
pub fn find_next_token_from_break(
    tokens: &TokenList,
    db: &SymbolDatabase,
    break_tok: TokenId,
) -> Option<TokenId> {
    let scope = tokens[break_tok].scope()?;
    for scope_id in db.scope_chain(scope) {
        let s = db.scope(scope_id);
        if s.is_loop_scope() || s.kind == ScopeKind::Switch {
            return s.body_end;
        }
        if s.kind == ScopeKind::Function {
            break;
        }
    }
    None
}

/// Reconstructed source text of the expression rooted at `tok`.
pub fn expression_string(tokens: &TokenList, tok: TokenId) -> String {
    let (start, end) = expr_start_end(tokens, tok);
    let mut out = String::new();
    let mut cur = start;
    loop {
        let t = &tokens[cur];
        if !out.is_empty()
            && !matches!(t.str(), ")" | "]" | "," | ";" | "." | "->" | "::" | "(" | "[")
            && !out.ends_with(['(', '[', '.', ':'])
            && !out.ends_with("->")
        {
            out.push(' ');
        }
        out.push_str(t.str());
        if cur == end {
            break;
        }
        match tokens.next(cur) {
            Some(next) => cur = next,
            None => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolDatabase;
    use crate::tokenlist::TokenList;

    fn build(code: &str) -> (TokenList, SymbolDatabase, Settings) {
        let settings = Settings::test_default();
        let mut tokens = TokenList::tokenize(code, "test.cpp", true).unwrap();
        let db = SymbolDatabase::build(&mut tokens, &settings).unwrap();
        (tokens, db, settings)
    }

    fn tok(tokens: &TokenList, text: &str) -> TokenId {
        tokens.ids().find(|&id| tokens[id].str() == text).unwrap()
    }

    #[test]
    fn cond_and_step_of_for() {
        let (tokens, _, _) = build("void f() { for (i = 0; i < 10; ++i) { } }");
        let for_tok = tok(&tokens, "for");
        let cond = get_cond_tok(&tokens, for_tok).unwrap();
        assert_eq!(tokens[cond].str(), "<");
        let init = get_init_tok(&tokens, for_tok).unwrap();
        assert_eq!(tokens[init].str(), "=");
        let step = get_step_tok(&tokens, for_tok).unwrap();
        assert_eq!(tokens[step].str(), "++");
    }

    #[test]
    fn cond_from_end_of_if_and_else() {
        let (tokens, _, _) = build("void f() { if (x) { a = 1; } else { a = 2; } }");
        let close_braces: Vec<TokenId> = tokens
            .ids()
            .filter(|&id| tokens[id].str() == "}")
            .collect();
        // then-block end and else-block end both find the condition
        let cond1 = get_cond_tok_from_end(&tokens, close_braces[0]).unwrap();
        assert_eq!(tokens[cond1].str(), "x");
        let cond2 = get_cond_tok_from_end(&tokens, close_braces[1]).unwrap();
        assert_eq!(tokens[cond2].str(), "x");
    }

    #[test]
    fn lambda_end_detection() {
        let (tokens, _, _) = build("void f() { auto g = [](int a) { return a; }; }");
        let bracket = tok(&tokens, "[");
        let end = find_lambda_end_token(&tokens, bracket).unwrap();
        assert_eq!(tokens[end].str(), "}");
        // array subscript is not a lambda
        let (tokens2, _, _) = build("void f() { a[3] = 1; }");
        let sub = tok(&tokens2, "[");
        assert_eq!(find_lambda_end_token(&tokens2, sub), None);
    }

    #[test]
    fn return_scope_detection() {
        let (tokens, _, settings) = build("void f() { if (x) { return; } }");
        let inner_end = tokens
            .ids()
            .filter(|&id| tokens[id].str() == "}")
            .next()
            .unwrap();
        let mut unknown = None;
        assert!(is_return_scope(&tokens, &settings, inner_end, &mut unknown));

        let (tokens2, _, settings2) = build("void f() { if (x) { exit(1); } }");
        let inner_end2 = tokens2
            .ids()
            .filter(|&id| tokens2[id].str() == "}")
            .next()
            .unwrap();
        let mut unknown2 = None;
        assert!(is_return_scope(&tokens2, &settings2, inner_end2, &mut unknown2));

        let (tokens3, _, settings3) = build("void f() { if (x) { a = 1; } }");
        let inner_end3 = tokens3
            .ids()
            .filter(|&id| tokens3[id].str() == "}")
            .next()
            .unwrap();
        let mut unknown3 = None;
        assert!(!is_return_scope(&tokens3, &settings3, inner_end3, &mut unknown3));
    }

    #[test]
    fn expression_change_detection() {
        let (tokens, _, settings) = build("void f(int x) { x = 1; int y = x + 2; }");
        let x_use = tokens
            .ids()
            .filter(|&id| tokens[id].str() == "x")
            .nth(1)
            .unwrap();
        let start = tokens.front().unwrap();
        let end = tokens.back().unwrap();
        assert!(is_expression_changed(&tokens, &settings, x_use, start, end));

        let (tokens2, _, settings2) = build("void f(int x) { int y = x + 2; }");
        let x_use2 = tokens2
            .ids()
            .filter(|&id| tokens2[id].str() == "x")
            .nth(1)
            .unwrap();
        let start2 = tokens2.front().unwrap();
        let end2 = tokens2.back().unwrap();
        assert!(!is_expression_changed(&tokens2, &settings2, x_use2, start2, end2));
    }

    #[test]
    fn expression_strings() {
        let (tokens, _, _) = build("void f() { y = a + b; }");
        let plus = tok(&tokens, "+");
        assert_eq!(expression_string(&tokens, plus), "a + b");
    }
}
