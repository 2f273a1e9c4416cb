//! Expression AST construction. Runs after scope discovery; only executable
//! ranges get statement ASTs.
//!
//! The produced link shape is what the traversal engines pattern-match on:
//!
//! - call `f(a, b)`: `(` node, op1 = callee, op2 = `,` chain
//! - `if/while/switch (c)`: `(` op2 = condition root
//! - `for (a; b; c)`: `(` op2 = `;` node (op1 = a, op2 = `;` (op1 = b, op2 = c))
//! - range `for (x : c)`: `(` op2 = `:` node (op1 = x, op2 = c)
//! - `(type)expr`: `(` flagged as cast, op1 = operand
//! - `return e` / `throw e`: keyword op1 = e

use crate::token::{TokenId, TokenKind};
use crate::tokenlist::TokenList;

const PREC_COMMA: u8 = 1;
const PREC_ASSIGN: u8 = 2;
const PREC_TERNARY: u8 = 3;

/// Build statement ASTs for every `(body_start, body_end)` range.
pub(crate) fn build_ast(list: &mut TokenList, ranges: &[(TokenId, TokenId)]) {
    for &(start, end) in ranges {
        build_range(list, start, end);
    }
}

fn build_range(list: &mut TokenList, body_start: TokenId, body_end: TokenId) {
    let Some(mut tok) = list.next(body_start) else { return };
    while tok < body_end {
        let next = statement(list, tok, body_end);
        match next {
            Some(next) if next > tok => tok = next,
            _ => match list.next(tok) {
                Some(next) => tok = next,
                None => break,
            },
        }
    }
}

/// Handle one statement starting at `tok`; returns the first token of the
/// next statement.
fn statement(list: &mut TokenList, tok: TokenId, end: TokenId) -> Option<TokenId> {
    let head_paren = matches!(list[tok].str(), "if" | "while" | "switch" | "for" | "catch")
        && list.is(list.next(tok), "(");
    if matches!(list[tok].str(), "{" | "}" | ";" | "do" | "else" | "try") {
        list.next(tok)
    } else if head_paren {
        let open = list.next(tok)?;
        let close = list[open].link()?;
        if list[tok].str() == "for" {
            build_for_head(list, open, close);
        } else if list[tok].str() != "catch" {
            let start = list.next(open)?;
            if start < close {
                let mut parser = ExprParser::new(list, start, close);
                if let Some(root) = parser.parse_expr(PREC_COMMA) {
                    list.set_ast_op2(open, root);
                }
            }
        }
        list.next(close)
    } else if matches!(list[tok].str(), "return" | "throw") {
        let first = list.next(tok)?;
        let stmt_end = statement_end(list, first, end)?;
        if stmt_end > first {
            let mut parser = ExprParser::new(list, first, stmt_end);
            if let Some(root) = parser.parse_expr(PREC_COMMA) {
                list.set_ast_op1(tok, root);
            }
        }
        list.next(stmt_end)
    } else if list[tok].str() == "case" {
        let mut cur = tok;
        while cur < end && list[cur].str() != ":" {
            cur = list.next(cur)?;
        }
        list.next(cur)
    } else if matches!(
        list[tok].str(),
        "goto" | "break" | "continue" | "default" | "using" | "typedef"
    ) {
        let mut cur = tok;
        while cur < end && !matches!(list[cur].str(), ";" | ":") {
            cur = list.next(cur)?;
        }
        list.next(cur)
    } else if list[tok].is_name() && !list[tok].is_keyword() && list.is(list.next(tok), ":") {
        // label
        list.tok_at(tok, 2)
    } else {
        let stmt_end = statement_end(list, tok, end)?;
        let ast_start = declaration_name(list, tok, stmt_end).unwrap_or(tok);
        if ast_start < stmt_end {
            let mut parser = ExprParser::new(list, ast_start, stmt_end);
            parser.parse_expr(PREC_COMMA);
        }
        list.next(stmt_end)
    }
}

/// The `;` ending the statement that starts at `tok`. Linked groups are
/// skipped, including initializer/lambda braces that appear mid-expression.
fn statement_end(list: &TokenList, tok: TokenId, end: TokenId) -> Option<TokenId> {
    let mut cur = tok;
    while cur < end {
        let t = &list[cur];
        match t.str() {
            ";" => return Some(cur),
            "(" | "[" => cur = t.link()?,
            "{" => {
                let prev = list.prev(cur);
                if prev.is_some_and(|p| matches!(list[p].str(), ")" | "]" | "=" | ",")) {
                    cur = t.link()?;
                } else {
                    // compound statement; treat the brace as the boundary
                    return list.prev(cur);
                }
            }
            "}" => return list.prev(cur),
            _ => {}
        }
        cur = list.next(cur)?;
    }
    list.prev(end)
}

/// If `start..end` is a variable declaration, the token of the declared
/// name (where the expression AST starts).
fn declaration_name(list: &TokenList, start: TokenId, end: TokenId) -> Option<TokenId> {
    let mut cur = start;
    let mut saw_type = false;
    // qualifiers and the type
    while cur < end {
        let t = &list[cur];
        match t.str() {
            "const" | "static" | "volatile" | "extern" | "mutable" | "register" | "constexpr"
            | "inline" | "typename" | "struct" | "class" | "union" | "enum" => {}
            "unsigned" | "signed" | "short" | "long" | "int" | "char" | "float" | "double"
            | "bool" | "void" | "auto" | "wchar_t" => saw_type = true,
            _ if t.is_name() && !t.is_keyword() && !saw_type => {
                // user type name, possibly qualified / templated
                cur = list.next(cur)?;
                loop {
                    if list.is(cur, "::") && list.get(list.next(cur)?).is_some_and(|n| n.is_name()) {
                        cur = list.tok_at(cur, 2)?;
                    } else if list.is(cur, "<") && list[cur].link().is_some() {
                        cur = list.next(list[cur].link()?)?;
                    } else {
                        break;
                    }
                }
                saw_type = true;
                continue;
            }
            _ => break,
        }
        cur = list.next(cur)?;
    }
    if !saw_type || cur >= end {
        return None;
    }
    while cur < end && matches!(list[cur].str(), "*" | "&" | "&&") {
        cur = list.next(cur)?;
    }
    let name = cur;
    if cur >= end || !list[name].is_name() || list[name].is_keyword() {
        return None;
    }
    match list.str_at(name, 1) {
        "=" | ";" | "," | "[" | "(" => Some(name),
        _ => None,
    }
}

fn build_for_head(list: &mut TokenList, open: TokenId, close: TokenId) {
    // locate the two top-level semicolons, or a range-for colon
    let mut semis = Vec::new();
    let mut colon = None;
    let mut cur = open;
    while let Some(next) = list.next(cur) {
        if next >= close {
            break;
        }
        cur = next;
        let t = &list[cur];
        match t.str() {
            ";" => semis.push(cur),
            ":" => {
                if colon.is_none() {
                    colon = Some(cur);
                }
            }
            "(" | "[" | "{" => {
                if let Some(link) = t.link() {
                    cur = link;
                }
                continue;
            }
            "<" => {
                if let Some(link) = t.link() {
                    cur = link;
                }
                continue;
            }
            _ => continue,
        };
    }
    if semis.len() == 2 {
        let (sc1, sc2) = (semis[0], semis[1]);
        let init_start = list.next(open);
        let cond_start = list.next(sc1);
        let step_start = list.next(sc2);
        if let Some(root) = parse_range(list, init_start, sc1) {
            list.set_ast_op1(sc1, root);
        }
        if let Some(root) = parse_range(list, cond_start, sc2) {
            list.set_ast_op1(sc2, root);
        }
        if let Some(root) = parse_range(list, step_start, close) {
            list.set_ast_op2(sc2, root);
        }
        list.set_ast_op2(sc1, sc2);
        list.set_ast_op2(open, sc1);
    } else if let Some(colon) = colon {
        // range-for: loop variable is the last name before the colon
        let mut var = None;
        let mut cur = list.next(open);
        while let Some(c) = cur {
            if c >= colon {
                break;
            }
            if list[c].is_name() && !list[c].is_keyword() {
                var = Some(c);
            }
            cur = list.next(c);
        }
        if let Some(var) = var {
            list.set_ast_op1(colon, var);
        }
        let range_start = list.next(colon);
        if let Some(root) = parse_range(list, range_start, close) {
            list.set_ast_op2(colon, root);
        }
        list.set_ast_op2(open, colon);
    }
}

fn parse_range(list: &mut TokenList, start: Option<TokenId>, end: TokenId) -> Option<TokenId> {
    let start = start?;
    if start >= end {
        return None;
    }
    let ast_start = declaration_name(list, start, end).unwrap_or(start);
    let mut parser = ExprParser::new(list, ast_start, end);
    parser.parse_expr(PREC_COMMA)
}

struct ExprParser<'l> {
    list: &'l mut TokenList,
    pos: TokenId,
    end: TokenId,
    depth: u32,
}

impl<'l> ExprParser<'l> {
    fn new(list: &'l mut TokenList, start: TokenId, end: TokenId) -> Self {
        ExprParser {
            list,
            pos: start,
            end,
            depth: 0,
        }
    }

    fn cur(&self) -> Option<TokenId> {
        (self.pos < self.end).then_some(self.pos)
    }

    fn advance(&mut self) {
        self.pos = TokenId(self.pos.0 + 1);
    }

    fn skip_to_after(&mut self, tok: TokenId) {
        self.pos = TokenId(tok.0 + 1);
    }

    fn binary_prec(&self, id: TokenId) -> Option<(u8, bool)> {
        let t = &self.list[id];
        if t.kind() != TokenKind::Op {
            return None;
        }
        if t.is_assignment_op() {
            return Some((PREC_ASSIGN, true));
        }
        let prec = match t.str() {
            "," => PREC_COMMA,
            "||" => 4,
            "&&" => 5,
            "|" => 6,
            "^" => 7,
            "&" => 8,
            "==" | "!=" => 9,
            "<" | ">" if t.link().is_none() => 10,
            "<=" | ">=" => 10,
            "<<" | ">>" => 11,
            "+" | "-" => 12,
            "*" | "/" | "%" => 13,
            _ => return None,
        };
        Some((prec, false))
    }

    fn parse_expr(&mut self, min_prec: u8) -> Option<TokenId> {
        self.depth += 1;
        if self.depth > 100 {
            return None;
        }
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.cur() {
            if self.list.is(op, "?") && PREC_TERNARY >= min_prec {
                self.advance();
                let then_root = self.parse_expr(PREC_COMMA)?;
                let colon = self.cur()?;
                if !self.list.is(colon, ":") {
                    return None;
                }
                self.advance();
                let else_root = self.parse_expr(PREC_TERNARY)?;
                self.list.set_ast_op1(colon, then_root);
                self.list.set_ast_op2(colon, else_root);
                self.list.set_ast_op1(op, lhs);
                self.list.set_ast_op2(op, colon);
                lhs = op;
                continue;
            }
            let Some((prec, right_assoc)) = self.binary_prec(op) else { break };
            if prec < min_prec {
                break;
            }
            self.advance();
            let rhs = self.parse_expr(if right_assoc { prec } else { prec + 1 })?;
            self.list.set_ast_op1(op, lhs);
            self.list.set_ast_op2(op, rhs);
            lhs = op;
        }
        self.depth -= 1;
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<TokenId> {
        self.depth += 1;
        if self.depth > 100 {
            return None;
        }
        let id = self.cur()?;
        let kind = self.list[id].kind();
        let result = if matches!(self.list[id].str(), "!" | "~" | "+" | "-" | "*" | "&")
            || kind == TokenKind::IncDec
        {
            self.advance();
            let operand = self.parse_unary()?;
            self.list.set_ast_op1(id, operand);
            Some(id)
        } else if self.list.is(id, "new") {
            self.advance();
            let operand = self.parse_unary()?;
            self.list.set_ast_op1(id, operand);
            Some(id)
        } else if self.list.is(id, "delete") {
            self.advance();
            if self.list.is(self.cur(), "[") {
                let link = self.list[self.cur()?].link()?;
                self.skip_to_after(link);
            }
            let operand = self.parse_unary()?;
            self.list.set_ast_op1(id, operand);
            Some(id)
        } else if self.list.is(id, "(") {
            let close = self.list[id].link()?;
            if self.is_cast(id, close) {
                self.list.tok_mut(id).is_cast = true;
                self.skip_to_after(close);
                let operand = self.parse_unary()?;
                self.list.set_ast_op1(id, operand);
                Some(id)
            } else {
                self.advance();
                let inner_end = self.end;
                self.end = close;
                let inner = self.parse_expr(PREC_COMMA);
                self.end = inner_end;
                self.skip_to_after(close);
                inner.map(|inner| self.parse_postfix(inner))
            }
        } else if matches!(self.list[id].str(), "[" | "{") {
            // lambda or brace initializer as an opaque leaf
            let mut last = self.list[id].link()?;
            if self.list[id].str() == "[" {
                while self.list.next(last).is_some_and(|n| matches!(self.list[n].str(), "(" | "{")) {
                    last = self.list[self.list.next(last)?].link()?;
                }
            }
            self.skip_to_after(last);
            Some(id)
        } else if self.list[id].is_name()
            || matches!(
                kind,
                TokenKind::Number | TokenKind::String | TokenKind::Char | TokenKind::Boolean
            )
        {
            self.advance();
            Some(self.parse_postfix(id))
        } else {
            None
        };
        self.depth -= 1;
        result
    }

    fn parse_postfix(&mut self, mut lhs: TokenId) -> TokenId {
        while let Some(id) = self.cur() {
            if self.list.is(id, "::") {
                let Some(name) = self.list.next(id).filter(|&n| n < self.end && self.list[n].is_name())
                else {
                    break;
                };
                self.skip_to_after(name);
                self.list.set_ast_op1(id, lhs);
                self.list.set_ast_op2(id, name);
                lhs = id;
            } else if matches!(self.list[id].str(), "." | "->") {
                let Some(name) = self.list.next(id).filter(|&n| n < self.end && self.list[n].is_name())
                else {
                    break;
                };
                self.skip_to_after(name);
                self.list.set_ast_op1(id, lhs);
                self.list.set_ast_op2(id, name);
                lhs = id;
            } else if self.list.is(id, "<") && self.list[id].link().is_some() {
                // template arguments on a name; skip them
                let close = self.list[id].link().unwrap();
                self.skip_to_after(close);
            } else if self.list.is(id, "(") && self.list[id].link().is_some() {
                let close = self.list[id].link().unwrap();
                self.advance();
                let outer_end = self.end;
                self.end = close;
                let mut args = None;
                if self.cur().is_some() {
                    args = self.parse_expr(PREC_ASSIGN);
                    while let Some(comma) = self.cur().filter(|&c| self.list.is(c, ",")) {
                        self.advance();
                        let Some(next_arg) = self.parse_expr(PREC_ASSIGN) else { break };
                        if let Some(acc) = args {
                            self.list.set_ast_op1(comma, acc);
                            self.list.set_ast_op2(comma, next_arg);
                            args = Some(comma);
                        }
                    }
                }
                self.end = outer_end;
                self.skip_to_after(close);
                self.list.set_ast_op1(id, lhs);
                if let Some(args) = args {
                    self.list.set_ast_op2(id, args);
                }
                lhs = id;
            } else if self.list.is(id, "[") && self.list[id].link().is_some() {
                let close = self.list[id].link().unwrap();
                self.advance();
                let outer_end = self.end;
                self.end = close;
                let index = if self.cur().is_some() {
                    self.parse_expr(PREC_COMMA)
                } else {
                    None
                };
                self.end = outer_end;
                self.skip_to_after(close);
                self.list.set_ast_op1(id, lhs);
                if let Some(index) = index {
                    self.list.set_ast_op2(id, index);
                }
                lhs = id;
            } else if self.list[id].kind() == TokenKind::IncDec {
                self.advance();
                self.list.set_ast_op1(id, lhs);
                lhs = id;
            } else {
                break;
            }
        }
        lhs
    }

    /// `( type-tokens )` followed by something an operand can start with.
    fn is_cast(&self, open: TokenId, close: TokenId) -> bool {
        if self.list.next(open) == Some(close) {
            return false;
        }
        let mut ends_with_pointer = false;
        let mut cur = open;
        while let Some(next) = self.list.next(cur) {
            if next >= close {
                break;
            }
            cur = next;
            let t = &self.list[cur];
            ends_with_pointer = matches!(t.str(), "*" | "&");
            let type_ish = matches!(t.str(), "*" | "&" | "::" | "const" | "unsigned" | "signed")
                || (t.is_name() && !t.is_control_flow_keyword())
                || (matches!(t.str(), "<" | ">") && t.link().is_some());
            if !type_ish {
                return false;
            }
            if let Some(link) = t.link() {
                if self.list[cur].str() == "<" {
                    cur = link;
                }
            }
        }
        let Some(after) = self.list.next(close).filter(|&a| a < self.end) else {
            return false;
        };
        let a = &self.list[after];
        let starts_operand = a.is_name() && !a.is_control_flow_keyword()
            || matches!(
                a.kind(),
                TokenKind::Number | TokenKind::String | TokenKind::Char | TokenKind::Boolean
            )
            || matches!(a.str(), "(" | "!" | "~")
            || a.kind() == TokenKind::IncDec
            || (ends_with_pointer && matches!(a.str(), "&" | "*" | "-" | "+"));
        starts_operand
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenlist::TokenList;

    /// Parse `code` as a single function body and build its AST.
    fn build(code: &str) -> TokenList {
        let mut list = TokenList::tokenize(code, "test.cpp", true).unwrap();
        let open = list.ids().find(|&id| list[id].str() == "{").unwrap();
        let close = list[open].link().unwrap();
        build_ast(&mut list, &[(open, close)]);
        list
    }

    fn tok(list: &TokenList, text: &str) -> TokenId {
        list.ids().find(|&id| list[id].str() == text).unwrap()
    }

    #[test]
    fn assignment_and_arithmetic() {
        let list = build("void f() { x = a + b * c; }");
        let assign = tok(&list, "=");
        let plus = tok(&list, "+");
        let mul = tok(&list, "*");
        assert_eq!(list.ast_op1(assign), Some(tok(&list, "x")));
        assert_eq!(list.ast_op2(assign), Some(plus));
        assert_eq!(list.ast_op2(plus), Some(mul));
        assert_eq!(list.ast_parent(mul), Some(plus));
        assert_eq!(list.ast_top(tok(&list, "c")), assign);
    }

    #[test]
    fn declaration_skips_type() {
        let list = build("void f() { int x = 3; }");
        let assign = tok(&list, "=");
        assert_eq!(list.ast_op1(assign), Some(tok(&list, "x")));
        assert_eq!(list.ast_op2(assign), Some(tok(&list, "3")));
        // the type token is not part of the AST
        assert_eq!(list.ast_parent(tok(&list, "int")), None);
    }

    #[test]
    fn call_shape() {
        let list = build("void f() { g(a, b); }");
        let open = tok(&list, "(");
        // first '(' is f's signature; find the call paren
        let call = list
            .ids()
            .filter(|&id| list[id].str() == "(")
            .find(|&id| list.ast_op1(id).is_some())
            .unwrap();
        assert_ne!(call, open);
        assert_eq!(list.ast_op1(call), Some(tok(&list, "g")));
        let comma = tok(&list, ",");
        assert_eq!(list.ast_op2(call), Some(comma));
        assert_eq!(list.ast_op1(comma), Some(tok(&list, "a")));
        assert_eq!(list.ast_op2(comma), Some(tok(&list, "b")));
    }

    #[test]
    fn if_condition_hangs_off_paren() {
        let list = build("void f() { if (x < 3) { y = 1; } }");
        let if_tok = tok(&list, "if");
        let open = list.next(if_tok).unwrap();
        let less = tok(&list, "<");
        assert_eq!(list.ast_op2(open), Some(less));
    }

    #[test]
    fn for_head_chain() {
        let list = build("void f() { for (i = 0; i < n; ++i) { } }");
        let for_tok = tok(&list, "for");
        let open = list.next(for_tok).unwrap();
        let sc1 = list.ast_op2(open).unwrap();
        assert_eq!(list[sc1].str(), ";");
        let init = list.ast_op1(sc1).unwrap();
        assert_eq!(list[init].str(), "=");
        let sc2 = list.ast_op2(sc1).unwrap();
        assert_eq!(list[sc2].str(), ";");
        assert_eq!(list[list.ast_op1(sc2).unwrap()].str(), "<");
        assert_eq!(list[list.ast_op2(sc2).unwrap()].str(), "++");
    }

    #[test]
    fn range_for_colon() {
        let list = build("void f() { for (int x : v) { } }");
        let open = list.next(tok(&list, "for")).unwrap();
        let colon = list.ast_op2(open).unwrap();
        assert_eq!(list[colon].str(), ":");
        assert_eq!(list.ast_op1(colon), Some(tok(&list, "x")));
        assert_eq!(list.ast_op2(colon), Some(tok(&list, "v")));
    }

    #[test]
    fn return_owns_operand() {
        let list = build("int f() { return a + 1; }");
        let ret = tok(&list, "return");
        let plus = tok(&list, "+");
        assert_eq!(list.ast_op1(ret), Some(plus));
        assert_eq!(list.ast_parent(plus), Some(ret));
    }

    #[test]
    fn address_of_is_unary() {
        let list = build("int* f() { return &x; }");
        let amp = tok(&list, "&");
        assert_eq!(list.ast_op1(amp), Some(tok(&list, "x")));
        assert_eq!(list.ast_op2(amp), None);
        assert!(list[amp].is_unary_op("&"));
    }

    #[test]
    fn cast_is_flagged() {
        let list = build("void f() { y = (char*)&x; }");
        let cast = list.ids().find(|&id| list[id].is_cast()).unwrap();
        assert_eq!(list[cast].str(), "(");
        let amp = list.ast_op1(cast).unwrap();
        assert_eq!(list[amp].str(), "&");
    }

    #[test]
    fn grouping_parens_have_no_node() {
        let list = build("void f() { x = (a + b) * c; }");
        let mul = tok(&list, "*");
        let plus = tok(&list, "+");
        assert_eq!(list.ast_op1(mul), Some(plus));
    }

    #[test]
    fn ternary_shape() {
        let list = build("void f() { x = c ? a : b; }");
        let question = tok(&list, "?");
        let colon = tok(&list, ":");
        assert_eq!(list.ast_op2(question), Some(colon));
        assert_eq!(list.ast_op1(colon), Some(tok(&list, "a")));
        assert_eq!(list.ast_op2(colon), Some(tok(&list, "b")));
    }

    #[test]
    fn member_call_shape() {
        let list = build("void f() { v.push_back(1); }");
        let dot = tok(&list, ".");
        assert_eq!(list.ast_op1(dot), Some(tok(&list, "v")));
        assert_eq!(list.ast_op2(dot), Some(tok(&list, "push_back")));
        let call = list.ast_parent(dot).unwrap();
        assert_eq!(list[call].str(), "(");
    }

    #[test]
    fn do_while_condition() {
        let list = build("void f() { do { x--; } while (x > 0); }");
        let while_tok = tok(&list, "while");
        let open = list.next(while_tok).unwrap();
        assert_eq!(list[list.ast_op2(open).unwrap()].str(), ">");
    }
}
