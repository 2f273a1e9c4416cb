//! The token entity. Tokens live in a [`TokenList`](crate::tokenlist::TokenList)
//! arena and reference each other (and the symbol database entities) by
//! `u32` ids; nothing here owns anything but its own text.

use crate::errors::Location;
use crate::symbols::{EnumeratorId, FunctionId, ScopeId, TypeId, ValueType, VariableId};
use crate::vfvalue::Value;

/// Index of a token in its list. Ordering follows source order, so
/// `a < b` means `a` precedes `b`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub u32);

impl TokenId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    Char,
    String,
    Boolean,
    Op,
    IncDec,
}

const KEYWORDS: &[&str] = &[
    "alignof", "auto", "bool", "break", "case", "catch", "char", "class", "const", "const_cast",
    "constexpr", "continue", "decltype", "default", "delete", "do", "double", "dynamic_cast",
    "else", "enum", "explicit", "extern", "final", "float", "for", "friend", "goto", "if",
    "inline", "int", "long", "mutable", "namespace", "new", "noexcept", "nullptr", "operator",
    "override", "private", "protected", "public", "register", "reinterpret_cast", "return",
    "short", "signed", "sizeof", "static", "static_cast", "struct", "switch", "template", "this",
    "throw", "try", "typedef", "typeid", "typename", "union", "unsigned", "using", "virtual",
    "void", "volatile", "wchar_t", "while",
];

#[derive(Clone, Debug)]
pub struct Token {
    pub(crate) text: String,
    pub(crate) kind: TokenKind,
    pub(crate) file_index: u32,
    pub(crate) line: u32,
    pub(crate) column: u32,
    pub(crate) link: Option<TokenId>,
    pub(crate) ast_op1: Option<TokenId>,
    pub(crate) ast_op2: Option<TokenId>,
    pub(crate) ast_parent: Option<TokenId>,
    pub(crate) scope: Option<ScopeId>,
    pub(crate) variable: Option<VariableId>,
    pub(crate) function: Option<FunctionId>,
    pub(crate) enumerator: Option<EnumeratorId>,
    pub(crate) type_ref: Option<TypeId>,
    pub(crate) var_id: u32,
    pub(crate) expr_id: u32,
    pub(crate) value_type: Option<ValueType>,
    pub(crate) values: Vec<Value>,
    pub(crate) is_cast: bool,
}

impl Token {
    pub(crate) fn new(text: String, kind: TokenKind, file_index: u32, line: u32, column: u32) -> Self {
        Token {
            text,
            kind,
            file_index,
            line,
            column,
            link: None,
            ast_op1: None,
            ast_op2: None,
            ast_parent: None,
            scope: None,
            variable: None,
            function: None,
            enumerator: None,
            type_ref: None,
            var_id: 0,
            expr_id: 0,
            value_type: None,
            values: Vec::new(),
            is_cast: false,
        }
    }

    pub fn str(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn location(&self) -> Location {
        Location {
            file_index: self.file_index,
            line: self.line,
            column: self.column,
        }
    }

    pub fn link(&self) -> Option<TokenId> {
        self.link
    }

    pub fn ast_op1(&self) -> Option<TokenId> {
        self.ast_op1
    }

    pub fn ast_op2(&self) -> Option<TokenId> {
        self.ast_op2
    }

    pub fn ast_parent(&self) -> Option<TokenId> {
        self.ast_parent
    }

    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    pub fn variable(&self) -> Option<VariableId> {
        self.variable
    }

    pub fn function(&self) -> Option<FunctionId> {
        self.function
    }

    pub fn enumerator(&self) -> Option<EnumeratorId> {
        self.enumerator
    }

    pub fn type_ref(&self) -> Option<TypeId> {
        self.type_ref
    }

    pub fn var_id(&self) -> u32 {
        self.var_id
    }

    pub fn expr_id(&self) -> u32 {
        self.expr_id
    }

    pub fn value_type(&self) -> Option<&ValueType> {
        self.value_type.as_ref()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn is_name(&self) -> bool {
        self.kind == TokenKind::Name
    }

    pub fn is_number(&self) -> bool {
        self.kind == TokenKind::Number
    }

    pub fn is_string(&self) -> bool {
        self.kind == TokenKind::String
    }

    pub fn is_char_literal(&self) -> bool {
        self.kind == TokenKind::Char
    }

    pub fn is_op(&self) -> bool {
        matches!(self.kind, TokenKind::Op | TokenKind::IncDec)
    }

    pub fn is_keyword(&self) -> bool {
        self.kind == TokenKind::Name && KEYWORDS.binary_search(&self.text.as_str()).is_ok()
    }

    pub fn is_control_flow_keyword(&self) -> bool {
        matches!(
            self.text.as_str(),
            "if" | "else"
                | "for"
                | "while"
                | "do"
                | "switch"
                | "case"
                | "break"
                | "continue"
                | "goto"
                | "return"
                | "try"
                | "catch"
        )
    }

    pub fn is_assignment_op(&self) -> bool {
        matches!(
            self.text.as_str(),
            "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>="
        ) && self.kind == TokenKind::Op
    }

    pub fn is_comparison_op(&self) -> bool {
        matches!(self.text.as_str(), "==" | "!=" | "<" | "<=" | ">" | ">=")
            && self.kind == TokenKind::Op
    }

    pub fn is_arithmetical_op(&self) -> bool {
        matches!(self.text.as_str(), "+" | "-" | "*" | "/" | "%")
            && self.kind == TokenKind::Op
    }

    /// Both AST operands present.
    pub fn is_binary_op(&self) -> bool {
        self.ast_op1.is_some() && self.ast_op2.is_some()
    }

    pub fn is_unary_op(&self, op: &str) -> bool {
        self.text == op && self.ast_op1.is_some() && self.ast_op2.is_none()
    }

    pub fn is_cast(&self) -> bool {
        self.is_cast
    }

    /// Literal body of a string/char token: prefix and quotes stripped.
    pub fn str_value(&self) -> &str {
        let text = self.text.as_str();
        let open = match text.find(['"', '\'']) {
            Some(i) => i,
            None => return text,
        };
        &text[open + 1..text.len().saturating_sub(1).max(open + 1)]
    }

    /// True for a `L"..."` / `L'.'` wide literal.
    pub fn is_long_literal(&self) -> bool {
        self.text.starts_with('L')
            && matches!(self.kind, TokenKind::String | TokenKind::Char)
    }

    /// The attached `Known` integer value, if there is exactly that.
    pub fn known_int_value(&self) -> Option<crate::mathlib::Bigint> {
        self.values
            .iter()
            .find(|v| v.is_known() && v.int_value().is_some())
            .and_then(|v| v.int_value())
    }

    pub fn has_known_int_value(&self) -> bool {
        self.known_int_value().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_table_is_sorted() {
        let mut sorted = KEYWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, KEYWORDS);
    }

    #[test]
    fn str_value_strips_quotes_and_prefix() {
        let tok = Token::new("\"abc\"".into(), TokenKind::String, 0, 1, 1);
        assert_eq!(tok.str_value(), "abc");
        let tok = Token::new("L\"abc\"".into(), TokenKind::String, 0, 1, 1);
        assert_eq!(tok.str_value(), "abc");
        assert!(tok.is_long_literal());
        let tok = Token::new("'x'".into(), TokenKind::Char, 0, 1, 1);
        assert_eq!(tok.str_value(), "x");
    }
}
