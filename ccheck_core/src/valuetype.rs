//! `ValueType` inference: declared types for variables, then a bottom-up
//! pass over every expression tree. Running the pass twice yields the same
//! annotations.

use ccheck_config::Settings;

use crate::mathlib;
use crate::symbols::{
    RefKind, ScopeId, ScopeKind, SymbolDatabase, ValueType, ValueTypeKind, ValueTypeSign,
    VariableFlags, VariableId,
};
use crate::token::{TokenId, TokenKind};
use crate::tokenlist::TokenList;

pub(crate) fn set_value_types(
    tokens: &mut TokenList,
    db: &mut SymbolDatabase,
    settings: &Settings,
) {
    // declared variable types
    let count = db.variables.len();
    let mut computed: Vec<Option<ValueType>> = Vec::with_capacity(count);
    for index in 0..count {
        let var = &db.variables[index];
        let vt = match (var.type_start, var.type_end) {
            (Some(start), Some(end)) => {
                let mut vt = parse_decl(tokens, db, settings, start, end, var.scope);
                if let Some(vt) = vt.as_mut() {
                    apply_variable_flags(vt, var.flags);
                }
                vt
            }
            _ => None,
        };
        computed.push(vt);
    }
    for (index, vt) in computed.into_iter().enumerate() {
        db.variables[index].value_type = vt;
        // variables of stl string type get the flag late, once the container
        // record is known
        if let Some(vt) = db.variables[index].value_type.clone() {
            if vt
                .container
                .as_deref()
                .and_then(|c| settings.library.container(c))
                .is_some_and(|c| c.std_string_like)
            {
                db.variables[index].flags.set(VariableFlags::STL_STRING, true);
            }
            if vt.container.is_some() || vt.kind == ValueTypeKind::SmartPointer {
                db.variables[index].flags.set(VariableFlags::STL_TYPE, true);
            }
            if vt.kind == ValueTypeKind::SmartPointer {
                db.variables[index].flags.set(VariableFlags::SMART_POINTER, true);
            }
        }
    }

    // leaf tokens
    let ids: Vec<TokenId> = tokens.ids().collect();
    for &id in &ids {
        let vt = leaf_value_type(tokens, db, settings, id);
        if let Some(vt) = vt {
            tokens.set_value_type(id, vt);
        }
    }

    // expression trees, bottom-up
    let roots: Vec<TokenId> = tokens
        .ids()
        .filter(|&id| tokens[id].ast_parent().is_none() && tokens[id].ast_op1().is_some())
        .collect();
    for root in roots {
        compute_rec(tokens, db, settings, root, 0);
    }
}

fn apply_variable_flags(vt: &mut ValueType, flags: VariableFlags) {
    if flags.get(VariableFlags::CONST) {
        vt.constness |= 1;
    }
    if flags.get(VariableFlags::REFERENCE) {
        vt.reference = if flags.get(VariableFlags::RVALUE_REF) {
            RefKind::RValue
        } else {
            RefKind::LValue
        };
    }
}

fn leaf_value_type(
    tokens: &TokenList,
    db: &SymbolDatabase,
    settings: &Settings,
    id: TokenId,
) -> Option<ValueType> {
    let t = &tokens[id];
    match t.kind() {
        TokenKind::Number => Some(number_value_type(t.str(), settings)),
        TokenKind::Boolean => Some(ValueType::new(
            ValueTypeSign::Unknown,
            ValueTypeKind::Bool,
            0,
        )),
        TokenKind::Char => {
            let mut vt = if t.is_long_literal() {
                ValueType::new(ValueTypeSign::Unknown, ValueTypeKind::Wchar, 0)
            } else if settings.is_cpp() {
                ValueType::new(char_sign(settings), ValueTypeKind::Char, 0)
            } else {
                ValueType::new(ValueTypeSign::Signed, ValueTypeKind::Int, 0)
            };
            vt.reference = RefKind::None;
            Some(vt)
        }
        TokenKind::String => {
            let kind = if t.is_long_literal() {
                ValueTypeKind::Wchar
            } else {
                ValueTypeKind::Char
            };
            let mut vt = ValueType::new(char_sign(settings), kind, 1);
            vt.constness = 1;
            Some(vt)
        }
        TokenKind::Name => {
            if let Some(vid) = t.variable() {
                let mut vt = db.variable(vid).value_type.clone()?;
                vt.reference = RefKind::None;
                return Some(vt);
            }
            if let Some(eid) = t.enumerator() {
                let scope = db.enumerator(eid).scope;
                let mut vt = ValueType::new(ValueTypeSign::Signed, ValueTypeKind::Int, 0);
                vt.is_enum = true;
                vt.type_scope = Some(scope);
                return Some(vt);
            }
            if t.str() == "this" {
                let class_scope = t
                    .scope()
                    .and_then(|s| enclosing_class(db, s))?;
                let mut vt = ValueType::new(ValueTypeSign::Unknown, ValueTypeKind::Record, 1);
                vt.type_scope = Some(class_scope);
                return Some(vt);
            }
            None
        }
        _ => None,
    }
}

fn enclosing_class(db: &SymbolDatabase, scope: ScopeId) -> Option<ScopeId> {
    db.scope_chain(scope).find_map(|s| {
        let sc = db.scope(s);
        if sc.is_class_or_struct_or_union() {
            Some(s)
        } else {
            sc.function_of
        }
    })
}

fn char_sign(settings: &Settings) -> ValueTypeSign {
    match settings.platform.default_sign {
        ccheck_config::CharSign::Signed => ValueTypeSign::Signed,
        ccheck_config::CharSign::Unsigned => ValueTypeSign::Unsigned,
    }
}

fn number_value_type(text: &str, settings: &Settings) -> ValueType {
    if mathlib::is_float(text) {
        let kind = if text.ends_with(['f', 'F']) {
            ValueTypeKind::Float
        } else if text.ends_with(['l', 'L']) {
            ValueTypeKind::LongDouble
        } else {
            ValueTypeKind::Double
        };
        return ValueType::new(ValueTypeSign::Unknown, kind, 0);
    }
    let sign = if mathlib::has_unsigned_suffix(text) {
        ValueTypeSign::Unsigned
    } else {
        ValueTypeSign::Signed
    };
    let longs = mathlib::long_suffix_count(text);
    let value = mathlib::to_bigint(text).unwrap_or(0);
    let platform = &settings.platform;
    let kind = if longs >= 2 {
        ValueTypeKind::LongLong
    } else if longs == 1 {
        ValueTypeKind::Long
    } else if value > ccheck_config::Platform::max_value(platform.int_bit(), sign == ValueTypeSign::Signed) {
        if value > ccheck_config::Platform::max_value(platform.long_bit(), sign == ValueTypeSign::Signed) {
            ValueTypeKind::LongLong
        } else {
            ValueTypeKind::Long
        }
    } else {
        ValueTypeKind::Int
    };
    ValueType::new(sign, kind, 0)
}

/// Parse declaration tokens `start..=end` into a `ValueType`.
pub(crate) fn parse_decl(
    tokens: &TokenList,
    db: &SymbolDatabase,
    settings: &Settings,
    start: TokenId,
    end: TokenId,
    scope: Option<ScopeId>,
) -> Option<ValueType> {
    let mut vt = ValueType::default();
    let mut longs = 0u32;
    let mut cur = Some(start);
    let mut is_double = false;
    while let Some(t) = cur.filter(|&t| t <= end) {
        match tokens[t].str() {
            "const" => {
                vt.constness |= 1 << vt.pointer;
            }
            "unsigned" => vt.sign = ValueTypeSign::Unsigned,
            "signed" => vt.sign = ValueTypeSign::Signed,
            "bool" => vt.kind = ValueTypeKind::Bool,
            "char" => vt.kind = ValueTypeKind::Char,
            "short" => vt.kind = ValueTypeKind::Short,
            "wchar_t" => vt.kind = ValueTypeKind::Wchar,
            "int" => {
                if longs == 0 && vt.kind == ValueTypeKind::Unknown {
                    vt.kind = ValueTypeKind::Int;
                }
            }
            "long" => {
                longs += 1;
                vt.kind = if is_double {
                    ValueTypeKind::LongDouble
                } else if longs >= 2 {
                    ValueTypeKind::LongLong
                } else {
                    ValueTypeKind::Long
                };
            }
            "float" => vt.kind = ValueTypeKind::Float,
            "double" => {
                is_double = true;
                vt.kind = if longs > 0 {
                    ValueTypeKind::LongDouble
                } else {
                    ValueTypeKind::Double
                };
            }
            "void" => vt.kind = ValueTypeKind::Void,
            "*" => vt.pointer += 1,
            "&" => vt.reference = RefKind::LValue,
            "&&" => vt.reference = RefKind::RValue,
            "static" | "extern" | "mutable" | "volatile" | "register" | "constexpr" | "inline"
            | "typename" | "struct" | "class" | "union" | "enum" | "virtual" | "friend"
            | "explicit" | "auto" | "operator" => {}
            "::" => {}
            "<" => {
                if let Some(link) = tokens[t].link() {
                    cur = tokens.next(link);
                    continue;
                }
            }
            name if tokens[t].is_name() && !tokens[t].is_keyword() => {
                resolve_named_type(tokens, db, settings, &mut vt, t, name, scope);
            }
            _ => {}
        }
        cur = tokens.next(t);
    }
    if vt.kind == ValueTypeKind::Unknown && longs > 0 {
        vt.kind = if longs >= 2 {
            ValueTypeKind::LongLong
        } else {
            ValueTypeKind::Long
        };
    }
    if vt.kind == ValueTypeKind::Unknown && vt.sign != ValueTypeSign::Unknown {
        // plain `unsigned x`
        vt.kind = ValueTypeKind::Int;
    }
    if vt.kind == ValueTypeKind::Unknown && vt.pointer == 0 {
        return None;
    }
    if vt.sign == ValueTypeSign::Unknown {
        vt.sign = match vt.kind {
            ValueTypeKind::Char => char_sign(settings),
            k if k >= ValueTypeKind::Short && k <= ValueTypeKind::UnknownInt => {
                ValueTypeSign::Signed
            }
            _ => ValueTypeSign::Unknown,
        };
    }
    Some(vt)
}

fn resolve_named_type(
    tokens: &TokenList,
    db: &SymbolDatabase,
    settings: &Settings,
    vt: &mut ValueType,
    tok: TokenId,
    name: &str,
    scope: Option<ScopeId>,
) {
    if vt.kind != ValueTypeKind::Unknown {
        return;
    }
    if name == "std" {
        return;
    }
    if name == "FILE" {
        vt.kind = ValueTypeKind::Record;
        vt.original_type_name = "FILE".to_string();
        return;
    }
    if let Some(pod) = settings.library.pod_type(name) {
        let platform = &settings.platform;
        let size = if pod.size == 0 {
            platform.sizeof_pointer
        } else {
            pod.size
        };
        vt.kind = if size == 1 {
            ValueTypeKind::Char
        } else if size == platform.sizeof_int {
            ValueTypeKind::Int
        } else if size == platform.sizeof_long {
            ValueTypeKind::Long
        } else if size == platform.sizeof_long_long {
            ValueTypeKind::LongLong
        } else if size == platform.sizeof_short {
            ValueTypeKind::Short
        } else {
            ValueTypeKind::UnknownInt
        };
        vt.sign = match pod.sign.as_deref() {
            Some("u") => ValueTypeSign::Unsigned,
            Some("s") => ValueTypeSign::Signed,
            _ => ValueTypeSign::Unknown,
        };
        vt.original_type_name = name.to_string();
        return;
    }
    if let Some(_container) = settings.library.container(name) {
        vt.kind = ValueTypeKind::Container;
        vt.container = Some(name.to_string());
        // element type: first token of the template argument list
        if let Some(lt) = tokens.next(tok).filter(|&n| tokens[n].str() == "<") {
            vt.container_element = tokens.next(lt);
        }
        return;
    }
    if settings.library.smart_pointer(name).is_some() {
        vt.kind = ValueTypeKind::SmartPointer;
        vt.smart_pointer = Some(name.to_string());
        return;
    }
    let start = scope.unwrap_or(ScopeId(0));
    if let Some(type_id) = db.find_variable_type(start, name) {
        vt.kind = ValueTypeKind::Record;
        vt.type_scope = db.type_of(type_id).class_scope;
        return;
    }
    // enum defined as a scope
    for s in db.scope_chain(start) {
        for &nested in &db.scope(s).nested_list {
            let ns = db.scope(nested);
            if ns.kind == ScopeKind::Enum && ns.class_name == name {
                vt.kind = ValueTypeKind::Int;
                vt.sign = ValueTypeSign::Signed;
                vt.is_enum = true;
                vt.type_scope = Some(nested);
                return;
            }
        }
    }
}

fn compute_rec(
    tokens: &mut TokenList,
    db: &SymbolDatabase,
    settings: &Settings,
    tok: TokenId,
    depth: u32,
) {
    if depth > 200 {
        return;
    }
    if let Some(op1) = tokens[tok].ast_op1() {
        compute_rec(tokens, db, settings, op1, depth + 1);
    }
    if let Some(op2) = tokens[tok].ast_op2() {
        compute_rec(tokens, db, settings, op2, depth + 1);
    }
    if let Some(vt) = node_value_type(tokens, db, settings, tok) {
        tokens.set_value_type(tok, vt);
    }
}

fn op_vt<'a>(tokens: &'a TokenList, tok: Option<TokenId>) -> Option<&'a ValueType> {
    tok.and_then(|t| tokens[t].value_type())
}

fn node_value_type(
    tokens: &mut TokenList,
    db: &SymbolDatabase,
    settings: &Settings,
    tok: TokenId,
) -> Option<ValueType> {
    let op1 = tokens[tok].ast_op1();
    let op2 = tokens[tok].ast_op2();
    let text = tokens[tok].str().to_string();
    let bool_kind = if settings.is_cpp() {
        ValueTypeKind::Bool
    } else {
        ValueTypeKind::Int
    };
    match text.as_str() {
        "." | "->" => {
            let member = resolve_member(tokens, db, tok)?;
            let vt = db.variable(member).value_type.clone()?;
            Some(vt)
        }
        "(" => {
            if tokens[tok].is_cast() {
                let start = tokens.next(tok)?;
                let end = tokens.prev(tokens[tok].link()?)?;
                let scope = tokens[tok].scope();
                return parse_decl(tokens, db, settings, start, end, scope);
            }
            if op1.is_some() {
                return call_value_type(tokens, db, settings, tok);
            }
            None
        }
        "&" if op2.is_none() => {
            let mut vt = op_vt(tokens, op1)?.clone();
            vt.pointer += 1;
            vt.reference = RefKind::None;
            Some(vt)
        }
        "*" if op2.is_none() => {
            let mut vt = op_vt(tokens, op1)?.clone();
            if vt.pointer == 0 {
                return None;
            }
            vt.pointer -= 1;
            Some(vt)
        }
        "[" => {
            let base = op_vt(tokens, op1)?.clone();
            if let Some(container) = base.container.as_deref() {
                return Some(container_element_type(tokens, db, settings, &base, container));
            }
            let is_array_var = op1
                .and_then(|t| tokens[t].variable())
                .is_some_and(|v| db.variable(v).is_array());
            let mut vt = base;
            if vt.pointer > 0 && !is_array_var {
                vt.pointer -= 1;
            }
            Some(vt)
        }
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>=" => {
            op_vt(tokens, op1).cloned()
        }
        "==" | "!=" | "<" | "<=" | ">" | ">=" | "&&" | "||" | "!" => Some(ValueType::new(
            ValueTypeSign::Unknown,
            bool_kind,
            0,
        )),
        "+" | "-" | "*" | "/" | "%" | "&" | "|" | "^" => {
            let a = op_vt(tokens, op1)?.clone();
            if op2.is_none() {
                return Some(a);
            }
            let b = op_vt(tokens, op2)?.clone();
            Some(arithmetic_join(&a, &b, &text))
        }
        "<<" | ">>" => {
            let a = op_vt(tokens, op1)?.clone();
            // stream output keeps the stream type; integers shift
            Some(a)
        }
        "~" => op_vt(tokens, op1).cloned(),
        "++" | "--" => op_vt(tokens, op1).cloned(),
        "?" => {
            let colon = op2?;
            op_vt(tokens, tokens[colon].ast_op1())
                .or(op_vt(tokens, tokens[colon].ast_op2()))
                .cloned()
        }
        "," => op_vt(tokens, op2).cloned(),
        "::" => op_vt(tokens, op2).cloned(),
        "new" => {
            let mut vt = op_vt(tokens, op1).cloned().or_else(|| {
                // `new T` with no constructor call
                let name = op1?;
                let start = name;
                parse_decl(tokens, db, settings, start, start, tokens[tok].scope())
            })?;
            vt.pointer += 1;
            Some(vt)
        }
        _ => None,
    }
}

fn container_element_type(
    tokens: &TokenList,
    db: &SymbolDatabase,
    settings: &Settings,
    base: &ValueType,
    container: &str,
) -> ValueType {
    if settings
        .library
        .container(container)
        .is_some_and(|c| c.std_string_like)
    {
        return ValueType::new(char_sign(settings), ValueTypeKind::Char, 0);
    }
    if let Some(element) = base.container_element {
        // element tokens run to the matching `>`
        let mut end = element;
        while let Some(next) = tokens.next(end) {
            if matches!(tokens[next].str(), ">" | ",") {
                break;
            }
            end = next;
        }
        if let Some(vt) = parse_decl(tokens, db, settings, element, end, tokens[element].scope()) {
            return vt;
        }
    }
    ValueType::default()
}

/// Resolve `base.member` / `base->member`; annotates the member token.
fn resolve_member(tokens: &mut TokenList, db: &SymbolDatabase, dot: TokenId) -> Option<VariableId> {
    let base = tokens[dot].ast_op1()?;
    let member = tokens[dot].ast_op2()?;
    if tokens[member].variable().is_some() {
        return tokens[member].variable();
    }
    let base_vt = tokens[base].value_type()?;
    let type_scope = base_vt.type_scope?;
    let name = tokens[member].str().to_string();
    let vid = find_member(db, type_scope, &name, 0)?;
    let declaration_id = db.variable(vid).declaration_id;
    let m = tokens.tok_mut(member);
    m.variable = Some(vid);
    m.var_id = declaration_id;
    Some(vid)
}

fn find_member(db: &SymbolDatabase, scope: ScopeId, name: &str, depth: u32) -> Option<VariableId> {
    if depth > 100 {
        return None;
    }
    let s = db.scope(scope);
    if let Some(&vid) = s.var_list.iter().find(|&&v| db.variable(v).name == name) {
        return Some(vid);
    }
    let type_id = s.defined_type?;
    for base in &db.type_of(type_id).derived_from {
        if let Some(base_scope) = base.type_id.and_then(|t| db.type_of(t).class_scope) {
            if let Some(vid) = find_member(db, base_scope, name, depth + 1) {
                return Some(vid);
            }
        }
    }
    None
}

fn call_value_type(
    tokens: &mut TokenList,
    db: &SymbolDatabase,
    settings: &Settings,
    call: TokenId,
) -> Option<ValueType> {
    let callee = tokens[call].ast_op1()?;
    // container member call: `v.size()`
    if matches!(tokens[callee].str(), "." | "->") {
        let base = tokens[callee].ast_op1()?;
        let method = tokens[callee].ast_op2()?;
        let base_vt = tokens[base].value_type()?.clone();
        if let Some(container_key) = base_vt.container.clone() {
            let method_name = tokens[method].str().to_string();
            if let Some(container) = settings.library.container(&container_key) {
                use ccheck_config::Yield;
                return match container.yield_of(&method_name) {
                    Some(Yield::Size) => {
                        let mut vt = size_type(settings);
                        vt.original_type_name = "size_t".to_string();
                        Some(vt)
                    }
                    Some(Yield::Empty) => Some(ValueType::new(
                        ValueTypeSign::Unknown,
                        if settings.is_cpp() {
                            ValueTypeKind::Bool
                        } else {
                            ValueTypeKind::Int
                        },
                        0,
                    )),
                    Some(Yield::Item | Yield::AtIndex) => Some(container_element_type(
                        tokens,
                        db,
                        settings,
                        &base_vt,
                        &container_key,
                    )),
                    Some(Yield::Buffer | Yield::BufferNt) => {
                        let mut vt = container_element_type(
                            tokens,
                            db,
                            settings,
                            &base_vt,
                            &container_key,
                        );
                        vt.pointer += 1;
                        if matches!(container.yield_of(&method_name), Some(Yield::BufferNt)) {
                            vt.constness |= 1;
                        }
                        Some(vt)
                    }
                    Some(Yield::BeginIterator | Yield::EndIterator) => {
                        let mut vt = ValueType::new(
                            ValueTypeSign::Unknown,
                            ValueTypeKind::Iterator,
                            0,
                        );
                        vt.container = Some(container_key);
                        Some(vt)
                    }
                    None => None,
                };
            }
        }
        // method call on a record: resolve within the class scope
        if let Some(type_scope) = base_vt.type_scope {
            let name = tokens[method].str().to_string();
            if let Some(&fid) = db
                .scope(type_scope)
                .function_list
                .iter()
                .find(|&&f| db.function(f).name == name)
            {
                tokens.tok_mut(method).function = Some(fid);
                let f = db.function(fid);
                if let (Some(start), Some(end)) = (f.ret_start, f.ret_end) {
                    return parse_decl(tokens, db, settings, start, end, f.nested_in);
                }
            }
        }
        return None;
    }
    // plain call: overload resolution, then the library
    if tokens[callee].is_name() {
        if tokens[callee].variable().is_some() {
            return None;
        }
        if let Some(fid) = db.find_function(tokens, callee) {
            tokens.tok_mut(callee).function = Some(fid);
            let f = db.function(fid);
            if let (Some(start), Some(end)) = (f.ret_start, f.ret_end) {
                return parse_decl(tokens, db, settings, start, end, f.nested_in);
            }
            return None;
        }
        let name = tokens[callee].str().to_string();
        return library_return_type(settings, &name);
    }
    None
}

fn size_type(settings: &Settings) -> ValueType {
    let platform = &settings.platform;
    let kind = if platform.sizeof_size_t == platform.sizeof_long {
        ValueTypeKind::Long
    } else if platform.sizeof_size_t == platform.sizeof_long_long {
        ValueTypeKind::LongLong
    } else {
        ValueTypeKind::Int
    };
    ValueType::new(ValueTypeSign::Unsigned, kind, 0)
}

fn library_return_type(settings: &Settings, name: &str) -> Option<ValueType> {
    // the common C standard library returns the checks care about
    let vt = match name {
        "strlen" | "fread" | "fwrite" => {
            let mut vt = size_type(settings);
            vt.original_type_name = "size_t".to_string();
            vt
        }
        "strcmp" | "strncmp" | "fgetc" | "getc" | "fputc" | "fputs" | "fseek" | "ferror"
        | "feof" | "fflush" | "fclose" | "rand" | "atoi" | "abs" | "printf" | "fprintf"
        | "sprintf" | "snprintf" | "scanf" | "fscanf" | "sscanf" => {
            ValueType::new(ValueTypeSign::Signed, ValueTypeKind::Int, 0)
        }
        "malloc" | "calloc" | "realloc" => ValueType::new(ValueTypeSign::Unknown, ValueTypeKind::Void, 1),
        "strcpy" | "strncpy" | "strcat" | "strchr" | "strrchr" | "strstr" | "strtok"
        | "fgets" => {
            let mut vt = ValueType::new(char_sign(settings), ValueTypeKind::Char, 1);
            vt.sign = char_sign(settings);
            vt
        }
        "atof" | "strtod" => ValueType::new(ValueTypeSign::Unknown, ValueTypeKind::Double, 0),
        "fopen" | "freopen" | "tmpfile" => {
            let mut vt = ValueType::new(ValueTypeSign::Unknown, ValueTypeKind::Record, 1);
            vt.original_type_name = "FILE".to_string();
            vt
        }
        _ => return None,
    };
    Some(vt)
}

fn arithmetic_join(a: &ValueType, b: &ValueType, op: &str) -> ValueType {
    // pointer arithmetic
    if a.pointer > 0 && b.pointer > 0 {
        if op == "-" {
            // pointer difference
            let mut vt = ValueType::new(ValueTypeSign::Signed, ValueTypeKind::Long, 0);
            vt.original_type_name = "ptrdiff_t".to_string();
            return vt;
        }
        return a.clone();
    }
    if a.pointer > 0 {
        return a.clone();
    }
    if b.pointer > 0 {
        return b.clone();
    }
    // usual arithmetic conversions
    let mut result = if a.kind >= b.kind { a.clone() } else { b.clone() };
    if result.kind < ValueTypeKind::Int && result.is_integral() {
        result.kind = ValueTypeKind::Int;
        result.sign = ValueTypeSign::Signed;
    } else if a.kind == b.kind
        && (a.sign == ValueTypeSign::Unsigned || b.sign == ValueTypeSign::Unsigned)
        && result.is_integral()
    {
        result.sign = ValueTypeSign::Unsigned;
    }
    result.constness = 0;
    result.reference = RefKind::None;
    result.original_type_name.clear();
    result.is_enum = false;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::test_default()
    }

    #[test]
    fn number_literals() {
        let s = settings();
        let vt = number_value_type("1", &s);
        assert_eq!(vt.kind, ValueTypeKind::Int);
        assert_eq!(vt.sign, ValueTypeSign::Signed);
        assert_eq!(number_value_type("1u", &s).sign, ValueTypeSign::Unsigned);
        assert_eq!(number_value_type("1ll", &s).kind, ValueTypeKind::LongLong);
        assert_eq!(number_value_type("2.5", &s).kind, ValueTypeKind::Double);
        assert_eq!(number_value_type("2.5f", &s).kind, ValueTypeKind::Float);
        // magnitude pushes the type up
        assert_eq!(number_value_type("3000000000", &s).kind, ValueTypeKind::Long);
    }

    #[test]
    fn join_promotes_to_int() {
        let a = ValueType::new(ValueTypeSign::Signed, ValueTypeKind::Char, 0);
        let b = ValueType::new(ValueTypeSign::Signed, ValueTypeKind::Char, 0);
        assert_eq!(arithmetic_join(&a, &b, "+").kind, ValueTypeKind::Int);
    }

    #[test]
    fn join_unsigned_wins() {
        let a = ValueType::new(ValueTypeSign::Unsigned, ValueTypeKind::Int, 0);
        let b = ValueType::new(ValueTypeSign::Signed, ValueTypeKind::Int, 0);
        assert_eq!(arithmetic_join(&a, &b, "+").sign, ValueTypeSign::Unsigned);
    }

    #[test]
    fn join_pointer_arithmetic() {
        let p = ValueType::new(ValueTypeSign::Signed, ValueTypeKind::Char, 1);
        let i = ValueType::new(ValueTypeSign::Signed, ValueTypeKind::Int, 0);
        assert_eq!(arithmetic_join(&p, &i, "+").pointer, 1);
        let diff = arithmetic_join(&p, &p, "-");
        assert_eq!(diff.pointer, 0);
        assert_eq!(diff.original_type_name, "ptrdiff_t");
    }
}
