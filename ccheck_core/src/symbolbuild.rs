//! Symbol database construction: one pass discovers scopes, types, functions
//! and enumerators; follow-up passes enumerate variables, resolve names to
//! declaration ids and resolve base classes. AST construction and value-type
//! inference run last, over the discovered function bodies.

use ccheck_config::Settings;
use indexmap::IndexMap;

use crate::astbuild;
use crate::errors::AnalysisError;
use crate::mathlib;
use crate::symbols::{
    AccessControl, BaseInfo, Dimension, Enumerator, EnumeratorId, Function, FunctionFlags,
    FunctionId, FunctionKind, NeedInitialization, Scope, ScopeId, ScopeKind, SymbolDatabase, Type,
    TypeId, Variable, VariableFlags, VariableId,
};
use crate::token::TokenId;
use crate::tokenlist::TokenList;

pub(crate) fn build(
    tokens: &mut TokenList,
    settings: &Settings,
) -> Result<SymbolDatabase, AnalysisError> {
    let mut builder = Builder {
        db: SymbolDatabase::default(),
        settings,
        next_var_id: 1,
    };
    builder.discover_scopes(tokens)?;
    builder.enumerate_variables(tokens);
    builder.resolve_names(tokens);
    builder.resolve_bases();
    let ranges: Vec<(TokenId, TokenId)> = builder
        .db
        .function_scopes
        .iter()
        .filter_map(|&s| {
            let scope = builder.db.scope(s);
            Some((scope.body_start?, scope.body_end?))
        })
        .collect();
    astbuild::build_ast(tokens, &ranges);
    builder.assign_expr_ids(tokens);
    crate::valuetype::set_value_types(tokens, &mut builder.db, settings);
    builder.db.validate(tokens);
    Ok(builder.db)
}

struct Builder<'s> {
    db: SymbolDatabase,
    settings: &'s Settings,
    next_var_id: u32,
}

impl<'s> Builder<'s> {
    fn new_scope(&mut self, kind: ScopeKind, nested_in: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.db.scopes.len() as u32);
        self.db.scopes.push(Scope::new(kind, nested_in));
        if let Some(parent) = nested_in {
            self.db.scopes[parent.index()].nested_list.push(id);
        }
        id
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.db.scopes[id.index()]
    }

    // -- pass A: scopes, types, functions, enumerators ----------------------

    fn discover_scopes(&mut self, tokens: &mut TokenList) -> Result<(), AnalysisError> {
        let global = self.new_scope(ScopeKind::Global, None);
        let mut stack: Vec<ScopeId> = vec![global];
        // scope layout decided ahead of the cursor: brace token -> scope
        let mut pending: Vec<(TokenId, ScopeId)> = Vec::new();
        // last enum value for enumerator auto-increment
        let mut enum_next: mathlib::Bigint = 0;

        let ids: Vec<TokenId> = tokens.ids().collect();
        let mut skip_until: Option<TokenId> = None;
        for &id in &ids {
            let cur = *stack.last().expect("scope stack never empty");
            tokens.tok_mut(id).scope = Some(cur);
            if let Some(until) = skip_until {
                if id < until {
                    continue;
                }
                skip_until = None;
            }

            let text = tokens[id].str().to_string();
            match text.as_str() {
                "}" => {
                    if self.db.scope(cur).body_end == Some(id) && stack.len() > 1 {
                        stack.pop();
                    }
                }
                "{" => {
                    if let Some(pos) = pending.iter().position(|&(brace, _)| brace == id) {
                        let (_, scope_id) = pending.swap_remove(pos);
                        tokens.tok_mut(id).scope = Some(scope_id);
                        stack.push(scope_id);
                        if self.db.scope(scope_id).kind == ScopeKind::Enum {
                            enum_next = 0;
                        }
                        continue;
                    }
                    let link = tokens[id]
                        .link()
                        .ok_or_else(|| AnalysisError::internal(id, "unlinked brace"))?;
                    if self.db.scope(cur).is_executable() {
                        let kind = classify_executable_brace(tokens, id);
                        match kind {
                            Some(kind) => {
                                let scope_id = self.new_scope(kind, Some(cur));
                                let s = self.scope_mut(scope_id);
                                s.body_start = Some(id);
                                s.body_end = Some(link);
                                tokens.tok_mut(id).scope = Some(scope_id);
                                // the head parens belong to the new scope so
                                // that loop-declared names resolve inside it
                                if matches!(
                                    kind,
                                    ScopeKind::If
                                        | ScopeKind::For
                                        | ScopeKind::While
                                        | ScopeKind::Switch
                                        | ScopeKind::Catch
                                ) {
                                    if let Some(head_open) = tokens
                                        .prev(id)
                                        .and_then(|close| tokens[close].link())
                                    {
                                        let mut head = head_open;
                                        while head < id {
                                            tokens.tok_mut(head).scope = Some(scope_id);
                                            match tokens.next(head) {
                                                Some(n) => head = n,
                                                None => break,
                                            }
                                        }
                                    }
                                }
                                stack.push(scope_id);
                            }
                            None => skip_until = Some(link),
                        }
                    } else {
                        // initializer braces and linkage blocks at declaration
                        // scope hold no symbols of their own
                        skip_until = Some(link);
                    }
                }
                "namespace" if !self.db.scope(cur).is_executable() => {
                    if let Some((name, brace)) = namespace_header(tokens, id) {
                        let scope_id = self.new_scope(ScopeKind::Namespace, Some(cur));
                        let s = self.scope_mut(scope_id);
                        s.class_name = name;
                        s.class_def = Some(id);
                        s.body_start = Some(brace);
                        s.body_end = tokens[brace].link();
                        pending.push((brace, scope_id));
                    }
                }
                "class" | "struct" | "union" if !self.db.scope(cur).is_executable() => {
                    self.class_header(tokens, id, cur, &mut pending);
                }
                "enum" if !self.db.scope(cur).is_executable() => {
                    self.enum_header(tokens, id, cur, &mut pending);
                }
                _ => {
                    if self.db.scope(cur).kind == ScopeKind::Enum {
                        if tokens[id].is_name() && !tokens[id].is_keyword() {
                            let value = enumerator_value(tokens, id, enum_next);
                            enum_next = value.map_or(enum_next, |v| v + 1);
                            let eid = EnumeratorId(self.db.enumerators.len() as u32);
                            self.db.enumerators.push(Enumerator {
                                name: text.clone(),
                                name_tok: id,
                                scope: cur,
                                value,
                            });
                            self.scope_mut(cur).enumerator_list.push(eid);
                        }
                        continue;
                    }
                    if self.db.scope(cur).is_executable() {
                        continue;
                    }
                    // function signatures in declaration scopes
                    if is_function_head(tokens, id) {
                        if let Some(skip) = self.function_header(tokens, id, cur, &mut pending) {
                            skip_until = Some(skip);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn class_header(
        &mut self,
        tokens: &mut TokenList,
        keyword: TokenId,
        cur: ScopeId,
        pending: &mut Vec<(TokenId, ScopeId)>,
    ) {
        let Some(name_tok) = tokens.next(keyword).filter(|&n| tokens[n].is_name()) else {
            return;
        };
        let name = tokens[name_tok].str().to_string();
        // skip "final" and base list to find the body or the ';'
        let mut cur_tok = tokens.next(name_tok);
        let mut bases = Vec::new();
        let mut brace = None;
        while let Some(t) = cur_tok {
            match tokens[t].str() {
                "{" => {
                    brace = Some(t);
                    break;
                }
                ";" => break,
                ":" => {
                    bases = parse_base_list(tokens, t);
                    // jump to the brace
                    cur_tok = tokens.next(t);
                    continue;
                }
                _ => {}
            }
            cur_tok = tokens.next(t);
        }

        // forward declarations and uses reuse the already known type
        let existing = self
            .db
            .types
            .iter()
            .position(|t| t.name == name && t.enclosing_scope == Some(cur))
            .map(|i| TypeId(i as u32));
        let type_id = match existing {
            Some(type_id) => {
                if !bases.is_empty() {
                    self.db.types[type_id.index()].derived_from = bases;
                }
                type_id
            }
            None => {
                let type_id = TypeId(self.db.types.len() as u32);
                self.db.types.push(Type {
                    name: name.clone(),
                    class_def: Some(keyword),
                    class_scope: None,
                    enclosing_scope: Some(cur),
                    derived_from: bases,
                    friend_names: Vec::new(),
                    need_initialization: NeedInitialization::Unknown,
                });
                type_id
            }
        };
        tokens.tok_mut(name_tok).type_ref = Some(type_id);
        let Some(brace) = brace else { return };

        let kind = match tokens[keyword].str() {
            "class" => ScopeKind::Class,
            "struct" => ScopeKind::Struct,
            _ => ScopeKind::Union,
        };
        let scope_id = self.new_scope(kind, Some(cur));
        let s = self.scope_mut(scope_id);
        s.class_name = name;
        s.class_def = Some(keyword);
        s.body_start = Some(brace);
        s.body_end = tokens[brace].link();
        s.defined_type = Some(type_id);
        self.db.types[type_id.index()].class_scope = Some(scope_id);
        self.db.class_and_struct_scopes.push(scope_id);
        pending.push((brace, scope_id));
    }

    fn enum_header(
        &mut self,
        tokens: &TokenList,
        keyword: TokenId,
        cur: ScopeId,
        pending: &mut Vec<(TokenId, ScopeId)>,
    ) {
        let mut t = tokens.next(keyword);
        let mut enum_class = false;
        if tokens.is(t, "class") || tokens.is(t, "struct") {
            enum_class = true;
            t = t.and_then(|t| tokens.next(t));
        }
        let mut name = String::new();
        if let Some(n) = t.filter(|&n| tokens[n].is_name() && !tokens[n].is_keyword()) {
            name = tokens[n].str().to_string();
            t = tokens.next(n);
        }
        // optional underlying type
        while let Some(n) = t {
            match tokens[n].str() {
                "{" => {
                    let scope_id = self.new_scope(ScopeKind::Enum, Some(cur));
                    let s = self.scope_mut(scope_id);
                    s.class_name = name;
                    s.class_def = Some(keyword);
                    s.body_start = Some(n);
                    s.body_end = tokens[n].link();
                    s.enum_class = enum_class;
                    pending.push((n, scope_id));
                    return;
                }
                ";" => return,
                _ => t = tokens.next(n),
            }
        }
    }

    /// Create the `Function` for a signature at `name_tok` and, if it has a
    /// body, schedule the function scope. Returns a token to skip to.
    fn function_header(
        &mut self,
        tokens: &mut TokenList,
        name_tok: TokenId,
        cur: ScopeId,
        pending: &mut Vec<(TokenId, ScopeId)>,
    ) -> Option<TokenId> {
        let sig = parse_signature(tokens, name_tok)?;
        // out-of-class definition `void S::f() { }`
        let owner_scope = match &sig.qualifier {
            Some(class_name) => self
                .db
                .scopes()
                .find(|(_, s)| s.is_class_or_struct_or_union() && s.class_name == *class_name)
                .map(|(id, _)| id)
                .unwrap_or(cur),
            None => cur,
        };

        let owner = self.db.scope(owner_scope);
        let class_name = owner.class_name.clone();
        let is_class_scope = owner.is_class_or_struct_or_union();
        let kind = if is_class_scope && sig.name == class_name {
            constructor_kind(tokens, sig.arg_def, &class_name)
        } else if sig.is_destructor {
            FunctionKind::Destructor
        } else if sig.name == "operator=" {
            FunctionKind::OperatorEqual
        } else {
            FunctionKind::Function
        };

        // reuse a declared prototype when this is the out-of-class definition
        let existing = if sig.qualifier.is_some() {
            self.db.scope(owner_scope).function_list.iter().copied().find(|&f| {
                self.db.function(f).name == sig.name
            })
        } else {
            None
        };

        let fid = existing.unwrap_or_else(|| {
            let fid = FunctionId(self.db.functions.len() as u32);
            self.db.functions.push(Function {
                name: sig.name.clone(),
                token_def: Some(name_tok),
                arg_def: Some(sig.arg_def),
                kind,
                flags: sig.flags,
                argument_list: Vec::new(),
                ret_start: sig.ret_start,
                ret_end: sig.ret_end,
                ret_type: None,
                nested_in: Some(owner_scope),
                function_scope: None,
                access: self.db.scope(owner_scope).default_access(),
            });
            self.scope_mut(owner_scope).function_list.push(fid);
            fid
        });
        if existing.is_some() {
            let f = &mut self.db.functions[fid.index()];
            f.flags.set(FunctionFlags::HAS_BODY, sig.flags.get(FunctionFlags::HAS_BODY));
            f.arg_def = Some(sig.arg_def);
            f.token_def = Some(name_tok);
        }
        tokens.tok_mut(name_tok).function = Some(fid);

        if let Some(body) = sig.body_start {
            let scope_id = self.new_scope(ScopeKind::Function, Some(cur));
            let s = self.scope_mut(scope_id);
            s.class_name = sig.name.clone();
            s.class_def = Some(name_tok);
            s.body_start = Some(body);
            s.body_end = tokens[body].link();
            s.function = Some(fid);
            if is_class_scope {
                s.function_of = Some(owner_scope);
            }
            self.db.functions[fid.index()].function_scope = Some(scope_id);
            self.db.function_scopes.push(scope_id);
            pending.push((body, scope_id));
            // skip the signature; the cursor enters the scope at the brace
            return Some(body);
        }
        // declaration only: skip past the ';'
        sig.decl_end
    }

    // -- pass B: variables --------------------------------------------------

    fn enumerate_variables(&mut self, tokens: &mut TokenList) {
        let scope_count = self.db.scopes.len();
        for index in 0..scope_count {
            let scope_id = ScopeId(index as u32);
            if self.db.scope(scope_id).kind == ScopeKind::Enum {
                continue;
            }
            self.scope_variable_list(tokens, scope_id);
        }
        // function arguments
        let function_count = self.db.functions.len();
        for index in 0..function_count {
            self.function_arguments(tokens, FunctionId(index as u32));
        }
        // index by declaration id
        self.db.variable_list = vec![None; self.next_var_id as usize];
        for (i, var) in self.db.variables.iter().enumerate() {
            if var.declaration_id != 0 {
                self.db.variable_list[var.declaration_id as usize] = Some(VariableId(i as u32));
            }
        }
    }

    fn scope_variable_list(&mut self, tokens: &mut TokenList, scope_id: ScopeId) {
        let scope = self.db.scope(scope_id);
        let (mut tok, end) = match (scope.body_start, scope.body_end) {
            (Some(s), Some(e)) => (tokens.next(s), Some(e)),
            _ if scope.kind == ScopeKind::Global => (tokens.front(), None),
            _ => return,
        };
        let mut access = scope.default_access();
        let end = end.unwrap_or(TokenId(tokens.len() as u32));

        // loop heads and catch parameters declare into the body scope:
        // `for (int i = 0; ...)`, `catch (const E& e)`
        if matches!(
            scope.kind,
            ScopeKind::For | ScopeKind::While | ScopeKind::Catch
        ) {
            if let Some(head_close) = scope.body_start.and_then(|b| tokens.prev(b)) {
                if tokens[head_close].str() == ")" {
                    if let Some(head_open) = tokens[head_close].link() {
                        let head_end = tokens
                            .find_simple_match(head_open, ";", head_close)
                            .unwrap_or(head_close);
                        if let Some(start) = tokens.next(head_open) {
                            if start < head_end {
                                self.declaration_statement(
                                    tokens,
                                    scope_id,
                                    AccessControl::Local,
                                    start,
                                    head_end,
                                );
                            }
                        }
                    }
                }
            }
        }

        while let Some(t) = tok.filter(|&t| t < end) {
            let text = tokens[t].str();
            match text {
                "{" | "(" | "[" => {
                    tok = tokens[t].link().and_then(|l| tokens.next(l));
                    continue;
                }
                "public" | "protected" | "private" if tokens.is(tokens.next(t), ":") => {
                    access = match text {
                        "public" => AccessControl::Public,
                        "protected" => AccessControl::Protected,
                        _ => AccessControl::Private,
                    };
                    tok = tokens.tok_at(t, 2);
                    continue;
                }
                ";" | "}" => {
                    tok = tokens.next(t);
                    continue;
                }
                _ => {}
            }
            // statement start: try to parse a declaration
            let stmt_start = t;
            let stmt_end = find_statement_end(tokens, stmt_start, end);
            if let Some(stmt_end) = stmt_end {
                if !starts_declaration_statement(tokens, stmt_start) {
                    tok = tokens.next(stmt_end);
                    continue;
                }
                self.declaration_statement(tokens, scope_id, access, stmt_start, stmt_end);
                tok = tokens.next(stmt_end);
            } else {
                tok = tokens.next(t);
            }
        }
    }

    fn declaration_statement(
        &mut self,
        tokens: &mut TokenList,
        scope_id: ScopeId,
        access: AccessControl,
        start: TokenId,
        end: TokenId,
    ) {
        let Some(decl) = parse_declaration(tokens, start, end) else { return };
        let mut name_info = Some((decl.name_tok, decl.flags, decl.dimensions));
        let mut index = self.db.scope(scope_id).var_list.len();
        while let Some((name_tok, flags, dimensions)) = name_info.take() {
            self.add_variable(
                tokens,
                scope_id,
                access,
                name_tok,
                decl.type_start,
                decl.type_end,
                flags,
                dimensions,
                index,
            );
            index += 1;
            // further declarators: `int a, *b = 0;`
            name_info = next_declarator(tokens, name_tok, end, decl.type_start, decl.type_end)
                .map(|d| (d.0, d.1, d.2));
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn add_variable(
        &mut self,
        tokens: &mut TokenList,
        scope_id: ScopeId,
        access: AccessControl,
        name_tok: TokenId,
        type_start: TokenId,
        type_end: TokenId,
        flags: VariableFlags,
        dimensions: Vec<Dimension>,
        index: usize,
    ) -> VariableId {
        let declaration_id = self.next_var_id;
        self.next_var_id += 1;
        let vid = VariableId(self.db.variables.len() as u32);
        self.db.variables.push(Variable {
            name: tokens[name_tok].str().to_string(),
            name_tok: Some(name_tok),
            type_start: Some(type_start),
            type_end: Some(type_end),
            declaration_id,
            index,
            access,
            flags,
            type_id: None,
            value_type: None,
            dimensions,
            scope: Some(scope_id),
        });
        self.scope_mut(scope_id).var_list.push(vid);
        let tok = tokens.tok_mut(name_tok);
        tok.variable = Some(vid);
        tok.var_id = declaration_id;
        vid
    }

    fn function_arguments(&mut self, tokens: &mut TokenList, fid: FunctionId) {
        let f = self.db.function(fid);
        let Some(open) = f.arg_def else { return };
        let Some(close) = tokens[open].link() else { return };
        // arguments of a defined function live in its body scope; prototype
        // arguments exist only for arity/type matching
        let body_scope = f.function_scope;
        let mut arg_start = tokens.next(open);
        let mut index = 0usize;
        while let Some(start) = arg_start.filter(|&s| s < close) {
            let arg_end = tokens
                .next_argument(start)
                .and_then(|n| tokens.prev(n))
                .filter(|&e| e < close)
                .unwrap_or(close);
            if tokens[start].str() == "..." {
                self.db.functions[fid.index()]
                    .flags
                    .set(FunctionFlags::IS_VARIADIC, true);
                break;
            }
            if tokens[start].str() == "void" && tokens.next(start) == Some(close) {
                break;
            }
            let decl = parse_declaration(tokens, start, arg_end);
            let (name, name_tok, flags, dimensions, type_start, type_end) = match &decl {
                Some(d) => (
                    tokens[d.name_tok].str().to_string(),
                    Some(d.name_tok),
                    d.flags,
                    d.dimensions.clone(),
                    d.type_start,
                    d.type_end,
                ),
                None => (
                    String::new(),
                    None,
                    VariableFlags::default(),
                    Vec::new(),
                    start,
                    arg_end,
                ),
            };
            let declaration_id = match (body_scope, name_tok) {
                (Some(_), Some(_)) => {
                    let id = self.next_var_id;
                    self.next_var_id += 1;
                    id
                }
                _ => 0,
            };
            let var_scope = body_scope.or(self.db.function(fid).nested_in);
            let vid = VariableId(self.db.variables.len() as u32);
            self.db.variables.push(Variable {
                name,
                name_tok,
                type_start: Some(type_start),
                type_end: Some(type_end),
                declaration_id,
                index,
                access: AccessControl::Argument,
                flags,
                type_id: None,
                value_type: None,
                dimensions,
                scope: var_scope,
            });
            self.db.functions[fid.index()].argument_list.push(vid);
            if let (Some(scope_id), Some(name_tok)) = (body_scope, name_tok) {
                self.scope_mut(scope_id).var_list.push(vid);
                let tok = tokens.tok_mut(name_tok);
                tok.variable = Some(vid);
                tok.var_id = declaration_id;
            }
            index += 1;
            arg_start = tokens.next_argument(start);
        }
    }

    // -- pass C: name resolution --------------------------------------------

    fn resolve_names(&mut self, tokens: &mut TokenList) {
        let ids: Vec<TokenId> = tokens.ids().collect();
        for &id in &ids {
            let t = &tokens[id];
            if !t.is_name() || t.is_keyword() || t.var_id() != 0 {
                continue;
            }
            // member accesses resolve through the object type, not the scope
            let prev = tokens.prev(id);
            if prev.is_some_and(|p| matches!(tokens[p].str(), "." | "->" | "::")) {
                continue;
            }
            let Some(scope) = t.scope() else { continue };
            let name = t.str().to_string();
            if let Some(vid) = self.lookup_variable(scope, &name) {
                let declaration_id = self.db.variable(vid).declaration_id;
                let tok = tokens.tok_mut(id);
                tok.variable = Some(vid);
                tok.var_id = declaration_id;
            } else if let Some(eid) = self.lookup_enumerator(scope, &name) {
                tokens.tok_mut(id).enumerator = Some(eid);
            }
        }
    }

    fn lookup_variable(&self, start: ScopeId, name: &str) -> Option<VariableId> {
        for scope_id in self.db.scope_chain(start) {
            let scope = self.db.scope(scope_id);
            if let Some(&vid) = scope
                .var_list
                .iter()
                .find(|&&v| self.db.variable(v).name == name)
            {
                return Some(vid);
            }
            // methods see the members of their class and its bases
            if let Some(class_scope) = scope.function_of {
                if let Some(vid) = self.lookup_member(class_scope, name, 0) {
                    return Some(vid);
                }
            }
        }
        None
    }

    fn lookup_member(&self, class_scope: ScopeId, name: &str, depth: u32) -> Option<VariableId> {
        if depth > 100 {
            return None;
        }
        let scope = self.db.scope(class_scope);
        if let Some(&vid) = scope
            .var_list
            .iter()
            .find(|&&v| self.db.variable(v).name == name)
        {
            return Some(vid);
        }
        let type_id = scope.defined_type?;
        for base in &self.db.type_of(type_id).derived_from {
            if let Some(base_scope) = base.type_id.and_then(|t| self.db.type_of(t).class_scope) {
                if let Some(vid) = self.lookup_member(base_scope, name, depth + 1) {
                    return Some(vid);
                }
            }
        }
        None
    }

    fn lookup_enumerator(&self, start: ScopeId, name: &str) -> Option<EnumeratorId> {
        for scope_id in self.db.scope_chain(start) {
            for &nested in &self.db.scope(scope_id).nested_list {
                let nested_scope = self.db.scope(nested);
                if nested_scope.kind != ScopeKind::Enum || nested_scope.enum_class {
                    continue;
                }
                if let Some(&eid) = nested_scope
                    .enumerator_list
                    .iter()
                    .find(|&&e| self.db.enumerator(e).name == name)
                {
                    return Some(eid);
                }
            }
        }
        None
    }

    // -- pass D: base classes -----------------------------------------------

    fn resolve_bases(&mut self) {
        let mut updates: Vec<(TypeId, usize, TypeId)> = Vec::new();
        for (i, ty) in self.db.types.iter().enumerate() {
            for (j, base) in ty.derived_from.iter().enumerate() {
                if base.type_id.is_some() {
                    continue;
                }
                let start = ty.enclosing_scope.unwrap_or(ScopeId(0));
                if let Some(found) = self.db.find_variable_type(start, &base.name) {
                    updates.push((TypeId(i as u32), j, found));
                }
            }
        }
        for (type_id, base_index, target) in updates {
            self.db.types[type_id.index()].derived_from[base_index].type_id = Some(target);
        }
    }

    // -- expression ids ------------------------------------------------------

    /// Identical expression structure gets an identical id; variable tokens
    /// reuse their declaration id.
    fn assign_expr_ids(&mut self, tokens: &mut TokenList) {
        // insertion-ordered so ids are stable across runs
        let mut table: IndexMap<(String, u32, u32), u32> = IndexMap::new();
        let mut next_id = self.next_var_id;
        let roots: Vec<TokenId> = tokens
            .ids()
            .filter(|&id| {
                tokens[id].ast_parent().is_none()
                    && (tokens[id].ast_op1().is_some() || tokens[id].var_id() != 0)
            })
            .collect();
        for root in roots {
            assign_expr_id_rec(tokens, root, &mut table, &mut next_id, 0);
        }
    }
}

fn assign_expr_id_rec(
    tokens: &mut TokenList,
    tok: TokenId,
    table: &mut IndexMap<(String, u32, u32), u32>,
    next_id: &mut u32,
    depth: u32,
) -> u32 {
    if depth > 200 {
        return 0;
    }
    if tokens[tok].expr_id() != 0 {
        return tokens[tok].expr_id();
    }
    if tokens[tok].var_id() != 0 {
        let id = tokens[tok].var_id();
        tokens.tok_mut(tok).expr_id = id;
        return id;
    }
    let op1 = tokens[tok]
        .ast_op1()
        .map_or(0, |c| assign_expr_id_rec(tokens, c, table, next_id, depth + 1));
    let op2 = tokens[tok]
        .ast_op2()
        .map_or(0, |c| assign_expr_id_rec(tokens, c, table, next_id, depth + 1));
    if op1 == 0 && op2 == 0 && !tokens[tok].is_name() && !tokens[tok].is_number() {
        return 0;
    }
    let key = (tokens[tok].str().to_string(), op1, op2);
    let id = *table.entry(key).or_insert_with(|| {
        let id = *next_id;
        *next_id += 1;
        id
    });
    tokens.tok_mut(tok).expr_id = id;
    id
}

// ---------------------------------------------------------------------------
// header parsing helpers

fn namespace_header(tokens: &TokenList, keyword: TokenId) -> Option<(String, TokenId)> {
    let name_tok = tokens.next(keyword)?;
    if tokens[name_tok].is_name() && tokens.is(tokens.next(name_tok), "{") {
        Some((
            tokens[name_tok].str().to_string(),
            tokens.next(name_tok)?,
        ))
    } else if tokens[name_tok].str() == "{" {
        Some((String::new(), name_tok))
    } else {
        None
    }
}

fn parse_base_list(tokens: &TokenList, colon: TokenId) -> Vec<BaseInfo> {
    let mut bases = Vec::new();
    let mut cur = tokens.next(colon);
    let mut access = AccessControl::Private;
    let mut is_virtual = false;
    let mut name: Option<String> = None;
    while let Some(t) = cur {
        match tokens[t].str() {
            "{" | ";" => break,
            "virtual" => is_virtual = true,
            "public" => access = AccessControl::Public,
            "protected" => access = AccessControl::Protected,
            "private" => access = AccessControl::Private,
            "," => {
                if let Some(n) = name.take() {
                    bases.push(BaseInfo {
                        name: n,
                        type_id: None,
                        access,
                        is_virtual,
                    });
                }
                access = AccessControl::Private;
                is_virtual = false;
            }
            "::" => {}
            "<" => {
                if let Some(link) = tokens[t].link() {
                    cur = tokens.next(link);
                    continue;
                }
            }
            _ if tokens[t].is_name() => name = Some(tokens[t].str().to_string()),
            _ => {}
        }
        cur = tokens.next(t);
    }
    if let Some(n) = name {
        bases.push(BaseInfo {
            name: n,
            type_id: None,
            access,
            is_virtual,
        });
    }
    bases
}

fn enumerator_value(
    tokens: &TokenList,
    name_tok: TokenId,
    auto_value: mathlib::Bigint,
) -> Option<mathlib::Bigint> {
    if tokens.is(tokens.next(name_tok), "=") {
        let value_tok = tokens.tok_at(name_tok, 2)?;
        // only a literal or a negated literal folds here
        if tokens[value_tok].is_number() {
            return mathlib::to_bigint(tokens[value_tok].str());
        }
        if tokens[value_tok].str() == "-" {
            let lit = tokens.next(value_tok)?;
            return mathlib::to_bigint(tokens[lit].str()).map(|v| -v);
        }
        return None;
    }
    Some(auto_value)
}

/// Is `tok` the name token of a function signature?
fn is_function_head(tokens: &TokenList, tok: TokenId) -> bool {
    let t = &tokens[tok];
    let is_operator = t.str() == "operator";
    if !t.is_name() || (t.is_keyword() && !is_operator) {
        return false;
    }
    if let Some(prev) = tokens.prev(tok) {
        let p = &tokens[prev];
        if matches!(p.str(), "=" | "," | "(" | "[" | "return" | "new" | "." | "->" | "::") {
            return false;
        }
        if p.is_number() || p.is_string() {
            return false;
        }
    }
    if is_operator {
        return true;
    }
    tokens.is(tokens.next(tok), "(")
}

struct Signature {
    name: String,
    qualifier: Option<String>,
    arg_def: TokenId,
    flags: FunctionFlags,
    ret_start: Option<TokenId>,
    ret_end: Option<TokenId>,
    body_start: Option<TokenId>,
    /// for declarations: the `;`
    decl_end: Option<TokenId>,
    is_destructor: bool,
}

fn parse_signature(tokens: &TokenList, name_tok: TokenId) -> Option<Signature> {
    let mut name = tokens[name_tok].str().to_string();
    let mut arg_open = tokens.next(name_tok)?;
    if name == "operator" {
        // collect the operator symbol(s)
        let mut sym = String::new();
        let mut cur = tokens.next(name_tok)?;
        while tokens[cur].str() != "(" {
            sym.push_str(tokens[cur].str());
            cur = tokens.next(cur)?;
            if sym.len() > 8 {
                return None;
            }
        }
        if sym.is_empty() {
            // operator() — the first ( is part of the name
            let close = tokens[cur].link()?;
            sym = "()".to_string();
            arg_open = tokens.next(close)?;
        } else {
            arg_open = cur;
        }
        name = format!("operator{sym}");
    }
    if tokens[arg_open].str() != "(" {
        return None;
    }
    let close = tokens[arg_open].link()?;

    let mut is_destructor = false;
    let mut qualifier = None;
    let mut ret_end = None;
    let mut ret_start = None;
    if let Some(prev) = tokens.prev(name_tok) {
        if tokens[prev].str() == "~" {
            is_destructor = true;
        } else if tokens[prev].str() == "::" {
            if let Some(q) = tokens.prev(prev).filter(|&q| tokens[q].is_name()) {
                qualifier = Some(tokens[q].str().to_string());
                ret_end = tokens.prev(q);
            }
        } else if !matches!(
            tokens[prev].str(),
            ";" | "{" | "}" | ":" | "public" | "private" | "protected"
        ) {
            // constructors have no return type
            ret_end = Some(prev);
        }
    }
    if let Some(end) = ret_end {
        // return type starts after the previous ; } { or access specifier
        let mut cur = end;
        while let Some(prev) = tokens.prev(cur) {
            if matches!(tokens[prev].str(), ";" | "}" | "{" | ":" | "public" | "private" | "protected") {
                break;
            }
            cur = prev;
        }
        if cur <= end {
            ret_start = Some(cur);
        }
    }

    let mut flags = FunctionFlags::default();
    // specifiers before the return type
    if let (Some(start), Some(end)) = (ret_start, ret_end) {
        let mut cur = start;
        while cur <= end {
            match tokens[cur].str() {
                "virtual" => flags.set(FunctionFlags::HAS_VIRTUAL_SPECIFIER, true),
                "static" => flags.set(FunctionFlags::IS_STATIC, true),
                "extern" => flags.set(FunctionFlags::IS_EXTERN, true),
                "friend" => flags.set(FunctionFlags::IS_FRIEND, true),
                "explicit" => flags.set(FunctionFlags::IS_EXPLICIT, true),
                "inline" => flags.set(FunctionFlags::IS_INLINE_KEYWORD, true),
                "constexpr" => flags.set(FunctionFlags::IS_CONSTEXPR, true),
                _ => {}
            }
            match tokens.next(cur) {
                Some(next) => cur = next,
                None => break,
            }
        }
    }

    // specifiers after the argument list, then body / ; / = default
    let mut cur = tokens.next(close)?;
    let mut body_start = None;
    let mut decl_end = None;
    loop {
        match tokens[cur].str() {
            "const" => flags.set(FunctionFlags::IS_CONST, true),
            "noexcept" => {
                flags.set(FunctionFlags::IS_NOEXCEPT, true);
                if tokens.is(tokens.next(cur), "(") {
                    cur = tokens.link_at(cur, 1)?;
                }
            }
            "throw" => {
                flags.set(FunctionFlags::IS_THROW, true);
                if tokens.is(tokens.next(cur), "(") {
                    cur = tokens.link_at(cur, 1)?;
                }
            }
            "override" => flags.set(FunctionFlags::HAS_OVERRIDE_SPECIFIER, true),
            "final" => flags.set(FunctionFlags::HAS_FINAL_SPECIFIER, true),
            "volatile" => flags.set(FunctionFlags::IS_VOLATILE, true),
            "&" => flags.set(FunctionFlags::HAS_LVAL_REF_QUAL, true),
            "&&" => flags.set(FunctionFlags::HAS_RVAL_REF_QUAL, true),
            "{" => {
                flags.set(FunctionFlags::HAS_BODY, true);
                body_start = Some(cur);
                break;
            }
            ";" => {
                decl_end = Some(cur);
                break;
            }
            "=" => {
                match tokens.str_at(cur, 1) {
                    "default" => flags.set(FunctionFlags::IS_DEFAULT, true),
                    "delete" => flags.set(FunctionFlags::IS_DELETE, true),
                    "0" => {
                        flags.set(FunctionFlags::IS_PURE, true);
                        flags.set(FunctionFlags::HAS_VIRTUAL_SPECIFIER, true);
                    }
                    _ => return None,
                }
                cur = tokens.tok_at(cur, 1)?;
            }
            ":" => {
                // constructor member initializer list
                match skip_ctor_initializers(tokens, cur) {
                    Some(brace) => {
                        flags.set(FunctionFlags::HAS_BODY, true);
                        body_start = Some(brace);
                        break;
                    }
                    None => return None,
                }
            }
            _ => return None,
        }
        cur = tokens.next(cur)?;
    }

    Some(Signature {
        name,
        qualifier,
        arg_def: arg_open,
        flags,
        ret_start,
        ret_end,
        body_start,
        decl_end,
        is_destructor,
    })
}

/// From the `:` of a constructor initializer list to the body `{`.
fn skip_ctor_initializers(tokens: &TokenList, colon: TokenId) -> Option<TokenId> {
    let mut cur = tokens.next(colon)?;
    loop {
        match tokens[cur].str() {
            "{" => {
                // `x{3}` member initializer braces follow a name; the body
                // brace follows `)` or `}` of a previous initializer
                if tokens.prev(cur).is_some_and(|p| tokens[p].is_name()) {
                    let link = tokens[cur].link()?;
                    cur = tokens.next(link)?;
                    continue;
                }
                return Some(cur);
            }
            "(" => cur = tokens[cur].link()?,
            ";" | "}" => return None,
            _ => {}
        }
        cur = tokens.next(cur)?;
    }
}

fn constructor_kind(tokens: &TokenList, arg_def: TokenId, class_name: &str) -> FunctionKind {
    // copy ctor: S(const S&), move ctor: S(S&&)
    let Some(close) = tokens[arg_def].link() else {
        return FunctionKind::Constructor;
    };
    let mut names = Vec::new();
    let mut has_amp = false;
    let mut has_amp_amp = false;
    let mut cur = tokens.next(arg_def);
    let mut args = 0;
    while let Some(t) = cur.filter(|&t| t < close) {
        match tokens[t].str() {
            "," => args += 1,
            "&" => has_amp = true,
            "&&" => has_amp_amp = true,
            s if tokens[t].is_name() => names.push(s.to_string()),
            _ => {}
        }
        cur = tokens.next(t);
    }
    if tokens.next(arg_def) != Some(close) {
        args += 1;
    }
    if args == 1 && names.iter().any(|n| n == class_name) {
        if has_amp_amp {
            return FunctionKind::MoveConstructor;
        }
        if has_amp {
            return FunctionKind::CopyConstructor;
        }
    }
    FunctionKind::Constructor
}

// ---------------------------------------------------------------------------
// variable declaration parsing

pub(crate) struct ParsedDeclaration {
    pub type_start: TokenId,
    pub type_end: TokenId,
    pub name_tok: TokenId,
    pub flags: VariableFlags,
    pub dimensions: Vec<Dimension>,
}

/// Statements that can not declare a variable.
fn starts_declaration_statement(tokens: &TokenList, tok: TokenId) -> bool {
    let t = &tokens[tok];
    if !t.is_name() {
        return false;
    }
    !matches!(
        t.str(),
        "return" | "if" | "else" | "while" | "for" | "do" | "switch" | "case" | "break"
            | "continue" | "goto" | "throw" | "try" | "catch" | "delete" | "new" | "using"
            | "typedef" | "template" | "friend" | "public" | "protected" | "private"
            | "operator" | "default" | "namespace" | "class" | "struct" | "union" | "enum"
    )
}

fn find_statement_end(tokens: &TokenList, start: TokenId, end: TokenId) -> Option<TokenId> {
    let mut cur = start;
    while cur < end {
        let t = &tokens[cur];
        match t.str() {
            ";" => return Some(cur),
            "(" | "[" => cur = t.link()?,
            "{" => {
                // only initializer braces belong to a declaration statement;
                // a `) {` here is a function body
                let prev = tokens.prev(cur);
                if prev.is_some_and(|p| matches!(tokens[p].str(), "=" | ",")) {
                    cur = t.link()?;
                } else {
                    return None;
                }
            }
            "}" => return None,
            _ => {}
        }
        cur = tokens.next(cur)?;
    }
    None
}

pub(crate) fn parse_declaration(
    tokens: &TokenList,
    start: TokenId,
    end: TokenId,
) -> Option<ParsedDeclaration> {
    let mut flags = VariableFlags::default();
    let mut cur = start;
    let mut saw_type = false;
    let mut type_start = None;
    let mut type_end = None;
    let mut float_type = false;
    let mut class_type = false;

    while cur < end {
        let t = &tokens[cur];
        match t.str() {
            "static" => flags.set(VariableFlags::STATIC, true),
            "const" => flags.set(VariableFlags::CONST, true),
            "extern" => flags.set(VariableFlags::EXTERN, true),
            "mutable" => flags.set(VariableFlags::MUTABLE, true),
            "volatile" => flags.set(VariableFlags::VOLATILE, true),
            "register" | "constexpr" | "inline" | "typename" | "struct" | "class" | "union"
            | "enum" => {}
            "unsigned" | "signed" | "short" | "long" | "int" | "char" | "bool" | "void"
            | "wchar_t" | "auto" => {
                type_start.get_or_insert(cur);
                type_end = Some(cur);
                saw_type = true;
            }
            "float" | "double" => {
                type_start.get_or_insert(cur);
                type_end = Some(cur);
                saw_type = true;
                float_type = true;
            }
            _ if t.is_name() && !t.is_keyword() && !saw_type => {
                type_start.get_or_insert(cur);
                type_end = Some(cur);
                // qualified / templated type name
                let mut scan = tokens.next(cur)?;
                loop {
                    if tokens.is(scan, "::")
                        && tokens.next(scan).is_some_and(|n| tokens[n].is_name())
                    {
                        scan = tokens.tok_at(scan, 2)?;
                        type_end = tokens.prev(scan);
                    } else if tokens.is(scan, "<") && tokens[scan].link().is_some() {
                        let link = tokens[scan].link()?;
                        type_end = Some(link);
                        scan = tokens.next(link)?;
                    } else {
                        break;
                    }
                }
                saw_type = true;
                class_type = true;
                cur = scan;
                continue;
            }
            _ => break,
        }
        cur = tokens.next(cur)?;
    }
    if !saw_type || cur >= end {
        return None;
    }

    while cur < end {
        match tokens[cur].str() {
            "*" => {
                flags.set(VariableFlags::POINTER, true);
                class_type = false;
            }
            "&" => flags.set(VariableFlags::REFERENCE, true),
            "&&" => {
                flags.set(VariableFlags::REFERENCE, true);
                flags.set(VariableFlags::RVALUE_REF, true);
            }
            "const" => flags.set(VariableFlags::CONST, true),
            _ => break,
        }
        cur = tokens.next(cur)?;
    }
    let name_tok = cur;
    let name = &tokens[name_tok];
    if !name.is_name() || name.is_keyword() {
        return None;
    }
    let after = tokens.next(name_tok).filter(|&a| a <= end)?;
    let mut dimensions = Vec::new();
    match tokens[after].str() {
        "=" | ";" | "," | ":" | ")" => {
            if tokens[after].str() == "=" {
                flags.set(VariableFlags::INIT, true);
            }
        }
        "[" => {
            flags.set(VariableFlags::ARRAY, true);
            let mut open = after;
            while tokens.is(open, "[") {
                let close = tokens[open].link()?;
                let size = tokens
                    .next(open)
                    .filter(|&n| n < close && tokens.next(n) == Some(close))
                    .and_then(|n| mathlib::to_bigint(tokens[n].str()));
                dimensions.push(Dimension {
                    size,
                    tok: tokens.next(open).filter(|&n| n < close),
                });
                open = match tokens.next(close) {
                    Some(n) => n,
                    None => break,
                };
            }
            if tokens.is(open, "=") {
                flags.set(VariableFlags::INIT, true);
            }
        }
        "(" | "{" => {
            // constructor-style initialization; a function declaration also
            // matches, so require the initializer to start with a value
            let inner = tokens.next(after);
            let looks_like_init = inner.is_some_and(|i| {
                tokens[i].is_number()
                    || tokens[i].is_string()
                    || tokens[i].var_id() != 0
                    || tokens[i].str() == ")" && tokens[after].str() == "{"
            }) || tokens[after].str() == "{";
            if !looks_like_init {
                return None;
            }
            flags.set(VariableFlags::INIT, true);
        }
        _ => return None,
    }

    if float_type {
        flags.set(VariableFlags::FLOAT_TYPE, true);
    }
    if class_type && !flags.get(VariableFlags::POINTER) {
        flags.set(VariableFlags::CLASS, true);
    }
    Some(ParsedDeclaration {
        type_start: type_start?,
        type_end: type_end?,
        name_tok,
        flags,
        dimensions,
    })
}

/// `int a, *b;` — find the declarator after the `,` following `prev_name`.
fn next_declarator(
    tokens: &TokenList,
    prev_name: TokenId,
    end: TokenId,
    _type_start: TokenId,
    _type_end: TokenId,
) -> Option<(TokenId, VariableFlags, Vec<Dimension>)> {
    // skip to the ',' at declarator level
    let mut cur = tokens.next(prev_name)?;
    while cur < end {
        match tokens[cur].str() {
            "," => break,
            ";" => return None,
            "(" | "[" | "{" => cur = tokens[cur].link()?,
            _ => {}
        }
        cur = tokens.next(cur)?;
    }
    if cur >= end || tokens[cur].str() != "," {
        return None;
    }
    let mut flags = VariableFlags::default();
    cur = tokens.next(cur)?;
    while cur < end {
        match tokens[cur].str() {
            "*" => flags.set(VariableFlags::POINTER, true),
            "&" => flags.set(VariableFlags::REFERENCE, true),
            _ => break,
        }
        cur = tokens.next(cur)?;
    }
    if cur >= end || !tokens[cur].is_name() || tokens[cur].is_keyword() {
        return None;
    }
    let mut dimensions = Vec::new();
    if tokens.is(tokens.next(cur), "[") {
        flags.set(VariableFlags::ARRAY, true);
        if let Some(open) = tokens.next(cur) {
            if let Some(close) = tokens[open].link() {
                let size = tokens
                    .next(open)
                    .filter(|&n| n < close && tokens.next(n) == Some(close))
                    .and_then(|n| mathlib::to_bigint(tokens[n].str()));
                dimensions.push(Dimension {
                    size,
                    tok: tokens.next(open).filter(|&n| n < close),
                });
            }
        }
    }
    if tokens.is(tokens.next(cur), "=") {
        flags.set(VariableFlags::INIT, true);
    }
    Some((cur, flags, dimensions))
}

/// Executable-scope brace classification by look-back.
fn classify_executable_brace(tokens: &TokenList, brace: TokenId) -> Option<ScopeKind> {
    let prev = tokens.prev(brace)?;
    match tokens[prev].str() {
        ")" => {
            let open = tokens[prev].link()?;
            let before = tokens.prev(open)?;
            match tokens[before].str() {
                "if" => Some(ScopeKind::If),
                "for" => Some(ScopeKind::For),
                "while" => Some(ScopeKind::While),
                "switch" => Some(ScopeKind::Switch),
                "catch" => Some(ScopeKind::Catch),
                "]" => Some(ScopeKind::Lambda),
                _ => Some(ScopeKind::Unconditional),
            }
        }
        "else" => Some(ScopeKind::Else),
        "do" => Some(ScopeKind::Do),
        "try" => Some(ScopeKind::Try),
        "]" => Some(ScopeKind::Lambda),
        "=" | "," | "(" | "[" | "return" => None,
        _ if tokens[prev].is_name() || tokens[prev].is_number() => None,
        _ => Some(ScopeKind::Unconditional),
    }
}
