//! Symbol database entities: scopes, types, variables, functions,
//! enumerators and the `ValueType` annotation.
//!
//! Everything is arena-allocated and referenced by `u32` ids; the token list
//! and the symbol database cross-link through those ids only.

use ccheck_config::{Library, Platform, Settings};
use itertools::Itertools;

use crate::mathlib::Bigint;
use crate::token::TokenId;
use crate::tokenlist::TokenList;

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

entity_id!(ScopeId);
entity_id!(TypeId);
entity_id!(VariableId);
entity_id!(FunctionId);
entity_id!(EnumeratorId);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessControl {
    Public,
    Protected,
    Private,
    Global,
    Namespace,
    Argument,
    Local,
    Throw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Namespace,
    Class,
    Struct,
    Union,
    Enum,
    Function,
    If,
    Else,
    For,
    While,
    Do,
    Switch,
    Try,
    Catch,
    Lambda,
    Unconditional,
}

#[derive(Clone, Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub class_name: String,
    /// class/struct/union/namespace token
    pub class_def: Option<TokenId>,
    /// `{` token
    pub body_start: Option<TokenId>,
    /// matching `}` token
    pub body_end: Option<TokenId>,
    pub nested_in: Option<ScopeId>,
    pub nested_list: Vec<ScopeId>,
    pub var_list: Vec<VariableId>,
    pub function_list: Vec<FunctionId>,
    /// function scopes: the function this body belongs to
    pub function: Option<FunctionId>,
    /// method bodies: the class scope the function is a member of
    pub function_of: Option<ScopeId>,
    pub defined_type: Option<TypeId>,
    pub enumerator_list: Vec<EnumeratorId>,
    pub enum_class: bool,
}

impl Scope {
    pub(crate) fn new(kind: ScopeKind, nested_in: Option<ScopeId>) -> Self {
        Scope {
            kind,
            class_name: String::new(),
            class_def: None,
            body_start: None,
            body_end: None,
            nested_in,
            nested_list: Vec::new(),
            var_list: Vec::new(),
            function_list: Vec::new(),
            function: None,
            function_of: None,
            defined_type: None,
            enumerator_list: Vec::new(),
            enum_class: false,
        }
    }

    pub fn is_class_or_struct(&self) -> bool {
        matches!(self.kind, ScopeKind::Class | ScopeKind::Struct)
    }

    pub fn is_class_or_struct_or_union(&self) -> bool {
        matches!(self.kind, ScopeKind::Class | ScopeKind::Struct | ScopeKind::Union)
    }

    pub fn is_executable(&self) -> bool {
        !matches!(
            self.kind,
            ScopeKind::Global
                | ScopeKind::Namespace
                | ScopeKind::Class
                | ScopeKind::Struct
                | ScopeKind::Union
                | ScopeKind::Enum
        )
    }

    pub fn is_loop_scope(&self) -> bool {
        matches!(self.kind, ScopeKind::For | ScopeKind::While | ScopeKind::Do)
    }

    pub fn is_local(&self) -> bool {
        matches!(
            self.kind,
            ScopeKind::If
                | ScopeKind::Else
                | ScopeKind::For
                | ScopeKind::While
                | ScopeKind::Do
                | ScopeKind::Switch
                | ScopeKind::Unconditional
                | ScopeKind::Try
                | ScopeKind::Catch
        )
    }

    pub fn default_access(&self) -> AccessControl {
        match self.kind {
            ScopeKind::Global => AccessControl::Global,
            ScopeKind::Namespace => AccessControl::Namespace,
            ScopeKind::Class => AccessControl::Private,
            ScopeKind::Struct | ScopeKind::Union => AccessControl::Public,
            _ => AccessControl::Local,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NeedInitialization {
    #[default]
    Unknown,
    True,
    False,
}

#[derive(Clone, Debug)]
pub struct BaseInfo {
    pub name: String,
    pub type_id: Option<TypeId>,
    pub access: AccessControl,
    pub is_virtual: bool,
}

/// A class/struct/union/enum definition.
#[derive(Clone, Debug)]
pub struct Type {
    pub name: String,
    pub class_def: Option<TokenId>,
    /// set when the body has been seen; `class_scope.defined_type` points back
    pub class_scope: Option<ScopeId>,
    pub enclosing_scope: Option<ScopeId>,
    pub derived_from: Vec<BaseInfo>,
    pub friend_names: Vec<String>,
    pub need_initialization: NeedInitialization,
}

#[derive(Clone, Debug)]
pub struct Dimension {
    pub size: Option<Bigint>,
    pub tok: Option<TokenId>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VariableFlags(u32);

impl VariableFlags {
    pub const MUTABLE: VariableFlags = VariableFlags(1 << 0);
    pub const STATIC: VariableFlags = VariableFlags(1 << 1);
    pub const CONST: VariableFlags = VariableFlags(1 << 2);
    pub const EXTERN: VariableFlags = VariableFlags(1 << 3);
    pub const CLASS: VariableFlags = VariableFlags(1 << 4);
    pub const ARRAY: VariableFlags = VariableFlags(1 << 5);
    pub const POINTER: VariableFlags = VariableFlags(1 << 6);
    pub const REFERENCE: VariableFlags = VariableFlags(1 << 7);
    pub const RVALUE_REF: VariableFlags = VariableFlags(1 << 8);
    pub const HAS_DEFAULT: VariableFlags = VariableFlags(1 << 9);
    pub const STL_TYPE: VariableFlags = VariableFlags(1 << 10);
    pub const STL_STRING: VariableFlags = VariableFlags(1 << 11);
    pub const FLOAT_TYPE: VariableFlags = VariableFlags(1 << 12);
    pub const VOLATILE: VariableFlags = VariableFlags(1 << 13);
    pub const SMART_POINTER: VariableFlags = VariableFlags(1 << 14);
    pub const MAYBE_UNUSED: VariableFlags = VariableFlags(1 << 15);
    pub const INIT: VariableFlags = VariableFlags(1 << 16);

    pub fn get(self, flag: VariableFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn set(&mut self, flag: VariableFlags, state: bool) {
        if state {
            self.0 |= flag.0;
        } else {
            self.0 &= !flag.0;
        }
    }
}

#[derive(Clone, Debug)]
pub struct Variable {
    pub name: String,
    /// declaring name token
    pub name_tok: Option<TokenId>,
    pub type_start: Option<TokenId>,
    pub type_end: Option<TokenId>,
    /// non-zero iff the variable can be referred to by id in the token stream
    pub declaration_id: u32,
    /// position among the scope's variables (argument index for arguments)
    pub index: usize,
    pub access: AccessControl,
    pub flags: VariableFlags,
    pub type_id: Option<TypeId>,
    pub value_type: Option<ValueType>,
    pub dimensions: Vec<Dimension>,
    pub scope: Option<ScopeId>,
}

impl Variable {
    pub fn is_pointer(&self) -> bool {
        self.flags.get(VariableFlags::POINTER)
    }

    pub fn is_array(&self) -> bool {
        self.flags.get(VariableFlags::ARRAY) && !self.flags.get(VariableFlags::POINTER)
    }

    pub fn is_pointer_or_array(&self) -> bool {
        self.flags.get(VariableFlags::POINTER) || self.flags.get(VariableFlags::ARRAY)
    }

    pub fn is_reference(&self) -> bool {
        self.flags.get(VariableFlags::REFERENCE)
    }

    pub fn is_rvalue_reference(&self) -> bool {
        self.flags.get(VariableFlags::RVALUE_REF)
    }

    pub fn is_const(&self) -> bool {
        self.flags.get(VariableFlags::CONST)
    }

    pub fn is_static(&self) -> bool {
        self.flags.get(VariableFlags::STATIC)
    }

    pub fn is_extern(&self) -> bool {
        self.flags.get(VariableFlags::EXTERN)
    }

    pub fn is_class(&self) -> bool {
        self.flags.get(VariableFlags::CLASS)
    }

    pub fn is_stl_type(&self) -> bool {
        self.flags.get(VariableFlags::STL_TYPE)
    }

    pub fn is_stl_string(&self) -> bool {
        self.flags.get(VariableFlags::STL_STRING)
    }

    pub fn is_smart_pointer(&self) -> bool {
        self.flags.get(VariableFlags::SMART_POINTER)
    }

    pub fn is_float_type(&self) -> bool {
        self.flags.get(VariableFlags::FLOAT_TYPE)
    }

    pub fn is_init(&self) -> bool {
        self.flags.get(VariableFlags::INIT)
    }

    pub fn is_volatile(&self) -> bool {
        self.flags.get(VariableFlags::VOLATILE)
    }

    pub fn is_mutable(&self) -> bool {
        self.flags.get(VariableFlags::MUTABLE)
    }

    pub fn is_argument(&self) -> bool {
        self.access == AccessControl::Argument
    }

    pub fn is_local(&self) -> bool {
        self.access == AccessControl::Local && !self.is_extern()
    }

    pub fn is_global(&self) -> bool {
        self.access == AccessControl::Global
    }

    pub fn is_member(&self) -> bool {
        matches!(
            self.access,
            AccessControl::Public | AccessControl::Protected | AccessControl::Private
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FunctionKind {
    Constructor,
    CopyConstructor,
    MoveConstructor,
    OperatorEqual,
    Destructor,
    Function,
    Lambda,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FunctionFlags(u32);

impl FunctionFlags {
    pub const HAS_BODY: FunctionFlags = FunctionFlags(1 << 0);
    pub const IS_INLINE: FunctionFlags = FunctionFlags(1 << 1);
    pub const IS_CONST: FunctionFlags = FunctionFlags(1 << 2);
    pub const HAS_VIRTUAL_SPECIFIER: FunctionFlags = FunctionFlags(1 << 3);
    pub const IS_PURE: FunctionFlags = FunctionFlags(1 << 4);
    pub const IS_STATIC: FunctionFlags = FunctionFlags(1 << 5);
    pub const IS_STATIC_LOCAL: FunctionFlags = FunctionFlags(1 << 6);
    pub const IS_EXTERN: FunctionFlags = FunctionFlags(1 << 7);
    pub const IS_FRIEND: FunctionFlags = FunctionFlags(1 << 8);
    pub const IS_EXPLICIT: FunctionFlags = FunctionFlags(1 << 9);
    pub const IS_DEFAULT: FunctionFlags = FunctionFlags(1 << 10);
    pub const IS_DELETE: FunctionFlags = FunctionFlags(1 << 11);
    pub const HAS_OVERRIDE_SPECIFIER: FunctionFlags = FunctionFlags(1 << 12);
    pub const HAS_FINAL_SPECIFIER: FunctionFlags = FunctionFlags(1 << 13);
    pub const IS_NOEXCEPT: FunctionFlags = FunctionFlags(1 << 14);
    pub const IS_THROW: FunctionFlags = FunctionFlags(1 << 15);
    pub const IS_OPERATOR: FunctionFlags = FunctionFlags(1 << 16);
    pub const HAS_LVAL_REF_QUAL: FunctionFlags = FunctionFlags(1 << 17);
    pub const HAS_RVAL_REF_QUAL: FunctionFlags = FunctionFlags(1 << 18);
    pub const IS_VARIADIC: FunctionFlags = FunctionFlags(1 << 19);
    pub const IS_VOLATILE: FunctionFlags = FunctionFlags(1 << 20);
    pub const HAS_TRAILING_RETURN_TYPE: FunctionFlags = FunctionFlags(1 << 21);
    pub const IS_ESCAPE_FUNCTION: FunctionFlags = FunctionFlags(1 << 22);
    pub const IS_INLINE_KEYWORD: FunctionFlags = FunctionFlags(1 << 23);
    pub const IS_CONSTEXPR: FunctionFlags = FunctionFlags(1 << 24);

    pub fn get(self, flag: FunctionFlags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn set(&mut self, flag: FunctionFlags, state: bool) {
        if state {
            self.0 |= flag.0;
        } else {
            self.0 &= !flag.0;
        }
    }
}

#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    /// definition name token
    pub token_def: Option<TokenId>,
    /// `(` of the argument list
    pub arg_def: Option<TokenId>,
    pub kind: FunctionKind,
    pub flags: FunctionFlags,
    pub argument_list: Vec<VariableId>,
    pub ret_start: Option<TokenId>,
    pub ret_end: Option<TokenId>,
    pub ret_type: Option<TypeId>,
    pub nested_in: Option<ScopeId>,
    /// body scope, when defined
    pub function_scope: Option<ScopeId>,
    pub access: AccessControl,
}

impl Function {
    pub fn has_body(&self) -> bool {
        self.flags.get(FunctionFlags::HAS_BODY)
    }

    pub fn is_const(&self) -> bool {
        self.flags.get(FunctionFlags::IS_CONST)
    }

    pub fn has_virtual_specifier(&self) -> bool {
        self.flags.get(FunctionFlags::HAS_VIRTUAL_SPECIFIER)
    }

    pub fn is_pure(&self) -> bool {
        self.flags.get(FunctionFlags::IS_PURE)
    }

    pub fn is_static(&self) -> bool {
        self.flags.get(FunctionFlags::IS_STATIC)
    }

    pub fn is_variadic(&self) -> bool {
        self.flags.get(FunctionFlags::IS_VARIADIC)
    }

    pub fn is_operator(&self) -> bool {
        self.flags.get(FunctionFlags::IS_OPERATOR)
    }

    pub fn is_explicit(&self) -> bool {
        self.flags.get(FunctionFlags::IS_EXPLICIT)
    }

    pub fn is_default(&self) -> bool {
        self.flags.get(FunctionFlags::IS_DEFAULT)
    }

    pub fn is_delete(&self) -> bool {
        self.flags.get(FunctionFlags::IS_DELETE)
    }

    pub fn is_escape_function(&self) -> bool {
        self.flags.get(FunctionFlags::IS_ESCAPE_FUNCTION)
    }

    pub fn is_constructor(&self) -> bool {
        matches!(
            self.kind,
            FunctionKind::Constructor | FunctionKind::CopyConstructor | FunctionKind::MoveConstructor
        )
    }

    pub fn is_destructor(&self) -> bool {
        self.kind == FunctionKind::Destructor
    }

    pub fn arg_count(&self) -> usize {
        self.argument_list.len()
    }
}

#[derive(Clone, Debug)]
pub struct Enumerator {
    pub name: String,
    pub name_tok: TokenId,
    pub scope: ScopeId,
    pub value: Option<Bigint>,
}

// ---------------------------------------------------------------------------
// ValueType

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValueTypeSign {
    #[default]
    Unknown,
    Signed,
    Unsigned,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueTypeKind {
    #[default]
    Unknown,
    Pod,
    Record,
    SmartPointer,
    Container,
    Iterator,
    Void,
    Bool,
    Char,
    Short,
    Wchar,
    Int,
    Long,
    LongLong,
    UnknownInt,
    Float,
    Double,
    LongDouble,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RefKind {
    #[default]
    None,
    LValue,
    RValue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchResult {
    Unknown,
    Same,
    Fallback1,
    Fallback2,
    NoMatch,
}

/// The type of an expression, attached to tokens lazily.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueType {
    pub sign: ValueTypeSign,
    pub kind: ValueTypeKind,
    /// 0 => not pointer, 1 => `*`, 2 => `**`, ...
    pub pointer: u32,
    /// bit 0 = constness of the data, bit 1 = `*`, bit 2 = `**`, ...
    pub constness: u32,
    pub reference: RefKind,
    /// record types: scope of the type definition
    pub type_scope: Option<ScopeId>,
    pub is_enum: bool,
    /// container types: the library container record key
    pub container: Option<String>,
    /// token of the container element type
    pub container_element: Option<TokenId>,
    pub smart_pointer: Option<String>,
    /// type name as written, e.g. `size_t` when the kind is resolved to long
    pub original_type_name: String,
}

impl ValueType {
    pub fn new(sign: ValueTypeSign, kind: ValueTypeKind, pointer: u32) -> Self {
        ValueType {
            sign,
            kind,
            pointer,
            ..ValueType::default()
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.kind >= ValueTypeKind::Bool
    }

    pub fn is_integral(&self) -> bool {
        self.kind >= ValueTypeKind::Bool && self.kind <= ValueTypeKind::UnknownInt
    }

    pub fn is_float_kind(&self) -> bool {
        self.kind >= ValueTypeKind::Float
    }

    pub fn is_const(&self, indirect: u32) -> bool {
        self.constness & (1 << indirect) != 0
    }

    /// Size in bytes on `platform`; 0 when unknown.
    pub fn type_size(&self, platform: &Platform, pointer_counts: bool) -> Bigint {
        if self.pointer > 0 && pointer_counts {
            return platform.sizeof_pointer as Bigint;
        }
        let size = match self.kind {
            ValueTypeKind::Bool => platform.sizeof_bool,
            ValueTypeKind::Char => 1,
            ValueTypeKind::Short => platform.sizeof_short,
            ValueTypeKind::Wchar => platform.sizeof_wchar_t,
            ValueTypeKind::Int => platform.sizeof_int,
            ValueTypeKind::Long => platform.sizeof_long,
            ValueTypeKind::LongLong => platform.sizeof_long_long,
            ValueTypeKind::Float => platform.sizeof_float,
            ValueTypeKind::Double => platform.sizeof_double,
            ValueTypeKind::LongDouble => platform.sizeof_long_double,
            _ => 0,
        };
        size as Bigint
    }

    /// Same type when const and references are ignored.
    pub fn is_type_equal(&self, other: &ValueType) -> bool {
        self.kind == other.kind
            && self.sign == other.sign
            && self.pointer == other.pointer
            && self.type_scope == other.type_scope
    }

    /// Argument matching for overload resolution and format checking.
    pub fn match_parameter(call: &ValueType, func: &ValueType) -> MatchResult {
        use ValueTypeKind::*;
        if call.kind == Unknown || func.kind == Unknown {
            return MatchResult::Unknown;
        }
        if call.pointer != func.pointer {
            // any pointer matches void*
            if call.pointer > 0 && func.kind == Void && func.pointer == 1 {
                return MatchResult::Fallback1;
            }
            return MatchResult::NoMatch;
        }
        if call.pointer > 0 {
            return if call.kind == func.kind {
                MatchResult::Same
            } else if func.kind == Void || call.kind == Void {
                MatchResult::Fallback1
            } else {
                MatchResult::NoMatch
            };
        }
        if call.kind == func.kind {
            if call.kind == Record {
                return if call.type_scope == func.type_scope {
                    MatchResult::Same
                } else {
                    MatchResult::NoMatch
                };
            }
            if call.is_integral()
                && call.sign != func.sign
                && call.sign != ValueTypeSign::Unknown
                && func.sign != ValueTypeSign::Unknown
            {
                return MatchResult::Fallback2;
            }
            return MatchResult::Same;
        }
        if call.is_integral() && func.is_integral() {
            // promotion keeps the value; narrowing and sign mixing is lossy
            return if func.kind > call.kind && func.kind >= Int {
                MatchResult::Fallback1
            } else {
                MatchResult::Fallback2
            };
        }
        if call.is_float_kind() && func.is_float_kind() {
            return MatchResult::Fallback1;
        }
        if (call.is_integral() && func.is_float_kind())
            || (call.is_float_kind() && func.is_integral())
        {
            return MatchResult::Fallback2;
        }
        if (call.is_enum && func.is_integral()) || (func.is_enum && call.is_integral()) {
            return MatchResult::Fallback2;
        }
        MatchResult::NoMatch
    }

    /// Human-readable form used in diagnostics, e.g. `const char *`.
    pub fn display(&self) -> String {
        let mut out = String::new();
        if self.is_const(0) {
            out.push_str("const ");
        }
        if !self.original_type_name.is_empty() {
            out.push_str(&self.original_type_name);
        } else {
            match self.sign {
                ValueTypeSign::Unsigned => out.push_str("unsigned "),
                ValueTypeSign::Signed
                    if matches!(self.kind, ValueTypeKind::Char) =>
                {
                    out.push_str("signed ")
                }
                _ => {}
            }
            out.push_str(match self.kind {
                ValueTypeKind::Bool => "bool",
                ValueTypeKind::Char => "char",
                ValueTypeKind::Short => "short",
                ValueTypeKind::Wchar => "wchar_t",
                ValueTypeKind::Int => "int",
                ValueTypeKind::Long => "long",
                ValueTypeKind::LongLong => "long long",
                ValueTypeKind::UnknownInt => "int",
                ValueTypeKind::Float => "float",
                ValueTypeKind::Double => "double",
                ValueTypeKind::LongDouble => "long double",
                ValueTypeKind::Void => "void",
                ValueTypeKind::Record => "record",
                ValueTypeKind::Container => "container",
                ValueTypeKind::SmartPointer => "smart pointer",
                ValueTypeKind::Iterator => "iterator",
                _ => "unknown",
            });
        }
        for i in 1..=self.pointer {
            out.push_str(" *");
            if self.is_const(i) {
                out.push_str(" const");
            }
        }
        match self.reference {
            RefKind::LValue => out.push_str(" &"),
            RefKind::RValue => out.push_str(" &&"),
            RefKind::None => {}
        }
        out
    }
}

// ---------------------------------------------------------------------------
// SymbolDatabase

#[derive(Debug, Default)]
pub struct SymbolDatabase {
    pub(crate) scopes: Vec<Scope>,
    pub(crate) types: Vec<Type>,
    pub(crate) variables: Vec<Variable>,
    pub(crate) functions: Vec<Function>,
    pub(crate) enumerators: Vec<Enumerator>,
    /// indexed by declaration id; slot 0 is reserved
    pub(crate) variable_list: Vec<Option<VariableId>>,
    pub(crate) function_scopes: Vec<ScopeId>,
    pub(crate) class_and_struct_scopes: Vec<ScopeId>,
}

impl SymbolDatabase {
    /// Build the database for a token list. See `symbolbuild`.
    pub fn build(
        tokens: &mut TokenList,
        settings: &Settings,
    ) -> Result<SymbolDatabase, crate::errors::AnalysisError> {
        crate::symbolbuild::build(tokens, settings)
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn type_of(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.index()]
    }

    pub fn function(&self, id: FunctionId) -> &Function {
        &self.functions[id.index()]
    }

    pub fn enumerator(&self, id: EnumeratorId) -> &Enumerator {
        &self.enumerators[id.index()]
    }

    pub fn scopes(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes.iter().enumerate().map(|(i, s)| (ScopeId(i as u32), s))
    }

    pub fn function_scopes(&self) -> &[ScopeId] {
        &self.function_scopes
    }

    pub fn class_and_struct_scopes(&self) -> &[ScopeId] {
        &self.class_and_struct_scopes
    }

    /// The variable table indexed by declaration id.
    pub fn variable_list(&self) -> &[Option<VariableId>] {
        &self.variable_list
    }

    pub fn variable_from_var_id(&self, var_id: u32) -> Option<&Variable> {
        self.variable_list
            .get(var_id as usize)
            .copied()
            .flatten()
            .map(|id| self.variable(id))
    }

    pub fn global_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Innermost-to-outermost walk from `scope`.
    pub fn scope_chain(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), move |&s| self.scope(s).nested_in)
    }

    pub fn is_nested_in(&self, inner: ScopeId, outer: ScopeId) -> bool {
        self.scope_chain(inner).any(|s| s == outer)
    }

    /// Enumerator of `scope` (an enum scope) with this name.
    pub fn find_enumerator(&self, scope: ScopeId, name: &str) -> Option<EnumeratorId> {
        self.scope(scope)
            .enumerator_list
            .iter()
            .copied()
            .find(|&e| self.enumerator(e).name == name)
    }

    /// For unit testing: first scope with this class name.
    pub fn find_scope_by_name(&self, name: &str) -> Option<ScopeId> {
        self.scopes()
            .find(|(_, s)| s.class_name == name)
            .map(|(id, _)| id)
    }

    /// Re-run value-type annotation over the token list. The pass is
    /// idempotent; this entry exists so hosts (and tests) can re-annotate
    /// after external token mutation.
    pub fn set_value_types_in_token_list(
        &mut self,
        tokens: &mut TokenList,
        settings: &Settings,
    ) {
        crate::valuetype::set_value_types(tokens, self, settings);
    }

    /// Scoped type lookup: walk outward through enclosing scopes and inward
    /// through base classes until a match or exhaustion.
    pub fn find_variable_type(&self, start: ScopeId, name: &str) -> Option<TypeId> {
        for scope_id in self.scope_chain(start) {
            let scope = self.scope(scope_id);
            for (i, ty) in self.types.iter().enumerate() {
                if ty.name == name && ty.enclosing_scope == Some(scope_id) {
                    return Some(TypeId(i as u32));
                }
            }
            // base classes of the enclosing class
            if let Some(type_id) = scope.defined_type {
                if let Some(found) = self.find_type_in_bases(type_id, name, 0) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn find_type_in_bases(&self, type_id: TypeId, name: &str, depth: u32) -> Option<TypeId> {
        if depth > 100 {
            return None;
        }
        for base in &self.type_of(type_id).derived_from {
            let Some(base_id) = base.type_id else { continue };
            if let Some(scope_id) = self.type_of(base_id).class_scope {
                for (i, ty) in self.types.iter().enumerate() {
                    if ty.name == name && ty.enclosing_scope == Some(scope_id) {
                        return Some(TypeId(i as u32));
                    }
                }
            }
            if let Some(found) = self.find_type_in_bases(base_id, name, depth + 1) {
                return Some(found);
            }
        }
        None
    }

    /// Overload resolution for a call site: candidates are ranked by
    /// [`ValueType::match_parameter`]; the best tier must be unambiguous.
    pub fn find_function(&self, tokens: &TokenList, call_tok: TokenId) -> Option<FunctionId> {
        let name = tokens[call_tok].str();
        let open = tokens.next(call_tok).filter(|&n| tokens[n].str() == "(")?;
        let args = call_argument_tokens(tokens, open);

        let mut candidates: Vec<FunctionId> = Vec::new();
        let start_scope = tokens[call_tok].scope().unwrap_or(ScopeId(0));
        for scope_id in self.scope_chain(start_scope) {
            let scope = self.scope(scope_id);
            // inside a method, member functions of the class are in scope
            let lists = scope
                .function_of
                .map(|of| &self.scope(of).function_list)
                .into_iter()
                .chain(std::iter::once(&scope.function_list));
            for list in lists {
                for &fid in list {
                    if self.function(fid).name == name {
                        candidates.push(fid);
                    }
                }
            }
            if !candidates.is_empty() {
                break;
            }
        }
        if candidates.is_empty() {
            return None;
        }
        if candidates.len() == 1 {
            let f = self.function(candidates[0]);
            if f.arg_count() == args.len() || f.is_variadic() {
                return Some(candidates[0]);
            }
            return None;
        }

        let mut tiers: [Vec<FunctionId>; 3] = Default::default();
        for &fid in &candidates {
            let f = self.function(fid);
            if f.arg_count() != args.len() && !f.is_variadic() {
                continue;
            }
            let mut worst = MatchResult::Same;
            for (i, &arg_tok) in args.iter().enumerate() {
                let Some(param) = f.argument_list.get(i) else { break };
                let Some(param_vt) = self.variable(*param).value_type.as_ref() else {
                    worst = MatchResult::Unknown;
                    break;
                };
                let Some(arg_vt) = tokens[arg_tok].value_type() else {
                    worst = MatchResult::Unknown;
                    break;
                };
                match ValueType::match_parameter(arg_vt, param_vt) {
                    MatchResult::Same => {}
                    MatchResult::Fallback1 => {
                        if worst == MatchResult::Same {
                            worst = MatchResult::Fallback1;
                        }
                    }
                    MatchResult::Fallback2 => {
                        if worst != MatchResult::NoMatch && worst != MatchResult::Unknown {
                            worst = MatchResult::Fallback2;
                        }
                    }
                    MatchResult::NoMatch => {
                        worst = MatchResult::NoMatch;
                        break;
                    }
                    MatchResult::Unknown => {
                        worst = MatchResult::Unknown;
                        break;
                    }
                }
            }
            match worst {
                MatchResult::Same => tiers[0].push(fid),
                MatchResult::Fallback1 => tiers[1].push(fid),
                MatchResult::Fallback2 => tiers[2].push(fid),
                _ => {}
            }
        }
        // the lowest-ranking tier must be unambiguous
        tiers
            .iter()
            .find(|t| !t.is_empty())
            .and_then(|t| t.iter().copied().exactly_one().ok())
    }

    /// A function is implicitly virtual if a transitively reachable base
    /// declares a virtual function with the same name and argument list.
    /// Missing base info yields `default_value`.
    pub fn is_implicitly_virtual(&self, func: FunctionId, default_value: bool) -> bool {
        let f = self.function(func);
        if f.has_virtual_specifier() {
            return true;
        }
        let Some(class_scope) = f.nested_in else { return false };
        let Some(type_id) = self.scope(class_scope).defined_type else {
            return false;
        };
        self.is_implicitly_virtual_rec(type_id, f, default_value, 0)
    }

    fn is_implicitly_virtual_rec(
        &self,
        type_id: TypeId,
        f: &Function,
        default_value: bool,
        depth: u32,
    ) -> bool {
        if depth > 100 {
            return default_value;
        }
        for base in &self.type_of(type_id).derived_from {
            let Some(base_id) = base.type_id else {
                // unresolved base; cannot tell
                return default_value;
            };
            let Some(base_scope) = self.type_of(base_id).class_scope else {
                return default_value;
            };
            for &base_fn_id in &self.scope(base_scope).function_list {
                let base_fn = self.function(base_fn_id);
                if base_fn.name != f.name || !base_fn.has_virtual_specifier() {
                    continue;
                }
                if base_fn.arg_count() != f.arg_count() {
                    continue;
                }
                let args_match = base_fn
                    .argument_list
                    .iter()
                    .zip(&f.argument_list)
                    .all(|(&a, &b)| {
                        match (
                            self.variable(a).value_type.as_ref(),
                            self.variable(b).value_type.as_ref(),
                        ) {
                            (Some(x), Some(y)) => x.is_type_equal(y),
                            _ => true,
                        }
                    });
                if args_match {
                    return true;
                }
            }
            if self.is_implicitly_virtual_rec(base_id, f, default_value, depth + 1) {
                return true;
            }
        }
        false
    }

    /// Whether the class (or any base) has a virtual function.
    pub fn has_virtual_function(&self, scope: ScopeId) -> bool {
        let s = self.scope(scope);
        if s.function_list
            .iter()
            .any(|&f| self.function(f).has_virtual_specifier())
        {
            return true;
        }
        if let Some(type_id) = s.defined_type {
            for base in &self.type_of(type_id).derived_from {
                if let Some(base_scope) = base.type_id.and_then(|t| self.type_of(t).class_scope) {
                    if self.has_virtual_function(base_scope) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Library configuration helper: variable's type is a configured
    /// container.
    pub fn container_of<'lib>(&self, library: &'lib Library, var: &Variable) -> Option<&'lib ccheck_config::Container> {
        var.value_type
            .as_ref()
            .and_then(|vt| vt.container.as_deref())
            .and_then(|name| library.container(name))
    }

    /// Debug/test sanity check of the core invariants.
    pub fn validate(&self, tokens: &TokenList) {
        for id in tokens.ids() {
            if let Some(parent) = tokens[id].ast_parent() {
                debug_assert!(
                    tokens[parent].ast_op1() == Some(id) || tokens[parent].ast_op2() == Some(id),
                    "ast parent does not point back"
                );
            }
            if let Some(link) = tokens[id].link() {
                debug_assert_eq!(tokens[link].link(), Some(id), "asymmetric link");
            }
        }
        for (var_id, slot) in self.variable_list.iter().enumerate().skip(1) {
            if let Some(vid) = slot {
                debug_assert_eq!(
                    self.variable(*vid).declaration_id,
                    var_id as u32,
                    "variable table index mismatch"
                );
            }
        }
    }
}

/// Top-level argument tokens of a call: the AST roots of each argument.
pub fn call_argument_tokens(tokens: &TokenList, open_paren: TokenId) -> Vec<TokenId> {
    let mut args = Vec::new();
    let Some(mut root) = tokens.ast_op2(open_paren) else {
        return args;
    };
    // comma chain is left-associative
    loop {
        if tokens[root].str() == "," && tokens[root].is_binary_op() {
            args.push(tokens.ast_op2(root).unwrap());
            match tokens.ast_op1(root) {
                Some(next) => root = next,
                None => break,
            }
        } else {
            args.push(root);
            break;
        }
    }
    args.reverse();
    args
}
