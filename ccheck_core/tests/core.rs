//! End-to-end tests of the analysis core: symbol database invariants,
//! value-type inference and value flow through the forward/reverse engines.

use ccheck_config::Settings;
use ccheck_core::errors::RecordingLogger;
use ccheck_core::symbols::{ScopeKind, ValueTypeKind};
use ccheck_core::token::TokenId;
use ccheck_core::vfvalue::{LifetimeKind, ValuePayload};
use ccheck_core::TranslationUnit;
use pretty_assertions::assert_eq;

fn analyze(code: &str) -> TranslationUnit {
    let settings = Settings::test_default();
    let mut logger = RecordingLogger::new();
    TranslationUnit::analyze(code, "test.cpp", &settings, &mut logger).unwrap()
}

fn find_all<'t>(tu: &'t TranslationUnit, text: &str) -> Vec<TokenId> {
    tu.tokens
        .ids()
        .filter(|&id| tu.tokens[id].str() == text)
        .collect()
}

#[test]
fn scopes_are_discovered_and_classified() {
    let tu = analyze(
        "namespace ns {\n\
         class C {\n\
         public:\n\
             int m;\n\
             void f();\n\
         };\n\
         }\n\
         void ns_free() { if (1) { } else { } for (;;) { } }\n",
    );
    let class_scope = tu.symbols.find_scope_by_name("C").unwrap();
    assert_eq!(tu.symbols.scope(class_scope).kind, ScopeKind::Class);
    let ns_scope = tu.symbols.find_scope_by_name("ns").unwrap();
    assert_eq!(tu.symbols.scope(ns_scope).kind, ScopeKind::Namespace);
    assert!(tu.symbols.is_nested_in(class_scope, ns_scope));

    let kinds: Vec<ScopeKind> = tu.symbols.scopes().map(|(_, s)| s.kind).collect();
    assert!(kinds.contains(&ScopeKind::If));
    assert!(kinds.contains(&ScopeKind::Else));
    assert!(kinds.contains(&ScopeKind::For));
    assert!(kinds.contains(&ScopeKind::Function));
}

#[test]
fn variable_table_index_matches_declaration_id() {
    let tu = analyze("int g; void f(int a) { int x; x = a; }");
    for (var_id, slot) in tu.symbols.variable_list().iter().enumerate().skip(1) {
        let vid = slot.expect("all ids assigned in this snippet");
        assert_eq!(tu.symbols.variable(vid).declaration_id, var_id as u32);
    }
    // every use refers back through the table
    let x_use = find_all(&tu, "x")[1];
    let var = tu
        .symbols
        .variable_from_var_id(tu.tokens[x_use].var_id())
        .unwrap();
    assert_eq!(var.name, "x");
    assert!(var.is_local());
}

#[test]
fn ast_parent_and_link_invariants() {
    let tu = analyze("void f(int a) { if (a < 3) { a = g(a, 1) + 2; } }");
    for id in tu.tokens.ids() {
        if let Some(parent) = tu.tokens[id].ast_parent() {
            assert!(
                tu.tokens[parent].ast_op1() == Some(id) || tu.tokens[parent].ast_op2() == Some(id)
            );
        }
        if let Some(link) = tu.tokens[id].link() {
            assert_eq!(tu.tokens[link].link(), Some(id));
        }
    }
}

#[test]
fn value_types_are_inferred() {
    let tu = analyze(
        "void f() {\n\
             int i = 1;\n\
             double d = 2.5;\n\
             const char* s = \"abc\";\n\
             unsigned u = i + 1;\n\
         }\n",
    );
    let i_use = find_all(&tu, "i")[0];
    assert_eq!(
        tu.tokens[i_use].value_type().unwrap().kind,
        ValueTypeKind::Int
    );
    let s_decl = find_all(&tu, "s")[0];
    let s_vt = tu.tokens[s_decl].value_type().unwrap();
    assert_eq!(s_vt.kind, ValueTypeKind::Char);
    assert_eq!(s_vt.pointer, 1);
    assert!(s_vt.is_const(0));
    let lit = tu.tokens.ids().find(|&id| tu.tokens[id].is_string()).unwrap();
    assert_eq!(tu.tokens[lit].value_type().unwrap().pointer, 1);
}

#[test]
fn set_value_types_is_idempotent() {
    let settings = Settings::test_default();
    let mut logger = RecordingLogger::new();
    let code = "int f(int a) { double d = a + 1.5; return a; }";
    let mut tu = TranslationUnit::analyze(code, "t.cpp", &settings, &mut logger).unwrap();
    let before: Vec<Option<String>> = tu
        .tokens
        .ids()
        .map(|id| tu.tokens[id].value_type().map(|vt| vt.display()))
        .collect();
    let mut tokens = std::mem::take(&mut tu.tokens);
    tu.symbols.set_value_types_in_token_list(&mut tokens, &settings);
    let after: Vec<Option<String>> = tokens
        .ids()
        .map(|id| tokens[id].value_type().map(|vt| vt.display()))
        .collect();
    assert_eq!(before, after);
}

#[test]
fn assignment_value_flows_forward() {
    let tu = analyze("void f() { int x = 3; int y = x + 1; }");
    // the use of x carries the known value 3
    let x_use = find_all(&tu, "x")[1];
    assert_eq!(tu.tokens[x_use].known_int_value(), Some(3));
    // and the sum was derived
    let plus = find_all(&tu, "+")[0];
    assert_eq!(tu.tokens[plus].known_int_value(), Some(4));
}

#[test]
fn write_stops_forward_flow() {
    let tu = analyze("void f() { int x = 3; x = g(); int y = x; }");
    let x_uses = find_all(&tu, "x");
    // the last use is after the unknown write; no known value survives
    let last = *x_uses.last().unwrap();
    assert_eq!(tu.tokens[last].known_int_value(), None);
}

#[test]
fn condition_value_flows_into_then_branch() {
    let tu = analyze("void f(int x) { if (x == 3) { int y = x; } }");
    let x_uses = find_all(&tu, "x");
    let in_then = *x_uses.last().unwrap();
    let values = tu.tokens[in_then].values();
    assert!(
        values
            .iter()
            .any(|v| v.int_value() == Some(3) && v.is_possible()),
        "no conditional value attached: {values:?}"
    );
    // the condition back-pointer is set
    assert!(values
        .iter()
        .filter(|v| v.int_value() == Some(3))
        .all(|v| v.cond_tok.is_some()));
}

#[test]
fn uninitialized_local_carries_uninit_value() {
    let tu = analyze("void f() { int x; int y = x; }");
    let x_use = find_all(&tu, "x")[1];
    assert!(tu.tokens[x_use].values().iter().any(|v| v.is_uninit()));
    // ... and the error path leads back to the declaration
    let value = tu.tokens[x_use]
        .values()
        .iter()
        .find(|v| v.is_uninit())
        .unwrap();
    assert!(!value.error_path.is_empty());
}

#[test]
fn initialized_local_has_no_uninit_value() {
    let tu = analyze("void f() { int x = 1; int y = x; }");
    let x_use = find_all(&tu, "x")[1];
    assert!(!tu.tokens[x_use].values().iter().any(|v| v.is_uninit()));
}

#[test]
fn address_of_local_carries_lifetime() {
    let tu = analyze("int* f() { int x = 3; return &x; }");
    let amp = find_all(&tu, "&")[0];
    let value = tu.tokens[amp]
        .values()
        .iter()
        .find(|v| v.is_lifetime())
        .expect("lifetime value on &x");
    let referent = value.lifetime_token().unwrap();
    assert_eq!(tu.tokens[referent].str(), "x");
    assert!(matches!(
        value.payload,
        ValuePayload::Lifetime {
            kind: LifetimeKind::Address,
            ..
        }
    ));
}

#[test]
fn lifetime_flows_through_pointer_assignment() {
    let tu = analyze("void f() { int x = 1; int* p; p = &x; int* q = p; }");
    let p_uses = find_all(&tu, "p");
    // the use of p on the rhs of `q = p`
    let p_read = *p_uses.last().unwrap();
    assert!(
        tu.tokens[p_read].values().iter().any(|v| v.is_lifetime()),
        "{:?}",
        tu.tokens[p_read].values()
    );
}

#[test]
fn moved_variable_is_flagged() {
    let tu = analyze("void f(S s) { g(std::move(s)); int n = s.size(); }");
    let s_uses = find_all(&tu, "s");
    let after_move = *s_uses.last().unwrap();
    assert!(tu.tokens[after_move].values().iter().any(|v| v.is_moved()));
}

#[test]
fn implicitly_virtual_through_base() {
    let tu = analyze(
        "class Base { public: virtual void f(); };\n\
         class Derived : public Base { public: void f(); };\n",
    );
    let derived = tu.symbols.find_scope_by_name("Derived").unwrap();
    let f = tu.symbols.scope(derived).function_list[0];
    assert!(tu.symbols.is_implicitly_virtual(f, false));

    let base = tu.symbols.find_scope_by_name("Base").unwrap();
    assert!(tu.symbols.has_virtual_function(base));
    assert!(tu.symbols.has_virtual_function(derived));
}

#[test]
fn not_virtual_without_base_match() {
    let tu = analyze(
        "class Base { public: void f(); };\n\
         class Derived : public Base { public: void f(); };\n",
    );
    let derived = tu.symbols.find_scope_by_name("Derived").unwrap();
    let f = tu.symbols.scope(derived).function_list[0];
    assert!(!tu.symbols.is_implicitly_virtual(f, false));
}

#[test]
fn enumerators_have_values() {
    let tu = analyze("enum E { A, B, C = 10, D };\nvoid f() { int x = B; int y = D; }");
    let b_use = *find_all(&tu, "B").last().unwrap();
    assert_eq!(tu.tokens[b_use].known_int_value(), Some(1));
    let d_use = *find_all(&tu, "D").last().unwrap();
    assert_eq!(tu.tokens[d_use].known_int_value(), Some(11));
}

#[test]
fn escape_terminates_branch_value() {
    // after the early return the conditional value is gone on the main path
    let tu = analyze("void f(int x) { if (x == 3) { return; } int y = x; }");
    let x_uses = find_all(&tu, "x");
    let after_if = *x_uses.last().unwrap();
    assert!(
        !tu.tokens[after_if]
            .values()
            .iter()
            .any(|v| v.int_value() == Some(3) && !v.is_impossible()),
        "{:?}",
        tu.tokens[after_if].values()
    );
}

#[test]
fn loop_write_bails_out() {
    let tu = analyze("void f() { int x = 3; while (g()) { x = h(); } int y = x; }");
    let x_uses = find_all(&tu, "x");
    let after_loop = *x_uses.last().unwrap();
    assert_eq!(tu.tokens[after_loop].known_int_value(), None);
}

#[test]
fn reverse_flow_reaches_earlier_reads() {
    let tu = analyze("void f(int x) { int y = x; if (x == 3) { } }");
    let x_uses = find_all(&tu, "x");
    // x in `int y = x` gets the possible value 3 from the later condition
    let early = x_uses[1];
    assert!(
        tu.tokens[early]
            .values()
            .iter()
            .any(|v| v.int_value() == Some(3) && v.is_possible()),
        "{:?}",
        tu.tokens[early].values()
    );
}

#[test]
fn container_defaults_to_empty() {
    let tu = analyze("void f() { std::vector<int> v; int n = v.size(); }");
    let v_uses = find_all(&tu, "v");
    let v_read = *v_uses.last().unwrap();
    assert!(tu.tokens[v_read]
        .values()
        .iter()
        .any(|v| matches!(v.payload, ValuePayload::ContainerSize(0))));
}
