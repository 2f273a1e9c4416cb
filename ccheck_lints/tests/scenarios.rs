//! End-to-end scenarios: analyze a snippet, run every check, assert on the
//! reported diagnostic ids and messages.

use ccheck_config::{Settings, Severity};
use ccheck_core::errors::RecordingLogger;
use ccheck_core::TranslationUnit;
use ccheck_lints::run_checks;
use pretty_assertions::assert_eq;

fn check(code: &str) -> RecordingLogger {
    let settings = Settings::test_default();
    let mut logger = RecordingLogger::new();
    let tu = TranslationUnit::analyze(code, "test.cpp", &settings, &mut logger).unwrap();
    run_checks(&tu, &settings, &mut logger);
    logger
}

// -- dangling auto variables -------------------------------------------------

#[test]
fn returning_address_of_local_dangles() {
    let logger = check("int* f() { int x = 3; return &x; }");
    assert!(logger.contains("returnDanglingLifetime"), "{:?}", logger.ids());
    let message = logger.find("returnDanglingLifetime").unwrap();
    assert!(message.message.contains("'x'"));
    assert!(!message.path.is_empty());
}

#[test]
fn returning_static_is_fine() {
    let logger = check("int* f() { static int x = 3; return &x; }");
    assert!(!logger.contains("returnDanglingLifetime"), "{:?}", logger.ids());
}

// -- printf / scanf ----------------------------------------------------------

#[test]
fn printf_uint_with_string_argument() {
    let logger = check("void f() { printf(\"%u\", \"xyz\"); }");
    let message = logger.find("invalidPrintfArgType_uint").expect("diagnosed");
    assert!(
        message
            .message
            .contains("requires 'unsigned int' but the argument type is 'const char *'"),
        "{}",
        message.message
    );
    assert_eq!(message.severity, Severity::Error);
}

#[test]
fn printf_matching_arguments_are_clean() {
    let logger = check("void f(int i, const char* s) { printf(\"%d %s\", i, s); }");
    assert!(
        !logger.ids().iter().any(|id| id.starts_with("invalidPrintf")),
        "{:?}",
        logger.ids()
    );
}

#[test]
fn printf_argument_count_mismatch() {
    let logger = check("void f(int i) { printf(\"%d %d\", i); }");
    let message = logger.find("wrongPrintfScanfArgNum").expect("diagnosed");
    assert_eq!(message.severity, Severity::Error);
    assert!(message.message.contains("requires 2 parameters"));

    let logger = check("void f(int i) { printf(\"%d\", i, i); }");
    let message = logger.find("wrongPrintfScanfArgNum").expect("diagnosed");
    assert_eq!(message.severity, Severity::Warning);
}

#[test]
fn printf_size_t_alias_is_portability() {
    let logger = check("void f(const char* s) { printf(\"%u\", strlen(s)); }");
    let message = logger.find("invalidPrintfArgType_uint").expect("diagnosed");
    assert_eq!(message.severity, Severity::Portability);
    assert!(message.message.contains("size_t"), "{}", message.message);
}

#[test]
fn printf_float_mismatch() {
    let logger = check("void f(const char* s) { printf(\"%f\", s); }");
    assert!(logger.contains("invalidPrintfArgType_float"));
}

#[test]
fn printf_percent_s_with_int() {
    let logger = check("void f(int i) { printf(\"%s\", i); }");
    assert!(logger.contains("invalidPrintfArgType_s"));
}

#[test]
fn scanf_without_width_is_flagged() {
    let logger = check("void f() { char buf[10]; scanf(\"%s\", buf); }");
    assert!(logger.contains("invalidscanf"), "{:?}", logger.ids());
}

#[test]
fn scanf_width_respects_buffer_size() {
    // width 4 into char[5] leaves room for the terminator
    let logger = check("void f() { char buf[5]; scanf(\"%4s\", buf); }");
    assert!(!logger.contains("invalidScanfFormatWidth"), "{:?}", logger.ids());
    // width 5 does not
    let logger = check("void f() { char buf[5]; scanf(\"%5s\", buf); }");
    let message = logger.find("invalidScanfFormatWidth").expect("diagnosed");
    assert!(message.message.contains("use %4s"), "{}", message.message);
}

#[test]
fn scanf_int_argument_must_be_pointer() {
    let logger = check("void f() { int i; scanf(\"%4d\", i); }");
    assert!(logger.contains("invalidScanfArgType_int"), "{:?}", logger.ids());
    let logger = check("void f() { int i; scanf(\"%4d\", &i); }");
    assert!(!logger.contains("invalidScanfArgType_int"), "{:?}", logger.ids());
}

#[test]
fn positional_parameter_out_of_range() {
    let logger = check("void f(int i) { printf(\"%2$d\", i); }");
    assert!(
        logger.contains("wrongPrintfScanfParameterPositionError"),
        "{:?}",
        logger.ids()
    );
}

// -- FILE* usage -------------------------------------------------------------

#[test]
fn write_to_read_only_file() {
    let logger = check(
        "void f(char* buf) {\n\
             FILE* f = fopen(\"a\", \"r\");\n\
             fwrite(buf, 1, 4, f);\n\
             fclose(f);\n\
         }\n",
    );
    assert!(logger.contains("writeReadOnlyFile"), "{:?}", logger.ids());
}

#[test]
fn read_from_write_only_file() {
    let logger = check(
        "void f(char* buf) {\n\
             FILE* f = fopen(\"a\", \"w\");\n\
             fread(buf, 1, 4, f);\n\
         }\n",
    );
    assert!(logger.contains("readWriteOnlyFile"), "{:?}", logger.ids());
}

#[test]
fn use_after_close() {
    let logger = check(
        "void f(char* buf) {\n\
             FILE* f = fopen(\"a\", \"r\");\n\
             fclose(f);\n\
             fread(buf, 1, 4, f);\n\
         }\n",
    );
    assert!(logger.contains("useClosedFile"), "{:?}", logger.ids());
}

#[test]
fn read_then_write_needs_positioning() {
    let logger = check(
        "void f(char* buf) {\n\
             FILE* f = fopen(\"a\", \"r+\");\n\
             fread(buf, 1, 4, f);\n\
             fwrite(buf, 1, 4, f);\n\
         }\n",
    );
    assert!(logger.contains("IOWithoutPositioning"), "{:?}", logger.ids());
}

#[test]
fn positioning_between_read_and_write_is_fine() {
    let logger = check(
        "void f(char* buf) {\n\
             FILE* f = fopen(\"a\", \"r+\");\n\
             fread(buf, 1, 4, f);\n\
             fseek(f, 0, 0);\n\
             fwrite(buf, 1, 4, f);\n\
         }\n",
    );
    assert!(!logger.contains("IOWithoutPositioning"), "{:?}", logger.ids());
}

#[test]
fn incompatible_open_of_same_file() {
    let logger = check(
        "void f() {\n\
             FILE* a = fopen(\"name\", \"w\");\n\
             FILE* b = fopen(\"name\", \"r\");\n\
         }\n",
    );
    assert!(logger.contains("incompatibleFileOpen"), "{:?}", logger.ids());
}

#[test]
fn fflush_on_stdin_is_portability() {
    let logger = check("void f() { fflush(stdin); }");
    let message = logger.find("fflushOnInputStream").expect("diagnosed");
    assert_eq!(message.severity, Severity::Portability);
}

// -- stdarg ------------------------------------------------------------------

#[test]
fn va_start_with_wrong_parameter() {
    let logger = check(
        "void f(int a, int b, ...) {\n\
             va_list v;\n\
             va_start(v, a);\n\
             va_end(v);\n\
         }\n",
    );
    let message = logger.find("va_start_wrongParameter").expect("diagnosed");
    assert!(message.message.contains("'b'"), "{}", message.message);
}

#[test]
fn va_start_with_last_parameter_is_fine() {
    let logger = check(
        "void f(int a, int b, ...) {\n\
             va_list v;\n\
             va_start(v, b);\n\
             va_end(v);\n\
         }\n",
    );
    assert!(!logger.contains("va_start_wrongParameter"), "{:?}", logger.ids());
}

#[test]
fn missing_va_end() {
    let logger = check(
        "void f(int a, ...) {\n\
             va_list v;\n\
             va_start(v, a);\n\
         }\n",
    );
    assert!(logger.contains("va_end_missing"), "{:?}", logger.ids());
}

#[test]
fn va_list_used_before_started() {
    let logger = check(
        "void f(int a, ...) {\n\
             va_list v;\n\
             g(v);\n\
             va_start(v, a);\n\
             va_end(v);\n\
         }\n",
    );
    assert!(logger.contains("va_list_usedBeforeStarted"), "{:?}", logger.ids());
}

// -- classes -----------------------------------------------------------------

#[test]
fn uninitialized_member_in_constructor() {
    let logger = check("struct S { int x; S() { } };");
    let message = logger.find("uninitMemberVar").expect("diagnosed");
    assert!(message.message.contains("S::x"), "{}", message.message);
}

#[test]
fn member_initialized_in_init_list_is_fine() {
    let logger = check("struct S { int x; S() : x(0) { } };");
    assert!(!logger.contains("uninitMemberVar"), "{:?}", logger.ids());
}

#[test]
fn member_assigned_in_body_is_fine() {
    let logger = check("struct S { int x; S() { x = 0; } };");
    assert!(!logger.contains("uninitMemberVar"), "{:?}", logger.ids());
}

#[test]
fn memset_on_class_with_virtual_function() {
    let logger = check(
        "struct S { virtual void f(); int x; };\n\
         void g() { S s; memset(&s, 0, sizeof(s)); }\n",
    );
    assert!(logger.contains("memsetClass"), "{:?}", logger.ids());
}

#[test]
fn memset_on_plain_struct_is_fine() {
    let logger = check(
        "struct S { int x; };\n\
         void g() { S s; memset(&s, 0, sizeof(s)); }\n",
    );
    assert!(!logger.contains("memsetClass"), "{:?}", logger.ids());
}

#[test]
fn operator_eq_should_return_ref_to_this() {
    let logger = check(
        "struct S {\n\
             int x;\n\
             S& operator=(const S& rhs) { x = rhs.x; }\n\
         };\n",
    );
    assert!(logger.contains("operatorEqRetRefThis"), "{:?}", logger.ids());
}

#[test]
fn operator_eq_returning_this_is_fine() {
    let logger = check(
        "struct S {\n\
             int x;\n\
             S& operator=(const S& rhs) { x = rhs.x; return *this; }\n\
         };\n",
    );
    assert!(!logger.contains("operatorEqRetRefThis"), "{:?}", logger.ids());
}

#[test]
fn operator_eq_needs_self_assignment_check() {
    let logger = check(
        "struct S {\n\
             int* p;\n\
             S& operator=(const S& rhs) {\n\
                 delete p;\n\
                 p = new int(*rhs.p);\n\
                 return *this;\n\
             }\n\
         };\n",
    );
    assert!(logger.contains("operatorEqToSelf"), "{:?}", logger.ids());
}

#[test]
fn operator_eq_with_self_check_is_fine() {
    let logger = check(
        "struct S {\n\
             int* p;\n\
             S& operator=(const S& rhs) {\n\
                 if (this == &rhs) { return *this; }\n\
                 delete p;\n\
                 p = new int(*rhs.p);\n\
                 return *this;\n\
             }\n\
         };\n",
    );
    assert!(!logger.contains("operatorEqToSelf"), "{:?}", logger.ids());
}

// -- strings -----------------------------------------------------------------

#[test]
fn static_string_comparison() {
    let logger = check("void f() { int x = strcmp(\"a\", \"b\"); }");
    assert!(logger.contains("staticStringCompare"), "{:?}", logger.ids());
}

#[test]
fn identical_string_comparison() {
    let logger = check("void f(const char* s) { int x = strcmp(s, s); }");
    assert!(logger.contains("stringCompare"), "{:?}", logger.ids());
}

#[test]
fn sprintf_overlapping_buffers() {
    let logger = check("void f(char* buf) { sprintf(buf, \"%s\", buf); }");
    assert!(logger.contains("sprintfOverlappingData"), "{:?}", logger.ids());
}

#[test]
fn str_plus_char_literal() {
    let logger = check("void f() { const char* p = \"abc\" + 'd'; }");
    assert!(logger.contains("strPlusChar"), "{:?}", logger.ids());
}

#[test]
fn writing_into_string_literal() {
    let logger = check("void f() { \"abc\"[0] = 'x'; }");
    assert!(logger.contains("stringLiteralWrite"), "{:?}", logger.ids());
}

#[test]
fn writing_through_pointer_to_string_literal() {
    let logger = check("void f() { char* p; p = \"abc\"; p[0] = 'x'; }");
    assert!(logger.contains("stringLiteralWrite"), "{:?}", logger.ids());
}

// -- threads -----------------------------------------------------------------

#[test]
fn non_reentrant_function_call() {
    let logger = check("void f(const char* k, const char* s) { crypt(k, s); }");
    assert!(logger.contains("nonreentrantFunctions"), "{:?}", logger.ids());
}

// -- postfix operators -------------------------------------------------------

#[test]
fn postfix_increment_of_class_object() {
    let logger = check(
        "struct It { int i; };\n\
         void f(It it) { it++; }\n",
    );
    assert!(logger.contains("postfixOperator"), "{:?}", logger.ids());
}

#[test]
fn postfix_on_int_is_fine() {
    let logger = check("void f(int i) { i++; }");
    assert!(!logger.contains("postfixOperator"), "{:?}", logger.ids());
}

// -- stream misuse -----------------------------------------------------------

#[test]
fn cout_into_cout() {
    let logger = check("void f() { std::cout << std::cout; }");
    assert!(logger.contains("coutCerrMisusage"), "{:?}", logger.ids());
}

// -- determinism -------------------------------------------------------------

#[test]
fn running_the_pipeline_twice_gives_identical_diagnostics() {
    let code = "struct S { int x; S() { } };\n\
                void f(char* buf) {\n\
                    FILE* h = fopen(\"a\", \"r\");\n\
                    fwrite(buf, 1, 4, h);\n\
                    printf(\"%u\", \"xyz\");\n\
                }\n";
    let first = check(code);
    let second = check(code);
    assert_eq!(first.ids(), second.ids());
    assert!(!first.messages.is_empty());
    for (a, b) in first.messages.iter().zip(&second.messages) {
        assert_eq!(a, b);
    }
}
