//! I/O checks: stream misuse, `FILE*` usage protocol, scanf width limits and
//! printf/scanf format-string argument matching.

use std::collections::HashMap;

use ccheck_config::Severity;
use ccheck_core::errors::ErrorLogger;
use ccheck_core::symbols::{call_argument_tokens, ValueType, ValueTypeKind, ValueTypeSign};
use ccheck_core::token::TokenId;
use if_chain::if_chain;

use crate::diagnostics::report;
use crate::{Check, CheckContext};

const CWE_BUFFER_BOUNDS: u16 = 119;
const CWE_POOR_QUALITY: u16 = 398;
const CWE_RESOURCE_LIFETIME: u16 = 664;
const CWE_ARG_COUNT: u16 = 685;
const CWE_ARG_TYPE: u16 = 686;
const CWE_ARG_VALUE: u16 = 687;
const CWE_EXPIRED_FD: u16 = 910;

pub struct CheckIo;

impl Check for CheckIo {
    fn name(&self) -> &'static str {
        "io"
    }

    fn run(&self, ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
        check_cout_cerr_misusage(ctx, logger);
        check_file_usage(ctx, logger);
        invalid_scanf(ctx, logger);
        check_wrong_printf_scanf_arguments(ctx, logger);
    }
}

// ---------------------------------------------------------------------------
// cout << cout

fn is_std_stream(ctx: &CheckContext<'_>, tok: TokenId) -> bool {
    matches!(ctx.tokens[tok].str(), "cout" | "cerr") && ctx.tokens[tok].variable().is_none()
}

fn check_cout_cerr_misusage(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    for id in ctx.tokens.ids() {
        if_chain! {
            if ctx.tokens[id].str() == "<<";
            if ctx.tokens[id].is_binary_op();
            if let Some(rhs) = ctx.tokens[id].ast_op2();
            let rhs_name = if ctx.tokens[rhs].str() == "::" {
                ctx.tokens[rhs].ast_op2().unwrap_or(rhs)
            } else {
                rhs
            };
            if is_std_stream(ctx, rhs_name);
            then {
                let stream = ctx.tokens[rhs_name].str().to_string();
                report(
                    ctx,
                    logger,
                    id,
                    Severity::Error,
                    "coutCerrMisusage",
                    format!("Invalid usage of output stream: '<< std::{stream}'."),
                    CWE_POOR_QUALITY,
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FILE* usage protocol

#[derive(Clone, Copy, PartialEq, Eq)]
enum OpenMode {
    Closed,
    Read,
    Write,
    ReadWrite,
    Unknown,
}

fn mode_from_string(mode: &str) -> OpenMode {
    if mode[1.min(mode.len())..].contains('+') {
        return OpenMode::ReadWrite;
    }
    if mode.contains('w') || mode.contains('a') {
        return OpenMode::Write;
    }
    if mode.contains('r') {
        return OpenMode::Read;
    }
    OpenMode::Unknown
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Operation {
    None,
    Unimportant,
    Read,
    Write,
    Positioning,
    Open,
    Close,
    Unknown,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum AppendMode {
    Unknown,
    Append,
    AppendExtended,
}

struct Filepointer {
    mode: OpenMode,
    mode_indent: i32,
    last_operation: Operation,
    op_indent: i32,
    append_mode: AppendMode,
    filename: Option<String>,
}

impl Filepointer {
    fn new(mode: OpenMode) -> Self {
        Filepointer {
            mode,
            mode_indent: 0,
            last_operation: Operation::None,
            op_indent: 0,
            append_mode: AppendMode::Unknown,
            filename: None,
        }
    }
}

const UNIMPORTANT_FILE_FUNCTIONS: &[&str] = &[
    "clearerr", "feof", "ferror", "fgetpos", "ftell", "setbuf", "setvbuf", "ungetc", "ungetwc",
];

fn is_file_variable(ctx: &CheckContext<'_>, var: &ccheck_core::symbols::Variable) -> bool {
    if var.is_array() || var.declaration_id == 0 {
        return false;
    }
    var.type_start
        .is_some_and(|t| ctx.tokens[t].str() == "FILE")
        && var.is_pointer()
}

fn check_file_usage(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    let windows = ctx.settings.platform.is_windows();
    let mut filepointers: HashMap<u32, Filepointer> = HashMap::new();

    for slot in ctx.symbols.variable_list().iter().flatten() {
        let var = ctx.symbols.variable(*slot);
        if !is_file_variable(ctx, var) {
            continue;
        }
        let mode = if var.is_local() {
            OpenMode::Closed
        } else {
            OpenMode::Unknown
        };
        filepointers.insert(var.declaration_id, Filepointer::new(mode));
    }

    for &scope_id in ctx.symbols.function_scopes() {
        let scope = ctx.symbols.scope(scope_id);
        let (Some(body_start), Some(body_end)) = (scope.body_start, scope.body_end) else {
            continue;
        };
        let mut indent = 0i32;
        let mut tok = body_start;
        while let Some(next) = ctx.tokens.next(tok) {
            if next >= body_end {
                break;
            }
            tok = next;
            match ctx.tokens[tok].str() {
                "{" => indent += 1,
                "}" => {
                    indent -= 1;
                    for fp in filepointers.values_mut() {
                        if indent < fp.mode_indent {
                            fp.mode_indent = 0;
                            fp.mode = OpenMode::Unknown;
                        }
                        if indent < fp.op_indent {
                            fp.op_indent = 0;
                            fp.last_operation = Operation::Unknown;
                        }
                    }
                }
                "return" | "continue" | "break" => {
                    // control leaves; the tracked state does not survive
                    for fp in filepointers.values_mut() {
                        fp.mode_indent = 0;
                        fp.mode = OpenMode::Unknown;
                        fp.op_indent = 0;
                        fp.last_operation = Operation::Unknown;
                    }
                }
                _ => {
                    if file_reassignment(ctx, tok, &mut filepointers, windows) {
                        continue;
                    }
                    file_operation(ctx, logger, tok, &mut filepointers, indent, windows);
                }
            }
        }
        for fp in filepointers.values_mut() {
            fp.op_indent = 0;
            fp.mode = OpenMode::Unknown;
            fp.last_operation = Operation::Unknown;
        }
    }
}

/// `f = something_else` loses the tracked state unless it is an open call.
fn file_reassignment(
    ctx: &CheckContext<'_>,
    tok: TokenId,
    filepointers: &mut HashMap<u32, Filepointer>,
    windows: bool,
) -> bool {
    if_chain! {
        if ctx.tokens[tok].var_id() != 0;
        if ctx.tokens.is(ctx.tokens.next(tok), "=");
        let rhs = ctx.tokens.str_at(tok, 2);
        if !matches!(rhs, "fopen" | "freopen" | "tmpfile");
        if !(windows && matches!(rhs, "_wfopen" | "_wfreopen"));
        if let Some(fp) = filepointers.get_mut(&ctx.tokens[tok].var_id());
        then {
            fp.mode = OpenMode::Unknown;
            fp.last_operation = Operation::Unknown;
            true
        } else {
            false
        }
    }
}

fn file_operation(
    ctx: &CheckContext<'_>,
    logger: &mut dyn ErrorLogger,
    tok: TokenId,
    filepointers: &mut HashMap<u32, Filepointer>,
    indent: i32,
    windows: bool,
) {
    let t = &ctx.tokens[tok];
    if !t.is_name() || !ctx.tokens.is(ctx.tokens.next(tok), "(") {
        return;
    }
    if let Some(prev) = ctx.tokens.prev(tok) {
        if ctx.tokens[prev].is_name() && !matches!(ctx.tokens[prev].str(), "return" | "throw") {
            return;
        }
    }
    let name = t.str().to_string();
    let open_paren = ctx.tokens.next(tok).unwrap();
    let first_arg = ctx.tokens.next(open_paren);

    let mut mode = String::new();
    let mut file_tok: Option<TokenId> = None;
    let mut file_name_tok: Option<TokenId> = None;
    let mut operation = Operation::None;

    if matches!(name.as_str(), "fopen" | "freopen" | "tmpfile")
        || (windows && matches!(name.as_str(), "_wfopen" | "_wfreopen"))
    {
        if ctx.tokens.str_at(tok, -1) != "=" {
            return;
        }
        if name != "tmpfile" {
            let mode_tok = first_arg.and_then(|a| ctx.tokens.next_argument(a));
            if let Some(mode_tok) = mode_tok.filter(|&m| ctx.tokens[m].is_string()) {
                mode = ctx.tokens[mode_tok].str_value().to_string();
            }
        } else {
            mode = "wb+".to_string();
        }
        file_tok = ctx.tokens.tok_at(tok, -2);
        operation = Operation::Open;
        if name == "fopen" && first_arg.is_some_and(|a| ctx.tokens[a].is_string()) {
            file_name_tok = first_arg;
        }
    } else if matches!(name.as_str(), "rewind" | "fseek" | "fsetpos" | "fflush")
        || (windows && name == "_fseeki64")
    {
        file_tok = first_arg;
        if name == "fflush" {
            if let Some(file_tok) = file_tok {
                if ctx.tokens[file_tok].str() == "stdin" {
                    fflush_on_input_stream_error(ctx, logger, tok, "stdin");
                } else if filepointers
                    .get(&ctx.tokens[file_tok].var_id())
                    .is_some_and(|fp| fp.mode == OpenMode::Read)
                {
                    let stream = ctx.tokens[file_tok].str().to_string();
                    fflush_on_input_stream_error(ctx, logger, tok, &stream);
                }
            }
        }
        operation = Operation::Positioning;
    } else if matches!(
        name.as_str(),
        "fgetc" | "fgetwc" | "fgets" | "fgetws" | "fread" | "fscanf" | "fwscanf" | "getc"
    ) || (windows && matches!(name.as_str(), "fscanf_s" | "fwscanf_s"))
    {
        file_tok = if name.contains("scanf") {
            first_arg
        } else {
            // stream is the last argument
            ctx.tokens.link_at(tok, 1).and_then(|c| ctx.tokens.prev(c))
        };
        operation = Operation::Read;
    } else if matches!(
        name.as_str(),
        "fputc" | "fputwc" | "fputs" | "fputws" | "fwrite" | "fprintf" | "fwprintf"
    ) || (windows && matches!(name.as_str(), "fprintf_s" | "fwprintf_s"))
    {
        file_tok = if name.contains("printf") {
            first_arg
        } else {
            ctx.tokens.link_at(tok, 1).and_then(|c| ctx.tokens.prev(c))
        };
        operation = Operation::Write;
    } else if name == "fclose" {
        file_tok = first_arg;
        operation = Operation::Close;
    } else if UNIMPORTANT_FILE_FUNCTIONS.contains(&name.as_str()) {
        file_tok = first_arg;
        if matches!(name.as_str(), "ungetc" | "ungetwc") {
            file_tok = file_tok.and_then(|f| ctx.tokens.next_argument(f));
        }
        operation = Operation::Unimportant;
    } else if !matches!(name.as_str(), "if" | "for" | "while" | "catch" | "switch")
        && !ctx.settings.library.is_function_const(&name, true)
    {
        // an unknown function that receives the pointer resets the state
        let end = ctx.tokens.link_at(tok, 1);
        let mut cur = first_arg;
        while let (Some(c), Some(end)) = (cur, end) {
            if c >= end {
                break;
            }
            if ctx.tokens[c].var_id() != 0
                && filepointers.contains_key(&ctx.tokens[c].var_id())
            {
                file_tok = Some(c);
                operation = Operation::Unknown;
                break;
            }
            cur = ctx.tokens.next(c);
        }
    }

    // `obj.member` file accesses: follow to the member
    let mut file_tok = file_tok;
    while let Some(f) = file_tok {
        if ctx.tokens[f].is_name() && ctx.tokens.is(ctx.tokens.next(f), ".") {
            file_tok = ctx.tokens.tok_at(f, 2);
        } else {
            break;
        }
    }
    let Some(file_tok) = file_tok else { return };
    let var_id = ctx.tokens[file_tok].var_id();
    if var_id == 0 || ctx.tokens.str_at(file_tok, 1) == "[" {
        return;
    }
    // a file function call marks the variable as a stream
    let fp = filepointers
        .entry(var_id)
        .or_insert_with(|| Filepointer::new(OpenMode::Unknown));
    let fp_mode = fp.mode;
    let fp_append = fp.append_mode;
    let fp_last = fp.last_operation;

    match operation {
        Operation::Open => {
            if let Some(name_tok) = file_name_tok {
                let opened = ctx.tokens[name_tok].str_value().to_string();
                let clash = filepointers.values().any(|other| {
                    other.filename.as_deref() == Some(opened.as_str())
                        && matches!(other.mode, OpenMode::ReadWrite | OpenMode::Write)
                });
                if clash {
                    incompatible_file_open_error(ctx, logger, tok, &opened);
                }
                let fp = filepointers.get_mut(&var_id).unwrap();
                fp.filename = Some(opened);
            }
            let fp = filepointers.get_mut(&var_id).unwrap();
            fp.mode = mode_from_string(&mode);
            fp.append_mode = if mode.contains('a') {
                if fp.mode == OpenMode::ReadWrite {
                    AppendMode::AppendExtended
                } else {
                    AppendMode::Append
                }
            } else {
                AppendMode::Unknown
            };
            fp.mode_indent = indent;
        }
        Operation::Positioning => {
            if fp_mode == OpenMode::Closed {
                use_closed_file_error(ctx, logger, tok);
            } else if fp_append == AppendMode::Append && name != "fflush" {
                seek_on_appended_file_error(ctx, logger, tok);
            }
        }
        Operation::Read => {
            if fp_mode == OpenMode::Closed {
                use_closed_file_error(ctx, logger, tok);
            } else if fp_mode == OpenMode::Write {
                read_write_only_file_error(ctx, logger, tok);
            } else if fp_last == Operation::Write {
                io_without_positioning_error(ctx, logger, tok);
            }
        }
        Operation::Write => {
            if fp_mode == OpenMode::Closed {
                use_closed_file_error(ctx, logger, tok);
            } else if fp_mode == OpenMode::Read {
                write_read_only_file_error(ctx, logger, tok);
            } else if fp_last == Operation::Read {
                io_without_positioning_error(ctx, logger, tok);
            }
        }
        Operation::Close => {
            let fp = filepointers.get_mut(&var_id).unwrap();
            if fp.mode == OpenMode::Closed {
                use_closed_file_error(ctx, logger, tok);
            } else {
                fp.mode = OpenMode::Closed;
            }
            fp.mode_indent = indent;
        }
        Operation::Unimportant => {
            if fp_mode == OpenMode::Closed {
                use_closed_file_error(ctx, logger, tok);
            }
        }
        Operation::Unknown => {
            let fp = filepointers.get_mut(&var_id).unwrap();
            fp.mode = OpenMode::Unknown;
            fp.mode_indent = 0;
        }
        Operation::None => {}
    }
    if operation != Operation::None && operation != Operation::Unimportant {
        let fp = filepointers.get_mut(&var_id).unwrap();
        fp.op_indent = indent;
        fp.last_operation = operation;
    }
}

fn fflush_on_input_stream_error(
    ctx: &CheckContext<'_>,
    logger: &mut dyn ErrorLogger,
    tok: TokenId,
    stream: &str,
) {
    report(
        ctx,
        logger,
        tok,
        Severity::Portability,
        "fflushOnInputStream",
        format!("fflush() called on input stream '{stream}' may result in undefined behaviour on non-linux systems."),
        CWE_POOR_QUALITY,
    );
}

fn io_without_positioning_error(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger, tok: TokenId) {
    report(
        ctx,
        logger,
        tok,
        Severity::Error,
        "IOWithoutPositioning",
        "Read and write operations without a call to a positioning function (fseek, fsetpos or rewind) or fflush in between result in undefined behaviour.",
        CWE_RESOURCE_LIFETIME,
    );
}

fn read_write_only_file_error(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger, tok: TokenId) {
    report(
        ctx,
        logger,
        tok,
        Severity::Error,
        "readWriteOnlyFile",
        "Read operation on a file that was opened only for writing.",
        CWE_RESOURCE_LIFETIME,
    );
}

fn write_read_only_file_error(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger, tok: TokenId) {
    report(
        ctx,
        logger,
        tok,
        Severity::Error,
        "writeReadOnlyFile",
        "Write operation on a file that was opened only for reading.",
        CWE_RESOURCE_LIFETIME,
    );
}

fn use_closed_file_error(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger, tok: TokenId) {
    report(
        ctx,
        logger,
        tok,
        Severity::Error,
        "useClosedFile",
        "Used file that is not opened.",
        CWE_EXPIRED_FD,
    );
}

fn seek_on_appended_file_error(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger, tok: TokenId) {
    report(
        ctx,
        logger,
        tok,
        Severity::Warning,
        "seekOnAppendedFile",
        "Repositioning operation performed on a file opened in append mode has no effect.",
        CWE_POOR_QUALITY,
    );
}

fn incompatible_file_open_error(
    ctx: &CheckContext<'_>,
    logger: &mut dyn ErrorLogger,
    tok: TokenId,
    filename: &str,
) {
    report(
        ctx,
        logger,
        tok,
        Severity::Warning,
        "incompatibleFileOpen",
        format!("The file '{filename}' is opened for read and write access at the same time on different streams"),
        CWE_RESOURCE_LIFETIME,
    );
}

// ---------------------------------------------------------------------------
// scanf without width limits

fn invalid_scanf(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    if !ctx.settings.severity.is_enabled(Severity::Warning) {
        return;
    }
    for id in ctx.tokens.ids() {
        let Some(info) = format_call(ctx, id) else { continue };
        if !info.scan {
            continue;
        }
        let format = ctx.tokens[info.format_tok].str_value().to_string();
        let mut chars = format.chars().peekable();
        let mut in_spec = false;
        while let Some(c) = chars.next() {
            if !in_spec {
                if c == '%' {
                    in_spec = true;
                }
                continue;
            }
            match c {
                '%' => in_spec = false,
                '*' | '.' | '0'..='9' => in_spec = false,
                's' | '[' => {
                    // no width limit before the conversion
                    report(
                        ctx,
                        logger,
                        id,
                        Severity::Warning,
                        "invalidscanf",
                        "scanf without field width limits can crash with huge input data.",
                        CWE_ARG_VALUE,
                    );
                    in_spec = false;
                }
                'h' | 'l' | 'j' | 'z' | 't' | 'L' => {}
                _ => in_spec = false,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// format string argument matching

struct FormatCall {
    format_tok: TokenId,
    /// AST roots of the arguments after the format string
    args: Vec<TokenId>,
    scan: bool,
}

/// Recognize a call to a configured format-string function at `tok`.
fn format_call(ctx: &CheckContext<'_>, tok: TokenId) -> Option<FormatCall> {
    let t = &ctx.tokens[tok];
    if !t.is_name() || !ctx.tokens.is(ctx.tokens.next(tok), "(") {
        return None;
    }
    let record = ctx.settings.library.format_str_info(t.str())?;
    let open = ctx.tokens.next(tok)?;
    let all_args = call_argument_tokens(ctx.tokens, open);
    let format_index = record.arg.checked_sub(1)?;
    let format_tok = *all_args.get(format_index)?;
    if !ctx.tokens[format_tok].is_string() {
        return None;
    }
    Some(FormatCall {
        format_tok,
        args: all_args.get(format_index + 1..).unwrap_or(&[]).to_vec(),
        scan: record.scan,
    })
}

struct Spec {
    positional: Option<usize>,
    width: Option<u64>,
    has_star_width: bool,
    suppressed: bool,
    length: String,
    conversion: char,
}

/// Parse one `%...` specifier starting after the `%`.
fn parse_spec(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, scan: bool) -> Option<Spec> {
    let mut spec = Spec {
        positional: None,
        width: None,
        has_star_width: false,
        suppressed: false,
        length: String::new(),
        conversion: ' ',
    };
    // positional n$
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            digits.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if chars.peek() == Some(&'$') {
        chars.next();
        spec.positional = digits.parse::<usize>().ok();
        digits.clear();
    }
    // flags and assignment suppression
    while let Some(&c) = chars.peek() {
        match c {
            '-' | '+' | ' ' | '#' | '\'' => {
                chars.next();
            }
            '*' if scan => {
                spec.suppressed = true;
                chars.next();
            }
            '0' if digits.is_empty() => {
                chars.next();
            }
            _ => break,
        }
    }
    // width
    if !digits.is_empty() {
        spec.width = digits.parse().ok();
    } else {
        let mut width = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() {
                width.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if !width.is_empty() {
            spec.width = width.parse().ok();
        } else if chars.peek() == Some(&'*') && !scan {
            spec.has_star_width = true;
            chars.next();
        }
    }
    // precision
    if chars.peek() == Some(&'.') {
        chars.next();
        if chars.peek() == Some(&'*') {
            spec.has_star_width = true;
            chars.next();
        } else {
            while chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                chars.next();
            }
        }
    }
    // length modifier
    while let Some(&c) = chars.peek() {
        match c {
            'h' | 'l' => {
                spec.length.push(c);
                chars.next();
                if spec.length.len() >= 2 {
                    break;
                }
                if chars.peek() != Some(&c) {
                    break;
                }
            }
            'j' | 'z' | 't' | 'L' | 'q' => {
                spec.length.push(c);
                chars.next();
                break;
            }
            'I' => {
                spec.length.push(c);
                chars.next();
                for _ in 0..2 {
                    if chars.peek().is_some_and(|d| d.is_ascii_digit()) {
                        spec.length.push(chars.next().unwrap());
                    }
                }
                break;
            }
            _ => break,
        }
    }
    // scanf %[...] set
    if chars.peek() == Some(&'[') {
        chars.next();
        while let Some(c) = chars.next() {
            if c == ']' {
                break;
            }
        }
        spec.conversion = '[';
        return Some(spec);
    }
    spec.conversion = chars.next()?;
    Some(spec)
}

fn check_wrong_printf_scanf_arguments(ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
    for id in ctx.tokens.ids() {
        let Some(call) = format_call(ctx, id) else { continue };
        check_format_string(ctx, logger, id, &call);
    }
}

fn check_format_string(
    ctx: &CheckContext<'_>,
    logger: &mut dyn ErrorLogger,
    call_tok: TokenId,
    call: &FormatCall,
) {
    let name = ctx.tokens[call_tok].str().to_string();
    let format = ctx.tokens[call.format_tok].str_value().to_string();
    let windows = ctx.settings.platform.is_windows();

    let mut chars = format.chars().peekable();
    let mut num_format = 0usize;
    let mut num_star = 0usize;
    let mut uses_positional = false;

    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
            continue;
        }
        if c != '%' {
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            continue;
        }
        let Some(spec) = parse_spec(&mut chars, call.scan) else { break };
        if spec.conversion == 'm' {
            // glibc %m takes no argument
            continue;
        }
        if !spec.length.is_empty() && spec.length.starts_with('I') && !windows {
            report(
                ctx,
                logger,
                call_tok,
                Severity::Portability,
                "invalidLengthModifier",
                format!(
                    "'{}' in format string (no. {}) is a Microsoft extension length modifier.",
                    spec.length,
                    num_format + 1
                ),
                CWE_ARG_TYPE,
            );
        }
        if spec.suppressed {
            continue;
        }
        if spec.has_star_width {
            num_star += 1;
        }
        num_format += 1;
        let arg_index = match spec.positional {
            Some(p) => {
                uses_positional = true;
                if p == 0 || p > call.args.len() {
                    report(
                        ctx,
                        logger,
                        call_tok,
                        Severity::Error,
                        "wrongPrintfScanfParameterPositionError",
                        format!(
                            "{name}: referencing parameter {p} while {} arguments given",
                            call.args.len()
                        ),
                        CWE_ARG_COUNT,
                    );
                    continue;
                }
                p - 1
            }
            None => num_format + num_star - 1,
        };
        let Some(&arg_tok) = call.args.get(arg_index) else {
            continue; // counted later as an argument-number mismatch
        };
        if call.scan {
            check_scanf_argument(ctx, logger, call_tok, &spec, arg_tok, num_format);
        } else {
            check_printf_argument(ctx, logger, call_tok, &spec, arg_tok, num_format);
        }
    }

    if !uses_positional {
        let wanted = num_format + num_star;
        let given = call.args.len();
        if wanted != given {
            let severity = if wanted > given {
                Severity::Error
            } else {
                Severity::Warning
            };
            report(
                ctx,
                logger,
                call_tok,
                severity,
                "wrongPrintfScanfArgNum",
                format!(
                    "{name} format string requires {wanted} parameters but {} given.",
                    if given < wanted {
                        format!("only {given} are")
                    } else {
                        format!("{given} are")
                    }
                ),
                CWE_ARG_COUNT,
            );
        }
    }
}

/// The integer kind a length modifier selects.
fn expected_int_kind(ctx: &CheckContext<'_>, length: &str, unsigned: bool) -> (ValueTypeKind, String) {
    let platform = &ctx.settings.platform;
    let size_kind = |bytes: u32| {
        if bytes == platform.sizeof_int {
            ValueTypeKind::Int
        } else if bytes == platform.sizeof_long {
            ValueTypeKind::Long
        } else {
            ValueTypeKind::LongLong
        }
    };
    match length {
        "" => (
            ValueTypeKind::Int,
            if unsigned { "unsigned int" } else { "int" }.to_string(),
        ),
        "hh" => (
            ValueTypeKind::Char,
            if unsigned { "unsigned char" } else { "signed char" }.to_string(),
        ),
        "h" => (
            ValueTypeKind::Short,
            if unsigned { "unsigned short" } else { "short" }.to_string(),
        ),
        "l" => (
            ValueTypeKind::Long,
            if unsigned { "unsigned long" } else { "long" }.to_string(),
        ),
        "ll" | "q" => (
            ValueTypeKind::LongLong,
            if unsigned { "unsigned long long" } else { "long long" }.to_string(),
        ),
        "j" => (ValueTypeKind::LongLong, "intmax_t".to_string()),
        "z" => (size_kind(platform.sizeof_size_t), "size_t".to_string()),
        "t" => (size_kind(platform.sizeof_pointer), "ptrdiff_t".to_string()),
        "I" => (size_kind(platform.sizeof_size_t), "size_t".to_string()),
        "I32" => (ValueTypeKind::Int, "__int32".to_string()),
        "I64" => (ValueTypeKind::LongLong, "__int64".to_string()),
        _ => (ValueTypeKind::Int, "int".to_string()),
    }
}

fn promoted_kind(kind: ValueTypeKind) -> ValueTypeKind {
    if kind < ValueTypeKind::Int && kind >= ValueTypeKind::Bool {
        ValueTypeKind::Int
    } else {
        kind
    }
}

fn argument_description(ctx: &CheckContext<'_>, arg_tok: TokenId) -> String {
    match ctx.tokens[arg_tok].value_type() {
        Some(vt) => vt.display(),
        None => "unknown".to_string(),
    }
}

fn effective_pointer(ctx: &CheckContext<'_>, arg_tok: TokenId, vt: &ValueType) -> u32 {
    let array_extra = ctx.tokens[arg_tok]
        .variable()
        .map(|v| ctx.symbols.variable(v))
        .is_some_and(|v| v.is_array()) as u32;
    vt.pointer + array_extra
}

fn check_printf_argument(
    ctx: &CheckContext<'_>,
    logger: &mut dyn ErrorLogger,
    call_tok: TokenId,
    spec: &Spec,
    arg_tok: TokenId,
    num_format: usize,
) {
    let Some(vt) = ctx.tokens[arg_tok].value_type().cloned() else {
        return;
    };
    let arg_desc = argument_description(ctx, arg_tok);
    let pointer = effective_pointer(ctx, arg_tok, &vt);
    let spec_str = format!("%{}{}", spec.length, spec.conversion);
    match spec.conversion {
        'd' | 'i' => {
            let (kind, type_name) = expected_int_kind(ctx, &spec.length, false);
            if pointer > 0 || !vt.is_integral() {
                report(
                    ctx,
                    logger,
                    call_tok,
                    Severity::Error,
                    "invalidPrintfArgType_sint",
                    format!(
                        "{spec_str} in format string (no. {num_format}) requires '{type_name}' but the argument type is '{arg_desc}'."
                    ),
                    CWE_ARG_TYPE,
                );
            } else if promoted_kind(vt.kind) != kind || vt.sign == ValueTypeSign::Unsigned {
                let severity = if !vt.original_type_name.is_empty()
                    || matches!(spec.length.as_str(), "z" | "t" | "j")
                {
                    Severity::Portability
                } else {
                    Severity::Warning
                };
                report(
                    ctx,
                    logger,
                    call_tok,
                    severity,
                    "invalidPrintfArgType_sint",
                    format!(
                        "{spec_str} in format string (no. {num_format}) requires '{type_name}' but the argument type is '{arg_desc}'."
                    ),
                    CWE_ARG_TYPE,
                );
            }
        }
        'u' | 'x' | 'X' | 'o' => {
            let (kind, type_name) = expected_int_kind(ctx, &spec.length, true);
            if pointer > 0 || !vt.is_integral() {
                report(
                    ctx,
                    logger,
                    call_tok,
                    Severity::Error,
                    "invalidPrintfArgType_uint",
                    format!(
                        "{spec_str} in format string (no. {num_format}) requires '{type_name}' but the argument type is '{arg_desc}'."
                    ),
                    CWE_ARG_TYPE,
                );
            } else if promoted_kind(vt.kind) != kind
                || (spec.conversion == 'u' && vt.sign == ValueTypeSign::Signed)
            {
                let severity = if !vt.original_type_name.is_empty()
                    || matches!(spec.length.as_str(), "z" | "t" | "j")
                {
                    Severity::Portability
                } else {
                    Severity::Warning
                };
                report(
                    ctx,
                    logger,
                    call_tok,
                    severity,
                    "invalidPrintfArgType_uint",
                    format!(
                        "{spec_str} in format string (no. {num_format}) requires '{type_name}' but the argument type is '{arg_desc}'."
                    ),
                    CWE_ARG_TYPE,
                );
            }
        }
        'e' | 'E' | 'f' | 'g' | 'G' | 'a' | 'A' => {
            let expected = if spec.length == "L" { "long double" } else { "double" };
            if pointer > 0 || !vt.is_float_kind() {
                report(
                    ctx,
                    logger,
                    call_tok,
                    Severity::Error,
                    "invalidPrintfArgType_float",
                    format!(
                        "{spec_str} in format string (no. {num_format}) requires '{expected}' but the argument type is '{arg_desc}'."
                    ),
                    CWE_ARG_TYPE,
                );
            }
        }
        's' => {
            let expected_kind = if spec.length == "l" {
                ValueTypeKind::Wchar
            } else {
                ValueTypeKind::Char
            };
            let expected = if spec.length == "l" { "const wchar_t *" } else { "const char *" };
            let is_string_like = vt
                .container
                .as_deref()
                .and_then(|c| ctx.settings.library.container(c))
                .is_some_and(|c| c.std_string_like);
            if pointer == 0 || vt.kind != expected_kind || is_string_like {
                report(
                    ctx,
                    logger,
                    call_tok,
                    Severity::Error,
                    "invalidPrintfArgType_s",
                    format!(
                        "{spec_str} in format string (no. {num_format}) requires '{expected}' but the argument type is '{arg_desc}'."
                    ),
                    CWE_ARG_TYPE,
                );
            }
        }
        'p' => {
            if pointer == 0 {
                report(
                    ctx,
                    logger,
                    call_tok,
                    Severity::Error,
                    "invalidPrintfArgType_p",
                    format!(
                        "%p in format string (no. {num_format}) requires an address but the argument type is '{arg_desc}'."
                    ),
                    CWE_ARG_TYPE,
                );
            }
        }
        'n' => {
            let writable_int = pointer == 1 && vt.is_integral() && !vt.is_const(1);
            if !writable_int {
                report(
                    ctx,
                    logger,
                    call_tok,
                    Severity::Error,
                    "invalidPrintfArgType_n",
                    format!(
                        "%n in format string (no. {num_format}) requires 'int *' but the argument type is '{arg_desc}'."
                    ),
                    CWE_ARG_TYPE,
                );
            }
        }
        'c' => {
            if pointer > 0 || !vt.is_integral() {
                report(
                    ctx,
                    logger,
                    call_tok,
                    Severity::Error,
                    "invalidPrintfArgType_sint",
                    format!(
                        "%c in format string (no. {num_format}) requires 'int' but the argument type is '{arg_desc}'."
                    ),
                    CWE_ARG_TYPE,
                );
            }
        }
        _ => {}
    }
}

fn check_scanf_argument(
    ctx: &CheckContext<'_>,
    logger: &mut dyn ErrorLogger,
    call_tok: TokenId,
    spec: &Spec,
    arg_tok: TokenId,
    num_format: usize,
) {
    let Some(vt) = ctx.tokens[arg_tok].value_type().cloned() else {
        return;
    };
    let arg_desc = argument_description(ctx, arg_tok);
    let pointer = effective_pointer(ctx, arg_tok, &vt);
    let spec_str = format!("%{}{}{}", spec.width.map(|w| w.to_string()).unwrap_or_default(), spec.length, spec.conversion);
    match spec.conversion {
        'd' | 'i' | 'u' | 'x' | 'X' | 'o' => {
            let unsigned = matches!(spec.conversion, 'u' | 'x' | 'X' | 'o');
            let (kind, type_name) = expected_int_kind(ctx, &spec.length, unsigned);
            let ok = pointer == 1
                && vt.is_integral()
                && vt.kind == kind
                && (vt.sign == ValueTypeSign::Unsigned) == unsigned;
            if !ok {
                let severity = if pointer == 1
                    && vt.is_integral()
                    && (!vt.original_type_name.is_empty()
                        || matches!(spec.length.as_str(), "z" | "t" | "j"))
                {
                    Severity::Portability
                } else if pointer == 1 && vt.is_integral() {
                    Severity::Warning
                } else {
                    Severity::Error
                };
                report(
                    ctx,
                    logger,
                    call_tok,
                    severity,
                    "invalidScanfArgType_int",
                    format!(
                        "{spec_str} in format string (no. {num_format}) requires '{type_name} *' but the argument type is '{arg_desc}'."
                    ),
                    CWE_ARG_TYPE,
                );
            }
        }
        'f' | 'e' | 'E' | 'g' | 'G' | 'a' => {
            let expected_kind = match spec.length.as_str() {
                "l" => ValueTypeKind::Double,
                "L" => ValueTypeKind::LongDouble,
                _ => ValueTypeKind::Float,
            };
            let type_name = match spec.length.as_str() {
                "l" => "double",
                "L" => "long double",
                _ => "float",
            };
            let ok = pointer == 1 && vt.kind == expected_kind;
            if !ok {
                let severity = if pointer == 1 && vt.is_float_kind() {
                    Severity::Warning
                } else {
                    Severity::Error
                };
                report(
                    ctx,
                    logger,
                    call_tok,
                    severity,
                    "invalidScanfArgType_float",
                    format!(
                        "{spec_str} in format string (no. {num_format}) requires '{type_name} *' but the argument type is '{arg_desc}'."
                    ),
                    CWE_ARG_TYPE,
                );
            }
        }
        's' | '[' | 'c' => {
            let writable_chars = pointer >= 1 && vt.kind == ValueTypeKind::Char && !vt.is_const(0);
            if !writable_chars {
                report(
                    ctx,
                    logger,
                    call_tok,
                    Severity::Error,
                    "invalidScanfArgType_s",
                    format!(
                        "{spec_str} in format string (no. {num_format}) requires a 'char *' but the argument type is '{arg_desc}'."
                    ),
                    CWE_ARG_TYPE,
                );
                return;
            }
            // field width must leave room for the terminator
            if_chain! {
                if let Some(width) = spec.width;
                if let Some(var) = ctx.tokens[arg_tok].variable();
                let var = ctx.symbols.variable(var);
                if var.is_array();
                if let Some(dim) = var.dimensions.first().and_then(|d| d.size);
                then {
                    let reserve = if spec.conversion == 'c' { 0 } else { 1 };
                    if width as i128 > dim - reserve {
                        report(
                            ctx,
                            logger,
                            call_tok,
                            Severity::Error,
                            "invalidScanfFormatWidth",
                            format!(
                                "Width {width} given in format string (no. {num_format}) is larger than destination buffer '{}[{dim}]', use %{}{} to prevent overflowing it.",
                                var.name,
                                dim - reserve,
                                spec.conversion
                            ),
                            CWE_BUFFER_BOUNDS,
                        );
                    }
                }
            }
        }
        'p' => {
            if pointer < 2 {
                report(
                    ctx,
                    logger,
                    call_tok,
                    Severity::Error,
                    "invalidScanfArgType_s",
                    format!(
                        "%p in format string (no. {num_format}) requires a 'void **' but the argument type is '{arg_desc}'."
                    ),
                    CWE_ARG_TYPE,
                );
            }
        }
        _ => {}
    }
}
