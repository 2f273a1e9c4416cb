//! Reporting helpers shared by the checks.

use ccheck_config::{Certainty, Severity};
use ccheck_core::errors::{ErrorLogger, ErrorMessage, ErrorPath};
use ccheck_core::token::TokenId;
use ccheck_core::vfvalue::Value;

use crate::CheckContext;

pub(crate) fn report(
    ctx: &CheckContext<'_>,
    logger: &mut dyn ErrorLogger,
    tok: TokenId,
    severity: Severity,
    id: &str,
    message: impl Into<String>,
    cwe: u16,
) {
    if !ctx.settings.severity.is_enabled(severity) {
        return;
    }
    logger.report(
        ErrorMessage::new(id, severity, message)
            .cwe(cwe)
            .at(ctx.tokens[tok].location()),
    );
}

pub(crate) fn report_with_path(
    ctx: &CheckContext<'_>,
    logger: &mut dyn ErrorLogger,
    tok: TokenId,
    severity: Severity,
    id: &str,
    message: impl Into<String>,
    cwe: u16,
    path: ErrorPath,
) {
    if !ctx.settings.severity.is_enabled(severity) {
        return;
    }
    logger.report(
        ErrorMessage::new(id, severity, message)
            .cwe(cwe)
            .at(ctx.tokens[tok].location())
            .with_path(path),
    );
}

pub(crate) fn report_inconclusive(
    ctx: &CheckContext<'_>,
    logger: &mut dyn ErrorLogger,
    tok: TokenId,
    severity: Severity,
    id: &str,
    message: impl Into<String>,
    cwe: u16,
) {
    if !ctx.settings.certainty_inconclusive || !ctx.settings.severity.is_enabled(severity) {
        return;
    }
    logger.report(
        ErrorMessage::new(id, severity, message)
            .cwe(cwe)
            .certainty(Certainty::Inconclusive)
            .at(ctx.tokens[tok].location()),
    );
}

/// Turn a value's breadcrumbs into a reportable error path.
pub(crate) fn value_error_path(ctx: &CheckContext<'_>, value: &Value) -> ErrorPath {
    value
        .error_path
        .iter()
        .map(|(tok, note)| (ctx.tokens[*tok].location(), note.clone()))
        .collect()
}
