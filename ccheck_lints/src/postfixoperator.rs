//! Prefer `++i` over `i++` for class types: the postfix form creates a
//! temporary copy.

use ccheck_config::Severity;
use ccheck_core::errors::ErrorLogger;
use ccheck_core::symbols::ValueTypeKind;
use ccheck_core::token::TokenKind;

use crate::diagnostics::report;
use crate::{Check, CheckContext};

const CWE_POOR_QUALITY: u16 = 398;

pub struct CheckPostfixOperator;

impl Check for CheckPostfixOperator {
    fn name(&self) -> &'static str {
        "postfixoperator"
    }

    fn run(&self, ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger) {
        if !ctx.settings.severity.is_enabled(Severity::Performance) {
            return;
        }
        for id in ctx.tokens.ids() {
            if ctx.tokens[id].kind() != TokenKind::IncDec {
                continue;
            }
            let Some(operand) = ctx.tokens[id].ast_op1() else { continue };
            // postfix form: the operator follows its operand
            if id < operand {
                continue;
            }
            // the result must be unused
            if ctx.tokens[id].ast_parent().is_some() {
                continue;
            }
            let class_like = ctx.tokens[operand]
                .value_type()
                .is_some_and(|vt| {
                    vt.pointer == 0
                        && matches!(
                            vt.kind,
                            ValueTypeKind::Record | ValueTypeKind::Iterator
                        )
                })
                || ctx.tokens[operand]
                    .variable()
                    .is_some_and(|v| ctx.symbols.variable(v).is_class());
            if class_like {
                let op = ctx.tokens[id].str().to_string();
                report(
                    ctx,
                    logger,
                    id,
                    Severity::Performance,
                    "postfixOperator",
                    format!(
                        "Prefer prefix ++/-- operators for non-primitive types. '{op}' yields an unneeded copy."
                    ),
                    CWE_POOR_QUALITY,
                );
            }
        }
    }
}
