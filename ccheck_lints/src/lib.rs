//! Check rules of the ccheck analyzer.
//!
//! Every check consumes the analyzed translation unit through
//! [`CheckContext`]: resolved symbols, value types and value-flow results.
//! The registry is constructed explicitly at startup so check order is
//! deterministic.

pub mod autovariables;
pub mod class;
pub mod ctu;
mod diagnostics;
pub mod io;
pub mod postfixoperator;
pub mod string;
pub mod threadsafety;
pub mod vaarg;

use ccheck_config::Settings;
use ccheck_core::errors::ErrorLogger;
use ccheck_core::symbols::SymbolDatabase;
use ccheck_core::tokenlist::TokenList;
use ccheck_core::TranslationUnit;

/// Read surface the checks operate on.
pub struct CheckContext<'a> {
    pub tokens: &'a TokenList,
    pub symbols: &'a SymbolDatabase,
    pub settings: &'a Settings,
}

pub trait Check {
    fn name(&self) -> &'static str;
    fn run(&self, ctx: &CheckContext<'_>, logger: &mut dyn ErrorLogger);
}

/// All checks, in a fixed order.
pub fn default_checks() -> Vec<Box<dyn Check>> {
    vec![
        Box::new(io::CheckIo),
        Box::new(vaarg::CheckVaarg),
        Box::new(autovariables::CheckAutoVariables),
        Box::new(class::CheckClass),
        Box::new(string::CheckString),
        Box::new(postfixoperator::CheckPostfixOperator),
        Box::new(threadsafety::CheckThreadSafety),
    ]
}

/// Run every registered check over one analyzed translation unit.
pub fn run_checks(tu: &TranslationUnit, settings: &Settings, logger: &mut dyn ErrorLogger) {
    let ctx = CheckContext {
        tokens: &tu.tokens,
        symbols: &tu.symbols,
        settings,
    };
    for check in default_checks() {
        check.run(&ctx, logger);
    }
}
