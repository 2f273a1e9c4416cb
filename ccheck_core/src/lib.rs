//! Analysis core of ccheck: the token list, the symbol database and the
//! bidirectional value-flow engines.
//!
//! The pipeline is: [`tokenlist::TokenList::tokenize`] lexes and links the
//! tokens, [`symbols::SymbolDatabase::build`] discovers scopes, symbols and
//! expression ASTs and annotates value types, and [`valueflow::run_value_flow`]
//! attaches abstract [`vfvalue::Value`]s that the check rules consume.

pub mod analyzer;
mod astbuild;
pub mod astutils;
pub mod errors;
pub mod forward;
pub mod mathlib;
pub mod reverse;
pub mod symbols;
mod symbolbuild;
pub mod token;
pub mod tokenlist;
pub mod valueflow;
mod valuetype;
pub mod vf_analyzers;
pub mod vfvalue;

pub use ccheck_config as config;

use ccheck_config::Settings;
use errors::{AnalysisError, ErrorLogger};
use symbols::SymbolDatabase;
use tokenlist::TokenList;

/// A fully analyzed translation unit.
pub struct TranslationUnit {
    pub tokens: TokenList,
    pub symbols: SymbolDatabase,
}

impl TranslationUnit {
    /// Tokenize, build symbols and run value flow over `code`.
    pub fn analyze(
        code: &str,
        file: &str,
        settings: &Settings,
        logger: &mut dyn ErrorLogger,
    ) -> Result<TranslationUnit, AnalysisError> {
        let is_cpp = settings.is_cpp() || file.ends_with(".cpp") || file.ends_with(".cc");
        let mut tokens = TokenList::tokenize(code, file, is_cpp)?;
        let symbols = SymbolDatabase::build(&mut tokens, settings)?;
        valueflow::run_value_flow(&mut tokens, &symbols, settings, logger)?;
        Ok(TranslationUnit { tokens, symbols })
    }
}
