//! Diagnostic messages, the sink they are reported through, and the error
//! sum the engines propagate instead of unwinding.

use std::fmt;

use ccheck_config::{Certainty, Severity};

use crate::token::TokenId;

/// Position of a token in the analyzed sources.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Location {
    pub file_index: u32,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file_index, self.line, self.column)
    }
}

/// Breadcrumb list leading up to a finding.
pub type ErrorPath = Vec<(Location, String)>;

/// One finding, as delivered to the [`ErrorLogger`] sink.
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorMessage {
    /// Stable identifier, e.g. `writeReadOnlyFile`.
    pub id: String,
    pub severity: Severity,
    pub certainty: Certainty,
    pub cwe: u16,
    pub message: String,
    /// Primary location; `None` for whole-program findings without a token.
    pub location: Option<Location>,
    pub path: ErrorPath,
}

impl ErrorMessage {
    pub fn new(id: &str, severity: Severity, message: impl Into<String>) -> Self {
        ErrorMessage {
            id: id.to_string(),
            severity,
            certainty: Certainty::Normal,
            cwe: 0,
            message: message.into(),
            location: None,
            path: Vec::new(),
        }
    }

    pub fn cwe(mut self, cwe: u16) -> Self {
        self.cwe = cwe;
        self
    }

    pub fn certainty(mut self, certainty: Certainty) -> Self {
        self.certainty = certainty;
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_path(mut self, path: ErrorPath) -> Self {
        self.path = path;
        self
    }
}

/// Sink for findings and internal debug messages. Diagnostics are never
/// errors; reporting one does not stop the traversal.
pub trait ErrorLogger {
    fn report(&mut self, message: ErrorMessage);

    /// Internal conditions worth surfacing when debug warnings are on.
    fn debug_message(&mut self, _location: Option<Location>, _kind: &str, _message: &str) {}
}

/// Collects everything; the logger used by the test suites.
#[derive(Default)]
pub struct RecordingLogger {
    pub messages: Vec<ErrorMessage>,
    pub debug: Vec<String>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        RecordingLogger::default()
    }

    /// The ids of all reported findings, in report order.
    pub fn ids(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    pub fn find(&self, id: &str) -> Option<&ErrorMessage> {
        self.messages.iter().find(|m| m.id == id)
    }
}

impl ErrorLogger for RecordingLogger {
    fn report(&mut self, message: ErrorMessage) {
        self.messages.push(message);
    }

    fn debug_message(&mut self, _location: Option<Location>, kind: &str, message: &str) {
        self.debug.push(format!("{kind}: {message}"));
    }
}

/// Why an analysis could not run to completion. Only the *engine* fails this
/// way; findings flow through the sink.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalysisError {
    /// Malformed input (broken AST link, cyclic traversal). The enclosing
    /// function is skipped.
    Internal {
        token: Option<TokenId>,
        reason: String,
    },
    /// The host raised the global stop flag.
    Terminated,
}

impl AnalysisError {
    pub fn internal(token: impl Into<Option<TokenId>>, reason: impl Into<String>) -> Self {
        AnalysisError::Internal {
            token: token.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::Internal { reason, .. } => write!(f, "internal error: {reason}"),
            AnalysisError::Terminated => write!(f, "analysis terminated"),
        }
    }
}

impl std::error::Error for AnalysisError {}
