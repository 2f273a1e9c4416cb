use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;

use crate::library::Library;
use crate::platform::Platform;

/// How serious a diagnostic is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Style,
    Performance,
    Portability,
    Information,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Style => "style",
            Severity::Performance => "performance",
            Severity::Portability => "portability",
            Severity::Information => "information",
        }
    }
}

/// How sure the analyzer is about a diagnostic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Certainty {
    #[default]
    Normal,
    Inconclusive,
}

/// Language standard the translation unit is parsed under.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Standard {
    C89,
    C99,
    C11,
    Cpp03,
    Cpp11,
    Cpp14,
    #[default]
    Cpp17,
    Cpp20,
}

impl Standard {
    pub fn is_cpp(self) -> bool {
        self >= Standard::Cpp03
    }
}

/// Which severities are enabled. `Error` is always on.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SeverityToggles {
    enabled: Vec<Severity>,
}

impl SeverityToggles {
    pub fn all() -> Self {
        SeverityToggles {
            enabled: vec![
                Severity::Warning,
                Severity::Style,
                Severity::Performance,
                Severity::Portability,
                Severity::Information,
            ],
        }
    }

    pub fn enable(&mut self, severity: Severity) {
        if !self.enabled.contains(&severity) {
            self.enabled.push(severity);
        }
    }

    pub fn is_enabled(&self, severity: Severity) -> bool {
        severity == Severity::Error || self.enabled.contains(&severity)
    }
}

static TERMINATED: AtomicBool = AtomicBool::new(false);

/// Everything the analysis reads about its environment.
#[derive(Clone, Debug, Default)]
pub struct Settings {
    pub platform: Platform,
    pub standard: Standard,
    pub severity: SeverityToggles,
    /// Report findings the analyzer is not sure about.
    pub certainty_inconclusive: bool,
    pub safe_checks: bool,
    /// Emit internal debug messages through the diagnostics sink.
    pub debug_warnings: bool,
    pub library: Library,
}

impl Settings {
    /// Settings used by most unit tests: everything enabled, std library
    /// configuration loaded.
    pub fn test_default() -> Self {
        Settings {
            severity: SeverityToggles::all(),
            certainty_inconclusive: true,
            library: Library::std(),
            ..Settings::default()
        }
    }

    pub fn is_cpp(&self) -> bool {
        self.standard.is_cpp()
    }

    /// Host-settable stop flag, polled at function boundaries.
    pub fn terminated() -> bool {
        TERMINATED.load(Ordering::Relaxed)
    }

    pub fn terminate(state: bool) {
        TERMINATED.store(state, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_always_enabled() {
        let toggles = SeverityToggles::default();
        assert!(toggles.is_enabled(Severity::Error));
        assert!(!toggles.is_enabled(Severity::Warning));
    }

    #[test]
    fn enable_is_idempotent() {
        let mut toggles = SeverityToggles::default();
        toggles.enable(Severity::Style);
        toggles.enable(Severity::Style);
        assert!(toggles.is_enabled(Severity::Style));
        assert_eq!(toggles.enabled.len(), 1);
    }

    #[test]
    fn standard_ordering() {
        assert!(Standard::Cpp03.is_cpp());
        assert!(!Standard::C11.is_cpp());
        assert!(Standard::Cpp11 >= Standard::Cpp03);
    }
}
