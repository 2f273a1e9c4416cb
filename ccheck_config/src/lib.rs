//! Configuration surface of the ccheck analyzer: the platform model, the
//! settings the checks consult, and the library records describing functions
//! and containers the analysis cannot see into.

mod library;
mod platform;
mod settings;

pub use library::{
    ArgSpec, Container, ContainerAction, FormatStr, FunctionRecord, Library, PodType,
    SmartPointer, Yield,
};
pub use platform::{CharSign, Platform};
pub use settings::{Certainty, Settings, Severity, SeverityToggles, Standard};
