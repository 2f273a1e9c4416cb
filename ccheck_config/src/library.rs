//! Library configuration: what the analysis knows about functions, containers
//! and smart pointers it cannot see the bodies of.
//!
//! Records are TOML documents. The built-in `std.toml` covers the C standard
//! library surface the checks rely on; users can merge further documents on
//! top with [`Library::load_str`].

use indexmap::IndexMap;
use serde::Deserialize;

/// Abstract result category of a container member function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Yield {
    BeginIterator,
    EndIterator,
    Item,
    AtIndex,
    Size,
    Empty,
    Buffer,
    BufferNt,
}

/// Container actions that matter to value flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContainerAction {
    Resize,
    Clear,
    Push,
    Pop,
    Insert,
    Erase,
    ChangeContent,
    Change,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Container {
    pub std_string_like: bool,
    /// Position of the element type in the template argument list.
    pub element_arg: Option<usize>,
    pub yields: IndexMap<String, Yield>,
    pub actions: IndexMap<String, ContainerAction>,
}

impl Container {
    pub fn yield_of(&self, function: &str) -> Option<Yield> {
        self.yields.get(function).copied()
    }

    pub fn action_of(&self, function: &str) -> Option<ContainerAction> {
        self.actions.get(function).copied()
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SmartPointer {
    pub unique: bool,
}

/// A type alias like `size_t` with platform-defined size and signedness.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PodType {
    /// Size in bytes; 0 means pointer-sized.
    pub size: u32,
    /// "u" for unsigned, "s" for signed, absent for unspecified.
    pub sign: Option<String>,
}

/// Direction of a format string: scan reads, print writes.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FormatStr {
    /// 1-based index of the format-string argument.
    pub arg: usize,
    #[serde(default)]
    pub scan: bool,
    /// Non-standard (printf on wide strings etc) so argument checking is off.
    #[serde(default)]
    pub secure: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ArgSpec {
    pub not_null: bool,
    pub not_uninit: bool,
    pub not_bool: bool,
    /// Accepted value range, e.g. "0:" or "1:100".
    pub valid: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FunctionRecord {
    pub noreturn: bool,
    pub use_retval: bool,
    /// Result depends only on arguments; no side effects.
    pub const_call: bool,
    pub pure_call: bool,
    pub leak_ignore: bool,
    /// Defaults to true; false marks functions like `strtok`.
    pub reentrant: Option<bool>,
    pub format_str: Option<FormatStr>,
    pub args: IndexMap<String, ArgSpec>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct LibraryFile {
    functions: IndexMap<String, FunctionRecord>,
    containers: IndexMap<String, Container>,
    smart_pointers: IndexMap<String, SmartPointer>,
    pod_types: IndexMap<String, PodType>,
}

/// Merged library records with lookup helpers.
#[derive(Clone, Debug, Default)]
pub struct Library {
    functions: IndexMap<String, FunctionRecord>,
    containers: IndexMap<String, Container>,
    smart_pointers: IndexMap<String, SmartPointer>,
    pod_types: IndexMap<String, PodType>,
}

impl Library {
    /// The built-in configuration for the C/C++ standard library.
    pub fn std() -> Self {
        let mut library = Library::default();
        library
            .load_str(include_str!("../std.toml"))
            .expect("embedded std.toml must parse");
        library
    }

    /// Merge a TOML document into this library. Later documents win on
    /// name collisions.
    pub fn load_str(&mut self, text: &str) -> Result<(), toml::de::Error> {
        let file: LibraryFile = toml::from_str(text)?;
        self.functions.extend(file.functions);
        self.containers.extend(file.containers);
        self.smart_pointers.extend(file.smart_pointers);
        self.pod_types.extend(file.pod_types);
        Ok(())
    }

    pub fn function(&self, name: &str) -> Option<&FunctionRecord> {
        self.functions
            .get(name)
            .or_else(|| name.strip_prefix("std::").and_then(|n| self.functions.get(n)))
    }

    pub fn is_noreturn(&self, name: &str) -> bool {
        self.function(name).is_some_and(|f| f.noreturn)
    }

    pub fn is_nonreentrant(&self, name: &str) -> bool {
        self.function(name).is_some_and(|f| f.reentrant == Some(false))
    }

    pub fn is_function_const(&self, name: &str, pure_is_const: bool) -> bool {
        self.function(name)
            .is_some_and(|f| f.const_call || (pure_is_const && f.pure_call))
    }

    /// 1-based format argument index and scan flag, if `name` is a
    /// format-string function.
    pub fn format_str_info(&self, name: &str) -> Option<&FormatStr> {
        self.function(name).and_then(|f| f.format_str.as_ref())
    }

    pub fn container(&self, name: &str) -> Option<&Container> {
        self.containers
            .get(name)
            .or_else(|| name.strip_prefix("std::").and_then(|n| self.containers.get(n)))
    }

    pub fn smart_pointer(&self, name: &str) -> Option<&SmartPointer> {
        self.smart_pointers
            .get(name)
            .or_else(|| name.strip_prefix("std::").and_then(|n| self.smart_pointers.get(n)))
    }

    pub fn pod_type(&self, name: &str) -> Option<&PodType> {
        self.pod_types.get(name)
    }

    /// A function the analysis knows nothing about.
    pub fn is_unknown_function(&self, name: &str) -> bool {
        self.function(name).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_records_present() {
        let library = Library::std();
        assert!(library.is_noreturn("exit"));
        assert!(library.is_noreturn("abort"));
        assert!(!library.is_noreturn("printf"));
        assert!(library.is_nonreentrant("crypt"));
        assert!(!library.is_nonreentrant("printf"));

        let printf = library.format_str_info("printf").unwrap();
        assert_eq!(printf.arg, 1);
        assert!(!printf.scan);
        let fscanf = library.format_str_info("fscanf").unwrap();
        assert_eq!(fscanf.arg, 2);
        assert!(fscanf.scan);
    }

    #[test]
    fn std_containers() {
        let library = Library::std();
        let vector = library.container("vector").unwrap();
        assert_eq!(vector.yield_of("size"), Some(Yield::Size));
        assert_eq!(vector.yield_of("begin"), Some(Yield::BeginIterator));
        assert_eq!(vector.element_arg, Some(0));
        assert!(!vector.std_string_like);

        let string = library.container("std::string").unwrap();
        assert!(string.std_string_like);
        assert_eq!(string.yield_of("c_str"), Some(Yield::BufferNt));
    }

    #[test]
    fn later_documents_win() {
        let mut library = Library::std();
        library
            .load_str("[functions.printf]\nnoreturn = true\n")
            .unwrap();
        assert!(library.is_noreturn("printf"));
    }

    #[test]
    fn smart_pointers_and_pod_types() {
        let library = Library::std();
        assert!(library.smart_pointer("unique_ptr").unwrap().unique);
        assert!(!library.smart_pointer("std::shared_ptr").unwrap().unique);
        let size_t = library.pod_type("size_t").unwrap();
        assert_eq!(size_t.size, 0);
        assert_eq!(size_t.sign.as_deref(), Some("u"));
    }
}
