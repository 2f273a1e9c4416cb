//! Cross-translation-unit one-definition-rule checking.
//!
//! Each TU contributes a file-info record per class definition: name,
//! location and a content hash over the definition's token sequence. The
//! whole-program pass compares records across TUs; the same name with
//! different content at different locations violates the ODR.

use ccheck_config::Severity;
use ccheck_core::errors::{ErrorLogger, ErrorMessage, Location};
use ccheck_core::TranslationUnit;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

const CWE_ODR: u16 = 758;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassDefinition {
    pub name: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub hash: u64,
}

/// Per-TU persisted analysis product.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileInfo {
    pub classes: Vec<ClassDefinition>,
}

/// Serializable snapshot of the scope tree: kinds, names and nesting, free
/// of token addresses.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScopeTree {
    pub kind: String,
    pub name: String,
    pub children: Vec<ScopeTree>,
}

impl ScopeTree {
    pub fn of(tu: &TranslationUnit) -> ScopeTree {
        fn build(tu: &TranslationUnit, scope: ccheck_core::symbols::ScopeId) -> ScopeTree {
            let s = tu.symbols.scope(scope);
            ScopeTree {
                kind: format!("{:?}", s.kind),
                name: s.class_name.clone(),
                children: s.nested_list.iter().map(|&c| build(tu, c)).collect(),
            }
        }
        build(tu, tu.symbols.global_scope())
    }
}

impl FileInfo {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("file-info serializes")
    }

    pub fn from_json(text: &str) -> Result<FileInfo, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Stable 64-bit FNV-1a over the token images of a definition. The hash must
/// not depend on process state so it can be compared across runs.
fn content_hash<'a>(parts: impl Iterator<Item = &'a str>) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for part in parts {
        for byte in part.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        hash ^= u64::from(b' ');
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Collect the class definitions of one analyzed TU.
pub fn collect_file_info(tu: &TranslationUnit) -> FileInfo {
    let mut info = FileInfo::default();
    for &scope_id in tu.symbols.class_and_struct_scopes() {
        let scope = tu.symbols.scope(scope_id);
        let (Some(class_def), Some(start), Some(end)) =
            (scope.class_def, scope.body_start, scope.body_end)
        else {
            continue;
        };
        let location = tu.tokens[class_def].location();
        let file = tu
            .tokens
            .files()
            .get(location.file_index as usize)
            .cloned()
            .unwrap_or_default();
        let body = (start.0..=end.0)
            .map(ccheck_core::token::TokenId)
            .map(|id| tu.tokens[id].str());
        info.classes.push(ClassDefinition {
            name: scope.class_name.clone(),
            file,
            line: location.line,
            column: location.column,
            hash: content_hash(body),
        });
    }
    info
}

/// Whole-program comparison of the collected file-infos. Definitions are
/// grouped by class name; every later definition is compared against the
/// first one seen.
pub fn analyze_whole_program(infos: &[FileInfo], logger: &mut dyn ErrorLogger) {
    let groups = infos
        .iter()
        .flat_map(|info| info.classes.iter())
        .sorted_by(|a, b| a.name.cmp(&b.name).then(a.file.cmp(&b.file)))
        .chunk_by(|class| class.name.clone());
    for (_, mut group) in &groups {
        let Some(first) = group.next() else { continue };
        for class in group {
            let same_location = first.file == class.file
                && first.line == class.line
                && first.column == class.column;
            if same_location || first.hash == class.hash {
                continue;
            }
            let first_loc = Location {
                file_index: 0,
                line: first.line,
                column: first.column,
            };
            let second_loc = Location {
                file_index: 0,
                line: class.line,
                column: class.column,
            };
            logger.report(
                ErrorMessage::new(
                    "ctuOneDefinitionRuleViolation",
                    Severity::Error,
                    format!(
                        "The one definition rule is violated, different classes/structs have the same name '{}'",
                        class.name
                    ),
                )
                .cwe(CWE_ODR)
                .at(second_loc)
                .with_path(vec![
                    (
                        first_loc,
                        format!("{}: definition of '{}'", first.file, first.name),
                    ),
                    (
                        second_loc,
                        format!("{}: definition of '{}'", class.file, class.name),
                    ),
                ]),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccheck_config::Settings;
    use ccheck_core::errors::RecordingLogger;

    fn file_info(code: &str, file: &str) -> FileInfo {
        let settings = Settings::test_default();
        let mut logger = RecordingLogger::new();
        let tu = TranslationUnit::analyze(code, file, &settings, &mut logger).unwrap();
        collect_file_info(&tu)
    }

    #[test]
    fn hash_is_stable_for_identical_bodies() {
        let a = file_info("struct P { int a; };", "a.cpp");
        let b = file_info("struct P { int a; };", "b.cpp");
        assert_eq!(a.classes[0].hash, b.classes[0].hash);
    }

    #[test]
    fn json_round_trip() {
        let info = file_info("struct P { int a; };", "a.cpp");
        let json = info.to_json();
        let back = FileInfo::from_json(&json).unwrap();
        assert_eq!(info, back);
    }

    #[test]
    fn odr_violation_is_reported() {
        let a = file_info("struct P { int a; };", "a.cpp");
        let b = file_info("\n\nstruct P { long a; };", "b.cpp");
        let mut logger = RecordingLogger::new();
        analyze_whole_program(&[a, b], &mut logger);
        assert!(logger.contains("ctuOneDefinitionRuleViolation"));
        let message = logger.find("ctuOneDefinitionRuleViolation").unwrap();
        assert_eq!(message.path.len(), 2);
    }

    #[test]
    fn identical_definitions_do_not_violate() {
        let a = file_info("struct P { int a; };", "a.cpp");
        let b = file_info("\n\nstruct P { int a; };", "b.cpp");
        let mut logger = RecordingLogger::new();
        analyze_whole_program(&[a, b], &mut logger);
        assert!(!logger.contains("ctuOneDefinitionRuleViolation"));
    }

    #[test]
    fn scope_tree_round_trips_through_json() {
        let settings = Settings::test_default();
        let mut logger = RecordingLogger::new();
        let tu = TranslationUnit::analyze(
            "namespace ns { struct S { int m; void f(); }; }\nvoid g() { if (1) { } }",
            "t.cpp",
            &settings,
            &mut logger,
        )
        .unwrap();
        let tree = ScopeTree::of(&tu);
        let json = serde_json::to_string(&tree).unwrap();
        let back: ScopeTree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, back);
        assert_eq!(tree.kind, "Global");
        assert!(tree.children.iter().any(|c| c.name == "ns"));
    }
}
