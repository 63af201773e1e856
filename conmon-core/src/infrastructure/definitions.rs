// conmon-core/src/infrastructure/definitions.rs

//! Loads check definitions from `*.yml` / `*.yaml` files.
//!
//! Each file holds a top-level `checks:` list. Files are read in path order
//! so ids and backlog entries come out deterministically.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::domain::check::{BacklogEntry, Check, CheckDefinition};
use crate::domain::error::DomainError;
use crate::error::ConmonError;
use crate::infrastructure::error::InfrastructureError;

#[derive(Debug, Deserialize)]
struct DefinitionFile {
    #[serde(default)]
    checks: Vec<CheckDefinition>,
}

/// Checks ready to evaluate plus the custom snippets awaiting migration.
#[derive(Debug, Clone, Default)]
pub struct CheckSet {
    pub checks: Vec<Check>,
    pub backlog: Vec<BacklogEntry>,
}

impl CheckSet {
    /// Compiles definitions, rejecting duplicate ids.
    pub fn compile(definitions: Vec<CheckDefinition>) -> Result<Self, ConmonError> {
        let mut set = CheckSet::default();
        let mut seen = HashSet::new();
        for definition in definitions {
            if !seen.insert(definition.id) {
                return Err(DomainError::InvalidCheck(format!(
                    "duplicate check id {}",
                    definition.id
                ))
                .into());
            }
            let compiled = definition.compile()?;
            if let Some(entry) = compiled.backlog {
                warn!(check = %entry.check_name, reason = %entry.reason, "Custom logic needs manual migration");
                set.backlog.push(entry);
            }
            set.checks.push(compiled.check);
        }
        Ok(set)
    }
}

pub fn parse_definitions(content: &str) -> Result<Vec<CheckDefinition>, InfrastructureError> {
    let file: DefinitionFile = serde_yaml::from_str(content)?;
    Ok(file.checks)
}

/// Walks every directory in `dirs` (missing ones are skipped).
#[instrument(skip(dirs))]
pub fn load_definitions<P: AsRef<Path>>(dirs: &[P]) -> Result<CheckSet, ConmonError> {
    let mut definitions = Vec::new();
    for dir in dirs {
        let dir = dir.as_ref();
        if !dir.exists() {
            debug!(dir = ?dir, "Check directory missing, skipped");
            continue;
        }
        let walker = WalkDir::new(dir).follow_links(true).sort_by_file_name();
        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            let is_yaml = path
                .extension()
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if !entry.file_type().is_file() || !is_yaml {
                continue;
            }
            let content = fs::read_to_string(path)?;
            let parsed = parse_definitions(&content).map_err(|e| {
                InfrastructureError::ConfigError(format!("{}: {}", path.display(), e))
            })?;
            debug!(file = ?path, count = parsed.len(), "Definitions read");
            definitions.extend(parsed);
        }
    }

    let set = CheckSet::compile(definitions)?;
    info!(checks = set.checks.len(), backlog = set.backlog.len(), "Check definitions loaded");
    Ok(set)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::check::ComparisonOperation;
    use anyhow::Result;
    use tempfile::tempdir;

    const STORAGE: &str = r#"
checks:
  - id: 1
    name: bucket_encrypted
    category: storage
    field_path: encryption.enabled
    operation:
      name: equal
    expected_value: true
  - id: 2
    name: tag_budget
    field_path: len(tags)
    operation:
      name: less_than_or_equal
    expected_value: 10
"#;

    const CUSTOM: &str = r#"
checks:
  - id: 3
    name: owner_is_team
    field_path: owner
    operation:
      name: custom
      custom_logic: "starts_with(actual, 'team-') && len(actual) > 5"
  - id: 4
    name: legacy_lambda
    field_path: policy
    operation:
      name: custom
      custom_logic: "lambda a, e: a.get('x') is not None"
"#;

    #[test]
    fn test_load_walks_nested_dirs_in_order() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("b/nested"))?;
        fs::write(dir.path().join("a.yaml"), STORAGE)?;
        fs::write(dir.path().join("b/nested/custom.yml"), CUSTOM)?;
        fs::write(dir.path().join("b/readme.md"), "not yaml")?;

        let set = load_definitions(&[dir.path()])?;
        let ids: Vec<i64> = set.checks.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        assert!(set.checks[2].operation.predicate().is_some());
        // the snippet that is not in the expression language lands in the backlog
        assert_eq!(set.backlog.len(), 1);
        assert_eq!(set.backlog[0].check_id, 4);
        assert!(matches!(set.checks[3].operation, ComparisonOperation::Custom(None)));
        Ok(())
    }

    #[test]
    fn test_missing_dir_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let set = load_definitions(&[dir.path().join("nope")])?;
        assert!(set.checks.is_empty());
        Ok(())
    }

    #[test]
    fn test_unsupported_operation_fails_load() {
        let yaml = "checks:\n  - id: 1\n    name: x\n    field_path: a\n    operation:\n      name: roughly\n";
        let defs = parse_definitions(yaml).unwrap();
        let err = CheckSet::compile(defs).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut defs = parse_definitions(STORAGE).unwrap();
        defs[1].id = 1;
        assert!(CheckSet::compile(defs).is_err());
    }

    #[test]
    fn test_broken_yaml_names_the_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.yaml"), "checks: [ {id: ").unwrap();
        let err = load_definitions(&[dir.path()]).unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }
}
