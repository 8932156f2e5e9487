// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::path::Path;

use crate::error::Failure;
use crate::program::ProgramSpec;

/// Loads a program file (§4.10): TOML or JSON, selected by extension (anything not `.json` is
/// treated as TOML), with optional `[a.b.c]` subsection addressing applied before the
/// schema-driven deserialization step so the typed constructor only ever sees the selected
/// subsection.
pub fn load_program(reference: &str) -> Result<ProgramSpec, Failure> {
    let (path, subsection) = split_subsection(reference);
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Failure::User(format!("failed to read {}: {e}", path.display())))?;
    parse_program(path, &contents, subsection.as_deref())
}

/// Splits `file#a.b.c` into the file path and the dotted subsection path, if present.
fn split_subsection(reference: &str) -> (&Path, Option<String>) {
    match reference.split_once('#') {
        Some((path, subsection)) => (Path::new(path), Some(subsection.to_string())),
        None => (Path::new(reference), None),
    }
}

fn parse_program(
    path: &Path,
    contents: &str,
    subsection: Option<&str>,
) -> Result<ProgramSpec, Failure> {
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");

    if is_json {
        let mut value: serde_json::Value = serde_json::from_str(contents).map_err(|e| {
            Failure::Config {
                expected: "valid JSON".to_string(),
                got: e.to_string(),
            }
        })?;
        if let Some(subsection) = subsection {
            value = select_json_subsection(value, subsection)?;
        }
        serde_json::from_value(value).map_err(|e| Failure::Config {
            expected: "a program matching the schema".to_string(),
            got: e.to_string(),
        })
    } else {
        let mut value: toml::Value = toml::from_str(contents).map_err(|e| Failure::Config {
            expected: "valid TOML".to_string(),
            got: e.to_string(),
        })?;
        if let Some(subsection) = subsection {
            value = select_toml_subsection(value, subsection)?;
        }
        value.try_into().map_err(|e: toml::de::Error| Failure::Config {
            expected: "a program matching the schema".to_string(),
            got: e.to_string(),
        })
    }
}

fn select_toml_subsection(mut value: toml::Value, subsection: &str) -> Result<toml::Value, Failure> {
    for key in subsection.split('.') {
        value = value
            .get(key)
            .cloned()
            .ok_or_else(|| Failure::User(format!("no subsection `{key}` in program file")))?;
    }
    Ok(value)
}

fn select_json_subsection(
    mut value: serde_json::Value,
    subsection: &str,
) -> Result<serde_json::Value, Failure> {
    for key in subsection.split('.') {
        value = value
            .get(key)
            .cloned()
            .ok_or_else(|| Failure::User(format!("no subsection `{key}` in program file")))?;
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_subsection_suffix() {
        let (path, subsection) = split_subsection("workflow.toml#a.b");
        assert_eq!(path, Path::new("workflow.toml"));
        assert_eq!(subsection.as_deref(), Some("a.b"));
    }

    #[test]
    fn no_subsection_suffix() {
        let (path, subsection) = split_subsection("workflow.toml");
        assert_eq!(path, Path::new("workflow.toml"));
        assert_eq!(subsection, None);
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = parse_program(Path::new("workflow.toml"), "bogus_field = 1", None);
        assert!(result.is_err());
    }

    #[test]
    fn parses_minimal_toml_program() {
        let program = parse_program(
            Path::new("workflow.toml"),
            "[[task]]\nscript = \"echo hi\"\n",
            None,
        )
        .unwrap();
        assert_eq!(program.task.len(), 1);
    }

    #[test]
    fn subsection_addressing_selects_nested_table() {
        let program = parse_program(
            Path::new("workflow.toml"),
            "[a.b]\n[[a.b.task]]\nscript = \"echo hi\"\n",
            Some("a.b"),
        )
        .unwrap();
        assert_eq!(program.task.len(), 1);
    }
}
