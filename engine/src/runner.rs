// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::HashMap;

use serde::Deserialize;

/// A named recipe for interpreting a materialized script via an external executable. Each arg may
/// contain the `${script}` placeholder, substituted with the materialized script path at
/// invocation time (§3).
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Runner {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Runner {
    fn new(command: &str, args: &[&str]) -> Runner {
        Runner {
            command: command.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// The runner table: initially `{bash, python}` (§3), extended by program-declared runners, which
/// may override the defaults by key (§4.8). Lookup is strict: an unknown runner name is an
/// execution error, not silently skipped.
#[derive(Clone, Debug)]
pub struct RunnerTable(HashMap<String, Runner>);

impl RunnerTable {
    pub fn with_defaults() -> RunnerTable {
        let mut table = HashMap::new();
        table.insert("bash".to_string(), Runner::new("bash", &["${script}"]));
        table.insert("python".to_string(), Runner::new("python", &["${script}"]));
        RunnerTable(table)
    }

    pub fn merge(&mut self, overrides: HashMap<String, Runner>) {
        self.0.extend(overrides);
    }

    pub fn get(&self, name: &str) -> Option<&Runner> {
        self.0.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_bash_and_python() {
        let table = RunnerTable::with_defaults();
        assert_eq!(table.get("bash").unwrap().command, "bash");
        assert_eq!(table.get("python").unwrap().command, "python");
        assert!(table.get("ruby").is_none());
    }

    #[test]
    fn merge_overrides_defaults_by_key() {
        let mut table = RunnerTable::with_defaults();
        let mut overrides = HashMap::new();
        overrides.insert(
            "bash".to_string(),
            Runner {
                command: "/usr/local/bin/bash".to_string(),
                args: vec!["-e".to_string(), "${script}".to_string()],
            },
        );
        table.merge(overrides);
        assert_eq!(table.get("bash").unwrap().command, "/usr/local/bin/bash");
    }
}
