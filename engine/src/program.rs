// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::collections::HashMap;
use std::collections::HashSet;

use serde::Deserialize;

use crate::error::Failure;
use crate::runner::Runner;
use crate::template;

/// The program schema of §6: the same logical shape whether read from TOML or JSON.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramSpec {
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub task: Vec<TaskSpec>,
    #[serde(default)]
    pub template: HashMap<String, TaskSpec>,
    #[serde(default)]
    pub call: Vec<TemplateCallSpec>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub runner: HashMap<String, Runner>,
}

/// A Task or Template record (§3): structurally identical, the difference is only in how a
/// Template's placeholder fields get substituted before becoming a concrete `Task`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskSpec {
    #[serde(default)]
    pub creates: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    pub name: Option<String>,
    pub runner: Option<String>,
    pub path: Option<String>,
    pub script: Option<String>,
    pub stdin: Option<String>,
    pub stdout: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub force: bool,
}

impl TaskSpec {
    /// The fields that determine this task's identity in the node database: `creates`/`requires`
    /// plus the fields Task::from_spec folds into them (`name`, `stdin`, `stdout`, `path`).
    /// `script`/`description` are deliberately excluded -- placeholders there are resolved lazily,
    /// at run time, against the task's own resolved Variable dependencies (§4.4), not eagerly by
    /// the resolver.
    fn identity_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.creates.iter().map(String::as_str).collect();
        fields.extend(self.requires.iter().map(String::as_str));
        fields.extend(self.name.as_deref());
        fields.extend(self.stdin.as_deref());
        fields.extend(self.stdout.as_deref());
        fields.extend(self.path.as_deref());
        fields
    }

    /// Placeholders referenced by any identity-determining field (§4.7 step 5).
    pub fn identity_placeholders(&self) -> HashSet<String> {
        self.identity_fields()
            .into_iter()
            .flat_map(template::gather_args_str)
            .collect()
    }

    /// Substitutes every field -- identity-determining and not -- against `env`. Used both by
    /// template expansion (§4.6, `env` is the call's args) and by the resolver's delayed-template
    /// pass (§4.7 step 6, `env` is the resolved environment variables a delayed task referenced).
    pub fn substitute(&self, env: &HashMap<String, String>) -> TaskSpec {
        let sub = |s: &str| template::substitute_str(s, env);
        TaskSpec {
            creates: self.creates.iter().map(|s| sub(s)).collect(),
            requires: self.requires.iter().map(|s| sub(s)).collect(),
            name: self.name.as_deref().map(sub),
            runner: self.runner.as_deref().map(sub),
            path: self.path.as_deref().map(sub),
            script: self.script.as_deref().map(sub),
            stdin: self.stdin.as_deref().map(sub),
            stdout: self.stdout.as_deref().map(sub),
            description: self.description.as_deref().map(sub),
            force: self.force,
        }
    }
}

/// A directive to expand a template against argument values, possibly multiplexed (§4.6).
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateCallSpec {
    pub template: String,
    #[serde(default)]
    pub args: HashMap<String, ArgValue>,
    pub collect: Option<String>,
    #[serde(default)]
    pub join: Join,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Scalar(String),
    List(Vec<String>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Join {
    Inner,
    Outer,
}

impl Default for Join {
    fn default() -> Self {
        Join::Inner
    }
}

// Case-folded by hand (`join = "INNER"` and `join = "inner"` are equivalent, §4.10) rather than
// relying on `#[serde(rename_all = "lowercase")]`, which only matches the exact-case spelling.
impl<'de> Deserialize<'de> for Join {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match s.to_lowercase().as_str() {
            "inner" => Ok(Join::Inner),
            "outer" => Ok(Join::Outer),
            other => Err(serde::de::Error::custom(format!(
                "unknown join kind {other:?}, expected \"inner\" or \"outer\""
            ))),
        }
    }
}

/// Expands a single `TemplateCall` against a template record into the `TaskSpec`s it produces,
/// plus an optional aggregator (§4.6). The result is handed to the resolver's usual
/// delayed-vs-ready classification (§4.7 step 5) rather than converted to a concrete `Task`
/// directly: a template field may reference an environment variable that the call's own `args`
/// don't cover, in which case `substitute` leaves it literal and it must still go through
/// delayed-template resolution like any other task.
pub fn expand_template(spec: &TaskSpec, call: &TemplateCallSpec) -> Result<Vec<TaskSpec>, Failure> {
    let expansions = build_expansions(&call.args, call.join)?;

    let mut specs: Vec<TaskSpec> = expansions.iter().map(|env| spec.substitute(env)).collect();

    if let Some(collect_name) = &call.collect {
        let mut requires: Vec<String> = Vec::new();
        for s in &specs {
            for target in &s.creates {
                if !requires.contains(target) {
                    requires.push(target.clone());
                }
            }
        }
        specs.push(TaskSpec {
            name: Some(collect_name.clone()),
            requires,
            ..TaskSpec::default()
        });
    }

    Ok(specs)
}

fn build_expansions(
    args: &HashMap<String, ArgValue>,
    join: Join,
) -> Result<Vec<HashMap<String, String>>, Failure> {
    if args.values().all(|v| matches!(v, ArgValue::Scalar(_))) {
        let env = args
            .iter()
            .map(|(k, v)| match v {
                ArgValue::Scalar(s) => (k.clone(), s.clone()),
                ArgValue::List(_) => unreachable!("checked all-scalar above"),
            })
            .collect();
        return Ok(vec![env]);
    }

    match join {
        Join::Inner => {
            let lengths: Vec<usize> = args
                .values()
                .filter_map(|v| match v {
                    ArgValue::List(l) => Some(l.len()),
                    ArgValue::Scalar(_) => None,
                })
                .collect();
            let shortest = lengths.into_iter().min().unwrap_or(0);
            if args
                .values()
                .any(|v| matches!(v, ArgValue::List(l) if l.len() != shortest))
            {
                log::debug!(
                    "template call args disagree in length under inner join; stopping at the \
                     shortest list ({shortest} elements)"
                );
            }

            let mut expansions = Vec::with_capacity(shortest);
            for i in 0..shortest {
                let env = args
                    .iter()
                    .map(|(k, v)| {
                        let value = match v {
                            ArgValue::Scalar(s) => s.clone(),
                            ArgValue::List(l) => l[i].clone(),
                        };
                        (k.clone(), value)
                    })
                    .collect();
                expansions.push(env);
            }
            Ok(expansions)
        }
        Join::Outer => {
            let mut keys: Vec<&String> = args.keys().collect();
            keys.sort();

            let mut expansions = vec![HashMap::new()];
            for key in keys {
                let options: Vec<String> = match &args[key] {
                    ArgValue::Scalar(s) => vec![s.clone()],
                    ArgValue::List(l) => l.clone(),
                };
                let mut next = Vec::with_capacity(expansions.len() * options.len());
                for env in &expansions {
                    for option in &options {
                        let mut entry = env.clone();
                        entry.insert(key.clone(), option.clone());
                        next.push(entry);
                    }
                }
                expansions = next;
            }
            Ok(expansions)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(s: &str) -> ArgValue {
        ArgValue::Scalar(s.to_string())
    }

    fn list(items: &[&str]) -> ArgValue {
        ArgValue::List(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn all_scalar_args_produce_one_expansion() {
        let mut args = HashMap::new();
        args.insert("a".to_string(), scalar("x"));
        let expansions = build_expansions(&args, Join::Inner).unwrap();
        assert_eq!(expansions.len(), 1);
    }

    #[test]
    fn inner_join_zips_and_stops_at_shortest() {
        let mut args = HashMap::new();
        args.insert("a".to_string(), list(&["1", "2", "3"]));
        args.insert("b".to_string(), list(&["x", "y"]));
        let expansions = build_expansions(&args, Join::Inner).unwrap();
        assert_eq!(expansions.len(), 2);
        assert_eq!(expansions[0]["a"], "1");
        assert_eq!(expansions[0]["b"], "x");
        assert_eq!(expansions[1]["a"], "2");
        assert_eq!(expansions[1]["b"], "y");
    }

    #[test]
    fn outer_join_is_the_cartesian_product() {
        let mut args = HashMap::new();
        args.insert("a".to_string(), list(&["x", "y"]));
        args.insert("b".to_string(), list(&["1", "2"]));
        let expansions = build_expansions(&args, Join::Outer).unwrap();
        assert_eq!(expansions.len(), 4);
    }

    #[test]
    fn join_kind_is_case_folded() {
        let parsed: Join = serde_json::from_str("\"INNER\"").unwrap();
        assert_eq!(parsed, Join::Inner);
        let parsed: Join = serde_json::from_str("\"Outer\"").unwrap();
        assert_eq!(parsed, Join::Outer);
    }
}
