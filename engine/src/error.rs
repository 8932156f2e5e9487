// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;

use crate::target::Target;

/// The failure taxonomy of §7: distinguishable kinds propagated across dependents via the same
/// `Result` channel as successes. Failures are memoized like successes -- a failed node is never
/// retried within a session.
#[derive(Clone, Debug)]
pub enum Failure {
    /// No node owns this target, and no on-disk file satisfies it either.
    Missing(Target),
    /// An `include` path resolved to a file that does not exist.
    MissingInclude(String),
    /// A `TemplateCall` named a template that was never declared, even after all includes.
    MissingTemplate(String),
    /// `run` re-entered a target already in its own call chain.
    Cyclic(Vec<String>),
    /// A task ran but its declared file targets are still stale, or it otherwise failed.
    Task(String),
    /// This node did not run because one or more of its `requires` failed; carries each failed
    /// dependency's index (into the node's own `requires`) and failure.
    Dependency(Vec<(usize, Failure)>),
    /// Program input did not match the declared schema.
    Config { expected: String, got: String },
    /// Catch-all for everything else, e.g. unresolvable templated targets after exhaustive passes.
    User(String),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Missing(target) => write!(f, "no target `{target}`"),
            Failure::MissingInclude(path) => write!(f, "missing include `{path}`"),
            Failure::MissingTemplate(name) => write!(f, "no template named `{name}`"),
            Failure::Cyclic(chain) => write!(f, "cyclic dependency: {}", chain.join(" -> ")),
            Failure::Task(message) => write!(f, "{message}"),
            Failure::Dependency(children) => {
                write!(f, "{} dependency failure(s)", children.len())
            }
            Failure::Config { expected, got } => {
                write!(f, "expected {expected}, got {got}")
            }
            Failure::User(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for Failure {}

impl graph::NodeError for Failure {
    fn cyclic(chain: Vec<String>) -> Self {
        Failure::Cyclic(chain)
    }
}
