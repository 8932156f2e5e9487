// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

#![deny(warnings)]
#![deny(
    clippy::all,
    clippy::default_trait_access,
    clippy::expl_impl_clone_on_copy,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding
)]
#![allow(clippy::match_ref_pats)]
#![allow(
    clippy::len_without_is_empty,
    clippy::redundant_field_names,
    clippy::too_many_arguments
)]
#![allow(clippy::new_without_default, clippy::new_ret_no_self)]
#![allow(clippy::mutex_atomic)]

//! The task/variable graph and runtime, and the program resolver, built atop the lazy evaluation
//! engine in the `graph` crate (§2).

pub mod config;
pub mod error;
pub mod node;
pub mod program;
pub mod resolver;
pub mod runner;
pub mod target;
pub mod task;
pub mod template;
pub mod variable;

pub use crate::error::Failure;
pub use crate::node::{WorkflowItem, WorkflowNode, WorkflowShared};
pub use crate::program::ProgramSpec;
pub use crate::resolver::Resolver;
pub use crate::target::Target;
pub use crate::task::Task;

use std::sync::Arc;

use graph::Graph;

/// A fully-resolved program: the populated node database of §2, ready to run goals against.
pub struct Database {
    graph: Arc<Graph<WorkflowNode>>,
    shared: WorkflowShared,
}

impl Database {
    /// Resolves `reference` (a program file path, optionally with a `#a.b.c` subsection suffix)
    /// and everything it transitively includes, into a ready-to-run database.
    pub async fn load(
        reference: &str,
        executor: task_executor::Executor,
        force: bool,
        max_concurrent_subprocesses: usize,
    ) -> Result<Database, Failure> {
        let shared = WorkflowShared::new();
        let graph = Graph::new(executor, force, max_concurrent_subprocesses);
        let resolver = Resolver::new(graph.clone(), shared.clone());
        resolver.resolve_root(reference).await?;
        Ok(Database { graph, shared })
    }

    /// Runs a single goal target to completion (§4.3).
    pub async fn run(&self, goal: &str) -> Result<WorkflowItem, Failure> {
        let target = Target::parse(goal);
        let node = self.shared.resolve(&target)?;
        self.graph.run(self.shared.clone(), node).await
    }

    /// Runs every goal concurrently, pairing each with its result in the order given (§4.10:
    /// goals run concurrently, with one line printed per failure).
    pub async fn run_all(
        &self,
        goals: &[String],
    ) -> Vec<(String, Result<WorkflowItem, Failure>)> {
        let futures = goals
            .iter()
            .map(|goal| async move { (goal.clone(), self.run(goal).await) });
        futures::future::join_all(futures).await
    }

    /// The number of distinct nodes this database has ever evaluated.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }
}
