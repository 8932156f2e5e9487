// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;

use crate::error::Failure;
use crate::runner::{Runner, RunnerTable};
use crate::target::Target;
use crate::task::Task;
use crate::variable::VariableDef;
use graph::Context;

/// The value produced by running a node: plain completion, or the trimmed text captured from a
/// task's stdout / a variable's substituted template (§4.4, §4.5).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkflowItem {
    Unit,
    Text(String),
}

/// The three kinds of lazy node in the database (§2): a Task to run, a Variable to substitute, or
/// a pre-existing file synthesized on demand by `WorkflowShared::resolve` (§4.3) when a `require`d
/// file target isn't registered but already exists on disk.
///
/// Equality/hash for `Task`/`Variable` is by `Arc` identity rather than by Target: a single Task
/// may register several Targets (e.g. a file and a phony name), and every one of them must route
/// to the *same* memoization cell so the task runs only once no matter which target is requested.
#[derive(Clone)]
pub enum WorkflowNode {
    Task(Arc<Task>),
    Variable(Arc<VariableDef>),
    ExistingFile(PathBuf),
}

impl WorkflowNode {
    pub(crate) fn creates(&self) -> Vec<Target> {
        match self {
            WorkflowNode::Task(task) => task.creates.clone(),
            WorkflowNode::Variable(var) => vec![Target::Variable(var.name.clone())],
            WorkflowNode::ExistingFile(path) => vec![Target::File(path.clone())],
        }
    }
}

impl PartialEq for WorkflowNode {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (WorkflowNode::Task(a), WorkflowNode::Task(b)) => Arc::ptr_eq(a, b),
            (WorkflowNode::Variable(a), WorkflowNode::Variable(b)) => Arc::ptr_eq(a, b),
            (WorkflowNode::ExistingFile(a), WorkflowNode::ExistingFile(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for WorkflowNode {}

impl Hash for WorkflowNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            WorkflowNode::Task(a) => (Arc::as_ptr(a) as usize).hash(state),
            WorkflowNode::Variable(a) => (Arc::as_ptr(a) as usize).hash(state),
            WorkflowNode::ExistingFile(path) => path.hash(state),
        }
    }
}

impl fmt::Display for WorkflowNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowNode::Task(task) => write!(f, "{}", task.label()),
            WorkflowNode::Variable(var) => write!(f, "var({})", var.name),
            WorkflowNode::ExistingFile(path) => write!(f, "{}", path.display()),
        }
    }
}

impl graph::Node for WorkflowNode {
    type Context = WorkflowShared;
    type Item = WorkflowItem;
    type Error = Failure;

    fn run(self, context: Context<Self>) -> BoxFuture<'static, Result<WorkflowItem, Failure>> {
        Box::pin(async move {
            match self {
                WorkflowNode::Task(task) => crate::task::run(task, context).await,
                WorkflowNode::Variable(var) => crate::variable::run(var, context).await,
                WorkflowNode::ExistingFile(_) => Ok(WorkflowItem::Unit),
            }
        })
    }
}

struct Inner {
    runners: RwLock<RunnerTable>,
    registry: RwLock<std::collections::HashMap<Target, WorkflowNode>>,
}

/// Domain state shared by every `WorkflowNode` of a run (`graph::Node::Context`): the runner table
/// and the node registry built up during program resolution (§4.7). The registry is append-mostly
/// during resolution and read-only during `run` (§5); both phases share the same `RwLock`.
#[derive(Clone)]
pub struct WorkflowShared(Arc<Inner>);

impl WorkflowShared {
    pub fn new() -> WorkflowShared {
        WorkflowShared(Arc::new(Inner {
            runners: RwLock::new(RunnerTable::with_defaults()),
            registry: RwLock::new(std::collections::HashMap::new()),
        }))
    }

    /// Registers `node` under every Target in its `creates`, per §4.3's `insert`.
    pub fn register(&self, node: WorkflowNode) {
        let mut registry = self.0.registry.write();
        for target in node.creates() {
            registry.insert(target, node.clone());
        }
    }

    pub fn merge_runners(&self, overrides: std::collections::HashMap<String, Runner>) {
        self.0.runners.write().merge(overrides);
    }

    pub fn runner(&self, name: &str) -> Option<Runner> {
        self.0.runners.read().get(name).cloned()
    }

    pub fn is_registered(&self, target: &Target) -> bool {
        self.0.registry.read().contains_key(target)
    }

    /// Resolves a Target to the node that owns it, synthesizing a no-op node for a pre-existing
    /// file that was never declared, per §4.3.
    pub fn resolve(&self, target: &Target) -> Result<WorkflowNode, Failure> {
        if let Some(node) = self.0.registry.read().get(target) {
            return Ok(node.clone());
        }
        if let Target::File(path) = target {
            if path.exists() {
                return Ok(WorkflowNode::ExistingFile(path.clone()));
            }
        }
        Err(Failure::Missing(target.clone()))
    }
}

impl Default for WorkflowShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves and runs every target in `targets` concurrently, in original order, aggregating every
/// failure (both resolution failures and run failures) rather than stopping at the first (§4.3
/// "dependency propagation"). On any failure, returns `Failure::Dependency` naming each failed
/// target by its index into `targets`.
pub(crate) async fn resolve_and_run(
    context: &Context<WorkflowNode>,
    targets: &[Target],
) -> Result<Vec<WorkflowItem>, Failure> {
    let resolved: Vec<Result<WorkflowNode, Failure>> =
        targets.iter().map(|t| context.shared().resolve(t)).collect();

    let nodes_to_run: Vec<WorkflowNode> = resolved
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .cloned()
        .collect();
    let mut run_results = context.get_all(nodes_to_run).await.into_iter();

    let mut items = Vec::with_capacity(targets.len());
    let mut failures = Vec::new();
    for (i, resolution) in resolved.into_iter().enumerate() {
        match resolution {
            Err(failure) => failures.push((i, failure)),
            Ok(_) => match run_results.next().expect("one run result per resolved node") {
                Ok(item) => items.push(item),
                Err(failure) => failures.push((i, failure)),
            },
        }
    }

    if !failures.is_empty() {
        return Err(Failure::Dependency(failures));
    }

    Ok(items)
}
