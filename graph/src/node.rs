// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;
use std::hash::Hash;

use futures::future::BoxFuture;

use crate::context::Context;

///
/// Defines executing a memoizable step within the given Context.
///
/// A Node is identified by its own equality/hash (generally the goal it addresses, e.g. a file
/// target or a phony name), and is consumed by `run` to produce its `Item` at most once per
/// Graph: see `Entry::get_or_run`.
///
pub trait Node: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static {
    /// Domain-specific state shared by every Node of this type: runner tables, the filesystem
    /// root, a subprocess gate, etc. Cloned cheaply (generally an `Arc` wrapper) for every
    /// dependency request.
    type Context: Clone + Send + Sync + 'static;

    type Item: Clone + Send + Sync + 'static;
    type Error: NodeError;

    fn run(self, context: Context<Self>) -> BoxFuture<'static, Result<Self::Item, Self::Error>>;
}

///
/// Errors produced by a Node must be able to represent a cyclic dependency chain discovered by
/// the Graph, regardless of what domain-specific failure kinds they also carry.
///
pub trait NodeError: Clone + fmt::Debug + Send + Sync + 'static {
    /// Creates an instance that represents a cyclic dependency chain, rendered as the sequence of
    /// Nodes from the outermost goal down to the Node that re-entered it.
    fn cyclic(chain: Vec<String>) -> Self;
}
