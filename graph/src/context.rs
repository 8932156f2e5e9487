// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Semaphore;

use crate::node::Node;
use crate::Graph;

///
/// A context passed to a running Node, used to request dependencies and to propagate the chain
/// of in-flight Nodes that cycle detection walks.
///
pub struct Context<N: Node> {
    graph: Arc<Graph<N>>,
    shared: N::Context,
    chain: Arc<Vec<N>>,
}

impl<N: Node> Clone for Context<N> {
    fn clone(&self) -> Self {
        Context {
            graph: self.graph.clone(),
            shared: self.shared.clone(),
            chain: self.chain.clone(),
        }
    }
}

impl<N: Node> Context<N> {
    pub(crate) fn new(graph: Arc<Graph<N>>, shared: N::Context, chain: Arc<Vec<N>>) -> Self {
        Context {
            graph,
            shared,
            chain,
        }
    }

    /// The domain-specific state shared by every Node in this run.
    pub fn shared(&self) -> &N::Context {
        &self.shared
    }

    /// Whether this run was started with a database-wide force-rebuild flag.
    pub fn force(&self) -> bool {
        self.graph.force()
    }

    /// The semaphore throttling concurrently live subprocesses across the whole run.
    pub fn subprocess_semaphore(&self) -> &Arc<Semaphore> {
        self.graph.subprocess_semaphore()
    }

    /// Requests the value of a single dependency Node, extending the call chain used for cycle
    /// detection with the Node currently running.
    pub fn get(&self, node: N) -> BoxFuture<'static, Result<N::Item, N::Error>> {
        let graph = self.graph.clone();
        let shared = self.shared.clone();
        let chain = self.chain.clone();
        Box::pin(async move { graph.run_in_chain(shared, chain, node).await })
    }

    /// Requests several dependency Nodes concurrently. Every dependency is run to completion
    /// regardless of whether earlier ones failed, so that a caller can aggregate every failure
    /// rather than stopping at the first (see the engine crate's `DependencyFailure`).
    pub async fn get_all(&self, nodes: Vec<N>) -> Vec<Result<N::Item, N::Error>> {
        futures::future::join_all(nodes.into_iter().map(|node| self.get(node))).await
    }
}
