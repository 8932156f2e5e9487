// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

#![deny(warnings)]
// Enable all clippy lints except for many of the pedantic ones. It's a shame this needs to be copied and pasted across crates, but there doesn't appear to be a way to include inner attributes from a common source.
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

pub mod context;
pub mod entry;
pub mod node;

pub use crate::context::Context;
pub use crate::entry::Entry;
pub use crate::node::{Node, NodeError};

use std::sync::Arc;

use fnv::FnvHashMap as HashMap;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

///
/// A goal-addressed database of lazily evaluated, memoized Nodes.
///
/// Mirrors a build tool's dependency graph: insertion is append-only, a Node's thunk runs at most
/// once regardless of how many dependents request it (`Entry::get_or_run`), and cycles are
/// rejected against the chain of Nodes currently being awaited (`run_in_chain`) rather than
/// against the whole Graph, so independent branches may legitimately revisit a Node that isn't
/// an ancestor of the current call.
///
pub struct Graph<N: Node> {
    entries: Mutex<HashMap<N, Entry<N>>>,
    force: bool,
    subprocess_semaphore: Arc<Semaphore>,
    executor: task_executor::Executor,
}

impl<N: Node> Graph<N> {
    pub fn new(
        executor: task_executor::Executor,
        force: bool,
        max_concurrent_subprocesses: usize,
    ) -> Arc<Graph<N>> {
        Arc::new(Graph {
            entries: Mutex::new(HashMap::default()),
            force,
            subprocess_semaphore: Arc::new(Semaphore::new(max_concurrent_subprocesses.max(1))),
            executor,
        })
    }

    /// Whether this Graph was constructed with the database-wide force-rebuild flag set.
    pub fn force(&self) -> bool {
        self.force
    }

    pub fn subprocess_semaphore(&self) -> &Arc<Semaphore> {
        &self.subprocess_semaphore
    }

    pub fn executor(&self) -> &task_executor::Executor {
        &self.executor
    }

    /// The number of distinct Nodes that have ever been requested from this Graph.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, node: N) -> Entry<N> {
        self.entries
            .lock()
            .entry(node.clone())
            .or_insert_with(|| Entry::new(node))
            .clone()
    }

    /// Runs the given root Node to completion, starting a fresh cycle-detection chain.
    pub async fn run(self: &Arc<Self>, shared: N::Context, node: N) -> Result<N::Item, N::Error> {
        self.run_in_chain(shared, Arc::new(Vec::new()), node).await
    }

    pub(crate) async fn run_in_chain(
        self: &Arc<Self>,
        shared: N::Context,
        chain: Arc<Vec<N>>,
        node: N,
    ) -> Result<N::Item, N::Error> {
        if chain.iter().any(|seen| seen == &node) {
            let mut rendered: Vec<String> = chain.iter().map(|n| n.to_string()).collect();
            rendered.push(node.to_string());
            return Err(N::Error::cyclic(rendered));
        }

        let mut next_chain = (*chain).clone();
        next_chain.push(node.clone());
        let next_chain = Arc::new(next_chain);

        let entry = self.entry(node);
        let context = Context::new(self.clone(), shared, next_chain);
        entry.get_or_run(context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct Counter(Arc<AtomicUsize>);

    #[derive(Clone, PartialEq, Eq, Hash)]
    enum TestNode {
        Leaf(&'static str),
        Branch(&'static str, Vec<TestNode>),
        SelfCycle,
    }

    impl fmt::Display for TestNode {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                TestNode::Leaf(name) => write!(f, "{name}"),
                TestNode::Branch(name, _) => write!(f, "{name}"),
                TestNode::SelfCycle => write!(f, "self-cycle"),
            }
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    enum TestError {
        Cyclic(Vec<String>),
    }

    impl NodeError for TestError {
        fn cyclic(chain: Vec<String>) -> Self {
            TestError::Cyclic(chain)
        }
    }

    impl Node for TestNode {
        type Context = Counter;
        type Item = usize;
        type Error = TestError;

        fn run(
            self,
            context: Context<Self>,
        ) -> futures::future::BoxFuture<'static, Result<usize, TestError>> {
            Box::pin(async move {
                match self {
                    TestNode::Leaf(_) => {
                        context.shared().0.fetch_add(1, Ordering::SeqCst);
                        Ok(1)
                    }
                    TestNode::Branch(_, deps) => {
                        context.shared().0.fetch_add(1, Ordering::SeqCst);
                        let results = context.get_all(deps).await;
                        let mut total = 1;
                        for result in results {
                            total += result?;
                        }
                        Ok(total)
                    }
                    TestNode::SelfCycle => context.get(TestNode::SelfCycle).await,
                }
            })
        }
    }

    fn test_graph(counter: Counter) -> (Arc<Graph<TestNode>>, Counter) {
        let executor = task_executor::Executor::new();
        (Graph::new(executor, false, 4), counter)
    }

    #[tokio::test]
    async fn at_most_once_under_concurrent_requests() {
        let counter = Counter(Arc::new(AtomicUsize::new(0)));
        let (graph, counter) = test_graph(counter.clone());
        let leaf = TestNode::Leaf("shared");

        let (a, b, c) = tokio::join!(
            graph.run(counter.clone(), leaf.clone()),
            graph.run(counter.clone(), leaf.clone()),
            graph.run(counter.clone(), leaf.clone()),
        );
        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);
        assert_eq!(c.unwrap(), 1);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn diamond_dependency_runs_shared_leaf_once() {
        let counter = Counter(Arc::new(AtomicUsize::new(0)));
        let (graph, counter) = test_graph(counter.clone());
        let leaf = TestNode::Leaf("shared-leaf");
        let left = TestNode::Branch("left", vec![leaf.clone()]);
        let right = TestNode::Branch("right", vec![leaf.clone()]);
        let top = TestNode::Branch("top", vec![left, right]);

        let result = graph.run(counter.clone(), top).await.unwrap();
        // top base(1) + left(base 1 + leaf 1 = 2) + right(base 1 + leaf 1 = 2) == 5
        assert_eq!(result, 5);
        // leaf + left + right + top == 4 runs total, leaf contributing only once even though
        // both left and right depend on it.
        assert_eq!(counter.0.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn cycle_is_rejected_rather_than_hanging() {
        let counter = Counter(Arc::new(AtomicUsize::new(0)));
        let (graph, counter) = test_graph(counter);
        let result = graph.run(counter, TestNode::SelfCycle).await;
        match result {
            Err(TestError::Cyclic(chain)) => assert!(chain.len() >= 2),
            other => panic!("expected a cyclic error, got {other:?}"),
        }
    }
}
