// Copyright 2026 Workflow project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

use crate::context::Context;
use crate::node::Node;

enum EntryState<N: Node> {
    NotStarted,
    // Once a Node starts running, every caller (the one that started it, and every later one)
    // awaits a clone of the same `Shared` future. `Shared` caches its output internally, so a
    // clone obtained long after completion still resolves immediately, with no second variant
    // needed for "done": the entry simply stays `Started` for the life of the Graph.
    Started(Shared<BoxFuture<'static, Result<N::Item, N::Error>>>),
}

///
/// A Node paired with its memoization cell.
///
/// Cloning an Entry is cheap (it shares the same `Arc`s) and yields a handle to the same
/// underlying cell: this is how concurrent dependents of the same Node end up awaiting the same
/// in-flight computation instead of running it twice.
///
pub struct Entry<N: Node> {
    node: Arc<N>,
    state: Arc<Mutex<EntryState<N>>>,
}

impl<N: Node> Clone for Entry<N> {
    fn clone(&self) -> Self {
        Entry {
            node: self.node.clone(),
            state: self.state.clone(),
        }
    }
}

impl<N: Node> Entry<N> {
    pub(crate) fn new(node: N) -> Entry<N> {
        Entry {
            node: Arc::new(node),
            state: Arc::new(Mutex::new(EntryState::NotStarted)),
        }
    }

    pub fn node(&self) -> &N {
        &self.node
    }

    ///
    /// Returns this Node's memoized result, running it at most once.
    ///
    /// The first caller to find the cell empty starts the computation and stores a `Shared`
    /// future in it before releasing the lock; every other caller -- whether already waiting, or
    /// arriving after the first has completed -- clones that same `Shared` and awaits it,
    /// observing either the in-flight computation or its cached result.
    ///
    pub async fn get_or_run(&self, context: Context<N>) -> Result<N::Item, N::Error> {
        let shared = {
            let mut state = self.state.lock();
            match &*state {
                EntryState::Started(shared) => shared.clone(),
                EntryState::NotStarted => {
                    let node = (*self.node).clone();
                    let fut: BoxFuture<'static, Result<N::Item, N::Error>> = node.run(context);
                    let shared = fut.shared();
                    *state = EntryState::Started(shared.clone());
                    shared
                }
            }
        };
        shared.await
    }
}
