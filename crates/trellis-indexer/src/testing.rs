//! Test doubles for code driving a [`GraphSource`]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{Semaphore, watch};
use trellis_core::{Graph, Node, RecomputeError};

use crate::source::GraphSource;

/// Replays queued results, one per `compute` call. An empty queue yields an
/// empty graph.
///
/// A gated source parks every call until [`release`](Self::release) hands out a
/// permit, which lets tests hold a run in flight.
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Graph, RecomputeError>>>,
    gate: Option<Arc<Semaphore>>,
    calls: watch::Sender<usize>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn gated() -> Self {
        Self::build(Some(Arc::new(Semaphore::new(0))))
    }

    fn build(gate: Option<Arc<Semaphore>>) -> Self {
        let (calls, _) = watch::channel(0);
        ScriptedSource {
            script: Mutex::new(VecDeque::new()),
            gate,
            calls,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn push_ok(&self, nodes: Vec<Node>) {
        self.push(Ok(Graph::from_nodes(nodes)));
    }

    pub fn push_err(&self, err: RecomputeError) {
        self.push(Err(err));
    }

    fn push(&self, result: Result<Graph, RecomputeError>) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
    }

    /// Let `runs` parked or future calls proceed.
    pub fn release(&self, runs: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(runs);
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub async fn wait_for_calls(&self, at_least: usize) {
        let mut rx = self.calls.subscribe();
        let _ = rx.wait_for(|calls| *calls >= at_least).await;
    }
}

impl Default for ScriptedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphSource for ScriptedSource {
    async fn compute(&self) -> Result<Graph, RecomputeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.send_modify(|calls| *calls += 1);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let result = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok(Graph::new()));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
