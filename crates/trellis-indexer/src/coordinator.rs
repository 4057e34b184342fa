//! Serializes recompute requests from independent triggers
//!
//! At most one recompute is in flight. Requests arriving while one runs are
//! folded into a single pending follow-up, started as soon as the current run
//! finishes, whether that run succeeded or failed. A panicking source counts
//! as a failed run.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use futures_util::FutureExt;
use tokio::sync::watch;
use tracing::{debug, error, info};
use trellis_core::{Broadcaster, GraphCache, GraphEvent, GraphSnapshot, RecomputeError};

use crate::source::GraphSource;

/// Origin of a recompute request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    FileChange,
    ClientReload,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trigger::Startup => "startup",
            Trigger::FileChange => "file change",
            Trigger::ClientReload => "client reload",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
}

/// What happened to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A run was started for this request.
    Started,
    /// A run is already in flight; one follow-up run is scheduled.
    Coalesced,
}

#[derive(Debug, Default)]
struct Slot {
    running: bool,
    pending: Option<Trigger>,
}

pub struct RecomputeCoordinator {
    source: Arc<dyn GraphSource>,
    cache: Arc<GraphCache>,
    broadcaster: Broadcaster,
    slot: Mutex<Slot>,
    phase: watch::Sender<Phase>,
    runs: AtomicU64,
}

impl RecomputeCoordinator {
    pub fn new(
        source: Arc<dyn GraphSource>,
        cache: Arc<GraphCache>,
        broadcaster: Broadcaster,
    ) -> Arc<Self> {
        let (phase, _) = watch::channel(Phase::Idle);
        Arc::new(Self {
            source,
            cache,
            broadcaster,
            slot: Mutex::new(Slot::default()),
            phase,
            runs: AtomicU64::new(0),
        })
    }

    pub fn cache(&self) -> &Arc<GraphCache> {
        &self.cache
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Number of runs started so far.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Acquire)
    }

    /// Ask for a recompute. Must be called from within a tokio runtime.
    pub fn request_recompute(self: &Arc<Self>, trigger: Trigger) -> RequestOutcome {
        {
            let mut slot = self.lock_slot();
            if slot.running {
                match slot.pending.replace(trigger) {
                    None => debug!("Recompute in flight, queued follow-up ({})", trigger),
                    Some(_) => debug!("Recompute in flight, coalesced request ({})", trigger),
                }
                return RequestOutcome::Coalesced;
            }
            slot.running = true;
            self.phase.send_replace(Phase::Running);
        }

        tokio::spawn(Arc::clone(self).drive(trigger));
        RequestOutcome::Started
    }

    /// Resolves once no run is in flight and none is pending.
    pub async fn wait_idle(&self) {
        let mut rx = self.phase.subscribe();
        // the sender lives as long as self, so this cannot fail
        let _ = rx.wait_for(|phase| *phase == Phase::Idle).await;
    }

    async fn drive(self: Arc<Self>, first: Trigger) {
        let mut trigger = first;
        loop {
            self.run_once(trigger).await;
            match self.finish_run() {
                Some(next) => trigger = next,
                None => return,
            }
        }
    }

    /// Take the pending follow-up, or go idle when there is none.
    fn finish_run(&self) -> Option<Trigger> {
        let mut slot = self.lock_slot();
        let next = slot.pending.take();
        if next.is_none() {
            slot.running = false;
            self.phase.send_replace(Phase::Idle);
        }
        next
    }

    async fn run_once(&self, trigger: Trigger) {
        let run = self.runs.fetch_add(1, Ordering::AcqRel) + 1;
        info!(run, "Recomputing graph ({})", trigger);

        let started = Instant::now();
        // a panic must not leave the slot marked running forever
        let result = AssertUnwindSafe(self.source.compute())
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(RecomputeError::Panicked {
                    message: panic_message(payload.as_ref()),
                })
            });

        let event = match result {
            Ok(graph) => {
                let snapshot = Arc::new(GraphSnapshot::new(run, graph, started.elapsed()));
                info!(
                    run,
                    "Graph updated: {} nodes in {}ms",
                    snapshot.graph().node_count(),
                    snapshot.elapsed_ms()
                );
                self.cache.publish(Arc::clone(&snapshot));
                GraphEvent::Updated(snapshot)
            }
            Err(e) => {
                error!(run, kind = e.kind(), "Recompute failed: {}", e);
                GraphEvent::Failed {
                    run,
                    message: e.to_string(),
                }
            }
        };

        let delivered = self.broadcaster.send(event);
        debug!(run, "Delivered result to {} client(s)", delivered);
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl fmt::Debug for RecomputeCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecomputeCoordinator")
            .field("phase", &self.phase())
            .field("runs", &self.runs())
            .finish_non_exhaustive()
    }
}
