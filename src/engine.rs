use crate::types::{Candidate, Outcome, ProbeResult};
use crate::view::View;
use anyhow::Result;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, warn};

/// Shared handles into a running scan: dispatch/completion counters, the
/// in-flight gauge, and the accumulated results. All fields are cheaply
/// cloneable so observers (the live view, tests) can sample mid-scan.
#[derive(Clone, Debug)]
pub struct SharedProgress {
    pub dispatched: Arc<AtomicU64>,
    pub completed: Arc<AtomicU64>,
    pub in_flight: Arc<AtomicU64>,
    pub entries: Arc<Mutex<Vec<ProbeResult>>>,
}

impl SharedProgress {
    pub fn new() -> Self {
        Self {
            dispatched: Arc::new(AtomicU64::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicU64::new(0)),
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for SharedProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one scan kind over the candidate list with a bounded number of
/// outstanding probes.
///
/// - Dispatches exactly one probe per candidate, in candidate order, with no
///   retries; admission is a `Semaphore` whose owned permit lives for the
///   whole probe task, so at most `limit` probes are outstanding at once.
/// - `probe` classifies each candidate into an [`Outcome`]; only `Accepted`
///   appends to the result vector, which is ordered by completion, not by
///   candidate.
/// - A `StreamFatal` outcome stops further dispatch for this scan while
///   keeping everything already accumulated.
/// - Returns only after every spawned probe has reached a terminal state
///   (the drain phase), so the caller can persist immediately.
pub async fn run_scan<F, Fut>(
    candidates: Vec<Candidate>,
    limit: usize,
    view: Option<View>,
    probe: F,
) -> Result<Vec<ProbeResult>>
where
    F: Fn(Candidate) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    run_scan_with_shared(candidates, limit, view, probe, SharedProgress::new()).await
}

/// Variant that scans through caller-provided [`SharedProgress`] handles.
pub async fn run_scan_with_shared<F, Fut>(
    candidates: Vec<Candidate>,
    limit: usize,
    view: Option<View>,
    probe: F,
    shared: SharedProgress,
) -> Result<Vec<ProbeResult>>
where
    F: Fn(Candidate) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    let sem = Arc::new(Semaphore::new(limit.clamp(1, 512)));
    let halt = Arc::new(AtomicBool::new(false));
    let probe = Arc::new(probe);
    let mut set = JoinSet::new();

    for cand in candidates {
        if halt.load(Ordering::Relaxed) {
            break;
        }
        let permit = sem
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore in scope");
        // A fatal signal may have landed while we waited on a slot.
        if halt.load(Ordering::Relaxed) {
            break;
        }

        if let Some(v) = &view {
            v.dispatch(cand.identity().to_string());
        }
        shared.dispatched.fetch_add(1, Ordering::Relaxed);
        shared.in_flight.fetch_add(1, Ordering::Relaxed);

        let probe = probe.clone();
        let halt = halt.clone();
        let view = view.clone();
        let entries = shared.entries.clone();
        let completed = shared.completed.clone();
        let in_flight = shared.in_flight.clone();

        set.spawn(async move {
            let _permit = permit; // held until this probe is terminal

            let label = cand.identity().to_string();
            match probe(cand).await {
                Outcome::Accepted(result) => {
                    let mut guard = entries.lock().await;
                    guard.push(result.clone());
                    drop(guard);
                    if let Some(v) = &view {
                        v.hit(result);
                    }
                }
                Outcome::Ignored => {}
                Outcome::AdapterError(msg) => {
                    error!("probe {label}: {msg}");
                }
                Outcome::StreamFatal(msg) => {
                    warn!("probe {label}: {msg}; halting further dispatch");
                    halt.store(true, Ordering::Relaxed);
                }
            }

            in_flight.fetch_sub(1, Ordering::Relaxed);
            completed.fetch_add(1, Ordering::Relaxed);
        });
    }

    // Drain phase: every in-flight probe reaches a terminal state before the
    // accumulator is handed back for persistence.
    while set.join_next().await.is_some() {}

    let guard = shared.entries.lock().await;
    Ok(guard.clone())
}
