//! Client-side search session: debounce, cancellation, dialog state.
//!
//! [`SearchSession`] owns the user-facing lifecycle of the search dialog:
//! every keystroke restarts a debounce timer, only the timer that survives
//! fires a request, and a response is applied only if no newer query (or a
//! close/shutdown) superseded it in the meantime. That last guard is
//! generation-based, which rules out the classic stale-response-overwrites-
//! fresh-state race by construction: superseded work is both aborted and,
//! should its result still arrive, discarded on arrival.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::document::SearchResult;
use crate::error::Result;
use crate::query::MIN_QUERY_LEN;

/// Default debounce window between a keystroke and the request it fires.
pub const DEBOUNCE: Duration = Duration::from_millis(300);

/// Default result limit requested per search.
const DEFAULT_LIMIT: usize = 10;

/// What the session talks to when a debounced query fires.
///
/// [`crate::QueryEngine`] implements this; tests plug in scripted fakes.
#[async_trait]
pub trait SearchBackend: Send + Sync + 'static {
    /// Execute a search for the given query text.
    async fn search(&self, text: &str, limit: usize) -> Result<Vec<SearchResult>>;
}

/// Where the search pipeline currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Nothing pending.
    Idle,
    /// A keystroke arrived; the debounce timer is running.
    Debouncing,
    /// A request is in flight.
    Requesting,
    /// The latest request completed with results (possibly empty).
    Success,
    /// The latest request failed. The UI shows a generic failure message.
    Error,
}

/// A point-in-time copy of the session state for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Current query text.
    pub query: String,
    /// Results of the latest authoritative response.
    pub results: Vec<SearchResult>,
    /// Pipeline status.
    pub status: SessionStatus,
    /// Whether the dialog is visible.
    pub open: bool,
}

#[derive(Debug)]
struct Inner {
    query: String,
    results: Vec<SearchResult>,
    status: SessionStatus,
    open: bool,
}

/// The search dialog state machine.
///
/// At most one pending unit of work (debounce timer or in-flight request)
/// is authoritative at a time. Every keystroke, close, or shutdown bumps a
/// generation counter; a task only writes state while its own generation is
/// still current.
pub struct SearchSession {
    backend: Arc<dyn SearchBackend>,
    state: Arc<Mutex<Inner>>,
    generation: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
    alive: Arc<AtomicBool>,
    debounce: Duration,
    limit: usize,
}

impl SearchSession {
    /// Create a session over a backend. The dialog starts closed and idle.
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(Inner {
                query: String::new(),
                results: Vec::new(),
                status: SessionStatus::Idle,
                open: false,
            })),
            generation: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
            alive: Arc::new(AtomicBool::new(true)),
            debounce: DEBOUNCE,
            limit: DEFAULT_LIMIT,
        }
    }

    /// Override the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Override the per-search result limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Snapshot the current state for rendering.
    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.state.lock().unwrap_or_else(|p| p.into_inner());
        SessionSnapshot {
            query: inner.query.clone(),
            results: inner.results.clone(),
            status: inner.status,
            open: inner.open,
        }
    }

    /// Whether the dialog is currently visible.
    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).open
    }

    /// Toggle dialog visibility; the global keyboard shortcut lands here.
    ///
    /// Works in every pipeline state. Closing cancels the pending debounce
    /// timer and marks any in-flight request non-authoritative.
    pub fn toggle_open(&self) {
        if self.is_open() {
            self.close();
        } else {
            self.open();
        }
    }

    /// Show the dialog.
    pub fn open(&self) {
        if !self.alive.load(Ordering::SeqCst) {
            return;
        }
        self.state.lock().unwrap_or_else(|p| p.into_inner()).open = true;
    }

    /// Hide the dialog, cancelling all pending work and resetting to idle.
    pub fn close(&self) {
        self.supersede();
        let mut inner = self.state.lock().unwrap_or_else(|p| p.into_inner());
        inner.open = false;
        inner.status = SessionStatus::Idle;
        inner.query.clear();
        inner.results.clear();
    }

    /// Feed a keystroke's worth of query text.
    ///
    /// Restarts the debounce timer; only the timer that survives
    /// un-interrupted fires a request. Ignored while the dialog is closed
    /// or after [`shutdown`](SearchSession::shutdown).
    pub fn input(&self, text: &str) {
        if !self.alive.load(Ordering::SeqCst) || !self.is_open() {
            debug!("ignoring input while closed");
            return;
        }

        let generation = self.supersede();
        {
            let mut inner = self.state.lock().unwrap_or_else(|p| p.into_inner());
            inner.query = text.to_string();
            inner.status = SessionStatus::Debouncing;
        }

        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        let current = Arc::clone(&self.generation);
        let query = text.to_string();
        let debounce = self.debounce;
        let limit = self.limit;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }

            // Short queries resolve without a request.
            if query.trim().chars().count() < MIN_QUERY_LEN {
                apply(&state, &current, generation, |inner| {
                    inner.status = SessionStatus::Success;
                    inner.results.clear();
                });
                return;
            }

            apply(&state, &current, generation, |inner| {
                inner.status = SessionStatus::Requesting;
            });

            let outcome = backend.search(&query, limit).await;
            apply(&state, &current, generation, |inner| match outcome {
                Ok(results) => {
                    inner.results = results;
                    inner.status = SessionStatus::Success;
                }
                Err(_) => {
                    inner.results.clear();
                    inner.status = SessionStatus::Error;
                }
            });
        });

        if let Some(old) = self
            .task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .replace(handle)
        {
            old.abort();
        }
    }

    /// Tear the session down; no state update may occur afterwards.
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.supersede();
    }

    /// Invalidate all outstanding work. Returns the new generation.
    ///
    /// The bump happens under the state lock so it serializes with
    /// [`apply`]'s check-and-write: a response either lands entirely before
    /// the bump or observes the new generation and is discarded. Without
    /// the lock a task that already passed the check could still write
    /// after a shutdown returned.
    fn supersede(&self) -> u64 {
        let generation = {
            let _state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        if let Some(task) = self.task.lock().unwrap_or_else(|p| p.into_inner()).take() {
            task.abort();
        }
        generation
    }
}

impl Drop for SearchSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Mutate the session state only if `generation` is still authoritative.
/// The check happens under the state lock, so a supersede-then-write race
/// cannot slip a stale update through.
fn apply(
    state: &Mutex<Inner>,
    current: &AtomicU64,
    generation: u64,
    mutate: impl FnOnce(&mut Inner),
) {
    let mut inner = state.lock().unwrap_or_else(|p| p.into_inner());
    if current.load(Ordering::SeqCst) != generation {
        debug!(generation, "discarding superseded session update");
        return;
    }
    mutate(&mut inner);
}
