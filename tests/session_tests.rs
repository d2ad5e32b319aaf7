//! Search session state machine under a paused tokio clock: debouncing,
//! cancellation, and response ordering are all exercised deterministically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use docsearch::{
    Result, SearchBackend, SearchError, SearchResult, SearchSession, SessionStatus,
};

/// A backend that records every query it receives and answers with a single
/// result naming the query, after an optional delay.
struct ScriptedBackend {
    queries: Mutex<Vec<String>>,
    delay: Duration,
    fail: AtomicBool,
}

impl ScriptedBackend {
    fn new() -> Arc<Self> {
        Self::delayed(Duration::ZERO)
    }

    fn delayed(delay: Duration) -> Arc<Self> {
        Arc::new(Self { queries: Mutex::new(Vec::new()), delay, fail: AtomicBool::new(false) })
    }

    fn failing() -> Arc<Self> {
        let backend = Self::new();
        backend.fail.store(true, Ordering::SeqCst);
        backend
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for ScriptedBackend {
    async fn search(&self, text: &str, _limit: usize) -> Result<Vec<SearchResult>> {
        self.queries.lock().unwrap().push(text.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(SearchError::provider("scripted", "scripted failure"));
        }
        Ok(vec![SearchResult {
            slug: text.to_string(),
            chunk_index: 0,
            title: text.to_uppercase(),
            folder: "docs".into(),
            tags: Vec::new(),
            snippet: String::new(),
            score: 1.0,
        }])
    }
}

/// Let the paused clock run until all pending session work has resolved.
async fn settle() {
    tokio::time::sleep(Duration::from_secs(5)).await;
}

#[tokio::test(start_paused = true)]
async fn rapid_keystrokes_fire_a_single_request() {
    let backend = ScriptedBackend::new();
    let session = SearchSession::new(backend.clone());
    session.open();

    session.input("p");
    session.input("po");
    session.input("postgres");
    settle().await;

    assert_eq!(backend.queries(), vec!["postgres"]);
    let snapshot = session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Success);
    assert_eq!(snapshot.query, "postgres");
    assert_eq!(snapshot.results.len(), 1);
    assert_eq!(snapshot.results[0].slug, "postgres");
}

#[tokio::test(start_paused = true)]
async fn each_keystroke_restarts_the_debounce_timer() {
    let backend = ScriptedBackend::new();
    let session = SearchSession::new(backend.clone());
    session.open();

    session.input("postgre");
    tokio::time::sleep(Duration::from_millis(200)).await;
    session.input("postgres");
    tokio::time::sleep(Duration::from_millis(200)).await;

    // 400ms of wall time, but no timer ever reached 300ms until now.
    assert!(backend.queries().is_empty());
    assert_eq!(session.snapshot().status, SessionStatus::Debouncing);

    settle().await;
    assert_eq!(backend.queries(), vec!["postgres"]);
}

#[tokio::test(start_paused = true)]
async fn a_newer_query_discards_the_in_flight_response() {
    let backend = ScriptedBackend::delayed(Duration::from_millis(500));
    let session = SearchSession::new(backend.clone());
    session.open();

    session.input("first query");
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(session.snapshot().status, SessionStatus::Requesting);

    // The slow first request is still in flight when the new query lands.
    session.input("second query");
    settle().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Success);
    assert_eq!(snapshot.results[0].slug, "second query");
    assert_eq!(backend.queries(), vec!["first query", "second query"]);
}

#[tokio::test(start_paused = true)]
async fn short_queries_resolve_empty_without_a_request() {
    let backend = ScriptedBackend::new();
    let session = SearchSession::new(backend.clone());
    session.open();

    session.input("a");
    settle().await;

    assert!(backend.queries().is_empty());
    let snapshot = session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Success);
    assert!(snapshot.results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn closing_cancels_the_pending_debounce() {
    let backend = ScriptedBackend::new();
    let session = SearchSession::new(backend.clone());
    session.open();

    session.input("database");
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.close();
    settle().await;

    assert!(backend.queries().is_empty());
    let snapshot = session.snapshot();
    assert!(!snapshot.open);
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert!(snapshot.query.is_empty());
}

#[tokio::test(start_paused = true)]
async fn closing_discards_an_in_flight_response() {
    let backend = ScriptedBackend::delayed(Duration::from_millis(500));
    let session = SearchSession::new(backend.clone());
    session.open();

    session.input("database");
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(backend.queries().len(), 1);

    session.close();
    settle().await;

    let snapshot = session.snapshot();
    assert!(!snapshot.open);
    assert_eq!(snapshot.status, SessionStatus::Idle);
    assert!(snapshot.results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn input_is_ignored_while_closed() {
    let backend = ScriptedBackend::new();
    let session = SearchSession::new(backend.clone());

    session.input("database");
    settle().await;

    assert!(backend.queries().is_empty());
    assert_eq!(session.snapshot().status, SessionStatus::Idle);
    assert!(session.snapshot().query.is_empty());
}

#[tokio::test(start_paused = true)]
async fn toggle_flips_visibility_and_reset_state() {
    let backend = ScriptedBackend::new();
    let session = SearchSession::new(backend.clone());

    session.toggle_open();
    assert!(session.is_open());

    session.input("database");
    settle().await;
    assert_eq!(session.snapshot().results.len(), 1);

    session.toggle_open();
    assert!(!session.is_open());
    assert!(session.snapshot().results.is_empty());
}

#[tokio::test(start_paused = true)]
async fn backend_failure_sets_error_status() {
    let backend = ScriptedBackend::failing();
    let session = SearchSession::new(backend.clone());
    session.open();

    session.input("database");
    settle().await;

    let snapshot = session.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Error);
    assert!(snapshot.results.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_serializes_with_response_application() {
    let backend = ScriptedBackend::new();
    // Real time and real threads: shutdown lands at varying points of the
    // response lifecycle, including mid-application.
    for _ in 0..50 {
        let session = SearchSession::new(backend.clone())
            .with_debounce(Duration::from_millis(1));
        session.open();
        session.input("database");
        tokio::time::sleep(Duration::from_millis(2)).await;

        session.shutdown();
        let at_shutdown = session.snapshot();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(session.snapshot(), at_shutdown);
    }
}

#[tokio::test(start_paused = true)]
async fn no_state_changes_after_shutdown() {
    let backend = ScriptedBackend::delayed(Duration::from_millis(500));
    let session = SearchSession::new(backend.clone());
    session.open();

    session.input("database");
    tokio::time::sleep(Duration::from_millis(350)).await;
    session.shutdown();
    settle().await;

    assert_eq!(session.snapshot().status, SessionStatus::Requesting);
    assert!(session.snapshot().results.is_empty());

    session.open();
    session.input("again");
    settle().await;
    assert_eq!(backend.queries(), vec!["database"]);
}
