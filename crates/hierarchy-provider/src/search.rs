//! Handle table for background searches.
//!
//! Each search runs as its own task that owns the accumulated results and
//! publishes them through a `watch` channel; polls only read the latest
//! snapshot. Results are append-only and `done` is published after the last
//! result, so consecutive polls never lose or reorder anything.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use hierarchy_model::{
    BackgroundSearch, ObjectResolver, ResolveError, SearchPlan, SearchRequest, SearchSink,
    SearchState, WPObject,
};
use log::{debug, info, warn};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

const HANDLE_CLASS: &str = "WPSearchHandle";
const PROGRESS_CLASS: &str = "WPSearchProgress";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// A handle nobody polled for this long is dropped.
    pub idle_timeout: Duration,
    pub reap_interval: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(600),
            reap_interval: Duration::from_secs(60),
        }
    }
}

/// The public face of a running search, as returned when it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHandleInfo {
    pub id: String,
    pub search: String,
    pub recursive: bool,
    pub started: DateTime<Utc>,
}

impl SearchHandleInfo {
    fn new(request: &SearchRequest) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            search: request.search.clone(),
            recursive: request.recursive,
            started: Utc::now(),
        }
    }

    #[must_use]
    pub fn to_wire(&self) -> Value {
        json!({
            "class": HANDLE_CLASS,
            "id": self.id,
            "title": format!("Search: {}", self.search),
            "icon": null,
            "objects": 0,
            "search": self.search,
            "recursive": self.recursive,
            "started": self.started.to_rfc3339(),
        })
    }
}

#[derive(Debug)]
pub enum SearchOutcome {
    Unsupported,
    Immediate(Vec<WPObject>),
    Started(SearchHandleInfo),
}

impl SearchOutcome {
    #[must_use]
    pub fn to_response(&self) -> Value {
        match self {
            Self::Unsupported => json!({ "objects": [] }),
            Self::Immediate(objects) => json!({ "objects": objects }),
            Self::Started(handle) => json!({ "handle": handle.to_wire() }),
        }
    }
}

/// Results observed by one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPoll {
    pub id: String,
    pub results: Vec<WPObject>,
    pub state: SearchState,
}

impl SearchPoll {
    #[must_use]
    pub fn to_response(&self) -> Value {
        json!({
            "objects": self.results,
            "progress": {
                "class": PROGRESS_CLASS,
                "id": self.id,
                "state": self.state,
            },
        })
    }
}

#[derive(Debug, Clone)]
struct Snapshot {
    results: Vec<WPObject>,
    state: SearchState,
}

struct HandleEntry {
    snapshot: watch::Receiver<Snapshot>,
    last_polled: Instant,
    collector: AbortHandle,
}

#[derive(Default)]
pub struct SearchEngine {
    config: SearchConfig,
    handles: Mutex<HashMap<String, HandleEntry>>,
}

impl SearchEngine {
    #[must_use]
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            handles: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> SearchConfig {
        self.config
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<String, HandleEntry>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask the resolver for a search plan and start it when it runs in the
    /// background. Must be called inside a tokio runtime.
    ///
    /// # Errors
    /// Whatever the resolver reports while planning the search.
    pub async fn start(
        &self,
        resolver: &dyn ObjectResolver,
        request: SearchRequest,
    ) -> Result<SearchOutcome, ResolveError> {
        match resolver.search(&request).await? {
            SearchPlan::Unsupported => Ok(SearchOutcome::Unsupported),
            SearchPlan::Immediate(results) => Ok(SearchOutcome::Immediate(results)),
            SearchPlan::Background(search) => Ok(SearchOutcome::Started(self.spawn(&request, search))),
        }
    }

    fn spawn(&self, request: &SearchRequest, search: Box<dyn BackgroundSearch>) -> SearchHandleInfo {
        let info = SearchHandleInfo::new(request);
        let (tx, rx) = watch::channel(Snapshot {
            results: Vec::new(),
            state: SearchState::Ongoing,
        });

        info!(
            "Search {} started for {:?} below {} (recursive: {})",
            info.id, request.search, request.id, request.recursive
        );
        let collector = tokio::spawn(collect(info.id.clone(), search, tx));
        self.handles().insert(
            info.id.clone(),
            HandleEntry {
                snapshot: rx,
                last_polled: Instant::now(),
                collector: collector.abort_handle(),
            },
        );
        info
    }

    /// Current results of a handle; `None` when the handle is unknown or was
    /// reaped. Polling keeps the handle alive.
    pub fn poll(&self, id: &str) -> Option<SearchPoll> {
        let mut handles = self.handles();
        let entry = handles.get_mut(id)?;
        entry.last_polled = Instant::now();
        let snapshot = entry.snapshot.borrow();
        Some(SearchPoll {
            id: id.to_string(),
            results: snapshot.results.clone(),
            state: snapshot.state,
        })
    }

    /// Drop handles idle for longer than the configured timeout as of `now`,
    /// stopping their searches. Returns how many were dropped.
    pub fn reap(&self, now: Instant) -> usize {
        let idle_timeout = self.config.idle_timeout;
        let mut handles = self.handles();
        let before = handles.len();
        handles.retain(|id, entry| {
            let keep = now.saturating_duration_since(entry.last_polled) < idle_timeout;
            if !keep {
                entry.collector.abort();
                debug!("Reaped search handle {id}");
            }
            keep
        });
        before - handles.len()
    }

    /// Reap idle handles periodically until `shutdown` is cancelled.
    pub async fn run_reaper(self: Arc<Self>, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.reap_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.reap(Instant::now());
                }
            }
        }
        debug!("Search reaper stopped");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

async fn collect(id: String, search: Box<dyn BackgroundSearch>, tx: watch::Sender<Snapshot>) {
    let (sink, mut results) = SearchSink::channel();
    let worker = tokio::spawn(search.run(sink));

    while let Some(object) = results.recv().await {
        tx.send_modify(|snapshot| snapshot.results.push(object));
    }

    match worker.await {
        Ok(Ok(())) => info!("Search {id} finished"),
        Ok(Err(err)) => warn!("Search {id} failed, keeping partial results: {err}"),
        Err(err) if err.is_panic() => warn!("Search {id} panicked, keeping partial results"),
        Err(err) => warn!("Search {id} was cancelled: {err}"),
    }
    tx.send_modify(|snapshot| snapshot.state = SearchState::Done);
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;

    /// Pushes whatever the test feeds it; ends when the feed closes.
    struct FedSearch {
        feed: mpsc::UnboundedReceiver<Result<WPObject, ResolveError>>,
    }

    #[async_trait]
    impl BackgroundSearch for FedSearch {
        async fn run(mut self: Box<Self>, sink: SearchSink) -> Result<(), ResolveError> {
            while let Some(item) = self.feed.recv().await {
                sink.push(item?);
            }
            Ok(())
        }
    }

    struct PanickingSearch;

    #[async_trait]
    impl BackgroundSearch for PanickingSearch {
        async fn run(self: Box<Self>, sink: SearchSink) -> Result<(), ResolveError> {
            sink.push(WPObject::new("WPFile", "/partial", "partial"));
            panic!("backend exploded");
        }
    }

    fn request() -> SearchRequest {
        SearchRequest {
            id: "/".to_string(),
            search: "python".to_string(),
            recursive: true,
        }
    }

    fn file(name: &str) -> WPObject {
        WPObject::new("WPFile", format!("/{name}"), name)
    }

    async fn poll_until(
        engine: &SearchEngine,
        id: &str,
        done: impl Fn(&SearchPoll) -> bool,
    ) -> SearchPoll {
        for _ in 0..200 {
            let poll = engine.poll(id).expect("handle is known");
            if done(&poll) {
                return poll;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("search {id} did not reach the expected state");
    }

    #[tokio::test]
    async fn polls_are_monotonic_and_idempotent_after_done() {
        let engine = SearchEngine::default();
        let (feed, rx) = mpsc::unbounded_channel();
        let info = engine.spawn(&request(), Box::new(FedSearch { feed: rx }));

        let first = engine.poll(&info.id).expect("handle is known");
        assert_eq!(first.state, SearchState::Ongoing);
        assert!(first.results.is_empty());

        feed.send(Ok(file("a"))).expect("feed open");
        let second = poll_until(&engine, &info.id, |p| p.results.len() == 1).await;
        assert_eq!(second.state, SearchState::Ongoing);

        feed.send(Ok(file("b"))).expect("feed open");
        drop(feed);
        let third = poll_until(&engine, &info.id, |p| p.state.is_done()).await;
        assert_eq!(third.results[..second.results.len()], second.results[..]);
        assert_eq!(third.results.len(), 2);

        let again = engine.poll(&info.id).expect("done handles stay pollable");
        assert_eq!(again, third);
    }

    #[tokio::test]
    async fn backend_error_ends_done_with_partial_results() {
        let engine = SearchEngine::default();
        let (feed, rx) = mpsc::unbounded_channel();
        let info = engine.spawn(&request(), Box::new(FedSearch { feed: rx }));

        feed.send(Ok(file("a"))).expect("feed open");
        feed.send(Err(ResolveError::backend("module spider", "timed out")))
            .expect("feed open");

        let poll = poll_until(&engine, &info.id, |p| p.state.is_done()).await;
        assert_eq!(poll.results, [file("a")]);
    }

    #[tokio::test]
    async fn panicking_search_ends_done_with_partial_results() {
        let engine = SearchEngine::default();
        let info = engine.spawn(&request(), Box::new(PanickingSearch));

        let poll = poll_until(&engine, &info.id, |p| p.state.is_done()).await;

        assert_eq!(poll.results.len(), 1);
    }

    #[tokio::test]
    async fn idle_handles_are_reaped() {
        let engine = SearchEngine::new(SearchConfig {
            idle_timeout: Duration::from_secs(30),
            reap_interval: Duration::from_secs(1),
        });
        let (_feed, rx) = mpsc::unbounded_channel();
        let info = engine.spawn(&request(), Box::new(FedSearch { feed: rx }));

        assert_eq!(engine.reap(Instant::now()), 0);
        assert_eq!(engine.reap(Instant::now() + Duration::from_secs(31)), 1);
        assert!(engine.poll(&info.id).is_none());
        assert!(engine.is_empty());
    }

    #[tokio::test]
    async fn reaper_stops_on_cancellation() {
        let engine = Arc::new(SearchEngine::default());
        let shutdown = CancellationToken::new();
        let reaper = tokio::spawn(Arc::clone(&engine).run_reaper(shutdown.clone()));

        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), reaper)
            .await
            .expect("reaper stops")
            .expect("reaper does not panic");
    }

    #[test]
    fn wire_shapes() {
        let info = SearchHandleInfo::new(&request());
        let handle = SearchOutcome::Started(info.clone()).to_response();

        assert_eq!(handle["handle"]["class"], HANDLE_CLASS);
        assert_eq!(handle["handle"]["id"], info.id.as_str());
        assert_eq!(handle["handle"]["recursive"], true);
        assert_eq!(SearchOutcome::Unsupported.to_response(), json!({"objects": []}));

        let poll = SearchPoll {
            id: info.id.clone(),
            results: Vec::new(),
            state: SearchState::Ongoing,
        };
        assert_eq!(
            poll.to_response(),
            json!({
                "objects": [],
                "progress": {"class": PROGRESS_CLASS, "id": info.id, "state": "ongoing"}
            })
        );
    }
}
