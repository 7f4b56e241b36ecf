use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::traits::BackgroundSearch;
use crate::types::WPObject;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub id: String,
    pub search: String,
    pub recursive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchState {
    Ongoing,
    Done,
}

impl SearchState {
    #[must_use]
    pub fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ongoing => write!(f, "ongoing"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// How a resolver answers a search request.
pub enum SearchPlan {
    /// The provider or the addressed object does not support search.
    Unsupported,
    /// Complete results, returned in the same response.
    Immediate(Vec<WPObject>),
    /// Results are produced by a background task and polled through a handle.
    Background(Box<dyn BackgroundSearch>),
}

impl fmt::Debug for SearchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported => f.write_str("Unsupported"),
            Self::Immediate(results) => f.debug_tuple("Immediate").field(&results.len()).finish(),
            Self::Background(_) => f.write_str("Background(..)"),
        }
    }
}

/// Write end handed to a background search. Results pushed here are appended
/// to the handle in order and are never retracted.
#[derive(Debug, Clone)]
pub struct SearchSink {
    tx: mpsc::UnboundedSender<WPObject>,
}

impl SearchSink {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WPObject>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Append one result. Returns `false` once nobody is collecting results
    /// anymore, which a search may take as a hint to stop early.
    pub fn push(&self, object: WPObject) -> bool {
        self.tx.send(object).is_ok()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(SearchState::Ongoing).expect("state serializes"),
            "ongoing"
        );
        assert_eq!(SearchState::Done.to_string(), "done");
        assert!(SearchState::Done.is_done());
    }

    #[tokio::test]
    async fn sink_preserves_push_order_and_reports_closed_receiver() {
        let (sink, mut rx) = SearchSink::channel();

        assert!(sink.push(WPObject::new("WPFile", "/a", "a")));
        assert!(sink.push(WPObject::new("WPFile", "/b", "b")));

        assert_eq!(rx.recv().await.map(|o| o.id), Some("/a".to_string()));
        assert_eq!(rx.recv().await.map(|o| o.id), Some("/b".to_string()));

        drop(rx);
        assert!(sink.is_closed());
        assert!(!sink.push(WPObject::new("WPFile", "/c", "c")));
    }
}
