use async_trait::async_trait;

use crate::error::ResolveError;
use crate::search::{SearchPlan, SearchRequest, SearchSink};
use crate::types::WPObject;

/// Id of the (virtual) root object of every provider.
pub const ROOT_ID: &str = "/";

/// Backend adapter contract: turn a path-like id into the objects below it.
///
/// Implementations set `objects` on every returned object to the number of
/// children a subsequent `resolve` of that object's id would return, and
/// encode icons at this boundary.
#[async_trait]
pub trait ObjectResolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Children of `id`, in display order.
    ///
    /// # Errors
    /// `ResolveError::NotFound` when `id` does not address an object; any other
    /// variant when the backend fails.
    async fn resolve(&self, id: &str) -> Result<Vec<WPObject>, ResolveError>;

    async fn root_objects(&self) -> Result<Vec<WPObject>, ResolveError> {
        self.resolve(ROOT_ID).await
    }

    async fn search(&self, _request: &SearchRequest) -> Result<SearchPlan, ResolveError> {
        Ok(SearchPlan::Unsupported)
    }
}

/// A search that runs detached from the request that started it.
#[async_trait]
pub trait BackgroundSearch: Send {
    /// Produce results into `sink` until the search is exhausted. Results
    /// already pushed are kept even when this returns an error.
    async fn run(self: Box<Self>, sink: SearchSink) -> Result<(), ResolveError>;
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;

    struct MockResolver {
        tree: HashMap<&'static str, Vec<WPObject>>,
    }

    impl MockResolver {
        fn new() -> Self {
            let tree = HashMap::from([
                (
                    ROOT_ID,
                    vec![WPObject::new("WPObject", "/ComputeSystems", "Compute Systems").with_children(2)],
                ),
                (
                    "/ComputeSystems",
                    vec![
                        WPObject::new("WPObject", "/ComputeSystems/Quartz", "Quartz"),
                        WPObject::new("WPObject", "/ComputeSystems/RED", "RED"),
                    ],
                ),
            ]);
            Self { tree }
        }
    }

    #[async_trait]
    impl ObjectResolver for MockResolver {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn resolve(&self, id: &str) -> Result<Vec<WPObject>, ResolveError> {
            self.tree
                .get(id)
                .cloned()
                .ok_or_else(|| ResolveError::not_found(id))
        }
    }

    struct CountingSearch(usize);

    #[async_trait]
    impl BackgroundSearch for CountingSearch {
        async fn run(self: Box<Self>, sink: SearchSink) -> Result<(), ResolveError> {
            for n in 0..self.0 {
                sink.push(WPObject::new("WPFile", format!("/{n}"), n.to_string()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn root_objects_default_resolves_root_id() {
        let resolver = MockResolver::new();

        let roots = resolver.root_objects().await.expect("root listing succeeds");

        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].id, "/ComputeSystems");
    }

    #[tokio::test]
    async fn search_default_is_unsupported() {
        let resolver: Arc<dyn ObjectResolver> = Arc::new(MockResolver::new());
        let request = SearchRequest {
            id: ROOT_ID.to_string(),
            search: "python".to_string(),
            recursive: true,
        };

        let plan = resolver.search(&request).await.expect("search answers");

        assert!(matches!(plan, SearchPlan::Unsupported));
    }

    #[tokio::test]
    async fn child_counts_match_resolved_children() {
        let resolver = MockResolver::new();

        for object in resolver.root_objects().await.expect("roots") {
            let children = resolver.resolve(&object.id).await.expect("children");
            assert_eq!(object.objects, children.len() as u64);
        }
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let resolver = MockResolver::new();

        let result = resolver.resolve("/Nope").await;

        assert!(matches!(result, Err(ResolveError::NotFound { ref id }) if id == "/Nope"));
    }

    #[tokio::test]
    async fn background_search_pushes_into_sink() {
        let (sink, mut rx) = SearchSink::channel();
        let search: Box<dyn BackgroundSearch> = Box::new(CountingSearch(3));

        search.run(sink).await.expect("search completes");

        let mut ids = Vec::new();
        while let Some(object) = rx.recv().await {
            ids.push(object.id);
        }
        assert_eq!(ids, ["/0", "/1", "/2"]);
    }
}
