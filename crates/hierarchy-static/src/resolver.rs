use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use hierarchy_model::{ObjectResolver, ResolveError, WPObject};
use log::debug;

use crate::error::StaticError;
use crate::store::ObjectStore;

/// Serves a tree of hand-authored JSON objects. It has no search support.
#[derive(Debug, Clone)]
pub struct StaticResolver {
    store: Arc<ObjectStore>,
}

impl StaticResolver {
    /// # Errors
    /// `MissingRoot` when `objects_dir` is not a directory, `DuplicateId`
    /// when two objects would be served under one id.
    pub fn open(objects_dir: &Path, icon_base: &Path) -> Result<Self, StaticError> {
        Ok(Self {
            store: Arc::new(ObjectStore::open(objects_dir, icon_base)?),
        })
    }
}

#[async_trait]
impl ObjectResolver for StaticResolver {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn resolve(&self, id: &str) -> Result<Vec<WPObject>, ResolveError> {
        debug!("static: listing {id}");
        let store = Arc::clone(&self.store);
        let id = id.to_string();
        tokio::task::spawn_blocking(move || -> Result<Vec<WPObject>, ResolveError> {
            let dir = store.directory_for(&id)?;
            if !store.contains(&id)? {
                return Err(ResolveError::not_found(id));
            }
            Ok(store.objects_in(&dir, &id)?)
        })
        .await
        .map_err(|err| ResolveError::backend_from("static objects", err))?
    }
}
