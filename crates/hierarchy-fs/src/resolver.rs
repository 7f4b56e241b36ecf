use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hierarchy_model::{
    ObjectResolver, ResolveError, SearchPlan, SearchRequest, WPObject, encode_icon_file,
};
use log::debug;

use crate::error::FsError;
use crate::listing::{self, path_for};
use crate::search::NameSearch;

pub use crate::listing::FsIcons;

/// Exposes a directory tree as `WPDirectory` and `WPFile` objects.
#[derive(Debug, Clone)]
pub struct FsResolver {
    root: PathBuf,
    icons: FsIcons,
}

impl FsResolver {
    /// # Errors
    /// `MissingRoot` when `root` is not a directory.
    pub fn open(root: &Path) -> Result<Self, FsError> {
        let root = root
            .canonicalize()
            .ok()
            .filter(|root| root.is_dir())
            .ok_or_else(|| FsError::MissingRoot(root.display().to_string()))?;
        Ok(Self {
            root,
            icons: FsIcons::default(),
        })
    }

    /// Use `Directory.png` and `File.png` from `resources` as object icons.
    #[must_use]
    pub fn with_resources(mut self, resources: &Path) -> Self {
        self.icons = FsIcons {
            directory: encode_icon_file(&resources.join("Directory.png")),
            file: encode_icon_file(&resources.join("File.png")),
        };
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn blocking<T, F>(&self, work: F) -> Result<T, ResolveError>
    where
        T: Send + 'static,
        F: FnOnce(PathBuf, FsIcons) -> Result<T, ResolveError> + Send + 'static,
    {
        let root = self.root.clone();
        let icons = self.icons.clone();
        tokio::task::spawn_blocking(move || work(root, icons))
            .await
            .map_err(|err| ResolveError::backend_from("filesystem", err))?
    }
}

#[async_trait]
impl ObjectResolver for FsResolver {
    fn name(&self) -> &'static str {
        "fs"
    }

    async fn resolve(&self, id: &str) -> Result<Vec<WPObject>, ResolveError> {
        debug!("fs: listing {id}");
        let id = id.to_string();
        self.blocking(move |root, icons| {
            let path = path_for(&root, &id)?;
            if path.is_dir() {
                Ok(listing::list(&path, &id, &icons)?)
            } else if path.is_file() {
                Ok(Vec::new())
            } else {
                Err(ResolveError::not_found(id))
            }
        })
        .await
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchPlan, ResolveError> {
        let id = request.id.clone();
        let recursive = request.recursive;
        let target = self
            .blocking(move |root, icons| {
                let dir = path_for(&root, &id)?;
                if dir.is_file() {
                    return Ok(None);
                }
                if !dir.is_dir() {
                    return Err(ResolveError::not_found(id));
                }
                let children = if recursive {
                    Vec::new()
                } else {
                    listing::list(&dir, &id, &icons)?
                };
                Ok(Some((dir, children)))
            })
            .await?;
        let Some((dir, children)) = target else {
            return Ok(SearchPlan::Immediate(Vec::new()));
        };

        if recursive {
            return Ok(SearchPlan::Background(Box::new(NameSearch {
                dir,
                base_id: request.id.clone(),
                needle: request.search.clone(),
                icons: self.icons.clone(),
            })));
        }

        let needle = request.search.to_lowercase();
        let matches = children
            .into_iter()
            .filter(|object| object.title.to_lowercase().contains(&needle))
            .collect();
        Ok(SearchPlan::Immediate(matches))
    }
}
