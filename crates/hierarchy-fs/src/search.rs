use std::path::PathBuf;

use async_trait::async_trait;
use hierarchy_model::{BackgroundSearch, ResolveError, SearchSink};
use log::debug;
use walkdir::WalkDir;

use crate::listing::{FsIcons, to_object};

/// Recursive, case-insensitive file name search below one directory.
#[derive(Debug, Clone)]
pub struct NameSearch {
    pub dir: PathBuf,
    pub base_id: String,
    pub needle: String,
    pub icons: FsIcons,
}

impl NameSearch {
    fn walk(self, sink: &SearchSink) {
        let needle = self.needle.to_lowercase();
        let base_id = self.base_id.trim_end_matches('/');

        for entry in WalkDir::new(&self.dir).min_depth(1).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!("fs search: skipping unreadable entry: {err}");
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy();
            if !name.to_lowercase().contains(&needle) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.dir) else {
                continue;
            };
            let relative: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect();
            let id = format!("{base_id}/{}", relative.join("/"));
            let object = to_object(id, &name, entry.path(), entry.file_type().is_dir(), &self.icons);
            if !sink.push(object) {
                debug!("fs search: nobody is collecting results, stopping");
                return;
            }
        }
    }
}

#[async_trait]
impl BackgroundSearch for NameSearch {
    async fn run(self: Box<Self>, sink: SearchSink) -> Result<(), ResolveError> {
        let search = *self;
        tokio::task::spawn_blocking(move || search.walk(&sink))
            .await
            .map_err(|err| ResolveError::backend_from("filesystem search", err))
    }
}
