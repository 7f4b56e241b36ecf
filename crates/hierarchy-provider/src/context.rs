use std::path::PathBuf;
use std::sync::Arc;

use hierarchy_model::{ObjectResolver, encode_icon_file};

use crate::error::StartupError;
use crate::icons::{IconEntry, collect_icons};
use crate::parts::PartsRegistry;
use crate::search::{SearchConfig, SearchEngine};

#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    /// Name reported by `GetInfo`.
    pub root_name: String,
    pub resources_dir: Option<PathBuf>,
    pub parts_dir: Option<PathBuf>,
    pub search: SearchConfig,
}

/// Everything one provider instance owns: its resolver, the parts indexed at
/// startup and the table of running searches. Several contexts can live in
/// one process.
pub struct ProviderContext {
    pub options: ProviderOptions,
    pub resolver: Arc<dyn ObjectResolver>,
    pub parts: PartsRegistry,
    pub searches: Arc<SearchEngine>,
    icons: Vec<IconEntry>,
    group_icon: Option<String>,
}

impl ProviderContext {
    /// Build the context and load the parts directory, if any.
    ///
    /// # Errors
    /// Any parts directory problem; those abort startup.
    pub fn new(
        options: ProviderOptions,
        resolver: Arc<dyn ObjectResolver>,
    ) -> Result<Self, StartupError> {
        let parts = match &options.parts_dir {
            Some(dir) => PartsRegistry::load(dir)?,
            None => PartsRegistry::empty(),
        };
        Ok(Self::with_parts(options, resolver, parts))
    }

    #[must_use]
    pub fn with_parts(
        options: ProviderOptions,
        resolver: Arc<dyn ObjectResolver>,
        parts: PartsRegistry,
    ) -> Self {
        let icons = options
            .resources_dir
            .as_deref()
            .map(collect_icons)
            .unwrap_or_default();
        let group_icon = options
            .resources_dir
            .as_deref()
            .and_then(|dir| encode_icon_file(&dir.join("WPGroup.png")));
        let searches = Arc::new(SearchEngine::new(options.search));
        Self {
            options,
            resolver,
            parts,
            searches,
            icons,
            group_icon,
        }
    }

    #[must_use]
    pub fn root_name(&self) -> &str {
        if self.options.root_name.is_empty() {
            self.resolver.name()
        } else {
            &self.options.root_name
        }
    }

    #[must_use]
    pub fn icons(&self) -> &[IconEntry] {
        &self.icons
    }

    #[must_use]
    pub fn group_icon(&self) -> Option<&str> {
        self.group_icon.as_deref()
    }
}
