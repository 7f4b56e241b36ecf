use std::collections::HashMap;
use std::path::{Path, PathBuf};

use hierarchy_model::PartSummary;
use serde::Deserialize;

use crate::error::StartupError;

/// Descriptor file as authored next to the part scripts.
#[derive(Debug, Deserialize)]
struct DescriptorFile {
    #[serde(rename = "UniqueID")]
    unique_id: String,
    #[serde(rename = "ContextMenuEntryName")]
    context_menu_entry_name: String,
    #[serde(rename = "ScriptReference", alias = "PythonScript")]
    script_reference: Option<String>,
    #[serde(rename = "ObjectClassList", default)]
    object_class_list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDescriptor {
    pub summary: PartSummary,
    pub script_reference: String,
    pub script: String,
}

impl PartDescriptor {
    #[must_use]
    pub fn new(summary: PartSummary, script: impl Into<String>) -> Self {
        Self {
            script_reference: format!("{}.js", summary.unique_id),
            summary,
            script: script.into(),
        }
    }

    #[must_use]
    pub fn unique_id(&self) -> &str {
        &self.summary.unique_id
    }
}

/// Parts known to one provider, indexed once at startup and read-only after.
#[derive(Debug, Default)]
pub struct PartsRegistry {
    parts: Vec<PartDescriptor>,
    by_id: HashMap<String, usize>,
}

impl PartsRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read every `*.json` descriptor in `dir`, in file name order, together
    /// with the script each one references. A missing directory has no parts.
    ///
    /// # Errors
    /// Any unreadable or invalid descriptor, a missing script, or two
    /// descriptors sharing a `UniqueID`.
    pub fn load(dir: &Path) -> Result<Self, StartupError> {
        if !dir.is_dir() {
            log::info!("No parts directory at {}", dir.display());
            return Ok(Self::empty());
        }

        let io_error = |source| StartupError::PartsIo {
            path: dir.to_path_buf(),
            source,
        };
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .map_err(io_error)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            })
            .collect();
        files.sort();

        let mut registry = Self::empty();
        let mut origins: HashMap<String, PathBuf> = HashMap::new();
        for file in files {
            let descriptor = read_descriptor(dir, &file)?;
            if let Some(first) = origins.get(descriptor.unique_id()) {
                return Err(StartupError::DuplicatePart {
                    unique_id: descriptor.summary.unique_id,
                    first: first.clone(),
                    second: file,
                });
            }
            origins.insert(descriptor.summary.unique_id.clone(), file);
            registry.insert(descriptor);
        }

        log::info!(
            "Loaded {} part(s) from {}",
            registry.len(),
            dir.display()
        );
        Ok(registry)
    }

    /// Build a registry from descriptors already in memory.
    ///
    /// # Errors
    /// Two descriptors sharing a `UniqueID`.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = PartDescriptor>,
    ) -> Result<Self, StartupError> {
        let mut registry = Self::empty();
        for descriptor in descriptors {
            if let Some(first) = registry.get(descriptor.unique_id()) {
                let first = PathBuf::from(&first.script_reference);
                return Err(StartupError::DuplicatePart {
                    unique_id: descriptor.summary.unique_id,
                    first,
                    second: PathBuf::from(descriptor.script_reference),
                });
            }
            registry.insert(descriptor);
        }
        Ok(registry)
    }

    fn insert(&mut self, descriptor: PartDescriptor) {
        self.by_id
            .insert(descriptor.summary.unique_id.clone(), self.parts.len());
        self.parts.push(descriptor);
    }

    pub fn summaries(&self) -> impl Iterator<Item = &PartSummary> {
        self.parts.iter().map(|part| &part.summary)
    }

    #[must_use]
    pub fn get(&self, unique_id: &str) -> Option<&PartDescriptor> {
        self.by_id.get(unique_id).map(|&index| &self.parts[index])
    }

    #[must_use]
    pub fn script(&self, unique_id: &str) -> Option<&str> {
        self.get(unique_id).map(|part| part.script.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

fn read_descriptor(dir: &Path, file: &Path) -> Result<PartDescriptor, StartupError> {
    let content = std::fs::read_to_string(file).map_err(|source| StartupError::PartsIo {
        path: file.to_path_buf(),
        source,
    })?;
    let raw: DescriptorFile = serde_json::from_str(&content)
        .map_err(|err| StartupError::invalid_part(file, err.to_string()))?;

    if raw.unique_id.trim().is_empty() {
        return Err(StartupError::invalid_part(file, "UniqueID is empty"));
    }
    if raw.object_class_list.is_empty() {
        return Err(StartupError::invalid_part(file, "ObjectClassList is empty"));
    }
    let Some(reference) = raw.script_reference.filter(|r| !r.trim().is_empty()) else {
        return Err(StartupError::invalid_part(file, "no script reference"));
    };

    let script_path = dir.join(&reference);
    if !script_path.starts_with(dir) || reference.split(['/', '\\']).any(|c| c == "..") {
        return Err(StartupError::invalid_part(
            file,
            format!("script {reference} is outside the parts directory"),
        ));
    }
    let script = std::fs::read_to_string(&script_path).map_err(|err| {
        StartupError::invalid_part(file, format!("cannot read script {reference}: {err}"))
    })?;
    if script.trim().is_empty() {
        return Err(StartupError::invalid_part(
            file,
            format!("script {reference} is empty"),
        ));
    }

    Ok(PartDescriptor {
        summary: PartSummary {
            unique_id: raw.unique_id,
            context_menu_entry_name: raw.context_menu_entry_name,
            object_class_list: raw.object_class_list,
        },
        script_reference: reference,
        script,
    })
}
