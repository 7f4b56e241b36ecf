use std::io::Write;
use std::path::{Path, PathBuf};

use hierarchy_model::PartSummary;
use sha2::{Digest, Sha256};

use crate::error::InventoryError;

const MANIFEST_FILE: &str = "manifest.json";

/// Per-provider directory holding downloaded part scripts.
///
/// The directory name combines the provider's root name with a digest of its
/// address, so two providers never share scripts even when they report the
/// same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartsStore {
    dir: PathBuf,
}

impl PartsStore {
    #[must_use]
    pub fn for_provider(base: &Path, root_name: &str, addr: &str) -> Self {
        let digest = format!("{:x}", Sha256::digest(addr.as_bytes()));
        let dir = base.join(format!("{}-{}", slug(root_name), &digest[..12]));
        Self { dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Script file for `unique_id`: a readable flattened name plus a digest
    /// of the id, so ids that flatten alike still get their own file.
    #[must_use]
    pub fn script_path(&self, unique_id: &str) -> PathBuf {
        let name: String = unique_id
            .replace('/', "__")
            .chars()
            .map(|c| if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' })
            .collect();
        let digest = format!("{:x}", Sha256::digest(unique_id.as_bytes()));
        self.dir.join(format!("{name}-{}.js", &digest[..12]))
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// # Errors
    /// Returns an error when the script cannot be written.
    pub fn save_script(&self, unique_id: &str, script: &str) -> Result<PathBuf, InventoryError> {
        let path = self.script_path(unique_id);
        self.write(&path, script.as_bytes())?;
        Ok(path)
    }

    /// # Errors
    /// Returns an error when the manifest cannot be encoded or written.
    pub fn save_manifest(&self, parts: &[PartSummary]) -> Result<(), InventoryError> {
        let data = serde_json::to_vec_pretty(parts)?;
        self.write(&self.manifest_path(), &data)
    }

    /// Summaries persisted by the last sync, if any.
    #[must_use]
    pub fn load_manifest(&self) -> Option<Vec<PartSummary>> {
        let data = std::fs::read_to_string(self.manifest_path()).ok()?;
        serde_json::from_str(&data).ok()
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<(), InventoryError> {
        let store_error = |source| InventoryError::Store {
            path: path.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(&self.dir).map_err(store_error)?;
        write_atomic(path, data).map_err(store_error)
    }
}

fn slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "provider".to_string()
    } else {
        slug.to_string()
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "store path has no parent")
    })?;
    let file_name = path
        .file_name()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("part");
    let pid = std::process::id();

    let mut tmp_path = None;
    for attempt in 0..16_u8 {
        let candidate = parent.join(format!(".{file_name}.{pid}.{attempt}.tmp"));
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(mut file) => {
                file.write_all(data)?;
                file.sync_all()?;
                tmp_path = Some(candidate);
                break;
            }
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(error) => return Err(error),
        }
    }
    let Some(tmp_path) = tmp_path else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "failed to create unique temp file",
        ));
    };

    if let Err(error) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}
