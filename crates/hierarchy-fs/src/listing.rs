use std::path::{Component, Path, PathBuf};

use hierarchy_model::{WPObject, join_id};

use crate::error::FsError;

pub(crate) const DIRECTORY_CLASS: &str = "WPDirectory";
pub(crate) const FILE_CLASS: &str = "WPFile";

/// Encoded icons for the two object classes this adapter emits.
#[derive(Debug, Clone, Default)]
pub struct FsIcons {
    pub directory: Option<String>,
    pub file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Map an object id onto a path below `root`.
pub(crate) fn path_for(root: &Path, id: &str) -> Result<PathBuf, FsError> {
    let relative = Path::new(id.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(FsError::PathEscape(id.to_string()));
    }

    let path = root.join(relative);
    if let Ok(resolved) = path.canonicalize()
        && !resolved.starts_with(root)
    {
        return Err(FsError::PathEscape(id.to_string()));
    }
    Ok(path)
}

/// Directories and regular files directly in `dir`, sorted case-insensitively
/// by name. Anything else (sockets, dangling links) is not an object.
pub(crate) fn entries(dir: &Path) -> Result<Vec<Entry>, FsError> {
    let mut entries: Vec<Entry> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let path = entry.path();
            let metadata = std::fs::metadata(&path).ok()?;
            if !metadata.is_dir() && !metadata.is_file() {
                return None;
            }
            Some(Entry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: metadata.is_dir(),
                path,
            })
        })
        .collect();
    entries.sort_by_key(|entry| entry.name.to_lowercase());
    Ok(entries)
}

pub(crate) fn child_count(dir: &Path) -> u64 {
    entries(dir).map_or(0, |entries| entries.len() as u64)
}

pub(crate) fn to_object(id: String, title: &str, path: &Path, is_dir: bool, icons: &FsIcons) -> WPObject {
    if is_dir {
        WPObject::new(DIRECTORY_CLASS, id, title)
            .with_icon(icons.directory.clone())
            .with_children(child_count(path))
    } else {
        let size = std::fs::metadata(path).map_or(0, |m| m.len());
        WPObject::new(FILE_CLASS, id, title)
            .with_icon(icons.file.clone())
            .with_field("size", size)
    }
}

pub(crate) fn list(dir: &Path, parent_id: &str, icons: &FsIcons) -> Result<Vec<WPObject>, FsError> {
    Ok(entries(dir)?
        .into_iter()
        .map(|entry| {
            to_object(
                join_id(parent_id, &entry.name),
                &entry.name,
                &entry.path,
                entry.is_dir,
                icons,
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_directories_and_files_with_counts() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("projects/alpha")).expect("dirs created");
        std::fs::write(root.join("projects/notes.txt"), "x").expect("file written");
        std::fs::write(root.join("README"), "hello").expect("file written");

        let objects = list(root, "/", &FsIcons::default()).expect("listing");

        let summary: Vec<_> = objects
            .iter()
            .map(|o| (o.id.as_str(), o.class.as_str(), o.objects))
            .collect();
        assert_eq!(
            summary,
            [("/projects", DIRECTORY_CLASS, 2), ("/README", FILE_CLASS, 0)]
        );
        assert_eq!(objects[1].field("size"), Some(5.into()));
    }

    #[test]
    fn path_for_rejects_parent_components() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");

        assert!(matches!(
            path_for(temp_dir.path(), "/a/../../b"),
            Err(FsError::PathEscape(_))
        ));
        assert_eq!(
            path_for(temp_dir.path(), "/a/b").expect("plain path"),
            temp_dir.path().join("a/b")
        );
    }
}
