//! Authored objects on disk.
//!
//! A directory holds `*.json` files, each with one object, a list of objects,
//! or `{"objects": [...]}`. Every object has a name within its directory: the
//! file stem for a single-object file, otherwise the last segment of its
//! authored `id` (or its `title`). The object's id is its parent id joined
//! with that name, and its children live in the sibling directory of the same
//! name. Authored ids that disagree with that location are replaced.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use hierarchy_model::{WPObject, encode_icon_file, join_id, parent_id};
use log::warn;
use serde_json::{Map, Value};

use crate::error::StaticError;

#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
    icon_base: PathBuf,
}

/// One authored record before it becomes a `WPObject`.
struct Record {
    name: String,
    file: PathBuf,
    fields: Map<String, Value>,
}

impl ObjectStore {
    /// `root` is the objects directory; relative icon paths are resolved
    /// against `icon_base`. The whole tree is checked once for objects that
    /// would share an id.
    ///
    /// # Errors
    /// `MissingRoot` when `root` is not a directory, `DuplicateId` when two
    /// records in one directory claim the same name.
    pub fn open(root: &Path, icon_base: &Path) -> Result<Self, StaticError> {
        let root = root
            .canonicalize()
            .map_err(|_| StaticError::MissingRoot(root.to_path_buf()))?;
        if !root.is_dir() {
            return Err(StaticError::MissingRoot(root));
        }
        let store = Self {
            root,
            icon_base: icon_base.to_path_buf(),
        };
        store.check_unique()?;
        Ok(store)
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the children of `id`. Only plain path components
    /// are accepted and the result never leaves the objects directory.
    ///
    /// # Errors
    /// `PathEscape` for `..`, absolute components, or symlinks pointing out.
    pub fn directory_for(&self, id: &str) -> Result<PathBuf, StaticError> {
        let relative = Path::new(id.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(StaticError::PathEscape(id.to_string()));
        }

        let dir = self.root.join(relative);
        if let Ok(resolved) = dir.canonicalize()
            && !resolved.starts_with(&self.root)
        {
            return Err(StaticError::PathEscape(id.to_string()));
        }
        Ok(dir)
    }

    /// Whether `id` is reachable from the root, i.e. it and each of its
    /// ancestors is listed by its parent.
    ///
    /// # Errors
    /// See [`ObjectStore::directory_for`] and [`ObjectStore::objects_in`].
    pub fn contains(&self, id: &str) -> Result<bool, StaticError> {
        let mut current = id.trim_end_matches('/');
        while let Some(parent) = parent_id(current) {
            let dir = self.directory_for(parent)?;
            let listed = self
                .records(&dir, parent)?
                .iter()
                .any(|(_, object)| object.id == current);
            if !listed {
                return Ok(false);
            }
            current = parent;
        }
        Ok(true)
    }

    /// Objects authored in `dir`, with icons encoded and child counts set.
    ///
    /// # Errors
    /// `Unreadable` when the directory cannot be listed.
    pub fn objects_in(&self, dir: &Path, parent_id: &str) -> Result<Vec<WPObject>, StaticError> {
        let mut objects = Vec::new();
        for (record, object) in self.records(dir, parent_id)? {
            let children = self
                .records(&dir.join(&record.name), &object.id)
                .map_or(0, |c| c.len() as u64);
            let icon = match record.fields.get("icon") {
                Some(Value::String(path)) if !path.is_empty() => self.encode_icon(path),
                _ => None,
            };
            objects.push(object.with_icon(icon).with_children(children));
        }
        Ok(objects)
    }

    /// Valid records of `dir` with their objects, first one wins per name.
    fn records(
        &self,
        dir: &Path,
        parent_id: &str,
    ) -> Result<Vec<(Record, WPObject)>, StaticError> {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        for record in read_directory(dir)? {
            let Some(object) = build(&record, parent_id) else {
                continue;
            };
            if !seen.insert(record.name.clone()) {
                warn!(
                    "Skipping {} in {}: id {} is already taken",
                    record.name,
                    record.file.display(),
                    object.id
                );
                continue;
            }
            kept.push((record, object));
        }
        Ok(kept)
    }

    fn check_unique(&self) -> Result<(), StaticError> {
        let mut pending = vec![(self.root.clone(), "/".to_string())];
        let mut visited = HashSet::new();
        while let Some((dir, parent_id)) = pending.pop() {
            if !visited.insert(dir.canonicalize().unwrap_or_else(|_| dir.clone())) {
                continue;
            }
            let mut taken: HashSet<String> = HashSet::new();
            for record in read_directory(&dir)? {
                let Some(object) = build(&record, &parent_id) else {
                    continue;
                };
                if !taken.insert(record.name.clone()) {
                    return Err(StaticError::DuplicateId {
                        id: object.id,
                        file: record.file,
                    });
                }
                let child_dir = dir.join(&record.name);
                if child_dir.is_dir() {
                    pending.push((child_dir, object.id));
                }
            }
        }
        Ok(())
    }

    fn encode_icon(&self, path: &str) -> Option<String> {
        let path = Path::new(path);
        if path.is_absolute() {
            encode_icon_file(path)
        } else {
            encode_icon_file(&self.icon_base.join(path))
        }
    }
}

/// The object for `record`, placed below `parent_id`. `None` when the fields
/// do not form an object.
fn build(record: &Record, parent_id: &str) -> Option<WPObject> {
    let id = join_id(parent_id, &record.name);
    let mut fields = record.fields.clone();
    fields.remove("icon");
    fields.remove("objects");
    if let Some(Value::String(authored)) = fields.get("id")
        && *authored != id
    {
        warn!(
            "Object {authored} in {} is served as {id}",
            record.file.display()
        );
    }
    fields.insert("id".to_string(), Value::String(id));
    fields
        .entry("title")
        .or_insert_with(|| Value::String(record.name.clone()));

    match serde_json::from_value::<WPObject>(Value::Object(fields)) {
        Ok(object) => Some(object),
        Err(err) => {
            warn!(
                "Skipping malformed object in {}: {err}",
                record.file.display()
            );
            None
        }
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

/// Name of the `index`th object of a multi-object file.
fn item_name(fields: &Map<String, Value>, stem: &str, index: usize) -> String {
    let from_id = fields
        .get("id")
        .and_then(Value::as_str)
        .and_then(|id| id.trim_end_matches('/').rsplit('/').next());
    let from_title = fields.get("title").and_then(Value::as_str);
    from_id
        .filter(|name| is_plain_name(name))
        .or_else(|| from_title.filter(|name| is_plain_name(name)))
        .map_or_else(|| format!("{stem}-{index}"), str::to_string)
}

/// Every record authored in `dir`, in file name order. Unparsable files are
/// skipped; a missing directory is empty.
fn read_directory(dir: &Path) -> Result<Vec<Record>, StaticError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = std::fs::read_dir(dir).map_err(|err| StaticError::Unreadable {
        path: dir.to_path_buf(),
        message: err.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    files.sort();

    let mut records = Vec::new();
    for file in files {
        let Some(stem) = file.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };
        let parsed = std::fs::read_to_string(&file)
            .map_err(|err| err.to_string())
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|err| err.to_string()));
        let value = match parsed {
            Ok(value) => value,
            Err(err) => {
                warn!("Skipping unreadable object file {}: {err}", file.display());
                continue;
            }
        };

        let items = match value {
            Value::Object(mut map) => match map.remove("objects") {
                Some(Value::Array(items)) => items,
                Some(other) => {
                    map.insert("objects".to_string(), other);
                    records.push(Record {
                        name: stem,
                        file,
                        fields: map,
                    });
                    continue;
                }
                None => {
                    records.push(Record {
                        name: stem,
                        file,
                        fields: map,
                    });
                    continue;
                }
            },
            Value::Array(items) => items,
            _ => continue,
        };
        for (index, item) in items.into_iter().enumerate() {
            if let Value::Object(fields) = item {
                records.push(Record {
                    name: item_name(&fields, &stem, index),
                    file: file.clone(),
                    fields,
                });
            }
        }
    }
    Ok(records)
}
