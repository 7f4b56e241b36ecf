use std::path::Path;

use hierarchy_model::encode_icon_file;
use serde::Serialize;

/// One entry of the `GetInfo` icon payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IconEntry {
    pub filename: String,
    pub data: String,
}

/// Every `*.png` in `dir`, sorted case-insensitively by name. Unreadable files
/// are skipped and a missing directory yields no icons.
#[must_use]
pub fn collect_icons(dir: &Path) -> Vec<IconEntry> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            Path::new(name)
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    names.sort_by_key(|name| name.to_lowercase());

    names
        .into_iter()
        .filter_map(|name| {
            let data = encode_icon_file(&dir.join(&name))?;
            Some(IconEntry {
                filename: format!("./resources/{name}"),
                data,
            })
        })
        .collect()
}
