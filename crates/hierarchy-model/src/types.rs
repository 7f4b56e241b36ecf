use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::hierarchy::ROOT_CLASS;

fn default_class() -> String {
    ROOT_CLASS.to_string()
}

/// One node of a provider's hierarchy, in its wire shape.
///
/// `objects` is always computed by the resolver that produced the record.
/// Fields the core does not know about are kept in `extra` and forwarded
/// unmodified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WPObject {
    #[serde(default = "default_class")]
    pub class: String,
    pub id: String,
    pub title: String,
    /// Base64 encoded PNG bytes.
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub objects: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contextmenu: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openaction: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WPObject {
    #[must_use]
    pub fn new(class: impl Into<String>, id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            id: id.into(),
            title: title.into(),
            icon: None,
            objects: 0,
            contextmenu: None,
            openaction: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_icon(mut self, icon: Option<String>) -> Self {
        self.icon = icon;
        self
    }

    #[must_use]
    pub fn with_children(mut self, count: u64) -> Self {
        self.objects = count;
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Look up a field by its wire name, core fields included.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<Value> {
        match key {
            "class" => Some(Value::String(self.class.clone())),
            "id" => Some(Value::String(self.id.clone())),
            "title" => Some(Value::String(self.title.clone())),
            "objects" => Some(Value::from(self.objects)),
            "icon" => self.icon.clone().map(Value::String),
            "contextmenu" => self.contextmenu.clone().map(Value::Array),
            "openaction" => self.openaction.clone(),
            _ => self.extra.get(key).cloned(),
        }
    }

    /// The field rendered as display text; `None` when absent or null.
    #[must_use]
    pub fn field_text(&self, key: &str) -> Option<String> {
        self.field(key).and_then(|value| value_text(&value))
    }

    /// Case-insensitive substring match against one field, or against every
    /// field when `prop` is `"all"`.
    #[must_use]
    pub fn matches(&self, prop: &str, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        if prop == "all" {
            return ["class", "id", "title", "objects"]
                .into_iter()
                .filter_map(|key| self.field_text(key))
                .chain(self.extra.values().filter_map(value_text))
                .any(|text| text.to_lowercase().contains(&needle));
        }
        self.field_text(prop)
            .is_some_and(|text| text.to_lowercase().contains(&needle))
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Summary of one part as listed by `GetParts`; never carries the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartSummary {
    pub unique_id: String,
    pub context_menu_entry_name: String,
    pub object_class_list: Vec<String>,
}

/// Read an icon file and encode it for the wire. A missing or unreadable file
/// is not an error, it just has no icon.
#[must_use]
pub fn encode_icon_file(path: &Path) -> Option<String> {
    std::fs::read(path).ok().map(|raw| STANDARD.encode(raw))
}

/// Child id for `name` below `parent`.
#[must_use]
pub fn join_id(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    format!("{parent}/{name}")
}

/// Parent id of `id`, `None` for the root.
#[must_use]
pub fn parent_id(id: &str) -> Option<&str> {
    let trimmed = id.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) | None => Some("/"),
        Some(pos) => Some(&trimmed[..pos]),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_null_icon_and_flattens_extra_fields() {
        let object = WPObject::new("WPSlurmPartition", "/general", "general")
            .with_children(3)
            .with_field("isdefault", true);

        let value = serde_json::to_value(&object).expect("object serializes");

        assert_eq!(
            value,
            json!({
                "class": "WPSlurmPartition",
                "id": "/general",
                "title": "general",
                "icon": null,
                "objects": 3,
                "isdefault": true
            })
        );
    }

    #[test]
    fn deserializes_passthrough_and_menu_fields() {
        let object: WPObject = serde_json::from_value(json!({
            "id": "/ComputeSystems/Quartz",
            "title": "Quartz",
            "contextmenu": [{"title": "Open docs", "action": "browser"}],
            "url": "https://example.org/quartz"
        }))
        .expect("authored object parses");

        assert_eq!(object.class, ROOT_CLASS);
        assert_eq!(object.objects, 0);
        assert_eq!(object.contextmenu.as_ref().map(Vec::len), Some(1));
        assert_eq!(
            object.field_text("url").as_deref(),
            Some("https://example.org/quartz")
        );
    }

    #[test]
    fn matches_is_case_insensitive_and_scoped_to_property() {
        let object = WPObject::new("WPSlurmJob", "/general/42", "42")
            .with_field("userid", "ALICE")
            .with_field("cpus", 16);

        assert!(object.matches("userid", "alice"));
        assert!(!object.matches("title", "alice"));
        assert!(object.matches("all", "Alic"));
        assert!(object.matches("cpus", "16"));
        assert!(!object.matches("missing", ""));
    }

    #[test]
    fn encode_icon_file_returns_none_for_missing_file() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let icon = temp_dir.path().join("Missing.png");

        assert!(encode_icon_file(&icon).is_none());

        std::fs::write(&icon, [0x89, b'P', b'N', b'G']).expect("icon written");
        assert_eq!(encode_icon_file(&icon).as_deref(), Some("iVBORw=="));
    }

    #[test]
    fn join_and_parent_ids() {
        assert_eq!(join_id("/", "Quartz"), "/Quartz");
        assert_eq!(join_id("/ComputeSystems", "RED"), "/ComputeSystems/RED");
        assert_eq!(parent_id("/ComputeSystems/RED"), Some("/ComputeSystems"));
        assert_eq!(parent_id("/ComputeSystems"), Some("/"));
        assert_eq!(parent_id("/"), None);
    }

    #[test]
    fn part_summary_uses_camel_case_wire_names() {
        let summary = PartSummary {
            unique_id: "Slurm/SubmitInteractiveJob".to_string(),
            context_menu_entry_name: "Submit interactive job".to_string(),
            object_class_list: vec!["WPSlurmPartition".to_string()],
        };

        let value = serde_json::to_value(&summary).expect("summary serializes");

        assert_eq!(value["uniqueId"], "Slurm/SubmitInteractiveJob");
        assert_eq!(value["contextMenuEntryName"], "Submit interactive job");
        assert_eq!(value["objectClassList"], json!(["WPSlurmPartition"]));
    }
}
