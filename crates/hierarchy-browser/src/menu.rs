use std::collections::HashSet;

use hierarchy_model::{ClassHierarchy, WPObject};
use serde_json::Value;

use crate::inventory::PartsInventory;

#[derive(Debug, Clone, PartialEq)]
pub enum MenuAction {
    /// Run an installed part against the object.
    RunPart { unique_id: String },
    /// An entry authored on the object itself, forwarded as-is.
    Authored(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MenuEntry {
    pub label: String,
    pub action: MenuAction,
}

/// Context menu for `object`: its authored entries, then every part whose
/// target classes include the object's class or one of its ancestors.
///
/// Parts for the object's own class come first, then those of each ancestor
/// nearest first; a part matching several classes is listed once. This is a
/// pure lookup and never talks to the provider.
#[must_use]
pub fn context_menu(
    object: &WPObject,
    hierarchy: &ClassHierarchy,
    inventory: &PartsInventory,
) -> Vec<MenuEntry> {
    let mut entries: Vec<MenuEntry> = object
        .contextmenu
        .iter()
        .flatten()
        .map(|entry| MenuEntry {
            label: authored_label(entry),
            action: MenuAction::Authored(entry.clone()),
        })
        .collect();

    let mut seen = HashSet::new();
    for class in hierarchy.lineage(&object.class) {
        for part in inventory.for_class(class) {
            if seen.insert(part.summary.unique_id.as_str()) {
                entries.push(MenuEntry {
                    label: part.summary.context_menu_entry_name.clone(),
                    action: MenuAction::RunPart {
                        unique_id: part.summary.unique_id.clone(),
                    },
                });
            }
        }
    }
    entries
}

fn authored_label(entry: &Value) -> String {
    ["title", "label", "name"]
        .iter()
        .find_map(|key| entry.get(*key).and_then(Value::as_str))
        .map_or_else(|| entry.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use hierarchy_model::PartSummary;
    use serde_json::json;

    use super::*;
    use crate::inventory::InstalledPart;

    fn part(unique_id: &str, label: &str, classes: &[&str]) -> InstalledPart {
        InstalledPart {
            summary: PartSummary {
                unique_id: unique_id.to_string(),
                context_menu_entry_name: label.to_string(),
                object_class_list: classes.iter().map(ToString::to_string).collect(),
            },
            script: "print(1);".to_string(),
            path: None,
        }
    }

    fn labels(entries: &[MenuEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.label.as_str()).collect()
    }

    #[test]
    fn ancestor_parts_apply_to_descendants() {
        let hierarchy = ClassHierarchy::builtin()
            .with_classes([("WPGpuPartition", "WPSlurmPartition")])
            .expect("acyclic");
        let inventory = PartsInventory::from_parts([
            part("Slurm/Submit", "Submit job", &["WPSlurmPartition"]),
            part("Any/Inspect", "Inspect", &["WPObject"]),
            part("Fs/Open", "Open file", &["WPFile"]),
        ]);
        let gpu = WPObject::new("WPGpuPartition", "/gpu", "gpu");

        let menu = context_menu(&gpu, &hierarchy, &inventory);

        assert_eq!(labels(&menu), ["Submit job", "Inspect"]);
    }

    #[test]
    fn unrelated_class_parts_never_appear() {
        let hierarchy = ClassHierarchy::builtin();
        let inventory = PartsInventory::from_parts([part("Fs/Open", "Open file", &["WPFile"])]);
        let job = WPObject::new("WPSlurmJob", "/general/1", "1");

        assert!(context_menu(&job, &hierarchy, &inventory).is_empty());
    }

    #[test]
    fn part_matching_several_classes_is_listed_once() {
        let hierarchy = ClassHierarchy::builtin();
        let inventory = PartsInventory::from_parts([part(
            "Any/Inspect",
            "Inspect",
            &["WPObject", "WPSlurmJob"],
        )]);
        let job = WPObject::new("WPSlurmJob", "/general/1", "1");

        let menu = context_menu(&job, &hierarchy, &inventory);

        assert_eq!(
            menu,
            [MenuEntry {
                label: "Inspect".to_string(),
                action: MenuAction::RunPart {
                    unique_id: "Any/Inspect".to_string()
                },
            }]
        );
    }

    #[test]
    fn unknown_classes_only_match_their_own_tag() {
        let hierarchy = ClassHierarchy::builtin();
        let inventory = PartsInventory::from_parts([
            part("Any/Inspect", "Inspect", &["WPObject"]),
            part("Custom/Run", "Run custom", &["WPCustom"]),
        ]);
        let custom = WPObject::new("WPCustom", "/c", "c");

        assert_eq!(
            labels(&context_menu(&custom, &hierarchy, &inventory)),
            ["Run custom"]
        );
    }

    #[test]
    fn authored_entries_come_first() {
        let hierarchy = ClassHierarchy::builtin();
        let inventory = PartsInventory::from_parts([part("Any/Inspect", "Inspect", &["WPObject"])]);
        let mut object = WPObject::new("WPObject", "/docs", "Docs");
        object.contextmenu = Some(vec![json!({"title": "Open docs", "url": "https://example.org"})]);

        let menu = context_menu(&object, &hierarchy, &inventory);

        assert_eq!(labels(&menu), ["Open docs", "Inspect"]);
        assert!(matches!(menu[0].action, MenuAction::Authored(_)));
    }
}
