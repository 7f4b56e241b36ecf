use std::collections::HashMap;
use std::path::PathBuf;

use hierarchy_model::PartSummary;
use log::info;

use crate::client::ProviderClient;
use crate::error::InventoryError;
use crate::store::PartsStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPart {
    pub summary: PartSummary,
    pub script: String,
    /// Where the script was persisted, if it was.
    pub path: Option<PathBuf>,
}

/// Parts downloaded from one provider, indexed by the classes they target.
#[derive(Debug, Default)]
pub struct PartsInventory {
    parts: Vec<InstalledPart>,
    by_id: HashMap<String, usize>,
    by_class: HashMap<String, Vec<usize>>,
}

impl PartsInventory {
    /// Download every part the provider lists, exactly once, and persist it
    /// into `store`.
    ///
    /// # Errors
    /// Transport or provider errors, empty scripts, and store write failures.
    pub async fn sync(
        client: &mut ProviderClient,
        store: &PartsStore,
    ) -> Result<Self, InventoryError> {
        let summaries = client.parts().await?;
        let mut installed = Vec::with_capacity(summaries.len());
        for summary in &summaries {
            let script = client.part(&summary.unique_id).await?;
            if script.trim().is_empty() {
                return Err(InventoryError::EmptyScript {
                    unique_id: summary.unique_id.clone(),
                });
            }
            let path = store.save_script(&summary.unique_id, &script)?;
            info!(
                "Installed part {} ({})",
                summary.unique_id, summary.context_menu_entry_name
            );
            installed.push(InstalledPart {
                summary: summary.clone(),
                script,
                path: Some(path),
            });
        }
        if !summaries.is_empty() {
            store.save_manifest(&summaries)?;
        }
        Ok(Self::from_parts(installed))
    }

    #[must_use]
    pub fn from_parts(parts: impl IntoIterator<Item = InstalledPart>) -> Self {
        let mut inventory = Self::default();
        for part in parts {
            if inventory.by_id.contains_key(&part.summary.unique_id) {
                continue;
            }
            let index = inventory.parts.len();
            inventory.by_id.insert(part.summary.unique_id.clone(), index);
            for class in &part.summary.object_class_list {
                let slots = inventory.by_class.entry(class.clone()).or_default();
                if !slots.contains(&index) {
                    slots.push(index);
                }
            }
            inventory.parts.push(part);
        }
        inventory
    }

    /// Parts registered directly for `class`, in download order.
    pub fn for_class<'a>(&'a self, class: &str) -> impl Iterator<Item = &'a InstalledPart> + 'a {
        self.by_class
            .get(class)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&index| &self.parts[index])
    }

    #[must_use]
    pub fn get(&self, unique_id: &str) -> Option<&InstalledPart> {
        self.by_id.get(unique_id).map(|&index| &self.parts[index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstalledPart> {
        self.parts.iter()
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
