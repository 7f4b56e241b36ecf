use std::path::PathBuf;
use std::time::Duration;

use hierarchy_model::{ClassHierarchy, ROOT_ID, WPObject, parent_id};
use log::info;

use crate::client::{ProviderClient, ProviderInfo};
use crate::error::{ClientError, InventoryError, PartExecutionError};
use crate::executor::{ExecutorLimits, PartExecutor, PartOutput};
use crate::inventory::PartsInventory;
use crate::menu::{MenuEntry, context_menu};
use crate::store::PartsStore;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Base directory of the per-provider part stores.
    pub store_dir: PathBuf,
    pub hierarchy: ClassHierarchy,
    pub limits: ExecutorLimits,
    pub poll_interval: Duration,
}

/// A connected browser: provider identity, the parts downloaded for this
/// connection, and the class table used to build menus.
pub struct BrowserSession {
    client: ProviderClient,
    info: ProviderInfo,
    store: PartsStore,
    inventory: PartsInventory,
    hierarchy: ClassHierarchy,
    executor: PartExecutor,
    poll_interval: Duration,
}

impl BrowserSession {
    /// Connect, identify the provider, and download its parts once.
    ///
    /// # Errors
    /// Connection, provider, and part store failures.
    pub async fn connect(addr: &str, options: SessionOptions) -> Result<Self, InventoryError> {
        let mut client = ProviderClient::connect(addr).await?;
        let info = client.get_info().await?;
        info!("Connected to {} at {addr}", info.root_name);

        let store = PartsStore::for_provider(&options.store_dir, &info.root_name, addr);
        let inventory = PartsInventory::sync(&mut client, &store).await?;
        if !inventory.is_empty() {
            info!(
                "Installed {} part(s) into {}",
                inventory.len(),
                store.dir().display()
            );
        }

        Ok(Self {
            client,
            info,
            store,
            inventory,
            hierarchy: options.hierarchy,
            executor: PartExecutor::new(options.limits),
            poll_interval: options.poll_interval,
        })
    }

    #[must_use]
    pub fn info(&self) -> &ProviderInfo {
        &self.info
    }

    #[must_use]
    pub fn inventory(&self) -> &PartsInventory {
        &self.inventory
    }

    #[must_use]
    pub fn store(&self) -> &PartsStore {
        &self.store
    }

    pub fn client(&mut self) -> &mut ProviderClient {
        &mut self.client
    }

    /// # Errors
    /// See [`ProviderClient::request`].
    pub async fn children(&mut self, id: &str) -> Result<Vec<WPObject>, ClientError> {
        if id == ROOT_ID {
            self.client.root_objects().await
        } else {
            self.client.objects(id).await
        }
    }

    /// Find the object with `id` by listing its parent.
    ///
    /// # Errors
    /// See [`ProviderClient::request`].
    pub async fn locate(&mut self, id: &str) -> Result<Option<WPObject>, ClientError> {
        let Some(parent) = parent_id(id) else {
            return Ok(None);
        };
        let siblings = self.children(parent).await?;
        Ok(siblings.into_iter().find(|object| object.id == id))
    }

    /// # Errors
    /// See [`ProviderClient::request`].
    pub async fn search(
        &mut self,
        id: &str,
        term: &str,
        recursive: bool,
    ) -> Result<Vec<WPObject>, ClientError> {
        let interval = self.poll_interval;
        self.client
            .search_until_done(id, term, recursive, interval)
            .await
    }

    #[must_use]
    pub fn menu(&self, object: &WPObject) -> Vec<MenuEntry> {
        context_menu(object, &self.hierarchy, &self.inventory)
    }

    /// Run an installed part against `object` on a blocking thread.
    ///
    /// # Errors
    /// `UnknownPart` when the part was not installed, otherwise whatever the
    /// script run reports.
    pub async fn run_part(
        &self,
        unique_id: &str,
        object: &WPObject,
    ) -> Result<PartOutput, PartExecutionError> {
        let part = self
            .inventory
            .get(unique_id)
            .ok_or_else(|| PartExecutionError::UnknownPart(unique_id.to_string()))?;

        let executor = self.executor;
        let unique_id = unique_id.to_string();
        let script = part.script.clone();
        let object = object.clone();
        tokio::task::spawn_blocking(move || executor.run(&unique_id, &script, &object))
            .await
            .map_err(|err| PartExecutionError::Engine(err.to_string()))?
    }
}
