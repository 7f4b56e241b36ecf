mod client;
mod error;
mod executor;
mod inventory;
mod menu;
mod session;
mod store;

pub use client::{ProviderClient, ProviderIcon, ProviderInfo, SearchHandle, SearchProgress, SearchStart};
pub use error::{ClientError, InventoryError, PartExecutionError};
pub use executor::{ExecutorLimits, PartExecutor, PartOutput};
pub use inventory::{InstalledPart, PartsInventory};
pub use menu::{MenuAction, MenuEntry, context_menu};
pub use session::{BrowserSession, SessionOptions};
pub use store::PartsStore;
