mod error;
mod listing;
mod resolver;
mod search;

pub use error::FsError;
pub use resolver::{FsIcons, FsResolver};
pub use search::NameSearch;
