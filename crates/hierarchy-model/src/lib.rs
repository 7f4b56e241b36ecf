mod error;
mod hierarchy;
mod search;
mod traits;
mod types;

pub use error::ResolveError;
pub use hierarchy::{ClassHierarchy, HierarchyError, ROOT_CLASS};
pub use search::{SearchPlan, SearchRequest, SearchSink, SearchState};
pub use traits::{BackgroundSearch, ObjectResolver, ROOT_ID};
pub use types::{PartSummary, WPObject, encode_icon_file, join_id, parent_id};
