mod error;
mod resolver;
mod store;

pub use error::StaticError;
pub use resolver::StaticResolver;
pub use store::ObjectStore;
