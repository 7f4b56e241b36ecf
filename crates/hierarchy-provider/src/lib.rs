mod context;
mod dispatcher;
mod envelope;
mod error;
mod handlers;
mod icons;
mod parts;
mod pipeline;
mod search;
mod server;

pub use context::{ProviderContext, ProviderOptions};
pub use dispatcher::{Dispatcher, Handler, HandlerFuture};
pub use envelope::{Method, Params};
pub use error::{ProtocolError, StartupError};
pub use icons::{IconEntry, collect_icons};
pub use parts::{PartDescriptor, PartsRegistry};
pub use pipeline::{Command, CommandPath};
pub use search::{SearchConfig, SearchEngine, SearchHandleInfo, SearchOutcome, SearchPoll};
pub use server::Server;
