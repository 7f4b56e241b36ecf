use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::{error, info};
use serde_json::Value;

use crate::context::ProviderContext;
use crate::envelope::{self, Params};
use crate::error::ProtocolError;
use crate::handlers;

pub type HandlerFuture<'a> = BoxFuture<'a, Result<Value, ProtocolError>>;
pub type Handler = for<'a> fn(&'a ProviderContext, &'a Params) -> HandlerFuture<'a>;

/// Method registry, built once per provider and shared by every connection.
#[derive(Clone)]
pub struct Dispatcher {
    context: Arc<ProviderContext>,
    handlers: HashMap<&'static str, Handler>,
}

impl Dispatcher {
    /// A dispatcher answering the standard method set.
    #[must_use]
    pub fn new(context: Arc<ProviderContext>) -> Self {
        Self::empty(context)
            .register(handlers::GET_INFO, handlers::get_info)
            .register(handlers::GET_ROOT_OBJECTS, handlers::get_root_objects)
            .register(handlers::GET_OBJECTS, handlers::get_objects)
            .register(handlers::GET_PARTS, handlers::get_parts)
            .register(handlers::GET_PART, handlers::get_part)
            .register(handlers::SEARCH, handlers::search)
    }

    #[must_use]
    pub fn empty(context: Arc<ProviderContext>) -> Self {
        Self {
            context,
            handlers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn register(mut self, method: &'static str, handler: Handler) -> Self {
        self.handlers.insert(method, handler);
        self
    }

    #[must_use]
    pub fn context(&self) -> &Arc<ProviderContext> {
        &self.context
    }

    #[must_use]
    pub fn is_known(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    /// Answer one request line. Blank lines get no answer; everything else gets
    /// exactly one response document, errors included.
    pub async fn dispatch_line(&self, line: &str) -> Option<Value> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        info!("Incoming: {line}");

        let response = match envelope::parse_line(line, |name| self.is_known(name)) {
            Ok(method) => self.dispatch(&method.name, &method.params).await,
            Err(err) => Err(err),
        };
        Some(response.unwrap_or_else(|err| err.to_response()))
    }

    /// Run the handler for `method`. A panicking handler is reported as a
    /// backend failure.
    ///
    /// # Errors
    /// Unknown methods and whatever the handler fails with.
    pub async fn dispatch(&self, method: &str, params: &Params) -> Result<Value, ProtocolError> {
        let Some(handler) = self.handlers.get(method) else {
            return Err(ProtocolError::Malformed(format!("Unknown message: {method}")));
        };

        let result = match AssertUnwindSafe(handler(&self.context, params))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::BackendFailure(format!(
                "{method} failed unexpectedly"
            ))),
        };
        if let Err(err) = &result {
            error!("{method} failed: {err}");
        }
        result
    }
}
