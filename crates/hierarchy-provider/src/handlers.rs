//! The provider-agnostic method set. Every backend gets these through the
//! dispatcher and only supplies a resolver.

use hierarchy_model::SearchRequest;
use serde_json::{Value, json};

use crate::context::ProviderContext;
use crate::dispatcher::HandlerFuture;
use crate::envelope::{Params, handle_id, object_id};
use crate::error::ProtocolError;
use crate::pipeline::CommandPath;

pub const GET_INFO: &str = "GetInfo";
pub const GET_ROOT_OBJECTS: &str = "GetRootObjects";
pub const GET_OBJECTS: &str = "GetObjects";
pub const GET_PARTS: &str = "GetParts";
pub const GET_PART: &str = "GetPart";
pub const SEARCH: &str = "Search";

pub fn get_info<'a>(context: &'a ProviderContext, _params: &'a Params) -> HandlerFuture<'a> {
    Box::pin(async move {
        Ok(json!({
            "RootName": context.root_name(),
            "icons": context.icons(),
        }))
    })
}

pub fn get_root_objects<'a>(
    context: &'a ProviderContext,
    _params: &'a Params,
) -> HandlerFuture<'a> {
    Box::pin(async move {
        let objects = context
            .resolver
            .root_objects()
            .await
            .map_err(|err| ProtocolError::resolve("Failed to list root objects", &err))?;
        Ok(json!({ "objects": objects }))
    })
}

pub fn get_objects<'a>(context: &'a ProviderContext, params: &'a Params) -> HandlerFuture<'a> {
    Box::pin(async move {
        let id = object_id(params).ok_or_else(|| ProtocolError::missing("id"))?;
        let path = CommandPath::parse(id);
        let base = if path.has_commands() { path.base.as_str() } else { id };

        let objects = context
            .resolver
            .resolve(base)
            .await
            .map_err(|err| ProtocolError::resolve("Failed to list objects", &err))?;
        let objects = path.apply(id, objects, context.group_icon());
        Ok(json!({ "objects": objects }))
    })
}

pub fn get_parts<'a>(context: &'a ProviderContext, _params: &'a Params) -> HandlerFuture<'a> {
    Box::pin(async move {
        let parts: Vec<_> = context.parts.summaries().collect();
        Ok(json!({ "parts": parts }))
    })
}

pub fn get_part<'a>(context: &'a ProviderContext, params: &'a Params) -> HandlerFuture<'a> {
    Box::pin(async move {
        let id = object_id(params).ok_or_else(|| ProtocolError::missing("id"))?;
        let script = context
            .parts
            .script(id)
            .ok_or_else(|| ProtocolError::NotFound(format!("Part not found: {id}")))?;
        Ok(json!({ "script": script }))
    })
}

/// Starts a search, or polls one when the request carries a handle.
pub fn search<'a>(context: &'a ProviderContext, params: &'a Params) -> HandlerFuture<'a> {
    Box::pin(async move {
        if let Some(handle) = handle_id(params) {
            let poll = context
                .searches
                .poll(handle)
                .ok_or_else(|| ProtocolError::NotFound(format!("Unknown search handle: {handle}")))?;
            return Ok(poll.to_response());
        }

        let id = object_id(params).ok_or_else(|| ProtocolError::missing("id"))?;
        let search = params
            .get("search")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::missing("search"))?;
        let recursive = params
            .get("recursive")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let request = SearchRequest {
            id: id.to_string(),
            search: search.to_string(),
            recursive,
        };

        let outcome = context
            .searches
            .start(context.resolver.as_ref(), request)
            .await
            .map_err(|err| ProtocolError::resolve("Search failed", &err))?;
        Ok(outcome.to_response())
    })
}
