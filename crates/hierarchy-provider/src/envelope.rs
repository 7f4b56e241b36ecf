use serde_json::{Map, Value};

use crate::error::ProtocolError;

pub type Params = Map<String, Value>;

/// Keys that may carry the method name, in lookup order.
const METHOD_KEYS: [&str; 5] = ["method", "message", "type", "command", "action"];
/// Keys that may carry an object or part id, in lookup order.
const ID_KEYS: [&str; 5] = ["id", "path", "object", "objectId", "ObjectId"];

/// A decoded request: the method name and the fields it was sent with.
#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub name: String,
    pub params: Params,
}

/// Resolve the method of a request document. `is_known` tells whether a name
/// is a registered method; it is only consulted for the lenient shapes.
///
/// # Errors
/// `Malformed` when no method can be found in the document.
pub fn decode(message: Value, is_known: impl Fn(&str) -> bool) -> Result<Method, ProtocolError> {
    match message {
        Value::String(name) => Ok(Method {
            name: name.trim().to_string(),
            params: Params::new(),
        }),
        Value::Object(params) => {
            if let Some(name) = params.get("method").and_then(Value::as_str) {
                return Ok(Method {
                    name: name.to_string(),
                    params,
                });
            }
            let mut unknown = None;
            for key in &METHOD_KEYS[1..] {
                if let Some(name) = params.get(*key).and_then(Value::as_str) {
                    if is_known(name) {
                        return Ok(Method {
                            name: name.to_string(),
                            params,
                        });
                    }
                    unknown.get_or_insert_with(|| name.to_string());
                }
            }
            let flagged = params
                .iter()
                .find(|(key, value)| is_known(key) && !matches!(value, Value::Bool(false)))
                .map(|(key, _)| key.clone());
            match (flagged, unknown) {
                (Some(name), _) | (None, Some(name)) => Ok(Method { name, params }),
                (None, None) => Err(ProtocolError::Malformed("Unknown message".to_string())),
            }
        }
        _ => Err(ProtocolError::Malformed("Unknown message".to_string())),
    }
}

/// Parse one request line.
///
/// # Errors
/// `Malformed` for invalid JSON or a document without a method.
pub fn parse_line(line: &str, is_known: impl Fn(&str) -> bool) -> Result<Method, ProtocolError> {
    let message: Value = serde_json::from_str(line)
        .map_err(|err| ProtocolError::Malformed(format!("Invalid JSON: {err}")))?;
    decode(message, is_known)
}

#[must_use]
pub fn object_id(params: &Params) -> Option<&str> {
    ID_KEYS
        .iter()
        .find_map(|key| params.get(*key).and_then(Value::as_str))
}

/// Handle id of a search poll, given either as a string or as the handle
/// object itself.
#[must_use]
pub fn handle_id(params: &Params) -> Option<&str> {
    ["handle", "search_handle"]
        .iter()
        .filter_map(|key| params.get(*key))
        .find_map(|value| match value {
            Value::String(id) => Some(id.as_str()),
            Value::Object(handle) => handle.get("id").and_then(Value::as_str),
            _ => None,
        })
}
