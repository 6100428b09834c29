//! Helpers for encoding/decoding the session wire format.
//!
//! This is primarily useful for testing and debugging.
//!
//! Cookie-backed sessions store a JSON object holding the user data plus the session id under
//! [`RESERVED_ID_KEY`]. Store-backed sessions keep only `{"_sid": ...}` in the cookie, and the
//! store payload is the JSON object of user data without the id.
//!
//! Encoding goes through `serde_json::Map`, whose keys are kept sorted, so equal contents always
//! encode to identical bytes.

use serde_json::{Map, Value};

use crate::{Id, error::Result};

/// Key under which the session id travels inside cookie payloads.
pub const RESERVED_ID_KEY: &str = "_sid";

/// A decoded cookie: the session id (if any) and the user data next to it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DecodedCookie {
    pub id: Option<Id>,
    pub data: Map<String, Value>,
}

/// Decode a raw cookie value.
///
/// Malformed JSON and non-object values decode as an empty cookie; an absent, non-string or empty
/// `_sid` yields no id.
pub fn decode_cookie(raw: &str) -> DecodedCookie {
    let mut data = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            tracing::debug!("session cookie is not a JSON object");
            Map::new()
        }
        Err(err) => {
            tracing::debug!(err = %err, "session cookie is not valid JSON");
            Map::new()
        }
    };

    let id = match data.remove(RESERVED_ID_KEY) {
        Some(Value::String(id)) => Id::parse(&id),
        _ => None,
    };

    DecodedCookie { id, data }
}

/// Decode a payload returned by a session store.
pub fn decode_payload(raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(mut map)) => {
            map.remove(RESERVED_ID_KEY);
            map
        }
        Ok(_) => {
            tracing::warn!("stored session payload is not a JSON object");
            Map::new()
        }
        Err(err) => {
            tracing::warn!(err = %err, "stored session payload is not valid JSON");
            Map::new()
        }
    }
}

/// Encode the full cookie-backed session: user data plus the id.
pub fn encode_cookie(id: &Id, data: &Map<String, Value>) -> Result<String> {
    let mut map = data.clone();
    map.insert(RESERVED_ID_KEY.to_owned(), Value::String(id.to_string()));
    Ok(serde_json::to_string(&map)?)
}

/// Encode the id-only cookie used with an external store.
pub fn encode_id_cookie(id: &Id) -> Result<String> {
    encode_cookie(id, &Map::new())
}

/// Encode user data for an external store. The reserved id key is never part of the payload.
pub fn encode_payload(data: &Map<String, Value>) -> Result<String> {
    if data.contains_key(RESERVED_ID_KEY) {
        let mut map = data.clone();
        map.remove(RESERVED_ID_KEY);
        return Ok(serde_json::to_string(&map)?);
    }
    Ok(serde_json::to_string(data)?)
}
