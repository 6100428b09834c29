use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::{Id, error::Result};

/// The session attached to the current request.
///
/// This is a cheap handle: clones share the same state. The middleware inserts one into the
/// request extensions before calling the inner service and inspects it once the inner service has
/// produced a response.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    id: Id,
    is_new: bool,
    contents: Mutex<Contents>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Contents {
    Present(Map<String, Value>),
    /// The handler cleared the session; it will be removed.
    Destroyed,
    /// The handler assigned something that cannot be a session.
    Rejected(&'static str),
}

impl Session {
    pub(crate) fn new(id: Id, is_new: bool, data: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(Inner {
                id,
                is_new,
                contents: Mutex::new(Contents::Present(data)),
            }),
        }
    }

    pub fn id(&self) -> &Id {
        &self.inner.id
    }

    /// `true` if the request did not carry a usable session id.
    pub fn is_new(&self) -> bool {
        self.inner.is_new
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        match &*self.contents() {
            Contents::Present(data) => data.get(key).cloned(),
            _ => None,
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self
            .get_value(key)
            .map(serde_json::from_value)
            .transpose()?)
    }

    /// Insert a value, returning the previous one. Reviving a destroyed session starts from an
    /// empty map; a rejected session ignores the insert and still fails the request.
    pub fn insert_value(&self, key: &str, value: Value) -> Option<Value> {
        let mut contents = self.contents();
        match &mut *contents {
            Contents::Present(data) => data.insert(key.to_owned(), value),
            Contents::Rejected(_) => None,
            Contents::Destroyed => {
                let mut data = Map::new();
                data.insert(key.to_owned(), value);
                *contents = Contents::Present(data);
                None
            }
        }
    }

    pub fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.insert_value(key, value);
        Ok(())
    }

    pub fn remove_value(&self, key: &str) -> Option<Value> {
        match &mut *self.contents() {
            Contents::Present(data) => data.remove(key),
            _ => None,
        }
    }

    pub fn remove<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self
            .remove_value(key)
            .map(serde_json::from_value)
            .transpose()?)
    }

    /// Drop every value but keep the session. For a session that already has a cookie this
    /// rewrites it without user data; a new session stays cookie-less.
    pub fn clear(&self) {
        let mut contents = self.contents();
        if !matches!(*contents, Contents::Rejected(_)) {
            *contents = Contents::Present(Map::new());
        }
    }

    /// End the session: the cookie is expired and, with an external store, the entry is removed.
    pub fn destroy(&self) {
        *self.contents() = Contents::Destroyed;
    }

    /// Assign the whole session.
    ///
    /// `null`, `false`, `0` and `""` destroy the session, an object replaces its data, and
    /// anything else makes the request fail once the handler returns.
    pub fn replace(&self, value: Value) {
        *self.contents() = match value {
            Value::Object(data) => Contents::Present(data),
            value if is_falsy(&value) => Contents::Destroyed,
            Value::Array(_) => Contents::Rejected("array"),
            Value::String(_) => Contents::Rejected("string"),
            Value::Number(_) => Contents::Rejected("number"),
            Value::Bool(_) => Contents::Rejected("boolean"),
            Value::Null => Contents::Destroyed,
        };
    }

    /// A snapshot of the user data. Empty once the session is destroyed.
    pub fn data(&self) -> Map<String, Value> {
        match &*self.contents() {
            Contents::Present(data) => data.clone(),
            _ => Map::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match &*self.contents() {
            Contents::Present(data) => data.is_empty(),
            _ => true,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(*self.contents(), Contents::Destroyed)
    }

    pub(crate) fn snapshot(&self) -> Contents {
        self.contents().clone()
    }

    fn contents(&self) -> MutexGuard<'_, Contents> {
        self.inner
            .contents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

#[cfg(feature = "axum-core")]
impl<S> axum_core::extract::FromRequestParts<S> for Session
where
    S: Sync + Send,
{
    type Rejection = (http::StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or((
            http::StatusCode::INTERNAL_SERVER_ERROR,
            "Can't extract session. Is `SessionManagerLayer` enabled?",
        ))
    }
}
