//! Pluggable persistence for store-backed sessions.

use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;

use crate::{Id, error::Result};

/// An asynchronous key/value backend addressed by session id.
///
/// Payloads are opaque serialized strings; the middleware produces and compares them, the store
/// only keeps them. Any error returned here fails the current request.
#[async_trait]
pub trait SessionStore: Debug + Send + Sync + 'static {
    /// Load the payload stored for `id`, or `None` if there is no entry.
    async fn load(&self, id: &Id) -> Result<Option<String>>;

    /// Create or replace the payload stored for `id`.
    async fn save(&self, id: &Id, payload: &str) -> Result<()>;

    /// Delete the entry for `id`. Removing a missing entry is not an error.
    async fn remove(&self, id: &Id) -> Result<()>;
}

/// Where session data lives.
#[derive(Debug, Clone, Default)]
pub enum Store {
    /// The cookie itself carries the whole session.
    #[default]
    Cookie,
    /// The cookie only carries the id; data lives in the given store.
    External(Arc<dyn SessionStore>),
}

impl Store {
    pub fn external<S: SessionStore>(store: S) -> Self {
        Self::External(Arc::new(store))
    }

    pub fn is_cookie(&self) -> bool {
        matches!(self, Self::Cookie)
    }
}

/// An in-process [`SessionStore`].
///
/// Nothing is persisted: all sessions are lost when the process exits, and entries are only
/// dropped when a session is removed. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<Mutex<HashMap<Id, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The payload currently stored for `id`.
    pub fn get(&self, id: &Id) -> Option<String> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Id, String>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, id: &Id) -> Result<Option<String>> {
        Ok(self.get(id))
    }

    async fn save(&self, id: &Id, payload: &str) -> Result<()> {
        self.lock().insert(id.clone(), payload.to_owned());
        Ok(())
    }

    async fn remove(&self, id: &Id) -> Result<()> {
        self.lock().remove(id);
        Ok(())
    }
}
