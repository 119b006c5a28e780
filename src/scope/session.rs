use alloc::{
    collections::BTreeMap,
    string::{String, ToString as _},
    sync::Arc,
};
use parking_lot::Mutex;

use super::{Storage, StorageScope, StoredEntries};
use crate::{annotation::AnnotationKind, reflect::Reflector, registry::Registry};

/// Session key the scope's entries are kept under
pub const SESSION_KEY: &str = "__sessionscope";

/// Access to the data of the current session
pub trait SessionHandler: Send + Sync {
    fn has(&self, key: &str) -> bool;

    fn get(&self, key: &str) -> Option<StoredEntries>;

    fn set(&self, key: &str, value: StoredEntries);
}

/// Session data kept in memory
#[derive(Default)]
pub struct MemorySessionHandler {
    values: Mutex<BTreeMap<String, StoredEntries>>,
}

impl MemorySessionHandler {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionHandler for MemorySessionHandler {
    fn has(&self, key: &str) -> bool {
        self.values.lock().contains_key(key)
    }

    fn get(&self, key: &str) -> Option<StoredEntries> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: StoredEntries) {
        self.values.lock().insert(key.to_string(), value);
    }
}

/// [`Storage`] of the session scope, claims types annotated with [`crate::Annotation::ScopeSession`]
pub struct SessionStorage {
    handler: Arc<dyn SessionHandler>,
}

impl SessionStorage {
    pub const NAME: &'static str = "session";

    #[inline]
    #[must_use]
    pub fn new(handler: Arc<dyn SessionHandler>) -> Self {
        Self { handler }
    }

    #[inline]
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn SessionHandler> {
        &self.handler
    }
}

impl Storage for SessionStorage {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn annotation(&self) -> AnnotationKind {
        AnnotationKind::ScopeSession
    }

    fn load(&self) -> StoredEntries {
        if self.handler.has(SESSION_KEY) {
            self.handler.get(SESSION_KEY).unwrap_or_default()
        } else {
            StoredEntries::new()
        }
    }

    fn store(&self, entries: StoredEntries) {
        self.handler.set(SESSION_KEY, entries);
    }
}

pub type SessionScope = StorageScope<SessionStorage>;

impl StorageScope<SessionStorage> {
    /// Session scope holding the entries of the current session
    #[inline]
    #[must_use]
    pub fn session(handler: Arc<dyn SessionHandler>, reflector: Arc<dyn Reflector>, registry: Arc<Registry>) -> Self {
        Self::open(SessionStorage::new(handler), reflector, registry)
    }
}
