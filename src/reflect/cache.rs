mod apc;
mod file;
mod memcache;

use alloc::{
    collections::BTreeMap,
    string::{String, ToString as _},
    sync::{Arc, Weak},
    vec::Vec,
};
use core::any::type_name;
use parking_lot::Mutex;
use tracing::{debug, error};

pub use apc::{Accelerator, AcceleratorBackend, ProcessAccelerator};
pub use file::FileBackend;
pub use memcache::{KeyValueStore, MemcacheStore, MemoryStore, SharedBackend, DEFAULT_HOST, DEFAULT_PORT};

use crate::errors::CacheErrorKind;

/// Memoised introspection results, keyed by query hash
pub type CacheData = BTreeMap<String, serde_json::Value>;

pub type FileCache = Cache<FileBackend>;
pub type MemcacheCache = Cache<SharedBackend<MemcacheStore>>;
pub type ApcCache = Cache<AcceleratorBackend<ProcessAccelerator>>;

/// Notified around every change of a cache's key
pub trait KeyListener: Send + Sync {
    /// Called while the old key is still active, after the cache committed its own dirty data.
    /// Data the listener writes from here must be committed by the listener.
    ///
    /// # Errors
    /// An error aborts the key change
    fn before_key_change(&self, old_key: &str, new_key: &str) -> Result<(), CacheErrorKind>;

    /// Called once the new key is active
    ///
    /// # Errors
    /// An error is returned from [`ReflectionCache::set_key`]; the key stays changed
    fn after_key_change(&self, old_key: &str, new_key: &str) -> Result<(), CacheErrorKind>;
}

/// Persisted memoisation store for introspection results
pub trait ReflectionCache: Send + Sync {
    /// In-memory snapshot, loaded from the backend on first use for the current key
    ///
    /// # Errors
    /// Returns an error if the backend can't be read
    fn read(&self) -> Result<CacheData, CacheErrorKind>;

    /// Replaces the in-memory snapshot and marks it dirty, the backend isn't touched
    fn write(&self, data: CacheData);

    /// Persists the snapshot if it's dirty
    ///
    /// # Errors
    /// Returns an error if the backend can't be written, the snapshot stays dirty
    fn commit(&self) -> Result<(), CacheErrorKind>;

    /// Switches to another logical bucket. Listeners are notified before and after the switch,
    /// unless the key doesn't change.
    ///
    /// # Errors
    /// Returns the first error of flushing the old bucket or of a listener.
    /// A failed flush aborts the change before any listener is notified.
    fn set_key(&self, key: &str) -> Result<(), CacheErrorKind>;

    /// Active key, the backend default if none was set
    fn key(&self) -> String;

    /// Data persisted under the active key, bypassing the snapshot
    ///
    /// # Errors
    /// Returns an error if the backend can't be read
    fn raw_read(&self) -> Result<CacheData, CacheErrorKind>;

    fn add_key_listener(&self, listener: Weak<dyn KeyListener>);

    fn remove_key_listener(&self, listener: &Weak<dyn KeyListener>);
}

/// Where a [`Cache`] persists its data
pub trait Backend: Send + Sync {
    /// Key used until [`ReflectionCache::set_key`] is called
    fn default_key(&self) -> String {
        type_name::<Self>().to_string()
    }

    /// Form a key takes before it's compared and used
    fn normalize_key(&self, key: &str) -> String {
        key.to_string()
    }

    /// # Errors
    /// Returns an error if the backing store can't be read or holds malformed data
    fn raw_read(&self, key: &str) -> Result<CacheData, CacheErrorKind>;

    /// # Errors
    /// Returns an error if the backing store can't be written
    fn raw_commit(&self, key: &str, data: &CacheData) -> Result<(), CacheErrorKind>;
}

#[derive(Default)]
struct State {
    data: Option<CacheData>,
    is_dirty: bool,
    key: Option<String>,
}

/// Lazily loaded, dirty-tracked snapshot over a [`Backend`]
pub struct Cache<B> {
    backend: B,
    state: Mutex<State>,
    listeners: Mutex<Vec<Weak<dyn KeyListener>>>,
}

impl<B: Backend> Cache<B> {
    #[inline]
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: Mutex::new(State::default()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn effective_key(&self, state: &State) -> String {
        match &state.key {
            Some(key) => key.clone(),
            None => self.backend.normalize_key(&self.backend.default_key()),
        }
    }

    /// Upgrades live listeners and prunes dead ones
    fn live_listeners(&self) -> Vec<Arc<dyn KeyListener>> {
        let mut listeners = self.listeners.lock();
        listeners.retain(|listener| listener.strong_count() > 0);
        listeners.iter().filter_map(Weak::upgrade).collect()
    }
}

impl<B: Backend> ReflectionCache for Cache<B> {
    fn read(&self) -> Result<CacheData, CacheErrorKind> {
        let mut state = self.state.lock();
        if let Some(data) = &state.data {
            return Ok(data.clone());
        }

        let key = self.effective_key(&state);
        let data = self.backend.raw_read(&key)?;
        debug!(%key, entries = data.len(), "Cache loaded");
        state.data = Some(data.clone());
        Ok(data)
    }

    fn write(&self, data: CacheData) {
        let mut state = self.state.lock();
        state.data = Some(data);
        state.is_dirty = true;
    }

    fn commit(&self) -> Result<(), CacheErrorKind> {
        let mut state = self.state.lock();
        if !state.is_dirty {
            return Ok(());
        }

        let key = self.effective_key(&state);
        let empty = CacheData::new();
        let data = state.data.as_ref().unwrap_or(&empty);
        if let Err(err) = self.backend.raw_commit(&key, data) {
            error!(%key, %err, "Cache commit failed");
            return Err(err);
        }
        debug!(%key, entries = data.len(), "Cache committed");
        state.is_dirty = false;
        Ok(())
    }

    fn set_key(&self, key: &str) -> Result<(), CacheErrorKind> {
        let new_key = self.backend.normalize_key(key);
        let old_key = self.effective_key(&self.state.lock());
        if old_key == new_key {
            return Ok(());
        }

        // Data still dirty belongs to the old bucket
        self.commit()?;

        let listeners = self.live_listeners();
        for listener in &listeners {
            listener.before_key_change(&old_key, &new_key)?;
        }

        {
            let mut state = self.state.lock();
            state.key = Some(new_key.clone());
            state.data = None;
        }
        debug!(%old_key, %new_key, "Cache key changed");

        for listener in &listeners {
            listener.after_key_change(&old_key, &new_key)?;
        }
        Ok(())
    }

    fn key(&self) -> String {
        self.effective_key(&self.state.lock())
    }

    fn raw_read(&self) -> Result<CacheData, CacheErrorKind> {
        let key = self.key();
        self.backend.raw_read(&key)
    }

    fn add_key_listener(&self, listener: Weak<dyn KeyListener>) {
        self.listeners.lock().push(listener);
    }

    fn remove_key_listener(&self, listener: &Weak<dyn KeyListener>) {
        self.listeners.lock().retain(|kept| !Weak::ptr_eq(kept, listener));
    }
}
