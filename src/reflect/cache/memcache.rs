use alloc::{
    collections::BTreeMap,
    string::{String, ToString as _},
    vec::Vec,
};
use core::any::type_name;
use futures::{executor::block_on, io::AllowStdIo};
use memcache_async::ascii::Protocol;
use parking_lot::Mutex;
use std::{io, net::TcpStream};
use tracing::{debug, warn};

use super::{Backend, CacheData};
use crate::errors::CacheErrorKind;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 11211;

type Connection = Protocol<AllowStdIo<TcpStream>>;

/// Process-shared blob store
pub trait KeyValueStore: Send + Sync {
    /// # Errors
    /// Returns an error if the store is unreachable or answers unexpectedly
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheErrorKind>;

    /// # Errors
    /// Returns an error if the store is unreachable or refuses the value
    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheErrorKind>;
}

/// Memcached client, connected on first use
pub struct MemcacheStore {
    host: String,
    port: u16,
    connection: Mutex<Option<Connection>>,
}

impl MemcacheStore {
    #[inline]
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connection: Mutex::new(None),
        }
    }

    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[inline]
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    fn with_connection<T>(&self, call: impl FnOnce(&mut Connection) -> io::Result<T>) -> Result<T, CacheErrorKind> {
        let mut connection = self.connection.lock();
        if connection.is_none() {
            let stream = TcpStream::connect((self.host.as_str(), self.port))?;
            debug!(host = %self.host, port = self.port, "Connected to memcache");
            *connection = Some(Protocol::new(AllowStdIo::new(stream)));
        }
        let Some(protocol) = connection.as_mut() else {
            return Err(CacheErrorKind::Protocol("memcache connection unavailable".to_string()));
        };

        let result = call(protocol);
        if let Err(err) = &result {
            warn!(%err, "Memcache request failed, dropping connection");
            *connection = None;
        }
        Ok(result?)
    }
}

impl Default for MemcacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl KeyValueStore for MemcacheStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheErrorKind> {
        self.with_connection(|protocol| match block_on(protocol.get(key)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        })
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheErrorKind> {
        self.with_connection(|protocol| block_on(protocol.set(key, value, 0)))
    }
}

/// In-process blob store
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheErrorKind> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheErrorKind> {
        self.values.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Cache data serialized as a JSON blob in a [`KeyValueStore`]
pub struct SharedBackend<S> {
    store: S,
}

impl<S: KeyValueStore> SharedBackend<S> {
    #[inline]
    #[must_use]
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    #[inline]
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }
}

impl<S: KeyValueStore> Backend for SharedBackend<S> {
    fn default_key(&self) -> String {
        type_name::<S>().to_string()
    }

    fn raw_read(&self, key: &str) -> Result<CacheData, CacheErrorKind> {
        match self.store.get(key)? {
            Some(raw) if !raw.is_empty() => Ok(serde_json::from_slice(&raw)?),
            _ => Ok(CacheData::new()),
        }
    }

    fn raw_commit(&self, key: &str, data: &CacheData) -> Result<(), CacheErrorKind> {
        let raw = serde_json::to_vec(data)?;
        self.store.set(key, &raw)
    }
}
