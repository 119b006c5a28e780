use alloc::{string::String, sync::Arc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use crate::{
    errors::CacheErrorKind,
    injector::Injector,
    reflect::{
        cache::{
            AcceleratorBackend, Cache, FileBackend, MemcacheStore, ReflectionCache, SharedBackend, DEFAULT_HOST,
            DEFAULT_PORT,
        },
        CachingReflector, Reflector, StandardReflector,
    },
    registry::Registry,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReflectorKind {
    #[default]
    Standard,
    Caching,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    #[default]
    File,
    Memcache,
    Apc,
}

/// Settings of the collaborators an [`Injector`] is built with. Unset values fall back to defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reflector: ReflectorKind,
    pub reflector_cache: CacheKind,
    pub memcache_host: Option<String>,
    pub memcache_port: Option<u16>,
    pub memcache_key: Option<String>,
    pub apc_key: Option<String>,
    pub file_cache_directory: Option<PathBuf>,
    pub file_cache_filename: Option<String>,
}

impl Config {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn caching(mut self, reflector_cache: CacheKind) -> Self {
        self.reflector = ReflectorKind::Caching;
        self.reflector_cache = reflector_cache;
        self
    }

    #[inline]
    #[must_use]
    pub fn memcache(mut self, host: impl Into<String>, port: u16) -> Self {
        self.memcache_host = Some(host.into());
        self.memcache_port = Some(port);
        self
    }

    #[inline]
    #[must_use]
    pub fn file_cache(mut self, directory: impl Into<PathBuf>) -> Self {
        self.file_cache_directory = Some(directory.into());
        self
    }

    /// Sets the cache key of the configured backend
    #[inline]
    #[must_use]
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        let key = Some(key.into());
        match self.reflector_cache {
            CacheKind::File => self.file_cache_filename = key,
            CacheKind::Memcache => self.memcache_key = key,
            CacheKind::Apc => self.apc_key = key,
        }
        self
    }

    /// Cache of the configured kind, with the configured key applied
    ///
    /// # Errors
    /// Returns an error if a key listener refuses the key change
    pub fn reflector_cache(&self) -> Result<Arc<dyn ReflectionCache>, CacheErrorKind> {
        let cache: Arc<dyn ReflectionCache> = match self.reflector_cache {
            CacheKind::Memcache => Arc::new(Cache::new(SharedBackend::new(MemcacheStore::new(
                self.memcache_host.as_deref().unwrap_or(DEFAULT_HOST),
                self.memcache_port.unwrap_or(DEFAULT_PORT),
            )))),
            CacheKind::Apc => Arc::new(Cache::new(AcceleratorBackend::default())),
            CacheKind::File => {
                let directory = self.file_cache_directory.clone().unwrap_or_else(std::env::temp_dir);
                Arc::new(Cache::new(FileBackend::new(directory)))
            }
        };
        let key = match self.reflector_cache {
            CacheKind::Memcache => self.memcache_key.as_deref(),
            CacheKind::Apc => self.apc_key.as_deref(),
            CacheKind::File => self.file_cache_filename.as_deref(),
        };

        if let Some(key) = key.filter(|key| !key.is_empty()) {
            cache.set_key(key)?;
        }
        debug!(kind = ?self.reflector_cache, key = %cache.key(), "Reflection cache configured");
        Ok(cache)
    }

    /// # Errors
    /// Returns an error if the cache of a caching reflector can't be set up or loaded
    pub fn reflector(&self, registry: Arc<Registry>) -> Result<Arc<dyn Reflector>, CacheErrorKind> {
        let standard = StandardReflector::new(registry);
        match self.reflector {
            ReflectorKind::Standard => Ok(Arc::new(standard)),
            ReflectorKind::Caching => Ok(CachingReflector::new(standard, self.reflector_cache()?)?),
        }
    }

    /// # Errors
    /// Returns an error if the cache of a caching reflector can't be set up or loaded
    pub fn injector(&self, registry: Arc<Registry>) -> Result<Injector, CacheErrorKind> {
        let reflector = self.reflector(registry.clone())?;
        Ok(Injector::new(reflector, registry))
    }
}
