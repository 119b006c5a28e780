use alloc::{collections::BTreeMap, string::String};
use parking_lot::{const_mutex, Mutex};

use super::{Backend, CacheData};
use crate::errors::CacheErrorKind;

/// In-memory accelerator storing unserialized data
pub trait Accelerator: Send + Sync {
    fn fetch(&self, key: &str) -> Option<CacheData>;

    fn store(&self, key: &str, data: CacheData);
}

static PROCESS_STORE: Mutex<BTreeMap<String, CacheData>> = const_mutex(BTreeMap::new());

/// Accelerator shared by every cache of the process, lives as long as the process
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessAccelerator;

impl Accelerator for ProcessAccelerator {
    fn fetch(&self, key: &str) -> Option<CacheData> {
        PROCESS_STORE.lock().get(key).cloned()
    }

    fn store(&self, key: &str, data: CacheData) {
        PROCESS_STORE.lock().insert(key.into(), data);
    }
}

pub struct AcceleratorBackend<A> {
    accelerator: A,
}

impl<A: Accelerator> AcceleratorBackend<A> {
    #[inline]
    #[must_use]
    pub const fn new(accelerator: A) -> Self {
        Self { accelerator }
    }

    #[inline]
    #[must_use]
    pub const fn accelerator(&self) -> &A {
        &self.accelerator
    }
}

impl Default for AcceleratorBackend<ProcessAccelerator> {
    fn default() -> Self {
        Self::new(ProcessAccelerator)
    }
}

impl<A: Accelerator> Backend for AcceleratorBackend<A> {
    fn raw_read(&self, key: &str) -> Result<CacheData, CacheErrorKind> {
        Ok(self.accelerator.fetch(key).unwrap_or_default())
    }

    fn raw_commit(&self, key: &str, data: &CacheData) -> Result<(), CacheErrorKind> {
        self.accelerator.store(key, data.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString as _;
    use tracing_test::traced_test;

    use super::{Accelerator as _, AcceleratorBackend, ProcessAccelerator};
    use crate::reflect::cache::{ApcCache, CacheData, ReflectionCache as _};

    #[test]
    #[traced_test]
    fn test_data_survives_the_cache() {
        let data = CacheData::from([("hash".to_string(), serde_json::json!({"a": 1}))]);

        let cache = ApcCache::new(AcceleratorBackend::default());
        cache.set_key("apc-test-survives").unwrap();
        assert!(cache.read().unwrap().is_empty());
        cache.write(data.clone());
        cache.commit().unwrap();
        drop(cache);

        let reopened = ApcCache::new(AcceleratorBackend::default());
        reopened.set_key("apc-test-survives").unwrap();
        assert_eq!(reopened.read().unwrap(), data);
        assert_eq!(ProcessAccelerator.fetch("apc-test-survives"), Some(data));
        assert!(ProcessAccelerator.fetch("apc-test-missing").is_none());
    }
}
