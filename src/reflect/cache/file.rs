use alloc::{format, string::String};
use core::any::type_name;
use std::{
    fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
};

use super::{Backend, CacheData};
use crate::errors::CacheErrorKind;

/// One JSON file per key under a directory
pub struct FileBackend {
    directory: PathBuf,
}

impl FileBackend {
    #[inline]
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[inline]
    #[must_use]
    pub fn path(&self, key: &str) -> PathBuf {
        self.directory.join(key)
    }
}

impl Backend for FileBackend {
    fn default_key(&self) -> String {
        format!("{}.cache", type_name::<Self>())
    }

    fn normalize_key(&self, key: &str) -> String {
        key.replace("::", "_").replace('\\', "_").to_lowercase()
    }

    fn raw_read(&self, key: &str) -> Result<CacheData, CacheErrorKind> {
        match fs::read(self.path(key)) {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(CacheData::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn raw_commit(&self, key: &str, data: &CacheData) -> Result<(), CacheErrorKind> {
        let raw = serde_json::to_vec(data)?;
        fs::create_dir_all(&self.directory)?;

        let temporary = self.directory.join(format!(".{key}.tmp"));
        let mut file = fs::File::create(&temporary)?;
        file.write_all(&raw)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temporary, self.path(key))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString as _;
    use std::fs;
    use tracing_test::traced_test;

    use super::FileBackend;
    use crate::{
        errors::CacheErrorKind,
        reflect::cache::{Backend as _, Cache, CacheData, ReflectionCache as _},
    };

    #[test]
    #[traced_test]
    fn test_default_key_is_sanitized() {
        let cache = Cache::new(FileBackend::new("/tmp"));
        assert_eq!(cache.key(), "wirekit_reflect_cache_file_filebackend.cache");

        cache.set_key("App\\Reflect::Cache").unwrap();
        assert_eq!(cache.key(), "app_reflect_cache");
    }

    #[test]
    #[traced_test]
    fn test_missing_file_is_empty() {
        let directory = tempfile::tempdir().unwrap();
        let cache = Cache::new(FileBackend::new(directory.path()));
        assert!(cache.read().unwrap().is_empty());
    }

    #[test]
    #[traced_test]
    fn test_commit_and_reload() {
        let directory = tempfile::tempdir().unwrap();
        let data = CacheData::from([("hash".to_string(), serde_json::json!(["a", "b"]))]);

        let cache = Cache::new(FileBackend::new(directory.path()));
        cache.set_key("reflection").unwrap();
        cache.write(data.clone());
        cache.commit().unwrap();

        assert!(directory.path().join("reflection").is_file());
        assert!(!directory.path().join(".reflection.tmp").exists());

        let reopened = Cache::new(FileBackend::new(directory.path()));
        reopened.set_key("reflection").unwrap();
        assert_eq!(reopened.read().unwrap(), data);
    }

    #[test]
    #[traced_test]
    fn test_malformed_file_is_an_error() {
        let directory = tempfile::tempdir().unwrap();
        fs::write(directory.path().join("broken"), b"not json").unwrap();

        let backend = FileBackend::new(directory.path());
        assert!(matches!(backend.raw_read("broken"), Err(CacheErrorKind::Serialize(_))));
    }
}
