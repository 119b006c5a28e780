use alloc::{
    format,
    string::{String, ToString as _},
    sync::{Arc, Weak},
    vec::Vec,
};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, warn};

use super::{
    cache::{CacheData, KeyListener, ReflectionCache},
    Reflector,
};
use crate::{
    annotation::{Annotation, AnnotationKind},
    any::TypeName,
    errors::CacheErrorKind,
    registry::Parameter,
};

/// Memoises the answers of another [`Reflector`] in a [`ReflectionCache`].
///
/// Registers itself as a key listener of the cache: pending results are committed before the key
/// changes and the new bucket is loaded after. Pending results are also committed on drop.
pub struct CachingReflector<R> {
    inner: R,
    cache: Arc<dyn ReflectionCache>,
    data: Mutex<CacheData>,
}

impl<R: Reflector + 'static> CachingReflector<R> {
    /// # Errors
    /// Returns an error if the data of the current key can't be loaded
    pub fn new(inner: R, cache: Arc<dyn ReflectionCache>) -> Result<Arc<Self>, CacheErrorKind> {
        let data = cache.raw_read()?;
        debug!(key = %cache.key(), entries = data.len(), "Reflection cache loaded");

        let reflector = Arc::new(Self {
            inner,
            cache,
            data: Mutex::new(data),
        });
        let listener: Weak<dyn KeyListener> = Arc::downgrade(&reflector) as Weak<dyn KeyListener>;
        reflector.cache.add_key_listener(listener);
        Ok(reflector)
    }
}

impl<R> CachingReflector<R> {
    #[inline]
    #[must_use]
    pub fn cache(&self) -> &Arc<dyn ReflectionCache> {
        &self.cache
    }

    #[inline]
    #[must_use]
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Persists results computed since the last commit
    ///
    /// # Errors
    /// Returns an error if the cache backend can't be written
    pub fn commit(&self) -> Result<(), CacheErrorKind> {
        self.cache.commit()
    }

    fn load(&self) -> Result<(), CacheErrorKind> {
        let data = self.cache.raw_read()?;
        *self.data.lock() = data;
        Ok(())
    }

    fn handle<T, F>(&self, method: &str, arguments: &[&str], query: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&R) -> T,
    {
        let hash = hash(method, arguments);
        let mut data = self.data.lock();

        if let Some(value) = data.get(&hash) {
            match serde_json::from_value(value.clone()) {
                Ok(result) => {
                    debug!(method, %hash, "Reflection cache hit");
                    return result;
                }
                Err(err) => warn!(method, %hash, %err, "Cached reflection result is stale, recomputing"),
            }
        }

        debug!(method, %hash, "Reflection cache miss");
        let result = query(&self.inner);
        match serde_json::to_value(&result) {
            Ok(value) => {
                data.insert(hash, value);
                self.cache.write(data.clone());
            }
            Err(err) => warn!(method, %err, "Reflection result can't be cached"),
        }
        result
    }
}

/// Hex MD5 of the query name followed by its arguments, as a JSON array
fn hash(method: &str, arguments: &[&str]) -> String {
    let mut values = Vec::with_capacity(arguments.len() + 1);
    values.push(method);
    values.extend_from_slice(arguments);
    format!("{:x}", md5::compute(serde_json::Value::from(values).to_string()))
}

impl<R> KeyListener for CachingReflector<R>
where
    R: Send + Sync,
{
    fn before_key_change(&self, _old_key: &str, _new_key: &str) -> Result<(), CacheErrorKind> {
        self.commit()
    }

    fn after_key_change(&self, _old_key: &str, _new_key: &str) -> Result<(), CacheErrorKind> {
        self.load()
    }
}

impl<R> Drop for CachingReflector<R> {
    fn drop(&mut self) {
        if let Err(err) = self.cache.commit() {
            error!(%err, "Reflection cache commit on drop failed");
        }
    }
}

impl<R: Reflector> Reflector for CachingReflector<R> {
    fn add_ignored_type_pattern(&self, pattern: &str) -> Result<(), regex::Error> {
        self.inner.add_ignored_type_pattern(pattern)
    }

    fn parent_type(&self, type_name: &TypeName) -> Option<TypeName> {
        self.handle("parent_type", &[type_name.as_str()], |inner| inner.parent_type(type_name))
    }

    fn has_method(&self, type_name: &TypeName, method: &str) -> bool {
        self.handle("has_method", &[type_name.as_str(), method], |inner| {
            inner.has_method(type_name, method)
        })
    }

    fn method_parameters(&self, type_name: &TypeName, method: &str) -> Vec<Parameter> {
        self.handle("method_parameters", &[type_name.as_str(), method], |inner| {
            inner.method_parameters(type_name, method)
        })
    }

    fn methods(&self, type_name: &TypeName) -> Vec<String> {
        self.handle("methods", &[type_name.as_str()], |inner| inner.methods(type_name))
    }

    fn methods_with_annotation(&self, type_name: &TypeName, kind: AnnotationKind) -> Vec<String> {
        self.handle("methods_with_annotation", &[type_name.as_str(), kind.name()], |inner| {
            inner.methods_with_annotation(type_name, kind)
        })
    }

    fn properties(&self, type_name: &TypeName) -> Vec<String> {
        self.handle("properties", &[type_name.as_str()], |inner| inner.properties(type_name))
    }

    fn properties_with_annotation(&self, type_name: &TypeName, kind: AnnotationKind) -> Vec<String> {
        self.handle("properties_with_annotation", &[type_name.as_str(), kind.name()], |inner| {
            inner.properties_with_annotation(type_name, kind)
        })
    }

    fn class_has_annotation(&self, type_name: &TypeName, kind: AnnotationKind) -> bool {
        self.handle("class_has_annotation", &[type_name.as_str(), kind.name()], |inner| {
            inner.class_has_annotation(type_name, kind)
        })
    }

    fn method_has_annotation(&self, type_name: &TypeName, method: &str, kind: AnnotationKind) -> bool {
        self.handle(
            "method_has_annotation",
            &[type_name.as_str(), method, kind.name()],
            |inner| inner.method_has_annotation(type_name, method, kind),
        )
    }

    fn property_has_annotation(&self, type_name: &TypeName, property: &str, kind: AnnotationKind) -> bool {
        self.handle(
            "property_has_annotation",
            &[type_name.as_str(), property, kind.name()],
            |inner| inner.property_has_annotation(type_name, property, kind),
        )
    }

    fn class_annotation(&self, type_name: &TypeName, kind: AnnotationKind) -> Option<Annotation> {
        self.handle("class_annotation", &[type_name.as_str(), kind.name()], |inner| {
            inner.class_annotation(type_name, kind)
        })
    }

    fn method_annotation(&self, type_name: &TypeName, method: &str, kind: AnnotationKind) -> Option<Annotation> {
        self.handle(
            "method_annotation",
            &[type_name.as_str(), method, kind.name()],
            |inner| inner.method_annotation(type_name, method, kind),
        )
    }

    fn method_annotations(&self, type_name: &TypeName, method: &str, kind: AnnotationKind) -> Vec<Annotation> {
        self.handle(
            "method_annotations",
            &[type_name.as_str(), method, kind.name()],
            |inner| inner.method_annotations(type_name, method, kind),
        )
    }

    fn property_annotation(&self, type_name: &TypeName, property: &str, kind: AnnotationKind) -> Option<Annotation> {
        self.handle(
            "property_annotation",
            &[type_name.as_str(), property, kind.name()],
            |inner| inner.property_annotation(type_name, property, kind),
        )
    }

    fn property_declared_type(&self, type_name: &TypeName, property: &str) -> Option<TypeName> {
        self.handle("property_declared_type", &[type_name.as_str(), property], |inner| {
            inner.property_declared_type(type_name, property)
        })
    }

    fn is_public_property(&self, type_name: &TypeName, property: &str) -> bool {
        self.handle("is_public_property", &[type_name.as_str(), property], |inner| {
            inner.is_public_property(type_name, property)
        })
    }
}
