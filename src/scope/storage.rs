use alloc::{collections::BTreeMap, string::String, sync::Arc};
use core::sync::atomic::{AtomicBool, Ordering};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use super::Scope;
use crate::{
    annotation::AnnotationKind,
    any::{Instance, TypeName},
    errors::StorageErrorKind,
    reflect::Reflector,
    registry::Registry,
};

/// Encoded instances as kept by a [`Storage`], keyed by the name they are held under
pub type StoredEntries = BTreeMap<TypeName, String>;

/// External store a [`StorageScope`] is persisted to
pub trait Storage: Send + Sync {
    /// Key of the scope, see [`Scope::name`]
    fn name(&self) -> &str;

    /// Class annotation claiming instances for the scope
    fn annotation(&self) -> AnnotationKind;

    fn load(&self) -> StoredEntries;

    fn store(&self, entries: StoredEntries);
}

/// An instance held by a [`StorageScope`]
#[derive(Clone, Debug)]
pub enum Entry {
    /// Stored value not decoded yet
    Undecoded(String),
    Materialized(Instance),
}

impl Entry {
    /// Decodes the entry if the registry knows how to, otherwise leaves it as is
    #[must_use]
    pub fn materialize(self, type_name: &TypeName, registry: &Registry) -> Self {
        let Self::Undecoded(raw) = self else {
            return self;
        };

        match registry.decode(type_name, &raw) {
            Some(Ok(instance)) => {
                debug!(%type_name, "Stored instance decoded");
                Self::Materialized(instance)
            }
            Some(Err(err)) => {
                error!(%type_name, %err, "Stored instance can't be decoded");
                Self::Undecoded(raw)
            }
            None => Self::Undecoded(raw),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_materialized(&self) -> bool {
        matches!(self, Self::Materialized(_))
    }
}

/// Scope whose instances outlive the process in a [`Storage`].
///
/// Stored instances are decoded lazily, on the first [`Scope::get`] once their type has a codec.
/// [`Self::close`] encodes the held instances back, it's called on drop if not called before.
pub struct StorageScope<S: Storage> {
    storage: S,
    reflector: Arc<dyn Reflector>,
    registry: Arc<Registry>,
    entries: Mutex<BTreeMap<TypeName, Entry>>,
    is_closed: AtomicBool,
}

impl<S: Storage> StorageScope<S> {
    /// Scope without any stored entry, see [`Self::init`]
    #[inline]
    #[must_use]
    pub fn new(storage: S, reflector: Arc<dyn Reflector>, registry: Arc<Registry>) -> Self {
        Self {
            storage,
            reflector,
            registry,
            entries: Mutex::new(BTreeMap::new()),
            is_closed: AtomicBool::new(false),
        }
    }

    /// Scope holding the entries of the storage
    #[inline]
    #[must_use]
    pub fn open(storage: S, reflector: Arc<dyn Reflector>, registry: Arc<Registry>) -> Self {
        let scope = Self::new(storage, reflector, registry);
        scope.init();
        scope
    }

    /// Marks every stored entry as pending decoding
    pub fn init(&self) {
        let stored = self.storage.load();
        debug!(scope = self.storage.name(), entries = stored.len(), "Storage scope initialized");

        let mut entries = self.entries.lock();
        for (type_name, raw) in stored {
            entries.insert(type_name, Entry::Undecoded(raw));
        }
    }

    #[inline]
    #[must_use]
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Encodes every held instance and writes them to the storage at once.
    /// Entries still pending or of a type without codec are left out.
    ///
    /// # Errors
    /// Returns the first encoding error; the successfully encoded entries are stored anyway
    pub fn close(&self) -> Result<(), StorageErrorKind> {
        self.is_closed.store(true, Ordering::SeqCst);

        let mut first_error = None;
        let mut encoded = StoredEntries::new();
        let mut entries = self.entries.lock();

        for (type_name, entry) in entries.iter_mut() {
            let current = core::mem::replace(entry, Entry::Undecoded(String::new()));
            *entry = current.materialize(type_name, &self.registry);

            let Entry::Materialized(instance) = &*entry else {
                warn!(%type_name, "Pending entry isn't stored");
                continue;
            };
            match self.registry.encode(instance) {
                Some(Ok(raw)) => {
                    encoded.insert(type_name.clone(), raw);
                }
                Some(Err(source)) => {
                    error!(%type_name, %source, "Instance can't be encoded");
                    if first_error.is_none() {
                        first_error = Some(StorageErrorKind::Encode {
                            type_name: type_name.clone(),
                            source,
                        });
                    }
                }
                None => warn!(%type_name, "Type has no codec, instance isn't stored"),
            }
        }
        drop(entries);

        debug!(scope = self.storage.name(), entries = encoded.len(), "Storage scope closed");
        self.storage.store(encoded);
        first_error.map_or(Ok(()), Err)
    }
}

impl<S: Storage> Scope for StorageScope<S> {
    fn name(&self) -> &str {
        self.storage.name()
    }

    fn get(&self, type_name: &TypeName) -> Option<Instance> {
        let mut entries = self.entries.lock();
        let entry = entries.get_mut(type_name)?;

        if !entry.is_materialized() {
            let current = core::mem::replace(entry, Entry::Undecoded(String::new()));
            *entry = current.materialize(type_name, &self.registry);
        }
        match entry {
            Entry::Materialized(instance) => Some(instance.clone()),
            Entry::Undecoded(_) => None,
        }
    }

    fn set(&self, instance: Instance, type_name: Option<TypeName>) {
        let type_name = type_name.unwrap_or_else(|| instance.type_name().clone());
        self.entries.lock().insert(type_name, Entry::Materialized(instance));
    }

    fn has(&self, type_name: &TypeName) -> bool {
        self.entries.lock().contains_key(type_name)
    }

    fn check(&self, instance: &Instance, type_name: &TypeName) -> bool {
        if !self.reflector.class_has_annotation(type_name, self.storage.annotation()) {
            return false;
        }
        self.set(instance.clone(), None);
        true
    }
}

impl<S: Storage> Drop for StorageScope<S> {
    fn drop(&mut self) {
        if self.is_closed.load(Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.close() {
            error!(%err, "Storage scope close on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::{string::ToString as _, sync::Arc};
    use parking_lot::Mutex;
    use serde::{Deserialize, Serialize};
    use tracing_test::traced_test;

    use super::{Entry, Storage, StorageScope, StoredEntries};
    use crate::{
        annotation::{Annotation, AnnotationKind},
        any::{Instance, TypeName},
        errors::StorageErrorKind,
        reflect::StandardReflector,
        registry::{Registry, TypeDescriptor},
        scope::Scope as _,
    };

    #[derive(Default)]
    struct MemoryStorage {
        entries: Mutex<StoredEntries>,
        stores: Mutex<usize>,
    }

    impl Storage for Arc<MemoryStorage> {
        fn name(&self) -> &str {
            "memory"
        }

        fn annotation(&self) -> AnnotationKind {
            AnnotationKind::ScopeSession
        }

        fn load(&self) -> StoredEntries {
            self.entries.lock().clone()
        }

        fn store(&self, entries: StoredEntries) {
            *self.stores.lock() += 1;
            *self.entries.lock() = entries;
        }
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Cart {
        items: u32,
    }

    #[derive(Default)]
    struct Unserializable;

    struct Faulty;

    impl Serialize for Faulty {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("faulty"))
        }
    }

    impl<'de> Deserialize<'de> for Faulty {
        fn deserialize<D: serde::Deserializer<'de>>(_: D) -> Result<Self, D::Error> {
            Ok(Faulty)
        }
    }

    fn registry(with_cart: bool) -> Arc<Registry> {
        let mut builder = Registry::builder()
            .register(
                TypeDescriptor::<Unserializable>::new("app::Unserializable").annotate(Annotation::ScopeSession),
            )
            .register(
                TypeDescriptor::<Faulty>::new("app::Faulty")
                    .annotate(Annotation::ScopeSession)
                    .serializable(),
            );
        if with_cart {
            builder = builder.register(
                TypeDescriptor::<Cart>::new("app::Cart")
                    .annotate(Annotation::ScopeSession)
                    .default_constructible()
                    .serializable(),
            );
        }
        Arc::new(builder.build())
    }

    fn open_scope(storage: &Arc<MemoryStorage>, registry: Arc<Registry>) -> StorageScope<Arc<MemoryStorage>> {
        let reflector = Arc::new(StandardReflector::new(registry.clone()));
        StorageScope::open(storage.clone(), reflector, registry)
    }

    #[test]
    #[traced_test]
    fn test_round_trip() {
        let storage = Arc::new(MemoryStorage::default());

        let scope = open_scope(&storage, registry(true));
        let cart = Instance::new("app::Cart", Cart { items: 3 });
        assert!(scope.check(&cart, &"app::Cart".into()));
        drop(scope);
        assert_eq!(*storage.stores.lock(), 1);

        let scope = open_scope(&storage, registry(true));
        assert!(scope.has(&"app::Cart".into()));
        let restored = scope.get(&"app::Cart".into()).unwrap();
        assert_eq!(restored.downcast_ref::<Cart>(), Some(&Cart { items: 3 }));
        assert!(!restored.ptr_eq(&cart));
        assert!(logs_contain("Stored instance decoded"));
    }

    #[test]
    #[traced_test]
    fn test_unknown_type_stays_pending() {
        let storage = Arc::new(MemoryStorage::default());
        storage
            .entries
            .lock()
            .insert("app::Cart".into(), r#"{"items":1}"#.to_string());

        let scope = open_scope(&storage, registry(false));
        assert!(scope.has(&"app::Cart".into()));
        assert!(scope.get(&"app::Cart".into()).is_none());
        assert!(scope.has(&"app::Cart".into()));
    }

    #[test]
    #[traced_test]
    fn test_malformed_entry_stays_pending() {
        let storage = Arc::new(MemoryStorage::default());
        storage.entries.lock().insert("app::Cart".into(), "not json".to_string());

        let scope = open_scope(&storage, registry(true));
        assert!(scope.get(&"app::Cart".into()).is_none());
        assert!(logs_contain("Stored instance can't be decoded"));
    }

    #[test]
    #[traced_test]
    fn test_unannotated_type_is_not_claimed() {
        let storage = Arc::new(MemoryStorage::default());
        let scope = open_scope(&storage, registry(true));

        let value = Instance::new("app::Other", 1u8);
        assert!(!scope.check(&value, &"app::Other".into()));
        assert!(!scope.has(&"app::Other".into()));
    }

    #[test]
    #[traced_test]
    fn test_close_skips_what_it_cannot_encode() {
        let storage = Arc::new(MemoryStorage::default());
        let scope = open_scope(&storage, registry(true));

        scope.set(Instance::new("app::Unserializable", Unserializable), None);
        scope.set(Instance::new("app::Faulty", Faulty), None);
        scope.set(Instance::new("app::Cart", Cart { items: 1 }), None);

        assert!(matches!(
            scope.close(),
            Err(StorageErrorKind::Encode { type_name, .. }) if type_name == TypeName::from("app::Faulty")
        ));
        drop(scope);

        let stored = storage.entries.lock().clone();
        assert_eq!(stored.keys().collect::<alloc::vec::Vec<_>>(), [&TypeName::from("app::Cart")]);
        assert_eq!(*storage.stores.lock(), 1);
        assert!(logs_contain("Type has no codec"));
    }

    #[test]
    fn test_materialize_transition() {
        let registry = registry(true);
        let raw = Entry::Undecoded(r#"{"items":2}"#.to_string());

        let entry = raw.materialize(&"app::Cart".into(), &registry);
        assert!(entry.is_materialized());
        let entry = entry.materialize(&"app::Cart".into(), &registry);
        assert!(entry.is_materialized());

        let unknown = Entry::Undecoded("{}".to_string()).materialize(&"app::Unknown".into(), &registry);
        assert!(!unknown.is_materialized());
    }
}
