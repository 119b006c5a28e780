use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use wirekit::{
    scope::{SessionHandler, StoredEntries},
    Annotation, Injector, Instance, Registry, Scope as _, SessionScope, StandardReflector, TypeDescriptor,
};

#[derive(Default)]
struct Settings;

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct Basket {
    items: Vec<String>,
}

/// Session data shared between requests
#[derive(Default)]
struct SessionManager {
    data: Mutex<BTreeMap<String, StoredEntries>>,
}

impl SessionHandler for SessionManager {
    fn has(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    fn get(&self, key: &str) -> Option<StoredEntries> {
        self.data.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: StoredEntries) {
        self.data.lock().insert(key.to_owned(), value);
    }
}

fn registry() -> Arc<Registry> {
    Arc::new(
        Registry::builder()
            .register(TypeDescriptor::<Settings>::new("app::Settings").default_constructible())
            .register(
                TypeDescriptor::<Basket>::new("app::Basket")
                    .annotate(Annotation::ScopeSession)
                    .default_constructible()
                    .serializable(),
            )
            .build(),
    )
}

fn session_scope(session: &Arc<SessionManager>, registry: &Arc<Registry>) -> SessionScope {
    SessionScope::session(
        session.clone(),
        Arc::new(StandardReflector::new(registry.clone())),
        registry.clone(),
    )
}

#[test]
fn test_classes_not_stored_initially() {
    let registry = registry();
    let scope = session_scope(&Arc::new(SessionManager::default()), &registry);

    assert!(!scope.has(&"app::Basket".into()));
}

#[test]
fn test_non_session_scoped_classes_not_stored() {
    let registry = registry();
    let scope = session_scope(&Arc::new(SessionManager::default()), &registry);

    let settings = Instance::new("app::Settings", Settings);
    assert!(!scope.check(&settings, &"app::Settings".into()));
    assert!(!scope.has(&"app::Settings".into()));
    assert!(scope.get(&"app::Settings".into()).is_none());
}

#[test]
fn test_session_scoped_classes_stored() {
    let registry = registry();
    let scope = session_scope(&Arc::new(SessionManager::default()), &registry);

    let basket = Instance::new("app::Basket", Basket::default());
    assert!(scope.check(&basket, &"app::Basket".into()));
    assert!(scope.has(&"app::Basket".into()));
    assert!(basket.ptr_eq(&scope.get(&"app::Basket".into()).unwrap()));
}

#[test]
fn test_stored_classes_persisted_across_loads() {
    let registry = registry();
    let session = Arc::new(SessionManager::default());

    let scope = session_scope(&session, &registry);
    let basket = Instance::new(
        "app::Basket",
        Basket {
            items: vec!["book".to_owned()],
        },
    );
    scope.check(&basket, &"app::Basket".into());
    scope.close().unwrap();
    drop(scope);

    let scope = session_scope(&session, &registry);
    assert!(scope.has(&"app::Basket".into()));
    assert_eq!(
        scope.get(&"app::Basket".into()).unwrap().downcast_ref::<Basket>(),
        Some(&Basket {
            items: vec!["book".to_owned()],
        })
    );
}

#[test]
fn test_injector_restores_session_instance() {
    let registry = registry();
    let session = Arc::new(SessionManager::default());

    {
        let injector = Injector::new(Arc::new(StandardReflector::new(registry.clone())), registry.clone());
        injector.add_scope(Arc::new(session_scope(&session, &registry)));
        injector.get_class(&"app::Basket".into()).unwrap();
    }

    let injector = Injector::new(Arc::new(StandardReflector::new(registry.clone())), registry.clone());
    let scope = Arc::new(session_scope(&session, &registry));
    injector.add_scope(scope.clone());

    assert!(scope.has(&"app::Basket".into()));
    let basket = injector.get_class(&"app::Basket".into()).unwrap();
    assert_eq!(basket.downcast_ref::<Basket>(), Some(&Basket::default()));
    assert!(basket.ptr_eq(&injector.get_class(&"app::Basket".into()).unwrap()));
}
