use alloc::{collections::BTreeMap, sync::Arc};
use parking_lot::RwLock;
use tracing::debug;

use super::Scope;
use crate::{
    annotation::AnnotationKind,
    any::{Instance, TypeName},
    reflect::Reflector,
};

/// Holds one instance per type annotated with [`crate::Annotation::ScopeSingleton`],
/// also reachable under every name the annotation `implements`
pub struct SingletonScope {
    reflector: Arc<dyn Reflector>,
    instances: RwLock<BTreeMap<TypeName, Instance>>,
}

impl SingletonScope {
    pub const NAME: &'static str = "singleton";

    #[inline]
    #[must_use]
    pub fn new(reflector: Arc<dyn Reflector>) -> Self {
        Self {
            reflector,
            instances: RwLock::new(BTreeMap::new()),
        }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }
}

impl Scope for SingletonScope {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn get(&self, type_name: &TypeName) -> Option<Instance> {
        self.instances.read().get(type_name).cloned()
    }

    fn set(&self, instance: Instance, type_name: Option<TypeName>) {
        let type_name = type_name.unwrap_or_else(|| instance.type_name().clone());
        self.instances.write().insert(type_name, instance);
    }

    fn has(&self, type_name: &TypeName) -> bool {
        self.instances.read().contains_key(type_name)
    }

    fn check(&self, instance: &Instance, type_name: &TypeName) -> bool {
        let Some(annotation) = self.reflector.class_annotation(type_name, AnnotationKind::ScopeSingleton) else {
            return false;
        };

        self.set(instance.clone(), None);
        for interface in annotation.implements() {
            debug!(%interface, type_name = %instance.type_name(), "Singleton bound to interface");
            self.set(instance.clone(), Some(interface));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;
    use tracing_test::traced_test;

    use super::SingletonScope;
    use crate::{
        annotation::Annotation,
        any::{Instance, TypeName},
        reflect::StandardReflector,
        registry::{Registry, TypeDescriptor},
        scope::Scope as _,
    };

    #[derive(Default)]
    struct Mailer;

    #[derive(Default)]
    struct Transport;

    #[derive(Default)]
    struct SmtpMailer {
        mailer: Mailer,
    }

    fn scope() -> SingletonScope {
        let registry = Registry::builder()
            .register(
                TypeDescriptor::<Mailer>::new("app::Mailer")
                    .annotate(Annotation::singleton_implementing("app::MailerInterface, app::Notifier ,")),
            )
            .register(TypeDescriptor::<Transport>::new("app::Transport"))
            .register(
                TypeDescriptor::<SmtpMailer>::new("app::SmtpMailer")
                    .extends("app::Mailer", |smtp: &mut SmtpMailer| &mut smtp.mailer),
            )
            .build();
        SingletonScope::new(Arc::new(StandardReflector::new(Arc::new(registry))))
    }

    #[test]
    #[traced_test]
    fn test_check_binds_implements() {
        let scope = scope();
        let mailer = Instance::new("app::Mailer", Mailer);

        assert!(scope.check(&mailer, &"app::Mailer".into()));
        for name in ["app::Mailer", "app::MailerInterface", "app::Notifier"] {
            assert!(scope.has(&name.into()));
            assert!(scope.get(&name.into()).unwrap().ptr_eq(&mailer));
        }
        assert_eq!(scope.len(), 3);
        assert!(logs_contain("Singleton bound to interface"));
    }

    #[test]
    #[traced_test]
    fn test_check_rejects_unannotated() {
        let scope = scope();
        let transport = Instance::new("app::Transport", Transport);

        assert!(!scope.check(&transport, &"app::Transport".into()));
        assert!(!scope.has(&"app::Transport".into()));
        assert!(scope.get(&"app::Transport".into()).is_none());
        assert!(scope.is_empty());
    }

    #[test]
    #[traced_test]
    fn test_check_of_ancestor_stores_under_own_type() {
        let scope = scope();
        let smtp = Instance::new("app::SmtpMailer", SmtpMailer::default());

        assert!(!scope.check(&smtp, &"app::SmtpMailer".into()));
        assert!(scope.check(&smtp, &"app::Mailer".into()));
        assert!(scope.has(&"app::SmtpMailer".into()));
        assert!(!scope.has(&"app::Mailer".into()));
        assert!(scope.has(&"app::MailerInterface".into()));
    }

    #[test]
    #[traced_test]
    fn test_set_under_explicit_name() {
        let scope = scope();
        let transport = Instance::new("app::Transport", Transport);

        scope.set(transport.clone(), Some(TypeName::from("app::TransportInterface")));
        scope.set(transport.clone(), None);
        assert!(scope.get(&"app::TransportInterface".into()).unwrap().ptr_eq(&transport));
        assert!(scope.get(&"app::Transport".into()).unwrap().ptr_eq(&transport));
    }
}
