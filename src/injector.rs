use alloc::{boxed::Box, string::String, sync::Arc, vec::Vec};
use core::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::RwLock;
use tracing::{debug, error, info_span, warn};

use crate::{
    annotation::{Annotation, AnnotationKind},
    any::{Instance, Object, TypeName},
    errors::{InstantiateErrorKind, ResolveErrorKind},
    instantiator::Arguments,
    reflect::Reflector,
    registry::{Parameter, Registry, CONSTRUCTOR},
    resolution::ResolutionGuard,
    scope::{Scope, SingletonScope},
};

static NEXT_INJECTOR_ID: AtomicUsize = AtomicUsize::new(0);

/// Builds fully wired instances of registered types.
///
/// Instances held by a scope are handed out again, new ones are constructed with their constructor
/// arguments, injected methods and injected properties resolved through [`Self::get_class`].
pub struct Injector {
    id: usize,
    reflector: Arc<dyn Reflector>,
    registry: Arc<Registry>,
    scopes: RwLock<Vec<Arc<dyn Scope>>>,
}

impl Injector {
    /// Creates an injector with a [`SingletonScope`] registered
    #[must_use]
    pub fn new(reflector: Arc<dyn Reflector>, registry: Arc<Registry>) -> Self {
        let singleton: Arc<dyn Scope> = Arc::new(SingletonScope::new(reflector.clone()));
        Self {
            id: NEXT_INJECTOR_ID.fetch_add(1, Ordering::Relaxed),
            reflector,
            registry,
            scopes: RwLock::new(alloc::vec![singleton]),
        }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    #[inline]
    #[must_use]
    pub fn reflector(&self) -> &Arc<dyn Reflector> {
        &self.reflector
    }

    /// Appends a scope, checked after the ones added before
    pub fn add_scope(&self, scope: Arc<dyn Scope>) {
        debug!(scope = scope.name(), "Scope added");
        self.scopes.write().push(scope);
    }

    /// Scope registered under `name`, compared case-insensitively.
    /// A trailing `scope` is ignored, so `"Singleton"` and `"singletonScope"` find the same scope.
    #[must_use]
    pub fn get_scope(&self, name: &str) -> Option<Arc<dyn Scope>> {
        let name = scope_key(name);
        self.scopes
            .read()
            .iter()
            .find(|scope| scope_key(scope.name()) == name)
            .cloned()
    }

    /// Instance held by a scope, or a new one which is then offered to the scopes
    ///
    /// # Errors
    /// See [`Self::get_new_class`]
    pub fn get_class(&self, type_name: &TypeName) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!("get_class", %type_name);
        let _guard = span.enter();

        for scope in self.scopes() {
            if !scope.has(type_name) {
                continue;
            }
            if let Some(instance) = scope.get(type_name) {
                debug!(scope = scope.name(), "Found in scope");
                return Ok(instance);
            }
            debug!(scope = scope.name(), "Held by scope but not available");
        }
        debug!("Not found in scopes");

        let instance = self.get_new_class(type_name)?;
        self.check_scope(&instance);
        Ok(instance)
    }

    /// Typed form of [`Self::get_class`] for a type registered under its Rust type
    ///
    /// # Errors
    /// - See [`Self::get_new_class`]
    /// - Returns [`ResolveErrorKind::Instantiate`] if the instance is of another type
    pub fn get<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ResolveErrorKind> {
        let name = self.name_of::<T>();
        let instance = self.get_class(&name)?;
        instance.downcast().ok_or_else(|| {
            let err = ResolveErrorKind::Instantiate {
                type_name: name,
                source: InstantiateErrorKind::IncorrectArgument {
                    expected: core::any::type_name::<T>(),
                    actual: instance.type_name().clone(),
                },
            };
            error!("{}", err);
            err
        })
    }

    /// Constructs a new instance, bypassing the scopes and not offering the result to them
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::NoInstantiator`] if the type is unknown or has neither an injectable
    ///   constructor nor a default factory
    /// - Returns [`ResolveErrorKind::CyclicDependency`] if the type depends on itself
    /// - Returns [`ResolveErrorKind::NonInjectableParameter`] or [`ResolveErrorKind::NonInjectableProperty`]
    ///   if an injection point has no type to resolve
    /// - Returns [`ResolveErrorKind::Instantiate`] if a constructor, method or setter fails
    pub fn get_new_class(&self, type_name: &TypeName) -> Result<Instance, ResolveErrorKind> {
        let span = info_span!("get_new_class", %type_name);
        let _guard = span.enter();

        let _resolution = ResolutionGuard::enter(self.id, type_name)?;

        let mut object = self.construct(type_name)?;
        self.inject_object(type_name, &mut *object)?;
        debug!("Constructed");

        Ok(Instance::from_arc(type_name.clone(), Arc::from(object)))
    }

    /// Offers the instance to the scopes for its type, then for each ancestor,
    /// until a scope claims it. Returns whether it was claimed.
    pub fn check_scope(&self, instance: &Instance) -> bool {
        let scopes = self.scopes();
        let mut current = Some(instance.type_name().clone());
        let mut remaining = self.registry.len() + 1;

        while let Some(type_name) = current {
            if remaining == 0 {
                warn!(%type_name, "Type hierarchy loop, scope check stopped");
                break;
            }
            remaining -= 1;

            if let Some(scope) = scopes.iter().find(|scope| scope.check(instance, &type_name)) {
                debug!(scope = scope.name(), %type_name, "Claimed by scope");
                return true;
            }
            current = self.reflector.parent_type(&type_name);
        }
        false
    }

    /// Runs method then property injection on an object built elsewhere
    ///
    /// # Errors
    /// See [`Self::get_new_class`]
    pub fn inject<T: Send + Sync + 'static>(&self, object: &mut T) -> Result<(), ResolveErrorKind> {
        let type_name = self.name_of::<T>();
        self.inject_named(&type_name, object)
    }

    /// [`Self::inject`] for an object known by its registered name
    ///
    /// # Errors
    /// See [`Self::get_new_class`]
    pub fn inject_named(&self, type_name: &TypeName, object: &mut Object) -> Result<(), ResolveErrorKind> {
        let span = info_span!("inject", %type_name);
        let _guard = span.enter();

        let _resolution = ResolutionGuard::enter(self.id, type_name)?;
        self.inject_object(type_name, object)
    }

    /// Wraps an external value under the name its type is registered with
    #[must_use]
    pub fn instance<T: Send + Sync + 'static>(&self, value: T) -> Instance {
        Instance::new(self.name_of::<T>(), value)
    }

    fn name_of<T: 'static>(&self) -> TypeName {
        self.registry.name_of::<T>().cloned().unwrap_or_else(TypeName::of::<T>)
    }

    fn scopes(&self) -> Vec<Arc<dyn Scope>> {
        self.scopes.read().clone()
    }

    fn construct(&self, type_name: &TypeName) -> Result<Box<Object>, ResolveErrorKind> {
        let Some(entry) = self.registry.get(type_name) else {
            let err = ResolveErrorKind::NoInstantiator {
                type_name: type_name.clone(),
            };
            error!("{}", err);
            return Err(err);
        };

        let result = match &entry.constructor {
            Some(constructor) if self.has_injectable_constructor(type_name) => {
                let arguments = self.method_arguments(type_name, CONSTRUCTOR)?;
                (constructor.factory)(arguments)
            }
            _ => match &entry.default_factory {
                Some(factory) => {
                    debug!("Constructor isn't injectable, using default");
                    factory(Arguments::new(Vec::new()))
                }
                None => {
                    let err = ResolveErrorKind::NoInstantiator {
                        type_name: type_name.clone(),
                    };
                    error!("{}", err);
                    return Err(err);
                }
            },
        };

        result.map_err(|source| {
            let err = ResolveErrorKind::Instantiate {
                type_name: type_name.clone(),
                source,
            };
            error!("{}", err);
            err
        })
    }

    /// Every constructor parameter has a declared type. Overrides only pick the type to resolve.
    fn has_injectable_constructor(&self, type_name: &TypeName) -> bool {
        self.reflector.has_method(type_name, CONSTRUCTOR)
            && self
                .reflector
                .method_parameters(type_name, CONSTRUCTOR)
                .iter()
                .all(|parameter| parameter.declared_type.is_some())
    }

    fn parameter_overrides(&self, type_name: &TypeName, method: &str) -> Vec<Annotation> {
        if self.reflector.method_has_annotation(type_name, method, AnnotationKind::InjectParam) {
            self.reflector
                .method_annotations(type_name, method, AnnotationKind::InjectParam)
        } else {
            Vec::new()
        }
    }

    fn method_arguments(&self, type_name: &TypeName, method: &str) -> Result<Arguments, ResolveErrorKind> {
        let overrides = self.parameter_overrides(type_name, method);
        let parameters = self.reflector.method_parameters(type_name, method);

        let mut arguments = Vec::with_capacity(parameters.len());
        for parameter in &parameters {
            let Some(parameter_type) = parameter_type(&overrides, parameter) else {
                let err = ResolveErrorKind::NonInjectableParameter {
                    type_name: type_name.clone(),
                    method: method.into(),
                    parameter: parameter.name.clone(),
                };
                error!("{}", err);
                return Err(err);
            };
            arguments.push(self.get_class(&parameter_type)?);
        }
        Ok(Arguments::new(arguments))
    }

    fn inject_object(&self, type_name: &TypeName, object: &mut Object) -> Result<(), ResolveErrorKind> {
        for method in self
            .reflector
            .methods_with_annotation(type_name, AnnotationKind::InjectMethod)
        {
            self.inject_method(type_name, &method, object)?;
        }
        for property in self
            .reflector
            .properties_with_annotation(type_name, AnnotationKind::InjectProperty)
        {
            self.inject_property(type_name, &property, object)?;
        }
        Ok(())
    }

    fn inject_method(&self, type_name: &TypeName, method: &str, object: &mut Object) -> Result<(), ResolveErrorKind> {
        let arguments = self.method_arguments(type_name, method)?;

        let invoker = self.registry.find_method(type_name, method).and_then(|(declaring, entry)| {
            entry.invoker.as_ref().map(|invoker| (declaring.name.clone(), invoker.clone()))
        });
        let Some((declaring, invoker)) = invoker else {
            return Err(self.no_member(type_name, method));
        };
        let Some(receiver) = self.registry.upcast(object, type_name, &declaring) else {
            return Err(self.no_member(type_name, method));
        };

        invoker(receiver, arguments).map_err(|source| self.instantiate_error(type_name, source))?;
        debug!(method, "Method injected");
        Ok(())
    }

    fn inject_property(&self, type_name: &TypeName, property: &str, object: &mut Object) -> Result<(), ResolveErrorKind> {
        let Some(property_type) = self.property_type(type_name, property) else {
            let err = ResolveErrorKind::NonInjectableProperty {
                type_name: type_name.clone(),
                property: property.into(),
            };
            error!("{}", err);
            return Err(err);
        };
        let value = self.get_class(&property_type)?;

        let setter = self.registry.find_property(type_name, property).and_then(|(declaring, entry)| {
            entry.setter.as_ref().map(|setter| (declaring.name.clone(), setter.clone()))
        });
        let Some((declaring, setter)) = setter else {
            return Err(self.no_member(type_name, property));
        };
        let Some(receiver) = self.registry.upcast(object, type_name, &declaring) else {
            return Err(self.no_member(type_name, property));
        };

        setter(receiver, value).map_err(|source| self.instantiate_error(type_name, source))?;
        debug!(property, "Property injected");
        Ok(())
    }

    fn property_type(&self, type_name: &TypeName, property: &str) -> Option<TypeName> {
        match self
            .reflector
            .property_annotation(type_name, property, AnnotationKind::InjectProperty)
        {
            Some(Annotation::InjectProperty { class: Some(class) }) => Some(class),
            _ => self.reflector.property_declared_type(type_name, property),
        }
    }

    fn no_member(&self, type_name: &TypeName, member: &str) -> ResolveErrorKind {
        let err = ResolveErrorKind::NoMember {
            type_name: type_name.clone(),
            member: String::from(member),
        };
        error!("{}", err);
        err
    }

    fn instantiate_error(&self, type_name: &TypeName, source: InstantiateErrorKind) -> ResolveErrorKind {
        let err = ResolveErrorKind::Instantiate {
            type_name: type_name.clone(),
            source,
        };
        error!("{}", err);
        err
    }
}

/// Type to resolve for a parameter: the `InjectParam` override naming it, else its declared type
fn parameter_type(overrides: &[Annotation], parameter: &Parameter) -> Option<TypeName> {
    overrides
        .iter()
        .find_map(|annotation| match annotation {
            Annotation::InjectParam { variable, class } if *variable == parameter.name => Some(class.clone()),
            _ => None,
        })
        .or_else(|| parameter.declared_type.clone())
}

fn scope_key(name: &str) -> String {
    let name = name.to_lowercase();
    match name.strip_suffix("scope") {
        Some(stripped) if !stripped.is_empty() => stripped.into(),
        _ => name,
    }
}
