use alloc::{string::String, vec::Vec};
use core::marker::PhantomData;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{Codec, ConstructorEntry, MethodEntry, ParentLink, PropertyEntry, TypeEntry};
use crate::{
    annotation::Annotation,
    any::{Instance, TypeName},
    errors::InstantiateErrorKind,
    instantiator::{
        boxed_decoder, boxed_encoder, boxed_factory, boxed_invoker, boxed_setter, boxed_upcast, Arguments, BoxedFactory,
        BoxedInvoker, BoxedSetter,
    },
};

/// Method name under which introspection exposes a type's constructor
pub const CONSTRUCTOR: &str = "new";

/// A declared parameter of a constructor or method
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub declared_type: Option<TypeName>,
}

impl Parameter {
    #[inline]
    #[must_use]
    pub fn typed(name: impl Into<String>, declared_type: impl Into<TypeName>) -> Self {
        Self {
            name: name.into(),
            declared_type: Some(declared_type.into()),
        }
    }

    #[inline]
    #[must_use]
    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Private,
}

pub struct Constructor<T> {
    parameters: Vec<Parameter>,
    annotations: Vec<Annotation>,
    factory: BoxedFactory,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> Constructor<T> {
    /// Constructor receiving one resolved argument per declared parameter
    #[inline]
    #[must_use]
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(Arguments) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        Self {
            parameters: Vec::new(),
            annotations: Vec::new(),
            factory: boxed_factory(factory),
            _marker: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[inline]
    #[must_use]
    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

pub struct Method<T> {
    name: String,
    parameters: Vec<Parameter>,
    annotations: Vec<Annotation>,
    invoker: Option<BoxedInvoker>,
    _marker: PhantomData<fn(&mut T)>,
}

impl<T: Send + Sync + 'static> Method<T> {
    /// Declares a method. Without [`Self::invoke`] it only shadows a parent declaration.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            annotations: Vec::new(),
            invoker: None,
            _marker: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[inline]
    #[must_use]
    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    #[inline]
    #[must_use]
    pub fn invoke<F>(mut self, invoke: F) -> Self
    where
        F: Fn(&mut T, Arguments) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.invoker = Some(boxed_invoker(invoke));
        self
    }
}

pub struct Property<T> {
    name: String,
    declared_type: Option<TypeName>,
    visibility: Visibility,
    annotations: Vec<Annotation>,
    setter: Option<BoxedSetter>,
    _marker: PhantomData<fn(&mut T)>,
}

impl<T: Send + Sync + 'static> Property<T> {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: None,
            visibility: Visibility::Public,
            annotations: Vec::new(),
            setter: None,
            _marker: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub fn declared_type(mut self, declared_type: impl Into<TypeName>) -> Self {
        self.declared_type = Some(declared_type.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    #[inline]
    #[must_use]
    pub fn private(self) -> Self {
        self.visibility(Visibility::Private)
    }

    #[inline]
    #[must_use]
    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Setter used by property injection, regardless of [`Visibility`]
    #[inline]
    #[must_use]
    pub fn assign<F>(mut self, assign: F) -> Self
    where
        F: Fn(&mut T, Instance) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.setter = Some(boxed_setter(assign));
        self
    }
}

/// Static description of a type: how to build it, what to inject into it and which scope claims it
///
/// ```
/// use std::sync::Arc;
/// use wirekit::{Annotation, Constructor, Parameter, Registry, TypeDescriptor};
///
/// #[derive(Default)]
/// struct Transport;
///
/// struct Mailer {
///     transport: Arc<Transport>,
/// }
///
/// let registry = Registry::builder()
///     .register(TypeDescriptor::<Transport>::new("app::Transport").default_constructible())
///     .register(
///         TypeDescriptor::<Mailer>::new("app::Mailer")
///             .annotate(Annotation::singleton_implementing("app::MailerInterface"))
///             .constructor(
///                 Constructor::new(|mut args| Ok(Mailer { transport: args.next()? }))
///                     .param(Parameter::typed("transport", "app::Transport")),
///             ),
///     )
///     .build();
/// assert_eq!(registry.len(), 2);
/// ```
pub struct TypeDescriptor<T> {
    entry: TypeEntry,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> TypeDescriptor<T> {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<TypeName>) -> Self {
        Self {
            entry: TypeEntry {
                name: name.into(),
                parent: None,
                annotations: Vec::new(),
                constructor: None,
                default_factory: None,
                methods: Vec::new(),
                properties: Vec::new(),
                codec: None,
            },
            _marker: PhantomData,
        }
    }

    /// Descriptor named after the Rust type path
    #[inline]
    #[must_use]
    pub fn of() -> Self {
        Self::new(TypeName::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn annotate(mut self, annotation: Annotation) -> Self {
        self.entry.annotations.push(annotation);
        self
    }

    /// Declares the parent type. `project` exposes the embedded parent value,
    /// so inherited methods and properties act on it.
    #[inline]
    #[must_use]
    pub fn extends<P: Send + Sync + 'static>(mut self, parent: impl Into<TypeName>, project: fn(&mut T) -> &mut P) -> Self {
        self.entry.parent = Some(ParentLink {
            name: parent.into(),
            upcast: boxed_upcast(project),
        });
        self
    }

    #[inline]
    #[must_use]
    pub fn constructor(mut self, constructor: Constructor<T>) -> Self {
        self.entry.constructor = Some(ConstructorEntry {
            parameters: constructor.parameters,
            annotations: constructor.annotations,
            factory: constructor.factory,
        });
        self
    }

    /// Factory used when the constructor is missing or not injectable
    #[inline]
    #[must_use]
    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
    {
        self.entry.default_factory = Some(boxed_factory(move |_| factory()));
        self
    }

    #[inline]
    #[must_use]
    pub fn method(mut self, method: Method<T>) -> Self {
        self.entry.methods.push(MethodEntry {
            name: method.name,
            parameters: method.parameters,
            annotations: method.annotations,
            invoker: method.invoker,
        });
        self
    }

    #[inline]
    #[must_use]
    pub fn property(mut self, property: Property<T>) -> Self {
        self.entry.properties.push(PropertyEntry {
            name: property.name,
            declared_type: property.declared_type,
            visibility: property.visibility,
            annotations: property.annotations,
            setter: property.setter,
        });
        self
    }

    #[inline]
    #[must_use]
    pub(crate) fn into_entry(self) -> TypeEntry {
        self.entry
    }
}

impl<T: Default + Send + Sync + 'static> TypeDescriptor<T> {
    #[inline]
    #[must_use]
    pub fn default_constructible(self) -> Self {
        self.default_with(|| Ok(T::default()))
    }
}

impl<T: Serialize + DeserializeOwned + Send + Sync + 'static> TypeDescriptor<T> {
    /// Allows storage-backed scopes to persist and restore instances of the type
    #[inline]
    #[must_use]
    pub fn serializable(mut self) -> Self {
        self.entry.codec = Some(Codec {
            encoder: boxed_encoder::<T>(),
            decoder: boxed_decoder::<T>(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::{Constructor, Method, Parameter, Property, TypeDescriptor, Visibility};
    use crate::{annotation::Annotation, instantiator::Arguments, Instance};

    #[derive(Default)]
    struct Dependency;

    #[derive(Default)]
    struct Service {
        dependency: Option<Arc<Dependency>>,
    }

    #[test]
    fn test_descriptor_collects_members() {
        let entry = TypeDescriptor::<Service>::new("Service")
            .annotate(Annotation::singleton())
            .constructor(
                Constructor::new(|mut args| {
                    Ok(Service {
                        dependency: Some(args.next()?),
                    })
                })
                .param(Parameter::typed("dependency", "Dependency"))
                .annotate(Annotation::inject_param("dependency", "OtherDependency")),
            )
            .default_constructible()
            .method(
                Method::new("set_dependency")
                    .param(Parameter::typed("dependency", "Dependency"))
                    .annotate(Annotation::InjectMethod)
                    .invoke(|service: &mut Service, mut args| {
                        service.dependency = Some(args.next()?);
                        Ok(())
                    }),
            )
            .property(
                Property::new("dependency")
                    .declared_type("Dependency")
                    .private()
                    .annotate(Annotation::inject_property())
                    .assign(|service: &mut Service, value: Instance| {
                        service.dependency = value.downcast();
                        Ok(())
                    }),
            )
            .into_entry();

        assert_eq!(entry.name, "Service");
        assert_eq!(entry.annotations, [Annotation::singleton()]);
        let constructor = entry.constructor.as_ref().unwrap();
        assert_eq!(constructor.parameters, [Parameter::typed("dependency", "Dependency")]);
        assert_eq!(constructor.annotations.len(), 1);
        assert!(entry.default_factory.is_some());
        assert!(entry.method("set_dependency").unwrap().invoker.is_some());
        let property = entry.property("dependency").unwrap();
        assert_eq!(property.visibility, Visibility::Private);
        assert!(property.setter.is_some());
        assert!(entry.codec.is_none());

        let built = (constructor.factory)(Arguments::new(alloc::vec![Instance::new("Dependency", Dependency)])).unwrap();
        assert!(built.downcast_ref::<Service>().unwrap().dependency.is_some());
    }
}
