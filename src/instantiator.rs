use alloc::{boxed::Box, collections::VecDeque, format, string::String, sync::Arc, vec::Vec};
use core::any::type_name;
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    any::{Instance, Object},
    errors::InstantiateErrorKind,
};

/// Resolved arguments handed to a constructor or an injected method, in declaration order
pub struct Arguments {
    values: VecDeque<Instance>,
}

impl Arguments {
    #[inline]
    #[must_use]
    pub(crate) fn new(values: Vec<Instance>) -> Self {
        Self { values: values.into() }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Takes the next argument as a concrete type
    ///
    /// # Errors
    /// - Returns [`InstantiateErrorKind::MissingArgument`] if all arguments are taken
    /// - Returns [`InstantiateErrorKind::IncorrectArgument`] if the argument is of another type
    pub fn next<T: Send + Sync + 'static>(&mut self) -> Result<Arc<T>, InstantiateErrorKind> {
        let instance = self.values.pop_front().ok_or(InstantiateErrorKind::MissingArgument {
            expected: type_name::<T>(),
        })?;
        instance.downcast().ok_or_else(|| InstantiateErrorKind::IncorrectArgument {
            expected: type_name::<T>(),
            actual: instance.type_name().clone(),
        })
    }

    /// Takes the next argument without checking its type
    ///
    /// # Errors
    /// Returns [`InstantiateErrorKind::MissingArgument`] if all arguments are taken
    pub fn next_instance(&mut self) -> Result<Instance, InstantiateErrorKind> {
        self.values
            .pop_front()
            .ok_or(InstantiateErrorKind::MissingArgument { expected: "Instance" })
    }
}

pub(crate) type BoxedFactory = Arc<dyn Fn(Arguments) -> Result<Box<Object>, InstantiateErrorKind> + Send + Sync>;
pub(crate) type BoxedInvoker = Arc<dyn Fn(&mut Object, Arguments) -> Result<(), InstantiateErrorKind> + Send + Sync>;
pub(crate) type BoxedSetter = Arc<dyn Fn(&mut Object, Instance) -> Result<(), InstantiateErrorKind> + Send + Sync>;
pub(crate) type BoxedUpcast = Arc<dyn for<'a> Fn(&'a mut Object) -> Option<&'a mut Object> + Send + Sync>;
pub(crate) type BoxedEncoder = Arc<dyn Fn(&Object) -> Result<String, serde_json::Error> + Send + Sync>;
pub(crate) type BoxedDecoder = Arc<dyn Fn(&str) -> Result<Box<Object>, serde_json::Error> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_factory<T, F>(factory: F) -> BoxedFactory
where
    T: Send + Sync + 'static,
    F: Fn(Arguments) -> Result<T, InstantiateErrorKind> + Send + Sync + 'static,
{
    Arc::new(move |arguments| factory(arguments).map(|value| Box::new(value) as Box<Object>))
}

#[must_use]
pub(crate) fn boxed_invoker<T, F>(invoke: F) -> BoxedInvoker
where
    T: Send + Sync + 'static,
    F: Fn(&mut T, Arguments) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
{
    Arc::new(move |object: &mut Object, arguments| {
        let receiver = object
            .downcast_mut::<T>()
            .ok_or(InstantiateErrorKind::IncorrectReceiver { expected: type_name::<T>() })?;
        invoke(receiver, arguments)
    })
}

#[must_use]
pub(crate) fn boxed_setter<T, F>(assign: F) -> BoxedSetter
where
    T: Send + Sync + 'static,
    F: Fn(&mut T, Instance) -> Result<(), InstantiateErrorKind> + Send + Sync + 'static,
{
    Arc::new(move |object: &mut Object, value| {
        let receiver = object
            .downcast_mut::<T>()
            .ok_or(InstantiateErrorKind::IncorrectReceiver { expected: type_name::<T>() })?;
        assign(receiver, value)
    })
}

fn upcast_fn<F>(upcast: F) -> F
where
    F: for<'a> Fn(&'a mut Object) -> Option<&'a mut Object>,
{
    upcast
}

#[must_use]
pub(crate) fn boxed_upcast<T, P>(project: fn(&mut T) -> &mut P) -> BoxedUpcast
where
    T: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    Arc::new(upcast_fn(move |object| {
        object.downcast_mut::<T>().map(|child| project(child) as &mut Object)
    }))
}

#[must_use]
pub(crate) fn boxed_encoder<T>() -> BoxedEncoder
where
    T: Serialize + Send + Sync + 'static,
{
    Arc::new(|object: &Object| match object.downcast_ref::<T>() {
        Some(value) => serde_json::to_string(value),
        None => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
            "value is not a {}",
            type_name::<T>()
        ))),
    })
}

#[must_use]
pub(crate) fn boxed_decoder<T>() -> BoxedDecoder
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    Arc::new(|raw: &str| serde_json::from_str::<T>(raw).map(|value| Box::new(value) as Box<Object>))
}

#[cfg(test)]
mod tests {
    use alloc::{boxed::Box, string::String, sync::Arc, vec, vec::Vec};
    use serde::{Deserialize, Serialize};

    use super::{
        boxed_decoder, boxed_encoder, boxed_factory, boxed_invoker, boxed_setter, boxed_upcast, Arguments,
    };
    use crate::{
        any::{Instance, Object},
        errors::InstantiateErrorKind,
    };

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Settings {
        name: String,
    }

    struct Base {
        settings: Option<Arc<Settings>>,
    }

    struct Derived {
        base: Base,
    }

    #[test]
    fn test_arguments_in_order() {
        let mut arguments = Arguments::new(vec![Instance::new("A", 1u8), Instance::new("B", 2u16)]);
        assert_eq!(arguments.len(), 2);
        assert_eq!(*arguments.next::<u8>().unwrap(), 1);
        assert!(matches!(
            arguments.next::<u8>(),
            Err(InstantiateErrorKind::IncorrectArgument { expected: "u8", .. })
        ));
        assert!(arguments.is_empty());
        assert!(matches!(
            arguments.next_instance(),
            Err(InstantiateErrorKind::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_factory_invoker_and_setter() {
        let factory = boxed_factory(|mut arguments| {
            Ok(Base {
                settings: Some(arguments.next()?),
            })
        });
        let settings = Instance::new("Settings", Settings { name: "a".into() });
        let mut object = factory(Arguments::new(vec![settings.clone()])).unwrap();
        assert!(object.downcast_ref::<Base>().unwrap().settings.is_some());

        let invoker = boxed_invoker(|base: &mut Base, _| {
            base.settings = None;
            Ok(())
        });
        invoker(&mut *object, Arguments::new(Vec::new())).unwrap();
        assert!(object.downcast_ref::<Base>().unwrap().settings.is_none());

        let setter = boxed_setter(|base: &mut Base, value: Instance| {
            base.settings = value.downcast();
            Ok(())
        });
        setter(&mut *object, settings).unwrap();
        assert!(object.downcast_ref::<Base>().unwrap().settings.is_some());

        let mut wrong: Box<Object> = Box::new(1u8);
        assert!(matches!(
            invoker(&mut *wrong, Arguments::new(Vec::new())),
            Err(InstantiateErrorKind::IncorrectReceiver { .. })
        ));
    }

    #[test]
    fn test_upcast_to_embedded_parent() {
        let upcast = boxed_upcast(|derived: &mut Derived| &mut derived.base);
        let mut object: Box<Object> = Box::new(Derived {
            base: Base { settings: None },
        });
        let base = upcast(&mut *object).unwrap();
        assert!(base.is::<Base>());

        let mut other: Box<Object> = Box::new(1u8);
        assert!(upcast(&mut *other).is_none());
    }

    #[test]
    fn test_codec() {
        let encoder = boxed_encoder::<Settings>();
        let decoder = boxed_decoder::<Settings>();

        let raw = encoder(&Settings { name: "a".into() }).unwrap();
        let decoded = decoder(&raw).unwrap();
        assert_eq!(decoded.downcast_ref::<Settings>(), Some(&Settings { name: "a".into() }));
        assert!(encoder(&1u8).is_err());
        assert!(decoder("not json").is_err());
    }
}
