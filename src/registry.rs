mod descriptor;

use alloc::{boxed::Box, collections::BTreeMap, string::String, vec::Vec};
use core::any::TypeId;
use tracing::{debug, warn};

pub use descriptor::{Constructor, Method, Parameter, Property, TypeDescriptor, Visibility, CONSTRUCTOR};

use crate::{
    annotation::Annotation,
    any::{Instance, Object, TypeName},
    instantiator::{BoxedDecoder, BoxedEncoder, BoxedFactory, BoxedInvoker, BoxedSetter, BoxedUpcast},
};

pub(crate) struct ParentLink {
    pub(crate) name: TypeName,
    pub(crate) upcast: BoxedUpcast,
}

pub(crate) struct ConstructorEntry {
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) annotations: Vec<Annotation>,
    pub(crate) factory: BoxedFactory,
}

pub(crate) struct MethodEntry {
    pub(crate) name: String,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) annotations: Vec<Annotation>,
    pub(crate) invoker: Option<BoxedInvoker>,
}

pub(crate) struct PropertyEntry {
    pub(crate) name: String,
    pub(crate) declared_type: Option<TypeName>,
    pub(crate) visibility: Visibility,
    pub(crate) annotations: Vec<Annotation>,
    pub(crate) setter: Option<BoxedSetter>,
}

pub(crate) struct Codec {
    pub(crate) encoder: BoxedEncoder,
    pub(crate) decoder: BoxedDecoder,
}

/// Erased form of a [`TypeDescriptor`], as stored in the [`Registry`]
pub(crate) struct TypeEntry {
    pub(crate) name: TypeName,
    pub(crate) parent: Option<ParentLink>,
    pub(crate) annotations: Vec<Annotation>,
    pub(crate) constructor: Option<ConstructorEntry>,
    pub(crate) default_factory: Option<BoxedFactory>,
    pub(crate) methods: Vec<MethodEntry>,
    pub(crate) properties: Vec<PropertyEntry>,
    pub(crate) codec: Option<Codec>,
}

impl TypeEntry {
    #[inline]
    #[must_use]
    pub(crate) fn method(&self, name: &str) -> Option<&MethodEntry> {
        self.methods.iter().find(|method| method.name == name)
    }

    #[inline]
    #[must_use]
    pub(crate) fn property(&self, name: &str) -> Option<&PropertyEntry> {
        self.properties.iter().find(|property| property.name == name)
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    entries: BTreeMap<TypeName, TypeEntry>,
    names: BTreeMap<TypeId, TypeName>,
}

impl RegistryBuilder {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a type, replacing an earlier registration under the same name
    #[inline]
    #[must_use]
    pub fn register<T: Send + Sync + 'static>(mut self, descriptor: TypeDescriptor<T>) -> Self {
        self.add(descriptor);
        self
    }

    pub(crate) fn add<T: Send + Sync + 'static>(&mut self, descriptor: TypeDescriptor<T>) -> Option<TypeEntry> {
        let entry = descriptor.into_entry();
        let name = entry.name.clone();
        self.names.entry(TypeId::of::<T>()).or_insert_with(|| name.clone());

        let replaced = self.entries.insert(name, entry);
        if let Some(replaced) = &replaced {
            warn!(type_name = %replaced.name, "Type registered twice, the last registration wins");
        }
        replaced
    }

    #[inline]
    #[must_use]
    pub fn build(self) -> Registry {
        debug!(types = self.entries.len(), "Registry built");
        Registry {
            entries: self.entries,
            names: self.names,
        }
    }
}

/// Static descriptors of every type the injector can build, addressed by [`TypeName`]
pub struct Registry {
    entries: BTreeMap<TypeName, TypeEntry>,
    names: BTreeMap<TypeId, TypeName>,
}

impl Registry {
    #[inline]
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, type_name: &TypeName) -> bool {
        self.entries.contains_key(type_name)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name a Rust type was first registered under
    #[inline]
    #[must_use]
    pub fn name_of<T: 'static>(&self) -> Option<&TypeName> {
        self.names.get(&TypeId::of::<T>())
    }

    /// Whether instances of the type can be restored from storage
    #[inline]
    #[must_use]
    pub fn is_decodable(&self, type_name: &TypeName) -> bool {
        self.entries.get(type_name).is_some_and(|entry| entry.codec.is_some())
    }

    #[inline]
    #[must_use]
    pub(crate) fn get(&self, type_name: &TypeName) -> Option<&TypeEntry> {
        self.entries.get(type_name)
    }

    /// The type itself followed by its ancestors, stopping at unregistered parents and loops
    pub(crate) fn ancestry<'a>(&'a self, type_name: &TypeName) -> Ancestry<'a> {
        Ancestry {
            registry: self,
            next: self.entries.get(type_name),
            remaining: self.entries.len(),
        }
    }

    /// Most-derived declaration of a method, with the type declaring it
    pub(crate) fn find_method<'a>(&'a self, type_name: &TypeName, method: &str) -> Option<(&'a TypeEntry, &'a MethodEntry)> {
        self.ancestry(type_name)
            .find_map(|entry| entry.method(method).map(|method| (entry, method)))
    }

    /// Most-derived declaration of a property, with the type declaring it
    pub(crate) fn find_property<'a>(
        &'a self,
        type_name: &TypeName,
        property: &str,
    ) -> Option<(&'a TypeEntry, &'a PropertyEntry)> {
        self.ancestry(type_name)
            .find_map(|entry| entry.property(property).map(|property| (entry, property)))
    }

    /// Views an object of type `from` as its embedded ancestor `to`
    pub(crate) fn upcast<'a>(&self, mut object: &'a mut Object, from: &TypeName, to: &TypeName) -> Option<&'a mut Object> {
        let mut current = self.entries.get(from)?;
        let mut remaining = self.entries.len();
        while current.name != *to {
            if remaining == 0 {
                return None;
            }
            remaining -= 1;

            let parent = current.parent.as_ref()?;
            object = (parent.upcast)(object)?;
            current = self.entries.get(&parent.name)?;
        }
        Some(object)
    }

    /// Decodes a stored value, `None` if the type has no codec registered
    pub(crate) fn decode(&self, type_name: &TypeName, raw: &str) -> Option<Result<Instance, serde_json::Error>> {
        let codec = self.entries.get(type_name)?.codec.as_ref()?;
        Some((codec.decoder)(raw).map(|value: Box<Object>| Instance::from_arc(type_name.clone(), value.into())))
    }

    /// Encodes an instance for storage, `None` if its type has no codec registered
    pub(crate) fn encode(&self, instance: &Instance) -> Option<Result<String, serde_json::Error>> {
        let codec = self.entries.get(instance.type_name())?.codec.as_ref()?;
        Some((codec.encoder)(&**instance.value()))
    }
}

pub(crate) struct Ancestry<'a> {
    registry: &'a Registry,
    next: Option<&'a TypeEntry>,
    remaining: usize,
}

impl<'a> Iterator for Ancestry<'a> {
    type Item = &'a TypeEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let current = self.next.take()?;
        self.next = current
            .parent
            .as_ref()
            .and_then(|parent| self.registry.entries.get(&parent.name));
        Some(current)
    }
}
