extern crate alloc;

pub(crate) mod annotation;
pub(crate) mod any;
pub(crate) mod config;
pub(crate) mod errors;
pub(crate) mod injector;
pub(crate) mod instantiator;
pub(crate) mod registry;
pub(crate) mod resolution;

pub mod reflect;
pub mod scope;

pub use annotation::{Annotation, AnnotationKind};
pub use any::{Instance, Object, TypeName};
pub use config::{CacheKind, Config, ReflectorKind};
pub use errors::{CacheErrorKind, InstantiateErrorKind, ResolveErrorKind, StorageErrorKind};
pub use injector::Injector;
pub use instantiator::Arguments;
pub use reflect::{CachingReflector, Reflector, StandardReflector};
pub use registry::{
    Constructor, Method, Parameter, Property, Registry, RegistryBuilder, TypeDescriptor, Visibility, CONSTRUCTOR,
};
pub use scope::{Scope, SessionScope, SingletonScope};
