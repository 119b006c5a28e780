use alloc::{string::String, sync::Arc};
use core::{
    any::{type_name, Any},
    borrow::Borrow,
    fmt::{self, Debug, Display, Formatter},
};
use serde::{Deserialize, Serialize};

/// Type-erased value the injector builds, injects and stores in scopes.
pub type Object = dyn Any + Send + Sync;

/// Opaque name a type is registered and looked up under.
///
/// Equality is exact string identity, so `"app::Mailer"` and `"app::mailer"` are different types.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name derived from the Rust type path, used when a type is registered without an explicit name
    #[inline]
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(type_name::<T>().into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for TypeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self(name.into())
    }
}

impl From<String> for TypeName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&TypeName> for TypeName {
    fn from(name: &TypeName) -> Self {
        name.clone()
    }
}

impl Borrow<str> for TypeName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for TypeName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TypeName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// A shared object together with the name of its runtime type
#[derive(Clone)]
pub struct Instance {
    type_name: TypeName,
    value: Arc<Object>,
}

impl Instance {
    #[inline]
    #[must_use]
    pub fn new<T: Send + Sync + 'static>(type_name: impl Into<TypeName>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            value: Arc::new(value),
        }
    }

    #[inline]
    #[must_use]
    pub fn from_arc(type_name: impl Into<TypeName>, value: Arc<Object>) -> Self {
        Self {
            type_name: type_name.into(),
            value,
        }
    }

    /// Name of the runtime type, regardless of the key the instance was stored or requested under
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &TypeName {
        &self.type_name
    }

    #[inline]
    #[must_use]
    pub fn value(&self) -> &Arc<Object> {
        &self.value
    }

    #[inline]
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        (*self.value).is::<T>()
    }

    #[inline]
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        (*self.value).downcast_ref()
    }

    #[inline]
    #[must_use]
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast().ok()
    }

    /// Whether both handles point at the same object
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl Debug for Instance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("ptr", &Arc::as_ptr(&self.value).cast::<()>())
            .finish()
    }
}
