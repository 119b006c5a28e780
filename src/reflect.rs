pub mod cache;

mod caching;
mod standard;

use alloc::{string::String, vec::Vec};

pub use caching::CachingReflector;
pub use standard::StandardReflector;

use crate::{
    annotation::{Annotation, AnnotationKind},
    any::TypeName,
    registry::Parameter,
};

/// Structural questions the injector and the scopes ask about a named type.
///
/// Unknown types and members answer with empty lists, `false` or `None`.
pub trait Reflector: Send + Sync {
    /// Members declared by types whose name matches `pattern` are left out of [`Self::methods`] and [`Self::properties`]
    ///
    /// # Errors
    /// Returns an error if `pattern` isn't a valid regular expression
    fn add_ignored_type_pattern(&self, pattern: &str) -> Result<(), regex::Error>;

    fn parent_type(&self, type_name: &TypeName) -> Option<TypeName>;

    fn has_method(&self, type_name: &TypeName, method: &str) -> bool;

    fn method_parameters(&self, type_name: &TypeName, method: &str) -> Vec<Parameter>;

    /// Own and inherited methods, the most-derived declaration of each name only
    fn methods(&self, type_name: &TypeName) -> Vec<String>;

    fn methods_with_annotation(&self, type_name: &TypeName, kind: AnnotationKind) -> Vec<String>;

    /// Own and inherited properties, the most-derived declaration of each name only
    fn properties(&self, type_name: &TypeName) -> Vec<String>;

    fn properties_with_annotation(&self, type_name: &TypeName, kind: AnnotationKind) -> Vec<String>;

    fn class_has_annotation(&self, type_name: &TypeName, kind: AnnotationKind) -> bool;

    fn method_has_annotation(&self, type_name: &TypeName, method: &str, kind: AnnotationKind) -> bool;

    fn property_has_annotation(&self, type_name: &TypeName, property: &str, kind: AnnotationKind) -> bool;

    fn class_annotation(&self, type_name: &TypeName, kind: AnnotationKind) -> Option<Annotation>;

    fn method_annotation(&self, type_name: &TypeName, method: &str, kind: AnnotationKind) -> Option<Annotation>;

    /// Every annotation of one kind on a method, in declaration order
    fn method_annotations(&self, type_name: &TypeName, method: &str, kind: AnnotationKind) -> Vec<Annotation>;

    fn property_annotation(&self, type_name: &TypeName, property: &str, kind: AnnotationKind) -> Option<Annotation>;

    fn property_declared_type(&self, type_name: &TypeName, property: &str) -> Option<TypeName>;

    fn is_public_property(&self, type_name: &TypeName, property: &str) -> bool;
}
