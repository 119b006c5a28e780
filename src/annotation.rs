use alloc::{string::String, vec::Vec};
use serde::{Deserialize, Serialize};

use crate::any::TypeName;

/// Declarative marker attached to a type, method or property of a descriptor
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Annotation {
    /// Method is called with resolved arguments right after construction
    InjectMethod,
    /// Overrides the type resolved for the parameter named `variable`
    InjectParam { variable: String, class: TypeName },
    /// Property is assigned a resolved instance, of `class` if set, of its declared type otherwise
    InjectProperty { class: Option<TypeName> },
    /// Type is created once; `implements` is a comma separated list of extra lookup names
    ScopeSingleton { implements: Option<String> },
    /// Type lives in the session store
    ScopeSession,
}

impl Annotation {
    #[inline]
    #[must_use]
    pub fn singleton() -> Self {
        Self::ScopeSingleton { implements: None }
    }

    #[inline]
    #[must_use]
    pub fn singleton_implementing(implements: impl Into<String>) -> Self {
        Self::ScopeSingleton {
            implements: Some(implements.into()),
        }
    }

    #[inline]
    #[must_use]
    pub fn inject_param(variable: impl Into<String>, class: impl Into<TypeName>) -> Self {
        Self::InjectParam {
            variable: variable.into(),
            class: class.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn inject_property() -> Self {
        Self::InjectProperty { class: None }
    }

    #[inline]
    #[must_use]
    pub fn inject_property_of(class: impl Into<TypeName>) -> Self {
        Self::InjectProperty { class: Some(class.into()) }
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> AnnotationKind {
        match self {
            Self::InjectMethod => AnnotationKind::InjectMethod,
            Self::InjectParam { .. } => AnnotationKind::InjectParam,
            Self::InjectProperty { .. } => AnnotationKind::InjectProperty,
            Self::ScopeSingleton { .. } => AnnotationKind::ScopeSingleton,
            Self::ScopeSession => AnnotationKind::ScopeSession,
        }
    }

    /// Extra lookup names of a singleton, empty for every other annotation
    #[must_use]
    pub fn implements(&self) -> Vec<TypeName> {
        match self {
            Self::ScopeSingleton {
                implements: Some(implements),
            } => implements
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(TypeName::from)
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnnotationKind {
    InjectMethod,
    InjectParam,
    InjectProperty,
    ScopeSingleton,
    ScopeSession,
}

impl AnnotationKind {
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InjectMethod => "InjectMethod",
            Self::InjectParam => "InjectParam",
            Self::InjectProperty => "InjectProperty",
            Self::ScopeSingleton => "ScopeSingleton",
            Self::ScopeSession => "ScopeSession",
        }
    }
}

pub(crate) fn find(annotations: &[Annotation], kind: AnnotationKind) -> Option<&Annotation> {
    annotations.iter().find(|annotation| annotation.kind() == kind)
}

pub(crate) fn filter(annotations: &[Annotation], kind: AnnotationKind) -> Vec<Annotation> {
    annotations.iter().filter(|annotation| annotation.kind() == kind).cloned().collect()
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::{filter, find, Annotation, AnnotationKind};
    use crate::any::TypeName;

    #[test]
    fn test_implements_split() {
        let annotation = Annotation::singleton_implementing("Injector, app::Injector,,");
        assert_eq!(
            annotation.implements(),
            vec![TypeName::from("Injector"), TypeName::from("app::Injector")]
        );
        assert!(Annotation::singleton().implements().is_empty());
        assert!(Annotation::ScopeSession.implements().is_empty());
    }

    #[test]
    fn test_find_and_filter_by_kind() {
        let annotations = vec![
            Annotation::InjectMethod,
            Annotation::inject_param("a", "A"),
            Annotation::inject_param("b", "B"),
        ];
        assert_eq!(find(&annotations, AnnotationKind::InjectMethod), Some(&Annotation::InjectMethod));
        assert_eq!(find(&annotations, AnnotationKind::ScopeSession), None);
        assert_eq!(filter(&annotations, AnnotationKind::InjectParam).len(), 2);
    }
}
