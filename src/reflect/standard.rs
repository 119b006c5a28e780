use alloc::{collections::BTreeSet, string::String, sync::Arc, vec::Vec};
use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;

use super::Reflector;
use crate::{
    annotation::{self, Annotation, AnnotationKind},
    any::TypeName,
    registry::{Parameter, Registry, Visibility, CONSTRUCTOR},
};

/// Answers introspection queries from the registry's static descriptors
pub struct StandardReflector {
    registry: Arc<Registry>,
    ignored_patterns: RwLock<Vec<Regex>>,
}

impl StandardReflector {
    #[inline]
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            ignored_patterns: RwLock::new(Vec::new()),
        }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn is_ignored_type(&self, type_name: &TypeName) -> bool {
        self.ignored_patterns
            .read()
            .iter()
            .any(|pattern| pattern.is_match(type_name.as_str()))
    }

    fn method_annotation_list(&self, type_name: &TypeName, method: &str) -> &[Annotation] {
        if method == CONSTRUCTOR {
            return self
                .registry
                .get(type_name)
                .and_then(|entry| entry.constructor.as_ref())
                .map_or(&[], |constructor| constructor.annotations.as_slice());
        }
        self.registry
            .find_method(type_name, method)
            .map_or(&[], |(_, method)| method.annotations.as_slice())
    }

    fn property_annotation_list(&self, type_name: &TypeName, property: &str) -> &[Annotation] {
        self.registry
            .find_property(type_name, property)
            .map_or(&[], |(_, property)| property.annotations.as_slice())
    }
}

impl Reflector for StandardReflector {
    fn add_ignored_type_pattern(&self, pattern: &str) -> Result<(), regex::Error> {
        let regex = Regex::new(pattern)?;
        self.ignored_patterns.write().push(regex);
        debug!(pattern, "Ignored type pattern added");
        Ok(())
    }

    fn parent_type(&self, type_name: &TypeName) -> Option<TypeName> {
        self.registry
            .get(type_name)
            .and_then(|entry| entry.parent.as_ref())
            .map(|parent| parent.name.clone())
    }

    fn has_method(&self, type_name: &TypeName, method: &str) -> bool {
        if method == CONSTRUCTOR {
            return self
                .registry
                .get(type_name)
                .is_some_and(|entry| entry.constructor.is_some());
        }
        self.methods(type_name).iter().any(|name| name == method)
    }

    fn method_parameters(&self, type_name: &TypeName, method: &str) -> Vec<Parameter> {
        if method == CONSTRUCTOR {
            return self
                .registry
                .get(type_name)
                .and_then(|entry| entry.constructor.as_ref())
                .map(|constructor| constructor.parameters.clone())
                .unwrap_or_default();
        }
        self.registry
            .find_method(type_name, method)
            .map(|(_, method)| method.parameters.clone())
            .unwrap_or_default()
    }

    fn methods(&self, type_name: &TypeName) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut methods = Vec::new();
        for entry in self.registry.ancestry(type_name) {
            let ignored = self.is_ignored_type(&entry.name);
            for method in &entry.methods {
                if seen.insert(method.name.as_str()) && !ignored {
                    methods.push(method.name.clone());
                }
            }
        }
        methods
    }

    fn methods_with_annotation(&self, type_name: &TypeName, kind: AnnotationKind) -> Vec<String> {
        self.methods(type_name)
            .into_iter()
            .filter(|method| self.method_has_annotation(type_name, method, kind))
            .collect()
    }

    fn properties(&self, type_name: &TypeName) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut properties = Vec::new();
        for entry in self.registry.ancestry(type_name) {
            let ignored = self.is_ignored_type(&entry.name);
            for property in &entry.properties {
                if seen.insert(property.name.as_str()) && !ignored {
                    properties.push(property.name.clone());
                }
            }
        }
        properties
    }

    fn properties_with_annotation(&self, type_name: &TypeName, kind: AnnotationKind) -> Vec<String> {
        self.properties(type_name)
            .into_iter()
            .filter(|property| self.property_has_annotation(type_name, property, kind))
            .collect()
    }

    fn class_has_annotation(&self, type_name: &TypeName, kind: AnnotationKind) -> bool {
        self.class_annotation(type_name, kind).is_some()
    }

    fn method_has_annotation(&self, type_name: &TypeName, method: &str, kind: AnnotationKind) -> bool {
        annotation::find(self.method_annotation_list(type_name, method), kind).is_some()
    }

    fn property_has_annotation(&self, type_name: &TypeName, property: &str, kind: AnnotationKind) -> bool {
        annotation::find(self.property_annotation_list(type_name, property), kind).is_some()
    }

    fn class_annotation(&self, type_name: &TypeName, kind: AnnotationKind) -> Option<Annotation> {
        self.registry
            .get(type_name)
            .and_then(|entry| annotation::find(&entry.annotations, kind))
            .cloned()
    }

    fn method_annotation(&self, type_name: &TypeName, method: &str, kind: AnnotationKind) -> Option<Annotation> {
        annotation::find(self.method_annotation_list(type_name, method), kind).cloned()
    }

    fn method_annotations(&self, type_name: &TypeName, method: &str, kind: AnnotationKind) -> Vec<Annotation> {
        annotation::filter(self.method_annotation_list(type_name, method), kind)
    }

    fn property_annotation(&self, type_name: &TypeName, property: &str, kind: AnnotationKind) -> Option<Annotation> {
        annotation::find(self.property_annotation_list(type_name, property), kind).cloned()
    }

    fn property_declared_type(&self, type_name: &TypeName, property: &str) -> Option<TypeName> {
        self.registry
            .find_property(type_name, property)
            .and_then(|(_, property)| property.declared_type.clone())
    }

    fn is_public_property(&self, type_name: &TypeName, property: &str) -> bool {
        self.registry
            .find_property(type_name, property)
            .is_some_and(|(_, property)| property.visibility == Visibility::Public)
    }
}
