use alloc::{string::String, vec::Vec};

use super::instantiate::InstantiateErrorKind;
use crate::any::TypeName;

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("No constructor or default factory registered for {type_name}")]
    NoInstantiator { type_name: TypeName },
    #[error(
        "Non-injectable parameter `{parameter}` in {type_name}::{method}: \
        the method is marked for injection, but the parameter has no type and no override"
    )]
    NonInjectableParameter {
        type_name: TypeName,
        method: String,
        parameter: String,
    },
    #[error("Non-injectable property `{property}` in {type_name}: no declared type and no override")]
    NonInjectableProperty { type_name: TypeName, property: String },
    #[error("Member `{member}` of {type_name} is described but has no callable registered")]
    NoMember { type_name: TypeName, member: String },
    #[error("Cyclic dependency detected: {}", display_path(path))]
    CyclicDependency { path: Vec<TypeName> },
    #[error("Failed to instantiate {type_name}")]
    Instantiate {
        type_name: TypeName,
        #[source]
        source: InstantiateErrorKind,
    },
}

fn display_path(path: &[TypeName]) -> String {
    let mut out = String::new();
    for (index, type_name) in path.iter().enumerate() {
        if index > 0 {
            out.push_str(" -> ");
        }
        out.push_str(type_name.as_str());
    }
    out
}

#[cfg(test)]
mod tests {
    use alloc::{string::ToString as _, vec};

    use super::ResolveErrorKind;

    #[test]
    fn test_cyclic_dependency_display() {
        let err = ResolveErrorKind::CyclicDependency {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "Cyclic dependency detected: A -> B -> A");
    }
}
