use crate::any::TypeName;

/// Errors raised by user-supplied constructors, method invokers and property setters
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error("Incorrect argument type. Actual: {actual}, expected: {expected}")]
    IncorrectArgument { expected: &'static str, actual: TypeName },
    #[error("Missing argument of type {expected}")]
    MissingArgument { expected: &'static str },
    #[error("Receiver is not a {expected}")]
    IncorrectReceiver { expected: &'static str },
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}
