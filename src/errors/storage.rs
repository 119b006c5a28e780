use crate::any::TypeName;

#[derive(thiserror::Error, Debug)]
pub enum StorageErrorKind {
    #[error("Failed to encode {type_name} for storage")]
    Encode {
        type_name: TypeName,
        #[source]
        source: serde_json::Error,
    },
}
