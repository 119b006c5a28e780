use alloc::string::String;

#[derive(thiserror::Error, Debug)]
pub enum CacheErrorKind {
    #[error("Cache backend I/O failed")]
    Io(#[from] std::io::Error),
    #[error("Cache data couldn't be (de)serialized")]
    Serialize(#[from] serde_json::Error),
    #[error("Unexpected cache server response: {0}")]
    Protocol(String),
}
