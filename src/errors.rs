mod cache;
mod instantiate;
mod resolve;
mod storage;

pub use cache::CacheErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use resolve::ResolveErrorKind;
pub use storage::StorageErrorKind;
