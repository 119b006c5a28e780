mod session;
mod singleton;
mod storage;

pub use session::{MemorySessionHandler, SessionHandler, SessionScope, SessionStorage, SESSION_KEY};
pub use singleton::SingletonScope;
pub use storage::{Entry, Storage, StorageScope, StoredEntries};

use crate::any::{Instance, TypeName};

/// Lifetime policy deciding which instances are kept and handed out again
pub trait Scope: Send + Sync {
    /// Key the scope is looked up by, see [`crate::Injector::get_scope`]
    #[must_use]
    fn name(&self) -> &str;

    /// Held instance, `None` if absent or not available yet
    #[must_use]
    fn get(&self, type_name: &TypeName) -> Option<Instance>;

    /// Holds the instance under `type_name`, or under its own type name if not given
    fn set(&self, instance: Instance, type_name: Option<TypeName>);

    #[must_use]
    fn has(&self, type_name: &TypeName) -> bool;

    /// Holds the instance if `type_name` (its type or an ancestor) is claimed by the scope
    ///
    /// Returns whether the instance was claimed
    fn check(&self, instance: &Instance, type_name: &TypeName) -> bool;
}
