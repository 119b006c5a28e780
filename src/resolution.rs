use alloc::vec::Vec;
use core::cell::RefCell;
use tracing::error;

use crate::{any::TypeName, errors::ResolveErrorKind};

thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<(usize, TypeName)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a type as under construction by an injector on the current thread until dropped
pub(crate) struct ResolutionGuard {
    injector: usize,
}

impl ResolutionGuard {
    /// # Errors
    /// Returns [`ResolveErrorKind::CyclicDependency`] if the type is already under construction
    pub(crate) fn enter(injector: usize, type_name: &TypeName) -> Result<Self, ResolveErrorKind> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();

            let in_progress = stack
                .iter()
                .filter(|(id, _)| *id == injector)
                .map(|(_, name)| name)
                .collect::<Vec<_>>();
            if let Some(start) = in_progress.iter().position(|name| *name == type_name) {
                let mut path = in_progress[start..].iter().map(|&name| name.clone()).collect::<Vec<_>>();
                path.push(type_name.clone());

                let err = ResolveErrorKind::CyclicDependency { path };
                error!("{}", err);
                return Err(err);
            }

            stack.push((injector, type_name.clone()));
            Ok(Self { injector })
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(index) = stack.iter().rposition(|(id, _)| *id == self.injector) {
                stack.remove(index);
            }
        });
    }
}
