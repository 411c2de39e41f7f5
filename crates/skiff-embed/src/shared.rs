//! Shared-value store: typed host values addressable by resource handle.
//!
//! Layers dynamic typing over [`ResourceTable`] so an engine-side instance
//! can carry one integer referencing any host value. Retrieval downcasts
//! back to the concrete type and reports `TypeMismatch` on a wrong ask.

use std::any::Any;
use std::rc::Rc;

use skiff_sdk::{InteropError, InteropResult};

use crate::resource::{ResourceHandle, ResourceTable};

/// A type-erased, reference-counted host value. Equality is identity so
/// the table's by-value operations compare the allocation, not contents.
#[derive(Clone)]
pub(crate) struct Shared(Rc<dyn Any>);

impl PartialEq for Shared {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Table of type-erased host values keyed by [`ResourceHandle`].
#[derive(Default)]
pub(crate) struct SharedStore {
    table: ResourceTable<Shared>,
}

impl SharedStore {
    pub fn add<T: Any>(&mut self, value: T) -> ResourceHandle {
        self.table.add(Shared(Rc::new(value)))
    }

    pub fn get<T: Any>(&self, handle: ResourceHandle) -> InteropResult<Rc<T>> {
        let shared = self.table.get(handle)?;
        Rc::clone(&shared.0)
            .downcast::<T>()
            .map_err(|_| InteropError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
                got: "a shared value of another type".to_string(),
            })
    }

    pub fn try_get<T: Any>(&self, handle: ResourceHandle) -> Option<Rc<T>> {
        let shared = self.table.try_get(handle)?;
        Rc::clone(&shared.0).downcast::<T>().ok()
    }

    pub fn remove(&mut self, handle: ResourceHandle) -> bool {
        self.table.remove(handle)
    }

    pub fn contains(&self, handle: ResourceHandle) -> bool {
        self.table.contains(handle)
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }
}
