//! Symbol dispatch table — integer symbols standing in for host callbacks.
//!
//! Ahead-of-time-compiled environments cannot hand the engine a runtime-
//! generated trampoline, so the engine carries a 16-bit symbol instead and
//! hands it back through `EngineHooks::dispatch` at invocation time. This
//! table maps symbols to callbacks. It is owned by its context and cleared
//! on teardown — never a process-wide static — so a disposed context can
//! never leave a stale symbol pointing at a dropped closure, and multiple
//! contexts never share a symbol space.

use std::rc::Rc;

use skiff_sdk::{InteropError, InteropResult, Symbol};

use crate::call::CallScope;
use crate::resource::{ResourceHandle, ResourceTable};

/// Host callback invocable from the engine.
///
/// Receives a [`CallScope`] giving slot access and the ability to call
/// back into the engine on a fresh fiber. Stored behind `Rc` so dispatch
/// can run a callback while the table itself is re-entered by a nested
/// call.
pub type ForeignMethod = dyn Fn(&mut CallScope<'_>);

/// Symbols fit a 16-bit wire field and `0` is reserved, so at most
/// `2^16 - 1` callbacks can be registered at once.
const MAX_SYMBOLS: u32 = u16::MAX as u32;

/// Free-list table of host callbacks keyed by [`Symbol`].
///
/// Identical in shape to [`ResourceTable`] (it is one, bounded to the
/// symbol's wire width). Symbol `0` is never issued; it is the engine's
/// "no method bound" marker that skips invocation entirely.
#[derive(Default)]
pub struct SymbolTable {
    table: ResourceTable<Rc<ForeignMethod>>,
}

impl SymbolTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback, returning its symbol.
    ///
    /// Raises `ArgumentRange` when the table is at the symbol width's
    /// capacity rather than silently wrapping symbol values.
    pub fn add(&mut self, callback: Rc<ForeignMethod>) -> InteropResult<Symbol> {
        if self.table.next_handle().raw() > MAX_SYMBOLS {
            return Err(InteropError::ArgumentRange(format!(
                "symbol table is full ({} entries)",
                MAX_SYMBOLS
            )));
        }
        let handle = self.table.add(callback);
        Ok(Symbol::from_raw(handle.raw() as u16))
    }

    /// Look up the callback behind `symbol`. Returns a clone so the
    /// caller can invoke it without holding a borrow on the table.
    pub fn get(&self, symbol: Symbol) -> Option<Rc<ForeignMethod>> {
        self.table.try_get(Self::handle(symbol)?).cloned()
    }

    /// Unregister `symbol`. No-op returning `false` for the reserved
    /// symbol or one not currently registered.
    pub fn remove(&mut self, symbol: Symbol) -> bool {
        match Self::handle(symbol) {
            Some(handle) => self.table.remove(handle),
            None => false,
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Drop every registered callback. Called at context teardown.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    fn handle(symbol: Symbol) -> Option<ResourceHandle> {
        if symbol.is_none() {
            None
        } else {
            Some(ResourceHandle::from_raw(symbol.raw() as u32))
        }
    }
}
