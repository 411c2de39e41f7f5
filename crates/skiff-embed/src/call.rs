//! Slot-register call protocol and reentrant-call scoping.
//!
//! A call writes the receiver into slot 0 and arguments into slots
//! 1..=arity, invokes the engine's call primitive, and reads the return
//! value back from slot 0. Both handles are validated *before* anything
//! crosses the ABI — an invalid handle is a hard error, never silently
//! ignored, because proceeding would let the engine dereference a
//! dangling value.
//!
//! Reentrancy: a host callback invoked from the engine may call back in.
//! The nested call runs inside a [`FiberScope`], a guard that suspends the
//! current execution context on construction and resumes it on drop, so
//! the interrupted call's slot state is untouched when it resumes — even
//! if the nested call fails or the callback panics.

use skiff_sdk::{
    EngineAbi, EngineHooks, FiberId, ForeignPtr, FromSlot, InteropError, InteropResult,
    InterpretOutcome, IntoSlot,
};

use crate::context::HostState;
use crate::pool::{CallHandle, Handle};
use crate::resource::ResourceHandle;

// ============================================================================
// SlotArg
// ============================================================================

/// One call argument, written into its numbered slot by the protocol.
pub enum SlotArg<'a> {
    /// The null value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    Str(&'a str),
    /// Raw bytes (byte-span variant of `Str`).
    Bytes(&'a [u8]),
    /// An engine value held through a pooled handle. Validated before the
    /// call like the receiver.
    Handle(&'a Handle),
    /// A raw rooted engine pointer. No staleness protection; prefer
    /// [`SlotArg::Handle`].
    Raw(ForeignPtr),
}

fn write_arg(engine: &mut dyn EngineAbi, slot: usize, arg: &SlotArg<'_>) -> InteropResult<()> {
    match arg {
        SlotArg::Null => engine.set_slot_null(slot),
        SlotArg::Bool(value) => engine.set_slot_bool(slot, *value),
        SlotArg::Number(value) => engine.set_slot_number(slot, *value),
        SlotArg::Str(value) => engine.set_slot_string(slot, value),
        SlotArg::Bytes(value) => engine.set_slot_bytes(slot, value),
        SlotArg::Handle(handle) => {
            if !handle.is_valid() {
                return Err(InteropError::InvalidHandle(format!(
                    "argument in slot {} was released",
                    slot
                )));
            }
            engine.set_slot_value(slot, handle.ptr());
        }
        SlotArg::Raw(ptr) => engine.set_slot_value(slot, *ptr),
    }
    Ok(())
}

// ============================================================================
// Core invoke
// ============================================================================

/// Steps 1-5 of the call protocol: validate, marshal, invoke.
///
/// Fiber scoping for nested calls (step 6) is the caller's concern; see
/// [`CallScope::call`].
pub(crate) fn invoke(
    engine: &mut dyn EngineAbi,
    hooks: &mut dyn EngineHooks,
    receiver: &Handle,
    target: &CallHandle,
    args: &[SlotArg<'_>],
) -> InteropResult<InterpretOutcome> {
    if !receiver.is_valid() {
        return Err(InteropError::InvalidHandle(
            "call receiver was released or recycled".to_string(),
        ));
    }
    if !target.is_valid() {
        return Err(InteropError::InvalidHandle(
            "call target was released or recycled".to_string(),
        ));
    }
    if args.len() != target.arity() {
        return Err(InteropError::ArgumentRange(format!(
            "call target takes {} arguments, got {}",
            target.arity(),
            args.len()
        )));
    }

    engine.ensure_slots(target.arity() + 1);
    engine.set_slot_value(0, receiver.ptr());
    for (i, arg) in args.iter().enumerate() {
        write_arg(engine, i + 1, arg)?;
    }
    Ok(engine.call(target.handle().ptr(), hooks))
}

// ============================================================================
// FiberScope
// ============================================================================

/// Guard holding the engine on a secondary execution context.
///
/// Construction suspends the current context; drop resumes it. Drop-based
/// resumption guarantees the interrupted call's slots are restored even
/// when the nested call errors.
pub(crate) struct FiberScope<'a> {
    engine: &'a mut dyn EngineAbi,
    fiber: FiberId,
}

impl<'a> FiberScope<'a> {
    pub fn enter(engine: &'a mut dyn EngineAbi) -> Self {
        let fiber = engine.push_fiber();
        FiberScope { engine, fiber }
    }

    pub fn engine(&mut self) -> &mut dyn EngineAbi {
        self.engine
    }
}

impl Drop for FiberScope<'_> {
    fn drop(&mut self) {
        self.engine.resume_fiber(self.fiber);
    }
}

// ============================================================================
// CallScope
// ============================================================================

/// Execution scope handed to a host callback invoked from the engine.
///
/// Gives the callback typed slot access, the shared-value store, handle
/// acquisition, and the reentrant [`call`](Self::call) that runs nested
/// calls on a fresh fiber.
pub struct CallScope<'a> {
    pub(crate) engine: &'a mut dyn EngineAbi,
    pub(crate) host: &'a mut HostState,
}

impl CallScope<'_> {
    /// Grow the slot register file to at least `count` slots.
    pub fn ensure_slots(&mut self, count: usize) {
        self.engine.ensure_slots(count);
    }

    /// Number of slots currently usable.
    pub fn slot_count(&self) -> usize {
        self.engine.slot_count()
    }

    /// Runtime type of the value in `slot`.
    pub fn slot_type(&self, slot: usize) -> skiff_sdk::SlotType {
        self.engine.slot_type(slot)
    }

    /// Read a typed value from `slot`.
    pub fn get_slot<T: FromSlot>(&mut self, slot: usize) -> InteropResult<T> {
        if slot >= self.engine.slot_count() {
            return Err(InteropError::ArgumentRange(format!(
                "slot {} out of range ({} slots)",
                slot,
                self.engine.slot_count()
            )));
        }
        T::from_slot(self.engine, slot)
    }

    /// Write a typed value into `slot`, growing the register file if
    /// needed.
    pub fn set_slot<T: IntoSlot>(&mut self, slot: usize, value: T) -> InteropResult<()> {
        self.engine.ensure_slots(slot + 1);
        value.into_slot(self.engine, slot)
    }

    /// Write the callback's return value (slot 0).
    pub fn set_return<T: IntoSlot>(&mut self, value: T) -> InteropResult<()> {
        self.set_slot(0, value)
    }

    /// Acquire a pooled handle on the value in `slot`.
    pub fn make_handle_from_slot(&mut self, slot: usize) -> InteropResult<Handle> {
        if slot >= self.engine.slot_count() {
            return Err(InteropError::ArgumentRange(format!(
                "slot {} out of range ({} slots)",
                slot,
                self.engine.slot_count()
            )));
        }
        let ptr = self.engine.get_slot_value(slot);
        if ptr.is_null() {
            return Err(InteropError::InvalidHandle(
                "slot holds the null value".to_string(),
            ));
        }
        Ok(self.host.pool.acquire(ptr))
    }

    /// Store a host value, returning the integer handle an engine-side
    /// instance can carry.
    pub fn add_shared<T: std::any::Any>(&mut self, value: T) -> ResourceHandle {
        self.host.shared.add(value)
    }

    /// Resolve a shared-value handle back to its typed host value.
    pub fn get_shared<T: std::any::Any>(
        &self,
        handle: ResourceHandle,
    ) -> InteropResult<std::rc::Rc<T>> {
        self.host.shared.get(handle)
    }

    /// Drop a shared value. No-op returning `false` on an unresolvable
    /// handle.
    pub fn remove_shared(&mut self, handle: ResourceHandle) -> bool {
        self.host.shared.remove(handle)
    }

    /// Call back into the engine from inside this callback.
    ///
    /// Runs on a fresh fiber so the suspended outer call's slot state is
    /// fully isolated from, and restored before, the outer call resumes.
    /// The nested call's return value lives in the fiber's slot 0 and is
    /// gone once it resumes; use [`call_returning`](Self::call_returning)
    /// to read it.
    pub fn call(
        &mut self,
        receiver: &Handle,
        target: &CallHandle,
        args: &[SlotArg<'_>],
    ) -> InteropResult<InterpretOutcome> {
        let mut fiber = FiberScope::enter(&mut *self.engine);
        invoke(fiber.engine(), &mut *self.host, receiver, target, args)
    }

    /// Nested call that reads the return value out of the fiber's slot 0
    /// before resuming the interrupted context. A compile or runtime
    /// failure is raised with the diagnostics it produced.
    pub fn call_returning<T: FromSlot>(
        &mut self,
        receiver: &Handle,
        target: &CallHandle,
        args: &[SlotArg<'_>],
    ) -> InteropResult<T> {
        let mut fiber = FiberScope::enter(&mut *self.engine);
        let outcome = invoke(fiber.engine(), &mut *self.host, receiver, target, args)?;
        if !outcome.is_success() {
            let kind = match outcome {
                InterpretOutcome::CompileError => skiff_sdk::FailureKind::Compile,
                _ => skiff_sdk::FailureKind::Runtime,
            };
            return Err(InteropError::InterpretFailure {
                kind,
                summary: self.host.diag.summary(),
                diagnostics: self.host.diag.snapshot(),
            });
        }
        T::from_slot(fiber.engine(), 0)
    }
}
