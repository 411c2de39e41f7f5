//! EngineAbi and EngineHooks traits — the two halves of the boundary.
//!
//! [`EngineAbi`] abstracts the foreign engine's slot-based C ABI behind a
//! safe trait: interpret/call primitives, the numbered slot register file,
//! and value rooting. The embedding layer programs against this trait
//! without depending on any concrete engine.
//!
//! [`EngineHooks`] is the reverse direction: the callbacks the engine
//! consumes at bind time and during execution (foreign method lookup,
//! symbol dispatch, diagnostics). The embedding context implements it;
//! engines receive it as a parameter on `interpret`/`call` rather than
//! through a process-wide registry, so multiple contexts never leak
//! entries into each other's symbol space.

use crate::value::{ForeignPtr, InterpretOutcome, SlotType};

// ============================================================================
// Symbol
// ============================================================================

/// Stable integer standing in for a host function pointer.
///
/// Ahead-of-time-compiled environments cannot marshal closures as raw
/// function pointers across the ABI; the engine instead carries a 16-bit
/// symbol and hands it back through [`EngineHooks::dispatch`]. Symbol `0`
/// is reserved to mean "no method bound", letting the engine skip
/// invocation entirely (e.g. a class with no finalizer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Symbol(u16);

impl Symbol {
    /// The reserved "no method bound" symbol.
    pub const NONE: Symbol = Symbol(0);

    /// Wrap a raw symbol value.
    pub fn from_raw(raw: u16) -> Self {
        Symbol(raw)
    }

    /// The raw 16-bit wire value.
    pub fn raw(self) -> u16 {
        self.0
    }

    /// Whether this is the reserved "no method bound" symbol.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// Allocator and finalizer symbols for a foreign class.
///
/// `finalize` is [`Symbol::NONE`] when the class declares no finalizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassSymbols {
    /// Symbol invoked to allocate backing storage for a new instance.
    pub allocate: Symbol,
    /// Symbol invoked when the engine's GC collects an instance.
    pub finalize: Symbol,
}

// ============================================================================
// FiberId
// ============================================================================

/// Identifier for a secondary execution context inside the engine.
///
/// Used by the reentrant-call protocol: a host callback that calls back
/// into the engine runs the nested call on a fresh fiber so the suspended
/// outer call's slot state is never touched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FiberId(usize);

impl FiberId {
    /// Wrap a raw engine fiber index.
    pub fn from_raw(raw: usize) -> Self {
        FiberId(raw)
    }

    /// The raw fiber index.
    pub fn raw(self) -> usize {
        self.0
    }
}

// ============================================================================
// EngineAbi
// ============================================================================

/// Abstract surface of the foreign script engine.
///
/// This is the single seam the embedding layer crosses. Implementations
/// wrap a real engine's C ABI (the unsafety confined to that one adapter)
/// or provide a scripted stand-in for tests.
///
/// # Threading
///
/// All methods must be driven from the single thread that owns the engine
/// context. This is a documented contract, not enforced at runtime.
///
/// # Slots
///
/// Typed getters assume the caller has checked [`slot_type`] first; handing
/// a getter a slot of the wrong type is a programming error and concrete
/// engines may abort on it. The embedding layer always checks.
///
/// [`slot_type`]: EngineAbi::slot_type
pub trait EngineAbi {
    /// Start the engine context. Returns `false` if the engine could not
    /// be brought up (the embedding layer turns this into
    /// `InitializationFailure`).
    fn start(&mut self) -> bool;

    /// Compile and run `source` in the module named `module`.
    fn interpret(
        &mut self,
        module: &str,
        source: &[u8],
        hooks: &mut dyn EngineHooks,
    ) -> InterpretOutcome;

    /// Invoke the callable identified by `target` (a call target created
    /// with [`make_call_target`]). Slot 0 holds the receiver on entry and
    /// the return value on success. Runs synchronously to completion or to
    /// a raised error.
    ///
    /// [`make_call_target`]: EngineAbi::make_call_target
    fn call(&mut self, target: ForeignPtr, hooks: &mut dyn EngineHooks) -> InterpretOutcome;

    /// Compile a signature into a reusable call target, rooted on the
    /// engine heap until released.
    fn make_call_target(&mut self, signature: &str) -> ForeignPtr;

    /// Grow the slot register file to at least `count` slots.
    fn ensure_slots(&mut self, count: usize);

    /// Number of slots currently usable.
    fn slot_count(&self) -> usize;

    /// Runtime type of the value in `slot`.
    fn slot_type(&self, slot: usize) -> SlotType;

    /// Read a boolean from `slot`.
    fn get_slot_bool(&self, slot: usize) -> bool;

    /// Read a number from `slot`.
    fn get_slot_number(&self, slot: usize) -> f64;

    /// Read a string slot's byte payload.
    fn get_slot_bytes(&self, slot: usize) -> &[u8];

    /// Root the value in `slot` on the engine heap and return a reference
    /// to it. The reference stays live until [`release_value`] is called.
    ///
    /// [`release_value`]: EngineAbi::release_value
    fn get_slot_value(&mut self, slot: usize) -> ForeignPtr;

    /// Store null into `slot`.
    fn set_slot_null(&mut self, slot: usize);

    /// Store a boolean into `slot`.
    fn set_slot_bool(&mut self, slot: usize, value: bool);

    /// Store a number into `slot`.
    fn set_slot_number(&mut self, slot: usize, value: f64);

    /// Store a string into `slot`.
    fn set_slot_string(&mut self, slot: usize, value: &str);

    /// Store raw bytes into `slot` (byte-span variant of the string setter).
    fn set_slot_bytes(&mut self, slot: usize, value: &[u8]);

    /// Store a previously rooted engine value into `slot`.
    fn set_slot_value(&mut self, slot: usize, value: ForeignPtr);

    /// Look up a top-level variable and copy it into `slot`. Returns
    /// `false` if the module or variable does not exist.
    fn get_variable(&mut self, module: &str, name: &str, slot: usize) -> bool;

    /// Drop the engine's root for `value`, allowing its GC to collect it.
    fn release_value(&mut self, value: ForeignPtr);

    /// Suspend the current execution context and switch to a fresh fiber
    /// with its own slot register file.
    fn push_fiber(&mut self) -> FiberId;

    /// Tear down the fiber and resume the execution context it suspended.
    fn resume_fiber(&mut self, fiber: FiberId);
}

// ============================================================================
// EngineHooks
// ============================================================================

/// Host-side callbacks consumed by the engine.
///
/// Passed explicitly into [`EngineAbi::interpret`] and [`EngineAbi::call`]
/// so the dispatch table's lifetime is tied to its owning context.
pub trait EngineHooks {
    /// Resolve a foreign method declaration to a dispatch symbol at bind
    /// time. Returns [`Symbol::NONE`] when no binding is registered.
    fn bind_method(
        &mut self,
        module: &str,
        class_name: &str,
        is_static: bool,
        signature: &str,
    ) -> Symbol;

    /// Resolve a foreign class declaration to its allocator and finalizer
    /// symbols at bind time.
    fn bind_class(&mut self, module: &str, class_name: &str) -> ClassSymbols;

    /// Invoke the host callback registered under `symbol`. A
    /// [`Symbol::NONE`] dispatch is a no-op.
    fn dispatch(&mut self, symbol: Symbol, engine: &mut dyn EngineAbi);

    /// Deliver one diagnostic entry (compile error, runtime error, or
    /// stack-trace frame).
    fn diagnostic(&mut self, diagnostic: crate::error::Diagnostic);
}
