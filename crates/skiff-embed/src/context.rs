//! ScriptContext — one engine instance plus its host-side state.
//!
//! `ScriptContext` owns the engine and everything the engine needs from
//! the host: the symbol dispatch table, foreign bindings, the shared-value
//! store, the handle pool, and the diagnostic log. The host state is
//! passed into the engine as `&mut dyn EngineHooks` on every interpret and
//! call, so nothing here is process-wide — two contexts have disjoint
//! symbol spaces and tearing one down cannot leave entries dangling in the
//! other.
//!
//! # Threading
//!
//! All slot and call operations must occur on the thread that owns the
//! context. The only exception is releasing handles through the pool
//! returned by [`ScriptContext::handle_pool`], which may happen from any
//! thread; the engine-side release is deferred to this context's thread.

use std::any::Any;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use skiff_sdk::{
    ClassSymbols, Diagnostic, DiagnosticKind, EngineAbi, FailureKind, FromSlot, InteropError,
    InteropResult, InterpretOutcome, IntoSlot, Signature, SlotType, Symbol,
};

use crate::call::{self, CallScope, SlotArg};
use crate::config::ContextConfig;
use crate::diag::DiagnosticLog;
use crate::dispatch::{ForeignMethod, SymbolTable};
use crate::pool::{CallHandle, Handle, HandlePool};
use crate::resource::ResourceHandle;
use crate::shared::SharedStore;

/// Module that dynamically compiled callables are defined in.
const DYNAMIC_MODULE: &str = "(skiff dynamic)";

// ============================================================================
// Bindings
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct MethodKey {
    module: String,
    class_name: String,
    is_static: bool,
    signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ClassKey {
    module: String,
    class_name: String,
}

struct ClassBinding {
    allocate: Rc<ForeignMethod>,
    finalize: Option<Rc<ForeignMethod>>,
}

/// Foreign method/class callbacks registered ahead of interpretation,
/// consulted by the engine's bind-time lookups.
#[derive(Default)]
struct Bindings {
    methods: FxHashMap<MethodKey, Rc<ForeignMethod>>,
    classes: FxHashMap<ClassKey, ClassBinding>,
}

// ============================================================================
// HostState
// ============================================================================

/// Everything the engine consumes from the host, bundled so it can cross
/// into the engine as one `&mut dyn EngineHooks`.
pub(crate) struct HostState {
    pub(crate) pool: Arc<HandlePool>,
    pub(crate) shared: SharedStore,
    pub(crate) symbols: SymbolTable,
    pub(crate) diag: DiagnosticLog,
    bindings: Bindings,
}

impl skiff_sdk::EngineHooks for HostState {
    fn bind_method(
        &mut self,
        module: &str,
        class_name: &str,
        is_static: bool,
        signature: &str,
    ) -> Symbol {
        let key = MethodKey {
            module: module.to_string(),
            class_name: class_name.to_string(),
            is_static,
            signature: signature.to_string(),
        };
        let Some(callback) = self.bindings.methods.get(&key).cloned() else {
            return Symbol::NONE;
        };
        self.install(callback, module, signature)
    }

    fn bind_class(&mut self, module: &str, class_name: &str) -> ClassSymbols {
        let key = ClassKey {
            module: module.to_string(),
            class_name: class_name.to_string(),
        };
        let (allocate, finalize) = match self.bindings.classes.get(&key) {
            Some(binding) => (
                Some(Rc::clone(&binding.allocate)),
                binding.finalize.as_ref().map(Rc::clone),
            ),
            None => (None, None),
        };
        ClassSymbols {
            allocate: match allocate {
                Some(callback) => self.install(callback, module, class_name),
                None => Symbol::NONE,
            },
            finalize: match finalize {
                Some(callback) => self.install(callback, module, class_name),
                None => Symbol::NONE,
            },
        }
    }

    fn dispatch(&mut self, symbol: Symbol, engine: &mut dyn EngineAbi) {
        if symbol.is_none() {
            // "No method bound" — the engine skips invocation entirely.
            return;
        }
        let Some(callback) = self.symbols.get(symbol) else {
            self.diag.push(Diagnostic {
                kind: DiagnosticKind::Runtime,
                module: String::new(),
                line: 0,
                message: format!("dispatch of unregistered symbol {}", symbol.raw()),
            });
            return;
        };
        let mut scope = CallScope { engine, host: self };
        callback(&mut scope);
    }

    fn diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diag.push(diagnostic);
    }
}

impl HostState {
    /// Install a callback into the symbol table, reporting exhaustion
    /// through the diagnostic log (bind-time lookups cannot raise across
    /// the engine).
    fn install(&mut self, callback: Rc<ForeignMethod>, module: &str, what: &str) -> Symbol {
        match self.symbols.add(callback) {
            Ok(symbol) => symbol,
            Err(err) => {
                self.diag.push(Diagnostic {
                    kind: DiagnosticKind::Runtime,
                    module: module.to_string(),
                    line: 0,
                    message: format!("binding '{}' failed: {}", what, err),
                });
                Symbol::NONE
            }
        }
    }
}

// ============================================================================
// ScriptContext
// ============================================================================

/// Dynamically compiled callable: the function value plus a call target
/// of matching arity.
#[derive(Clone, Debug)]
pub struct CompiledFunction {
    /// Handle on the function value (the call receiver).
    pub function: Handle,
    /// `call(_..)` target with the function's arity.
    pub target: CallHandle,
}

/// One embedded engine instance and its host-side interop state.
pub struct ScriptContext<E: EngineAbi> {
    engine: E,
    host: HostState,
    raise_on_failure: bool,
    /// Monotonic counter naming dynamically compiled callables, so nested
    /// construction never clobbers an in-flight temporary binding.
    fn_counter: u64,
}

impl<E: EngineAbi> ScriptContext<E> {
    /// Create a context with default configuration.
    pub fn new(engine: E) -> InteropResult<Self> {
        Self::with_config(engine, ContextConfig::default())
    }

    /// Create a context, pre-warming the handle pool per `config`.
    pub fn with_config(mut engine: E, config: ContextConfig) -> InteropResult<Self> {
        if !engine.start() {
            return Err(InteropError::InitializationFailure(
                "engine context refused to start".to_string(),
            ));
        }
        Ok(ScriptContext {
            engine,
            host: HostState {
                pool: Arc::new(HandlePool::new(
                    config.initial_pool_capacity,
                    config.max_pool_capacity,
                )),
                shared: SharedStore::default(),
                symbols: SymbolTable::new(),
                diag: DiagnosticLog::new(config.diagnostic_capacity),
                bindings: Bindings::default(),
            },
            raise_on_failure: config.raise_on_failure,
            fn_counter: 0,
        })
    }

    // ========================================================================
    // Interpret / Call
    // ========================================================================

    /// Compile and run `source` in a module context.
    ///
    /// Clears the diagnostic log and forwards any deferred handle
    /// releases to the engine first. The result code is always returned;
    /// with `raise_on_failure` set, failures are additionally raised as
    /// `InterpretFailure` carrying the accumulated diagnostics.
    pub fn interpret(&mut self, module: &str, source: &str) -> InteropResult<InterpretOutcome> {
        self.interpret_bytes(module, source.as_bytes())
    }

    /// Byte-source variant of [`interpret`](Self::interpret).
    pub fn interpret_bytes(
        &mut self,
        module: &str,
        source: &[u8],
    ) -> InteropResult<InterpretOutcome> {
        self.begin_boundary();
        let outcome = self.engine.interpret(module, source, &mut self.host);
        self.finish(outcome)
    }

    /// Invoke a foreign callable: `receiver` into slot 0, `args` into
    /// slots 1..=arity, then the engine's call primitive. On success the
    /// return value is in slot 0 ([`get_return`](Self::get_return)).
    ///
    /// Both handles are validated before anything crosses the ABI; an
    /// invalid handle is a hard `InvalidHandle` error.
    pub fn call(
        &mut self,
        receiver: &Handle,
        target: &CallHandle,
        args: &[SlotArg<'_>],
    ) -> InteropResult<InterpretOutcome> {
        self.begin_boundary();
        let outcome = call::invoke(&mut self.engine, &mut self.host, receiver, target, args)?;
        self.finish(outcome)
    }

    // ========================================================================
    // Handle lifecycle
    // ========================================================================

    /// Compile `signature` into a reusable call handle. The arity (capped
    /// at 16) is parsed from the signature and fixed for the handle's
    /// lifetime.
    pub fn make_call_handle(&mut self, signature: &str) -> InteropResult<CallHandle> {
        let signature = Signature::parse(signature)?;
        self.make_call_handle_from(&signature)
    }

    fn make_call_handle_from(&mut self, signature: &Signature) -> InteropResult<CallHandle> {
        let ptr = self.engine.make_call_target(signature.text());
        if ptr.is_null() {
            return Err(InteropError::InvalidHandle(format!(
                "engine produced no call target for '{}'",
                signature.text()
            )));
        }
        Ok(CallHandle::new(
            self.host.pool.acquire(ptr),
            signature.arity(),
        ))
    }

    /// Acquire a pooled handle on the value in `slot`.
    pub fn make_handle_from_slot(&mut self, slot: usize) -> InteropResult<Handle> {
        self.scope().make_handle_from_slot(slot)
    }

    /// Look up a top-level variable and return a handle on its value.
    pub fn get_variable(&mut self, module: &str, name: &str) -> InteropResult<Handle> {
        self.engine.ensure_slots(1);
        if !self.engine.get_variable(module, name, 0) {
            return Err(InteropError::InvalidHandle(format!(
                "variable '{}' not found in module '{}'",
                name, module
            )));
        }
        self.make_handle_from_slot(0)
    }

    /// Release `handle` and forward the engine-side release immediately
    /// (we are on the context thread). No-op returning `false` if the
    /// handle is already invalid.
    pub fn release(&mut self, handle: &Handle) -> bool {
        let released = self.host.pool.release(handle);
        self.drain_pending();
        released
    }

    /// The handle pool, shareable with cleanup threads that release
    /// handles without touching the engine.
    pub fn handle_pool(&self) -> Arc<HandlePool> {
        Arc::clone(&self.host.pool)
    }

    // ========================================================================
    // Slot primitives
    // ========================================================================

    /// Grow the slot register file to at least `count` slots.
    pub fn ensure_slots(&mut self, count: usize) {
        self.engine.ensure_slots(count);
    }

    /// Number of slots currently usable.
    pub fn slot_count(&self) -> usize {
        self.engine.slot_count()
    }

    /// Runtime type of the value in `slot`.
    pub fn slot_type(&self, slot: usize) -> SlotType {
        self.engine.slot_type(slot)
    }

    /// Read a typed value from `slot`.
    pub fn get_slot<T: FromSlot>(&mut self, slot: usize) -> InteropResult<T> {
        self.scope().get_slot(slot)
    }

    /// Write a typed value into `slot`, growing the register file if
    /// needed.
    pub fn set_slot<T: IntoSlot>(&mut self, slot: usize, value: T) -> InteropResult<()> {
        self.scope().set_slot(slot, value)
    }

    /// Read the last call's return value (slot 0).
    pub fn get_return<T: FromSlot>(&mut self) -> InteropResult<T> {
        self.get_slot(0)
    }

    // ========================================================================
    // Shared values
    // ========================================================================

    /// Store a host value, returning the integer handle an engine-side
    /// instance can carry instead of an unmanaged host reference.
    pub fn add_shared<T: Any>(&mut self, value: T) -> ResourceHandle {
        self.host.shared.add(value)
    }

    /// Resolve a shared-value handle back to its typed host value.
    /// Raises `InvalidHandle` on an unresolvable handle and
    /// `TypeMismatch` on a wrong type ask.
    pub fn get_shared<T: Any>(&self, handle: ResourceHandle) -> InteropResult<Rc<T>> {
        self.host.shared.get(handle)
    }

    /// Non-raising variant of [`get_shared`](Self::get_shared).
    pub fn try_get_shared<T: Any>(&self, handle: ResourceHandle) -> Option<Rc<T>> {
        self.host.shared.try_get(handle)
    }

    /// Drop a shared value. No-op returning `false` on an unresolvable
    /// handle.
    pub fn remove_shared(&mut self, handle: ResourceHandle) -> bool {
        self.host.shared.remove(handle)
    }

    // ========================================================================
    // Foreign bindings
    // ========================================================================

    /// Register the host callback for a foreign method declaration.
    /// Consulted by the engine's bind-time lookup during interpret; the
    /// dispatch symbol is installed then and torn down with the context.
    pub fn bind_method(
        &mut self,
        module: &str,
        class_name: &str,
        is_static: bool,
        signature: &str,
        callback: impl Fn(&mut CallScope<'_>) + 'static,
    ) {
        self.host.bindings.methods.insert(
            MethodKey {
                module: module.to_string(),
                class_name: class_name.to_string(),
                is_static,
                signature: signature.to_string(),
            },
            Rc::new(callback),
        );
    }

    /// Register the allocator for a foreign class (no finalizer — the
    /// engine receives symbol 0 and skips finalization).
    pub fn bind_class(
        &mut self,
        module: &str,
        class_name: &str,
        allocate: impl Fn(&mut CallScope<'_>) + 'static,
    ) {
        self.insert_class_binding(module, class_name, Rc::new(allocate), None);
    }

    /// Register both allocator and finalizer for a foreign class.
    pub fn bind_class_with_finalizer(
        &mut self,
        module: &str,
        class_name: &str,
        allocate: impl Fn(&mut CallScope<'_>) + 'static,
        finalize: impl Fn(&mut CallScope<'_>) + 'static,
    ) {
        self.insert_class_binding(module, class_name, Rc::new(allocate), Some(Rc::new(finalize)));
    }

    fn insert_class_binding(
        &mut self,
        module: &str,
        class_name: &str,
        allocate: Rc<ForeignMethod>,
        finalize: Option<Rc<ForeignMethod>>,
    ) {
        self.host.bindings.classes.insert(
            ClassKey {
                module: module.to_string(),
                class_name: class_name.to_string(),
            },
            ClassBinding { allocate, finalize },
        );
    }

    // ========================================================================
    // Dynamic callables
    // ========================================================================

    /// Compile `body` into a callable taking `params` (comma-separated
    /// names, empty for none) and return it with a matching call target.
    ///
    /// The temporary top-level binding uses a monotonically fresh name,
    /// so a construction triggered while another is in flight cannot
    /// silently overwrite the outer one's binding.
    pub fn compile_function(
        &mut self,
        params: &str,
        body: &str,
    ) -> InteropResult<CompiledFunction> {
        let arity = params.split(',').filter(|p| !p.trim().is_empty()).count();
        let signature = Signature::for_call(arity)?;

        let name = format!("skiff_fn_{}", self.fn_counter);
        self.fn_counter += 1;

        let source = if arity == 0 {
            format!("var {} = Fn.new {{ {} }}", name, body)
        } else {
            format!("var {} = Fn.new {{|{}| {} }}", name, params.trim(), body)
        };

        let outcome = self.interpret(DYNAMIC_MODULE, &source)?;
        if !outcome.is_success() {
            return Err(self.failure(outcome));
        }

        let function = self.get_variable(DYNAMIC_MODULE, &name)?;
        let target = self.make_call_handle_from(&signature)?;
        Ok(CompiledFunction { function, target })
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// The diagnostics accumulated since the last interpret/call began,
    /// oldest first.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.host.diag.snapshot()
    }

    // ========================================================================
    // Engine access
    // ========================================================================

    /// The wrapped engine. Escape hatch for engine-specific surface the
    /// context does not mirror; the threading contract still applies.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable access to the wrapped engine.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn scope(&mut self) -> CallScope<'_> {
        CallScope {
            engine: &mut self.engine,
            host: &mut self.host,
        }
    }

    /// Per-boundary housekeeping: clear the diagnostic log and forward
    /// deferred handle releases to the engine on this (the owning)
    /// thread.
    fn begin_boundary(&mut self) {
        self.host.diag.clear();
        self.drain_pending();
    }

    fn drain_pending(&mut self) {
        for ptr in self.host.pool.drain_pending() {
            self.engine.release_value(ptr);
        }
    }

    fn finish(&self, outcome: InterpretOutcome) -> InteropResult<InterpretOutcome> {
        if self.raise_on_failure && !outcome.is_success() {
            Err(self.failure(outcome))
        } else {
            Ok(outcome)
        }
    }

    fn failure(&self, outcome: InterpretOutcome) -> InteropError {
        let kind = match outcome {
            InterpretOutcome::CompileError => FailureKind::Compile,
            _ => FailureKind::Runtime,
        };
        InteropError::InterpretFailure {
            kind,
            summary: self.host.diag.summary(),
            diagnostics: self.host.diag.snapshot(),
        }
    }
}

impl<E: EngineAbi> Drop for ScriptContext<E> {
    fn drop(&mut self) {
        // Teardown order: invalidate every outstanding handle, forward
        // the engine-side releases, then drop the host tables so no
        // symbol or shared entry can outlive the context.
        self.host.pool.release_all();
        self.drain_pending();
        self.host.symbols.clear();
        self.host.shared.clear();
    }
}
