//! Skiff embedding layer — safe indirection between host code and a
//! foreign script engine.
//!
//! The boundary is dangerous in both directions: the host allocator can
//! move or collect objects the engine must not see move, and the engine's
//! GC can free values the host still thinks are alive. Every crossing
//! therefore goes through one of the indirection primitives in this crate:
//!
//! - [`ResourceTable`] — small stable integers standing in for host object
//!   references, safe to embed inside engine-managed storage.
//! - [`HandlePool`] / [`Handle`] — pooled, versioned wrappers that keep an
//!   engine value addressable from the host and detect staleness.
//! - The call protocol ([`ScriptContext::call`], [`CallScope::call`]) —
//!   slot-register marshaling plus fiber-scoped reentrancy.
//! - [`SymbolTable`] — integer symbols standing in for host callbacks in
//!   ahead-of-time-compiled environments that forbid runtime trampolines.
//!
//! [`ScriptContext`] ties the pieces to one engine instance.

mod call;
mod config;
mod context;
mod diag;
mod dispatch;
mod pool;
mod resource;
mod shared;

pub use call::{CallScope, SlotArg};
pub use config::ContextConfig;
pub use context::{CompiledFunction, ScriptContext};
pub use diag::DiagnosticLog;
pub use dispatch::{ForeignMethod, SymbolTable};
pub use pool::{CallHandle, Handle, HandlePool};
pub use resource::{ResourceHandle, ResourceTable};

pub use skiff_sdk::{
    ClassSymbols, Diagnostic, DiagnosticKind, EngineAbi, EngineHooks, FailureKind, FiberId,
    ForeignPtr, FromSlot, InteropError, InteropResult, InterpretOutcome, IntoSlot, Null,
    Signature, SlotType, Symbol, MAX_ARITY,
};
