//! Skiff SDK - Boundary types for embedding slot-based script engines
//!
//! This crate defines the minimal types and traits shared between host
//! code and a foreign script-execution engine. The engine sits behind the
//! [`EngineAbi`] trait: a slot-based register file for passing values,
//! plus interpret/call primitives. Host-side callbacks the engine consumes
//! (method binding, symbol dispatch, diagnostics) sit behind [`EngineHooks`].
//!
//! The actual indirection machinery (handle pools, resource tables, the
//! call protocol) lives in `skiff-embed`. This crate carries no engine
//! dependency so that alternative engine backends can compile against the
//! SDK alone.

#![warn(missing_docs)]

mod convert;
mod engine;
mod error;
mod signature;
mod value;

pub use convert::{FromSlot, IntoSlot, Null};
pub use engine::{ClassSymbols, EngineAbi, EngineHooks, FiberId, Symbol};
pub use error::{
    Diagnostic, DiagnosticKind, FailureKind, InteropError, InteropResult,
};
pub use signature::{Signature, MAX_ARITY};
pub use value::{ForeignPtr, InterpretOutcome, SlotType};
