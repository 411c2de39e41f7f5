//! Value-model primitives shared across the interop boundary.
//!
//! The foreign engine addresses everything through two kinds of token:
//! numbered slots in its per-call register file, and opaque pointers to
//! values rooted on its own heap. Neither side ever dereferences the
//! other's memory directly.

use std::fmt;

// ============================================================================
// ForeignPtr
// ============================================================================

/// Opaque reference to a value rooted on the foreign engine's heap.
///
/// The host never dereferences this; it is a token handed back to the
/// engine through slot operations, calls, and releases. `0` is the null
/// value and means "no value".
///
/// A `ForeignPtr` on its own carries no staleness protection — wrap it in
/// a pooled `Handle` (skiff-embed) to keep it addressable safely across
/// calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ForeignPtr(u64);

impl ForeignPtr {
    /// The null pointer (no value).
    pub const NULL: ForeignPtr = ForeignPtr(0);

    /// Wrap a raw engine pointer value.
    pub fn from_raw(raw: u64) -> Self {
        ForeignPtr(raw)
    }

    /// The raw pointer value.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Whether this is the null pointer.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for ForeignPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ForeignPtr({:#x})", self.0)
    }
}

// ============================================================================
// SlotType
// ============================================================================

/// Runtime type of the value held in a slot.
///
/// Queried before a typed read so the host can fail with a local
/// `TypeMismatch` instead of handing the engine bad data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotType {
    /// The null value.
    Null,
    /// A boolean.
    Bool,
    /// A double-precision number.
    Number,
    /// A string (byte payload; not required to be UTF-8).
    String,
    /// An engine-heap value with no slot representation (object, closure...).
    Opaque,
    /// Anything the engine cannot classify.
    Unknown,
}

impl SlotType {
    /// Human-readable type name for error messages.
    pub fn name(self) -> &'static str {
        match self {
            SlotType::Null => "null",
            SlotType::Bool => "bool",
            SlotType::Number => "number",
            SlotType::String => "string",
            SlotType::Opaque => "opaque value",
            SlotType::Unknown => "unknown",
        }
    }
}

// ============================================================================
// InterpretOutcome
// ============================================================================

/// Result code reported by the engine for an interpret or call.
///
/// Always returned as a code first; opt-in raising on failure is layered
/// on top by the embedding context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpretOutcome {
    /// Execution ran to completion.
    Success,
    /// Source failed to compile.
    CompileError,
    /// Execution raised a runtime error.
    RuntimeError,
}

impl InterpretOutcome {
    /// Whether this outcome is `Success`.
    pub fn is_success(self) -> bool {
        matches!(self, InterpretOutcome::Success)
    }
}
