//! Traits for moving Rust values through slot registers.
//!
//! `FromSlot` and `IntoSlot` are the typed accessors over the engine's
//! slot register file. Every read checks the slot's runtime type first
//! and fails with `TypeMismatch` instead of letting a bad read cross the
//! ABI.

use crate::engine::EngineAbi;
use crate::error::{InteropError, InteropResult};
use crate::value::{ForeignPtr, SlotType};

/// Read a Rust value out of a slot register.
pub trait FromSlot: Sized {
    /// Read from `slot`, returning `TypeMismatch` if the slot holds a
    /// different type.
    fn from_slot(engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<Self>;
}

/// Write a Rust value into a slot register.
pub trait IntoSlot {
    /// Write into `slot`. The slot is guaranteed to exist by the caller.
    fn into_slot(self, engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<()>;
}

fn mismatch(expected: &str, engine: &dyn EngineAbi, slot: usize) -> InteropError {
    InteropError::TypeMismatch {
        expected: expected.to_string(),
        got: engine.slot_type(slot).name().to_string(),
    }
}

// ============================================================================
// FromSlot implementations
// ============================================================================

impl FromSlot for bool {
    fn from_slot(engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<Self> {
        if engine.slot_type(slot) != SlotType::Bool {
            return Err(mismatch("bool", engine, slot));
        }
        Ok(engine.get_slot_bool(slot))
    }
}

impl FromSlot for f64 {
    fn from_slot(engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<Self> {
        if engine.slot_type(slot) != SlotType::Number {
            return Err(mismatch("number", engine, slot));
        }
        Ok(engine.get_slot_number(slot))
    }
}

impl FromSlot for String {
    fn from_slot(engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<Self> {
        if engine.slot_type(slot) != SlotType::String {
            return Err(mismatch("string", engine, slot));
        }
        Ok(String::from_utf8_lossy(engine.get_slot_bytes(slot)).into_owned())
    }
}

impl FromSlot for Vec<u8> {
    fn from_slot(engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<Self> {
        if engine.slot_type(slot) != SlotType::String {
            return Err(mismatch("string", engine, slot));
        }
        Ok(engine.get_slot_bytes(slot).to_vec())
    }
}

impl FromSlot for ForeignPtr {
    /// Roots the slot's value on the engine heap. The caller owns the
    /// resulting reference and must arrange for its release.
    fn from_slot(engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<Self> {
        Ok(engine.get_slot_value(slot))
    }
}

// ============================================================================
// IntoSlot implementations
// ============================================================================

/// Marker for writing null into a slot.
pub struct Null;

impl IntoSlot for Null {
    fn into_slot(self, engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<()> {
        engine.set_slot_null(slot);
        Ok(())
    }
}

impl IntoSlot for bool {
    fn into_slot(self, engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<()> {
        engine.set_slot_bool(slot, self);
        Ok(())
    }
}

impl IntoSlot for f64 {
    fn into_slot(self, engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<()> {
        engine.set_slot_number(slot, self);
        Ok(())
    }
}

impl IntoSlot for &str {
    fn into_slot(self, engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<()> {
        engine.set_slot_string(slot, self);
        Ok(())
    }
}

impl IntoSlot for String {
    fn into_slot(self, engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<()> {
        engine.set_slot_string(slot, &self);
        Ok(())
    }
}

impl IntoSlot for &[u8] {
    fn into_slot(self, engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<()> {
        engine.set_slot_bytes(slot, self);
        Ok(())
    }
}

impl IntoSlot for Vec<u8> {
    fn into_slot(self, engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<()> {
        engine.set_slot_bytes(slot, &self);
        Ok(())
    }
}

impl IntoSlot for ForeignPtr {
    fn into_slot(self, engine: &mut dyn EngineAbi, slot: usize) -> InteropResult<()> {
        engine.set_slot_value(slot, self);
        Ok(())
    }
}
