//! Free-list-backed indirection table from small integers to host values.
//!
//! The foreign engine cannot safely hold a host reference inside its own
//! storage, but it can hold an integer. `ResourceTable` issues densely
//! packed 1-based handles for host values; an instance on the engine side
//! carries the integer and resolves it back through the table on each use.
//!
//! Handles carry no generation tag: a handle freed and reissued resolves
//! to the new occupant. The table models a pure array-like indirection,
//! not a capability — callers that need ABA protection hold a versioned
//! [`Handle`](crate::Handle) instead.

use skiff_sdk::{InteropError, InteropResult};

/// Initial backing-store capacity. Growth doubles and never shrinks.
const INITIAL_CAPACITY: usize = 8;

// ============================================================================
// ResourceHandle
// ============================================================================

/// 1-based index into a [`ResourceTable`]. `0` is the reserved invalid value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceHandle(u32);

impl ResourceHandle {
    /// The reserved invalid handle.
    pub const INVALID: ResourceHandle = ResourceHandle(0);

    /// Wrap a raw handle value.
    pub fn from_raw(raw: u32) -> Self {
        ResourceHandle(raw)
    }

    /// The raw handle value.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Whether this is the reserved invalid handle.
    pub fn is_invalid(self) -> bool {
        self.0 == 0
    }
}

// ============================================================================
// ResourceTable
// ============================================================================

enum Slot<T> {
    Live(T),
    /// Tombstone linking into the free chain. `next` is the free handle
    /// below this one, or `INVALID` at the end of the chain.
    Free { next: ResourceHandle },
}

/// Free-list-backed table mapping 1-based integer handles to values.
///
/// A handle resolves iff `0 < handle <= tail` and its slot is live, where
/// `tail` is one past the highest handle ever issued while the slot below
/// it is live. Removing the highest live handle shrinks `tail`
/// immediately, bounding future by-value scans.
pub struct ResourceTable<T> {
    slots: Vec<Slot<T>>,
    free_head: ResourceHandle,
}

impl<T> Default for ResourceTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResourceTable<T> {
    /// Create an empty table with the default initial capacity.
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(INITIAL_CAPACITY),
            free_head: ResourceHandle::INVALID,
        }
    }

    /// One past the highest live handle. Bounds every by-value scan.
    pub fn tail(&self) -> u32 {
        self.slots.len() as u32
    }

    /// The handle the next [`add`](Self::add) will return.
    pub fn next_handle(&self) -> ResourceHandle {
        if self.free_head.is_invalid() {
            ResourceHandle(self.tail() + 1)
        } else {
            self.free_head
        }
    }

    /// Insert a value, reusing a tombstoned slot when one is free.
    /// Amortized O(1).
    pub fn add(&mut self, value: T) -> ResourceHandle {
        if self.free_head.is_invalid() {
            self.slots.push(Slot::Live(value));
            ResourceHandle(self.slots.len() as u32)
        } else {
            let handle = self.free_head;
            let slot = &mut self.slots[(handle.0 - 1) as usize];
            let Slot::Free { next } = *slot else {
                unreachable!("free head points at a live slot");
            };
            self.free_head = next;
            *slot = Slot::Live(value);
            handle
        }
    }

    /// Remove the value behind `handle`. O(1).
    ///
    /// Returns `false` (no-op) if the handle is out of range or already
    /// tombstoned. Removing the highest live handle shrinks the tail
    /// instead of leaving a sparse tombstone.
    pub fn remove(&mut self, handle: ResourceHandle) -> bool {
        if !self.is_live(handle) {
            return false;
        }
        if handle.0 == self.tail() {
            self.slots.pop();
        } else {
            self.slots[(handle.0 - 1) as usize] = Slot::Free {
                next: self.free_head,
            };
            self.free_head = handle;
        }
        true
    }

    /// Remove the first slot holding `value`. O(n) scan bounded by the
    /// tail — a rare/debug-path operation, not the primary removal
    /// mechanism.
    pub fn remove_value(&mut self, value: &T) -> bool
    where
        T: PartialEq,
    {
        match self.handle_of(value) {
            Some(handle) => self.remove(handle),
            None => false,
        }
    }

    /// Resolve `handle`, raising `InvalidHandle` on failure.
    ///
    /// The strict form signals a programming error at the call site; use
    /// [`try_get`](Self::try_get) for expected runtime conditions.
    pub fn get(&self, handle: ResourceHandle) -> InteropResult<&T> {
        self.try_get(handle)
            .ok_or_else(|| invalid(handle, self.tail()))
    }

    /// Resolve `handle`, or `None` if it does not resolve.
    pub fn try_get(&self, handle: ResourceHandle) -> Option<&T> {
        match self.slots.get(handle.0.checked_sub(1)? as usize) {
            Some(Slot::Live(value)) => Some(value),
            _ => None,
        }
    }

    /// Overwrite the live value behind `handle`, raising `InvalidHandle`
    /// if it does not resolve.
    pub fn set(&mut self, handle: ResourceHandle, value: T) -> InteropResult<()> {
        if self.try_set(handle, value) {
            Ok(())
        } else {
            Err(invalid(handle, self.tail()))
        }
    }

    /// Overwrite the live value behind `handle`; `false` if it does not
    /// resolve.
    pub fn try_set(&mut self, handle: ResourceHandle, value: T) -> bool {
        if !self.is_live(handle) {
            return false;
        }
        self.slots[(handle.0 - 1) as usize] = Slot::Live(value);
        true
    }

    /// Whether `handle` resolves. O(1).
    pub fn contains(&self, handle: ResourceHandle) -> bool {
        self.is_live(handle)
    }

    /// Whether any live slot holds `value`. O(n).
    pub fn contains_value(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.handle_of(value).is_some()
    }

    /// Reverse lookup of the handle for `value`. O(n) — callers should
    /// cache the handle returned by [`add`](Self::add) instead of calling
    /// this repeatedly.
    pub fn handle_of(&self, value: &T) -> Option<ResourceHandle>
    where
        T: PartialEq,
    {
        self.slots.iter().enumerate().find_map(|(i, slot)| match slot {
            Slot::Live(v) if v == value => Some(ResourceHandle(i as u32 + 1)),
            _ => None,
        })
    }

    /// Drop every live value (releasing host references for reclaim) and
    /// reset the free list. Keeps the backing allocation.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_head = ResourceHandle::INVALID;
    }

    /// Number of live entries. O(n).
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Live(_)))
            .count()
    }

    /// Whether the table holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_live(&self, handle: ResourceHandle) -> bool {
        match handle.0.checked_sub(1) {
            Some(index) => matches!(self.slots.get(index as usize), Some(Slot::Live(_))),
            None => false,
        }
    }
}

fn invalid(handle: ResourceHandle, tail: u32) -> InteropError {
    InteropError::InvalidHandle(format!(
        "resource handle {} does not resolve (tail={})",
        handle.raw(),
        tail
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut table = ResourceTable::new();
        let h = table.add("hello");
        assert_eq!(table.get(h).unwrap(), &"hello");
        assert!(table.contains(h));
        assert!(table.remove(h));
        assert!(!table.contains(h));
        assert!(matches!(
            table.get(h),
            Err(InteropError::InvalidHandle(_))
        ));
    }

    #[test]
    fn test_handles_are_one_based() {
        let mut table = ResourceTable::new();
        assert_eq!(table.add("a").raw(), 1);
        assert_eq!(table.add("b").raw(), 2);
        assert!(!table.contains(ResourceHandle::INVALID));
    }

    #[test]
    fn test_slot_reuse() {
        let mut table = ResourceTable::new();
        let h1 = table.add("a");
        let h2 = table.add("b");
        assert_eq!(h1.raw(), 1);
        assert_eq!(h2.raw(), 2);

        assert!(table.remove(h1));
        let h3 = table.add("c");
        assert_eq!(h3.raw(), 1, "tombstoned slot is reused");
        assert_eq!(table.get(h3).unwrap(), &"c");
        assert_eq!(table.get(h2).unwrap(), &"b");
    }

    #[test]
    fn test_tail_shrinks_on_top_removal() {
        let mut table = ResourceTable::new();
        table.add("a");
        table.add("b");
        let top = table.add("c");
        assert_eq!(table.tail(), 3);

        assert!(table.remove(top));
        assert_eq!(table.tail(), 2, "tail reclaimed immediately");

        // The next add reuses the same numeric handle instead of growing.
        let h = table.add("d");
        assert_eq!(h.raw(), 3);
        assert_eq!(table.tail(), 3);
    }

    #[test]
    fn test_free_chain_reuses_lifo() {
        let mut table = ResourceTable::new();
        let h1 = table.add(1);
        let h2 = table.add(2);
        table.add(3);
        table.remove(h1);
        table.remove(h2);
        // Most recently freed slot comes back first.
        assert_eq!(table.add(4).raw(), 2);
        assert_eq!(table.add(5).raw(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut table = ResourceTable::new();
        let h = table.add("a");
        table.add("b");
        assert!(table.remove(h));
        assert!(!table.remove(h), "double remove is a no-op");
        assert!(!table.remove(ResourceHandle::from_raw(99)));
        assert!(!table.remove(ResourceHandle::INVALID));
    }

    #[test]
    fn test_set_overwrites_live_entry() {
        let mut table = ResourceTable::new();
        let h = table.add("a");
        table.set(h, "b").unwrap();
        assert_eq!(table.get(h).unwrap(), &"b");

        table.remove(h);
        assert!(table.set(h, "c").is_err());
        assert!(!table.try_set(h, "c"));
    }

    #[test]
    fn test_by_value_operations() {
        let mut table = ResourceTable::new();
        let h1 = table.add("a");
        table.add("b");

        assert_eq!(table.handle_of(&"a"), Some(h1));
        assert!(table.contains_value(&"b"));
        assert!(!table.contains_value(&"z"));

        assert!(table.remove_value(&"a"));
        assert!(!table.remove_value(&"a"));
        assert!(!table.contains(h1));
    }

    #[test]
    fn test_clear_resets_state() {
        let mut table = ResourceTable::new();
        let h = table.add("a");
        table.add("b");
        table.clear();

        assert!(table.is_empty());
        assert_eq!(table.tail(), 0);
        assert!(!table.contains(h));
        assert_eq!(table.add("c").raw(), 1, "handles restart after clear");
    }

    #[test]
    fn test_next_handle_peek() {
        let mut table = ResourceTable::new();
        assert_eq!(table.next_handle().raw(), 1);
        let h1 = table.add("a");
        table.add("b");
        assert_eq!(table.next_handle().raw(), 3);
        table.remove(h1);
        assert_eq!(table.next_handle(), h1);
    }

    #[test]
    fn test_growth_beyond_initial_capacity() {
        let mut table = ResourceTable::new();
        for i in 0..100u32 {
            assert_eq!(table.add(i).raw(), i + 1);
        }
        assert_eq!(table.len(), 100);
        assert_eq!(table.get(ResourceHandle::from_raw(64)).unwrap(), &63);
    }
}
