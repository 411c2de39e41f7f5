//! Pooled, versioned handles over foreign-engine values.
//!
//! A [`Handle`] keeps an engine value addressable from host code without
//! holding a foreign GC root forever. Handles snapshot a pooled wrapper
//! cell's pointer and version at acquisition; the cell is recycled across
//! many acquisitions, and the version bump on each acquisition makes any
//! snapshot from an earlier epoch detectably stale.
//!
//! Pool bookkeeping (free queue, active set) is lock-guarded so handles
//! may be released from a thread other than the one driving the engine —
//! e.g. a finalizer/cleanup thread. The engine-side release is deferred:
//! release queues the foreign pointer on a pending list that the owning
//! context drains on its own thread before the next interpret/call.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use skiff_sdk::ForeignPtr;

// ============================================================================
// HandleCell
// ============================================================================

/// Pooled wrapper cell tracking one engine pointer and its version.
///
/// Cells persist for the life of the owning pool and are recycled across
/// transient handle acquisitions. Identity-based: two handles comparing
/// the same cell see the same live state.
#[derive(Debug)]
struct HandleCell {
    id: u32,
    /// Current engine pointer; `0` after release.
    ptr: AtomicU64,
    /// Bumped on every acquisition, never on release.
    version: AtomicU32,
}

// ============================================================================
// Handle
// ============================================================================

/// Freely clonable reference to a pooled engine value.
///
/// Snapshots the cell's pointer and version at acquisition time. The
/// handle is valid while the cell still holds exactly that pointer and
/// version; release zeroes the pointer (detected by the null check) and
/// a later acquisition of the recycled cell bumps the version (detected
/// by the version check), so two handles from different epochs never both
/// validate even when they share a cell.
#[derive(Clone, Debug)]
pub struct Handle {
    cell: Arc<HandleCell>,
    ptr: u64,
    version: u32,
}

impl Handle {
    /// Whether this handle still addresses the value it was acquired for.
    ///
    /// Hot path: two atomic loads and compares, no allocation, no lock.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.ptr != 0
            && self.cell.ptr.load(Ordering::Acquire) == self.ptr
            && self.cell.version.load(Ordering::Acquire) == self.version
    }

    /// The snapshotted engine pointer. Only meaningful while
    /// [`is_valid`](Self::is_valid) holds.
    pub fn ptr(&self) -> ForeignPtr {
        ForeignPtr::from_raw(self.ptr)
    }
}

// ============================================================================
// CallHandle
// ============================================================================

/// A [`Handle`] on an engine call target, carrying the arity fixed at
/// creation — the number of slot registers the callable consumes.
#[derive(Clone, Debug)]
pub struct CallHandle {
    handle: Handle,
    arity: u8,
}

impl CallHandle {
    pub(crate) fn new(handle: Handle, arity: usize) -> Self {
        debug_assert!(arity <= skiff_sdk::MAX_ARITY);
        CallHandle {
            handle,
            arity: arity as u8,
        }
    }

    /// The underlying versioned handle.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Number of argument slots the callable consumes.
    pub fn arity(&self) -> usize {
        self.arity as usize
    }

    /// Whether the underlying handle is still valid.
    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }
}

// ============================================================================
// HandlePool
// ============================================================================

struct PoolInner {
    free: Vec<Arc<HandleCell>>,
    active: FxHashMap<u32, Arc<HandleCell>>,
    /// Engine pointers whose release must still be forwarded to the
    /// engine, drained on the context thread.
    pending_release: Vec<ForeignPtr>,
    next_id: u32,
}

impl PoolInner {
    fn new_cell(&mut self) -> Arc<HandleCell> {
        let id = self.next_id;
        self.next_id += 1;
        Arc::new(HandleCell {
            id,
            ptr: AtomicU64::new(0),
            version: AtomicU32::new(0),
        })
    }
}

/// Recycling pool of [`HandleCell`]s issuing versioned [`Handle`]s.
///
/// `acquire`/`release` are safe to call concurrently from any thread;
/// only the deferred engine-side release ties back to the context thread.
pub struct HandlePool {
    inner: Mutex<PoolInner>,
    /// Cells beyond this count are not retained in the free queue — they
    /// are dropped on release, trading a later allocation for a bounded
    /// steady-state footprint. `None` means unbounded.
    max_pooled: Option<usize>,
}

impl HandlePool {
    /// Create a pool, pre-warming `initial_capacity` cells.
    pub fn new(initial_capacity: usize, max_pooled: Option<usize>) -> Self {
        let mut inner = PoolInner {
            free: Vec::with_capacity(initial_capacity),
            active: FxHashMap::default(),
            pending_release: Vec::new(),
            next_id: 0,
        };
        for _ in 0..initial_capacity {
            let cell = inner.new_cell();
            inner.free.push(cell);
        }
        HandlePool {
            inner: Mutex::new(inner),
            max_pooled,
        }
    }

    /// Issue a handle for `ptr`, recycling a pooled cell when one is free.
    ///
    /// The cell's version is bumped before the new pointer is stored, so
    /// handles from its previous epoch stop validating immediately.
    pub fn acquire(&self, ptr: ForeignPtr) -> Handle {
        debug_assert!(!ptr.is_null(), "acquiring a handle on the null value");
        let mut inner = self.inner.lock();
        let cell = inner.free.pop().unwrap_or_else(|| inner.new_cell());
        let version = cell.version.fetch_add(1, Ordering::AcqRel) + 1;
        cell.ptr.store(ptr.raw(), Ordering::Release);
        inner.active.insert(cell.id, Arc::clone(&cell));
        Handle {
            cell,
            ptr: ptr.raw(),
            version,
        }
    }

    /// Release `handle`, returning its cell to the free queue and queueing
    /// the engine-side release for the context thread.
    ///
    /// No-op returning `false` when the handle is already invalid —
    /// double-release observes the zeroed pointer and takes this branch.
    pub fn release(&self, handle: &Handle) -> bool {
        if !handle.is_valid() {
            return false;
        }
        let mut inner = self.inner.lock();
        // Re-check under the lock: another thread may have released the
        // same cell between the validity check and here.
        if handle.cell.version.load(Ordering::Acquire) != handle.version
            || handle.cell.ptr.load(Ordering::Acquire) != handle.ptr
        {
            return false;
        }
        handle.cell.ptr.store(0, Ordering::Release);
        inner.active.remove(&handle.cell.id);
        inner.pending_release.push(ForeignPtr::from_raw(handle.ptr));
        self.retain(&mut inner, Arc::clone(&handle.cell));
        true
    }

    /// Release every active cell. Bulk variant used at context teardown.
    pub fn release_all(&self) {
        let mut inner = self.inner.lock();
        let active: Vec<_> = inner.active.drain().map(|(_, cell)| cell).collect();
        for cell in active {
            let ptr = cell.ptr.swap(0, Ordering::AcqRel);
            if ptr != 0 {
                inner.pending_release.push(ForeignPtr::from_raw(ptr));
            }
            self.retain(&mut inner, cell);
        }
    }

    /// Take the queued engine-side releases. Called by the owning context
    /// on its own thread before crossing into the engine.
    pub fn drain_pending(&self) -> Vec<ForeignPtr> {
        std::mem::take(&mut self.inner.lock().pending_release)
    }

    /// Number of handles currently outstanding.
    pub fn active_count(&self) -> usize {
        self.inner.lock().active.len()
    }

    /// Number of cells waiting in the free queue.
    pub fn pooled_count(&self) -> usize {
        self.inner.lock().free.len()
    }

    fn retain(&self, inner: &mut PoolInner, cell: Arc<HandleCell>) {
        match self.max_pooled {
            Some(cap) if inner.free.len() >= cap => {} // dropped, not pooled
            _ => inner.free.push(cell),
        }
    }
}
