//! The parking lot: a fixed-size array of waitlists shared by every
//! parking-style algorithm (`parking`, `parkingfair`, `wtflock`).
//!
//! Grounded on `parking/mutex.c`'s `mtx_park`/`mtx_parking` array and the
//! `struct waiter`/`TAILQ` it threads through a per-slot spinlock. A
//! mutex address hashes to one of a fixed number of slots; each slot
//! owns a doubly-linked FIFO of waiter descriptors, guarded by its own
//! spin-lock so that two unrelated mutexes that happen to hash together
//! don't serialize each other's critical sections, only their queue
//! manipulation.
//!
//! Slot critical sections only ever splice pointers in a short list —
//! they must never call [`crate::lock::RawLock::enter`] on any mutex.

use std::cell::Cell;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU32, AtomicU64, Ordering};
use std::sync::OnceLock;

use crate::atomic::busy_cycle;

/// `MTX_PARKING_BITS` in the C source: `log2(num slots)`.
const PARK_BITS: u32 = 7;
/// `MTX_PARKING_LOTS`: number of slots, a compile-time power of two.
pub(crate) const PARK_LOTS: usize = 1 << PARK_BITS;
const PARK_MASK: usize = PARK_LOTS - 1;
/// `log2(cacheline)`, used as the first shift in the address hash.
const CACHELINE_BITS: u32 = 6;

/// A waiter descriptor, stack-allocated by the acquiring thread for the
/// duration it is parked. Matches `struct waiter` in `parking/mutex.c`
/// (and its `spins`/`self` extension in `parkingfair/mutex.c`).
pub(crate) struct Waiter {
    /// The mutex this waiter is waiting for. Nulled by the releaser (or
    /// by the waiter itself, in the `wtflock` variant) to signal
    /// hand-off; re-armed by the waiter when it loses a barging race.
    pub(crate) mtx: AtomicPtr<()>,
    /// The waiting thread's tagged identity (only used by `parkingfair`
    /// for direct ownership transfer; zero elsewhere).
    pub(crate) ident: usize,
    /// Count of wake cycles this waiter has lost to a barging acquirer
    /// (only used by `parkingfair`). An atomic cell: written by the
    /// waiter without the slot lock, read by the releaser while
    /// holding it.
    pub(crate) spins: AtomicU32,
    next: Cell<Option<NonNull<Waiter>>>,
    prev: Cell<Option<NonNull<Waiter>>>,
}

// SAFETY: all mutation of `next`/`prev` happens while the owning slot's
// spinlock is held; `mtx` and `spins` are atomics; `ident` is set once
// before the waiter is published and never mutated afterwards.
unsafe impl Sync for Waiter {}

impl Waiter {
    pub(crate) fn new(mtx: *const ()) -> Waiter {
        Waiter {
            mtx: AtomicPtr::new(mtx as *mut ()),
            ident: 0,
            spins: AtomicU32::new(0),
            next: Cell::new(None),
            prev: Cell::new(None),
        }
    }

    pub(crate) fn with_ident(mtx: *const (), ident: usize) -> Waiter {
        Waiter {
            ident,
            ..Waiter::new(mtx)
        }
    }
}

struct Slot {
    lock: AtomicBool,
    head: Cell<Option<NonNull<Waiter>>>,
    tail: Cell<Option<NonNull<Waiter>>>,
}

// SAFETY: `head`/`tail` are only touched while `lock` is held.
unsafe impl Sync for Slot {}

impl Slot {
    fn new() -> Slot {
        Slot {
            lock: AtomicBool::new(false),
            head: Cell::new(None),
            tail: Cell::new(None),
        }
    }

    fn enter(&self) -> SlotGuard<'_> {
        while self
            .lock
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            busy_cycle();
        }
        SlotGuard { slot: self }
    }
}

/// RAII handle on a locked park slot. Every mutation of the slot's FIFO
/// happens through this guard, so there's no way to touch the list
/// without holding the spinlock.
pub(crate) struct SlotGuard<'a> {
    slot: &'a Slot,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.slot.lock.store(false, Ordering::Release);
    }
}

impl SlotGuard<'_> {
    /// Push `w` onto the tail of this slot's FIFO.
    pub(crate) fn push_back(&self, w: &Waiter) {
        let node = NonNull::from(w);
        w.prev.set(self.slot.tail.get());
        w.next.set(None);
        match self.slot.tail.get() {
            Some(tail) => unsafe { tail.as_ref() }.next.set(Some(node)),
            None => self.slot.head.set(Some(node)),
        }
        self.slot.tail.set(Some(node));
        PARK_COUNT.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove `w` from this slot's FIFO. `w` must currently be linked
    /// into this slot.
    pub(crate) fn remove(&self, w: &Waiter) {
        let node = NonNull::from(w);
        match w.prev.get() {
            Some(prev) => unsafe { prev.as_ref() }.next.set(w.next.get()),
            None => self.slot.head.set(w.next.get()),
        }
        match w.next.get() {
            Some(next) => unsafe { next.as_ref() }.prev.set(w.prev.get()),
            None => self.slot.tail.set(w.prev.get()),
        }
        w.next.set(None);
        w.prev.set(None);
        let _ = node;
    }

    /// Wakes (nulls the `mtx` field of) the first waiter in this slot
    /// whose `mtx` matches `mtx`, without unlinking it. Used by
    /// `parking`/`parkingfair`'s release path, where the woken thread
    /// is responsible for removing its own descriptor.
    pub(crate) fn wake_first_matching(&self, mtx: *const ()) -> bool {
        let mut cur = self.slot.head.get();
        while let Some(node) = cur {
            let w = unsafe { node.as_ref() };
            if w.mtx.load(Ordering::Relaxed) == mtx as *mut () {
                w.mtx.store(std::ptr::null_mut(), Ordering::Release);
                UNPARK_COUNT.fetch_add(1, Ordering::Relaxed);
                return true;
            }
            cur = w.next.get();
        }
        false
    }

    /// Finds, unlinks and wakes the first waiter in this slot whose
    /// `mtx` matches `mtx`. Used by `wtflock`'s release path, where the
    /// releaser (not the waiter) unlinks the node.
    pub(crate) fn pop_first_matching(&self, mtx: *const ()) -> bool {
        let mut cur = self.slot.head.get();
        while let Some(node) = cur {
            let w = unsafe { node.as_ref() };
            if w.mtx.load(Ordering::Relaxed) == mtx as *mut () {
                self.remove(w);
                w.mtx.store(std::ptr::null_mut(), Ordering::Release);
                UNPARK_COUNT.fetch_add(1, Ordering::Relaxed);
                return true;
            }
            cur = w.next.get();
        }
        false
    }

    /// Returns the first waiter in this slot whose `mtx` matches `mtx`,
    /// without unlinking or waking it. Used by `parkingfair`'s release
    /// path to inspect a waiter's `spins` count before deciding whether
    /// to hand off ownership directly or just clear it.
    pub(crate) fn first_matching(&self, mtx: *const ()) -> Option<&Waiter> {
        let mut cur = self.slot.head.get();
        while let Some(node) = cur {
            let w = unsafe { node.as_ref() };
            if w.mtx.load(Ordering::Relaxed) == mtx as *mut () {
                return Some(w);
            }
            cur = w.next.get();
        }
        None
    }

    /// True if some waiter other than `except` is still queued for `mtx`
    /// in this slot. Used to decide whether a newly-claiming thread must
    /// preserve the contended bit.
    pub(crate) fn has_other_waiter_for(&self, mtx: *const (), except: &Waiter) -> bool {
        let except = NonNull::from(except);
        let mut cur = self.slot.head.get();
        while let Some(node) = cur {
            if node != except {
                let w = unsafe { node.as_ref() };
                if w.mtx.load(Ordering::Relaxed) == mtx as *mut () {
                    return true;
                }
            }
            cur = unsafe { node.as_ref() }.next.get();
        }
        false
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        let mut n = 0;
        let mut cur = self.slot.head.get();
        while let Some(node) = cur {
            n += 1;
            cur = unsafe { node.as_ref() }.next.get();
        }
        n
    }
}

static PARK_COUNT: AtomicU64 = AtomicU64::new(0);
static UNPARK_COUNT: AtomicU64 = AtomicU64::new(0);

/// Process-wide `(parks, unparks)` counts across every parking-style
/// algorithm, sampled by the benchmark binary's verbose logging.
/// Increments are `Relaxed` and cheap enough to leave on unconditionally.
pub fn counts() -> (u64, u64) {
    (
        PARK_COUNT.load(Ordering::Relaxed),
        UNPARK_COUNT.load(Ordering::Relaxed),
    )
}

/// Records a wake that happened without going through
/// [`SlotGuard::wake_first_matching`] or [`SlotGuard::pop_first_matching`]
/// (`parkingfair`'s direct hand-off nulls the waiter's `mtx` field itself).
pub(crate) fn note_unpark() {
    UNPARK_COUNT.fetch_add(1, Ordering::Relaxed);
}

static LOT: OnceLock<Vec<Slot>> = OnceLock::new();

fn lot() -> &'static [Slot] {
    LOT.get_or_init(|| (0..PARK_LOTS).map(|_| Slot::new()).collect())
}

/// Hashes a mutex address down to a park slot index: shift by
/// `log2(cacheline)`, fold with an XOR shift by `log2(num slots)`, mask.
fn index_for(mtx: *const ()) -> usize {
    let mut addr = mtx as usize;
    addr >>= CACHELINE_BITS;
    addr ^= addr >> PARK_BITS;
    addr & PARK_MASK
}

/// Locks and returns the park slot that `mtx` hashes to.
pub(crate) fn enter_for(mtx: *const ()) -> SlotGuard<'static> {
    lot()[index_for(mtx)].enter()
}
