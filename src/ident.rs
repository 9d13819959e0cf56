//! Thread-identity tagging used by the parking-style algorithms.
//!
//! The owner word these algorithms use packs an identity into the high
//! bits and one or two flag bits into the low end, which needs a
//! non-zero, word-aligned-enough per-thread value with its low bits
//! free. The original C source gets this for free from `pthread_self()`
//! on platforms where thread handles are pointers; Rust's
//! `std::thread::ThreadId` has no stable numeric or address
//! representation, so each thread mints its own tag from a process-wide
//! counter the first time it asks, and keeps it for the life of the
//! thread.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static IDENT: Cell<usize> = const { Cell::new(0) };
}

/// Number of low bits callers may use as tag/flag bits in an owner word
/// alongside the identity returned by [`current`].
pub(crate) const TAG_BITS: u32 = 2;

/// Returns a non-zero `usize` unique to the calling thread for the life
/// of the process, with its low [`TAG_BITS`] bits clear.
#[inline]
pub(crate) fn current() -> usize {
    IDENT.with(|cell| {
        let mut id = cell.get();
        if id == 0 {
            id = NEXT.fetch_add(1, Ordering::Relaxed) << TAG_BITS;
            cell.set(id);
        }
        id
    })
}
