//! CAS spinlock that degrades to plain reads while contended.
//!
//! Grounded on `spinlockrd/mutex.c`. Identical fast path to
//! [`crate::algorithms::backoff::RawBackoff`]; the difference is entirely
//! in `enter`'s retry loop, which busy-spins *reading* the owner word
//! (not re-issuing CAS) until it looks free, letting the cacheline
//! settle into the Shared state under contention before the next CAS
//! attempt. No fairness.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::atomic::{acquire_after_atomic, busy_cycle, release_before_atomic};
use crate::ident;
use crate::lock::RawLock;

const NONE: usize = 0;

/// `struct mutex { mtx_owner }` from `spinlockrd/mutex.c`.
pub struct RawSpinlockRd {
    owner: AtomicUsize,
}

unsafe impl RawLock for RawSpinlockRd {
    const INIT: Self = RawSpinlockRd {
        owner: AtomicUsize::new(NONE),
    };

    #[inline]
    fn try_enter(&self) -> bool {
        let me = ident::current();
        if self
            .owner
            .compare_exchange(NONE, me, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            acquire_after_atomic();
            true
        } else {
            false
        }
    }

    fn enter(&self) {
        while !self.try_enter() {
            while self.owner.load(Ordering::Relaxed) != NONE {
                busy_cycle();
            }
        }
    }

    unsafe fn leave(&self) {
        release_before_atomic();
        self.owner.store(NONE, Ordering::Relaxed);
    }
}
