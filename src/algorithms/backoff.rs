//! Test-and-set spinlock with exponential backoff.
//!
//! Grounded on `backoff/mutex.c`, whose header comment says it models
//! the OpenBSD kernel mutex from `src/sys/kern/kern_lock.c` r1.76/r1.79.
//! No fairness: under contention, any spinning thread may win the next
//! CAS, so starvation is possible.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::atomic::{acquire_after_atomic, busy_cycle, release_before_atomic};
use crate::ident;
use crate::lock::RawLock;

const NONE: usize = 0;

#[cfg(feature = "std")]
fn ncpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(not(feature = "std"))]
fn ncpus() -> usize {
    1
}

/// `struct mutex { mtx_owner }` from `backoff/mutex.c`.
pub struct RawBackoff {
    owner: AtomicUsize,
}

unsafe impl RawLock for RawBackoff {
    const INIT: Self = RawBackoff {
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
        let ceiling = ncpus().max(1);
        let mut ncycle: usize = 1;
        loop {
            if self.try_enter() {
                return;
            }
            for _ in 0..ncycle {
                busy_cycle();
            }
            ncycle = (ncycle * 2).min(ceiling);
        }
    }

    unsafe fn leave(&self) {
        release_before_atomic();
        self.owner.store(NONE, Ordering::Relaxed);
    }
}
