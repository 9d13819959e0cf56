//! Fair parking mutex: the same machinery as
//! [`crate::algorithms::parking`], except a releaser that sees a waiter
//! who has lost too many races hands ownership to it directly instead
//! of just clearing the owner word.
//!
//! Grounded on `parkingfair/mutex.c`. The "too many races" threshold
//! is the `-x` benchmark knob from the original harness; here it is a
//! process-wide [`AtomicU32`] set once by the benchmark binary before
//! any thread touches a lock, read by every release. A waiter whose
//! `spins` counter exceeds the threshold is woken already owning the
//! lock — it never re-enters the CAS race at all, which is what
//! bounds the number of times any single waiter can be passed over.

use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::process;

use crate::atomic::{acquire_after_atomic, busy_cycle, release_before_atomic};
use crate::ident;
use crate::lock::RawLock;
use crate::park::{self, Waiter};

const NONE: usize = 0;
const CONTENDED: usize = 1;
const SPIN_LIMIT: u32 = 40;

/// Number of lost races a parked waiter tolerates before the releaser
/// starts handing it the lock directly (`-x` in the original harness).
/// Zero (the default) means every release is a plain clear-and-race.
static FAIRNESS_THRESHOLD: AtomicU32 = AtomicU32::new(0);

/// Sets the fairness threshold used by every [`RawParkingFair`]
/// instance from this point on. Intended to be called once, before any
/// contended use, by the benchmark harness's `-x` flag; changing it
/// mid-run is safe but affects in-flight waiters non-deterministically.
pub fn set_fairness_threshold(x: u32) {
    FAIRNESS_THRESHOLD.store(x, Ordering::Relaxed);
}

fn cas(word: &AtomicUsize, old: usize, new: usize) -> usize {
    word.compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire)
        .unwrap_or_else(|found| found)
}

/// `struct mutex { mtx_owner }` from `parkingfair/mutex.c`.
pub struct RawParkingFair {
    owner: AtomicUsize,
}

unsafe impl RawLock for RawParkingFair {
    const INIT: Self = RawParkingFair {
        owner: AtomicUsize::new(NONE),
    };

    #[inline]
    fn try_enter(&self) -> bool {
        let me = ident::current();
        if cas(&self.owner, NONE, me) == NONE {
            acquire_after_atomic();
            true
        } else {
            false
        }
    }

    fn enter(&self) {
        let me = ident::current();

        let mut owner = cas(&self.owner, NONE, me);
        if owner == NONE {
            acquire_after_atomic();
            return;
        }
        if owner == (me | CONTENDED) {
            process::abort();
        }

        for _ in 0..SPIN_LIMIT {
            if owner & CONTENDED != 0 {
                break;
            }
            busy_cycle();
            owner = self.owner.load(Ordering::Relaxed);
            if owner == NONE {
                owner = cas(&self.owner, NONE, me);
                if owner == NONE {
                    acquire_after_atomic();
                    return;
                }
            }
        }

        let mtx_addr = self as *const Self as *const ();
        let w = Waiter::with_ident(mtx_addr, me);
        {
            let g = park::enter_for(mtx_addr);
            g.push_back(&w);
        }

        loop {
            let nowner = owner | CONTENDED;
            let mut o = cas(&self.owner, owner, nowner);
            if o == owner {
                o = nowner;
            }
            if (o | CONTENDED) == (me | CONTENDED) {
                break;
            }
            if o & CONTENDED != 0 {
                while !w.mtx.load(Ordering::Acquire).is_null() {
                    busy_cycle();
                }
                w.spins.fetch_add(1, Ordering::Relaxed);
            }

            owner = cas(&self.owner, NONE, me);
            if owner == NONE {
                break;
            }
            w.mtx.store(mtx_addr as *mut (), Ordering::Relaxed);
        }

        {
            let g = park::enter_for(mtx_addr);
            g.remove(&w);
            if g.has_other_waiter_for(mtx_addr, &w) {
                self.owner.store(me | CONTENDED, Ordering::Relaxed);
            }
        }

        acquire_after_atomic();
    }

    unsafe fn leave(&self) {
        release_before_atomic();
        let me = ident::current();

        let owner = cas(&self.owner, me, NONE);
        if owner != me {
            if owner != (me | CONTENDED) {
                process::abort();
            }

            let mtx_addr = self as *const Self as *const ();
            let threshold = FAIRNESS_THRESHOLD.load(Ordering::Relaxed);
            let g = park::enter_for(mtx_addr);
            match g.first_matching(mtx_addr) {
                Some(w) => {
                    let fair = w.spins.load(Ordering::Relaxed) > threshold;
                    self.owner.store(
                        if fair { w.ident } else { NONE },
                        Ordering::Relaxed,
                    );
                    w.mtx.store(core::ptr::null_mut(), Ordering::Release);
                    park::note_unpark();
                }
                None => self.owner.store(NONE, Ordering::Relaxed),
            }
        }
    }
}
