//! WTF::Lock: owner word with separate "locked" and "has
//! parked waiter" bits, the direct ancestor the two `parking*`
//! algorithms generalise.
//!
//! Grounded on `wtflock/mutex.c`, itself a port of WebKit's `WTF::Lock`
//! (see the module doc on [`crate::algorithms::parking`] for the
//! design note both share). Unlike `parking`, the releaser — not the
//! woken waiter — unlinks the waiter's descriptor from the parking lot
//! slot, and barging (a thread grabbing the lock while others are
//! parked) is unconditionally allowed rather than gated by a spin
//! budget.
//!
//! The original keeps every mutex's waiters on one global list, since
//! `struct mutex` there carries no address a slot could hash on; this
//! crate already has an address-hashed parking lot shared by the other
//! two algorithms (see [`crate::park`]), so this implementation reuses
//! that instead of adding a second, single-slot waitlist — the per-mtx
//! "is anyone still parked for me" check is done by filtering the
//! slot's list by mutex address rather than by checking the whole slot
//! empty, which is the correct generalisation once a slot can be
//! shared by more than one lock.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::process;

use crate::atomic::{acquire_after_atomic, busy_cycle, release_before_atomic};
use crate::ident;
use crate::lock::RawLock;
use crate::park::{self, Waiter};

const ISLOCKED: usize = 1;
const HASPARKED: usize = 2;
const SPIN_LIMIT: u32 = 40;

fn cas(word: &AtomicUsize, old: usize, new: usize) -> usize {
    word.compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire)
        .unwrap_or_else(|found| found)
}

/// An identity with the [`ISLOCKED`] bit folded in, matching
/// `mtx_self()` in the C source.
fn self_word() -> usize {
    ident::current() | ISLOCKED
}

/// `struct mutex { mtx_owner }` from `wtflock/mutex.c`.
pub struct RawWtfLock {
    owner: AtomicUsize,
}

unsafe impl RawLock for RawWtfLock {
    const INIT: Self = RawWtfLock {
        owner: AtomicUsize::new(0),
    };

    #[inline]
    fn try_enter(&self) -> bool {
        let me = self_word();
        if cas(&self.owner, 0, me) == 0 {
            acquire_after_atomic();
            true
        } else {
            false
        }
    }

    fn enter(&self) {
        let me = self_word();

        if cas(&self.owner, 0, me) == 0 {
            acquire_after_atomic();
            return;
        }

        for _ in 0..SPIN_LIMIT {
            let owner = self.owner.load(Ordering::Relaxed);
            if owner & HASPARKED != 0 {
                break;
            }
            if cas(&self.owner, 0, me) == 0 {
                acquire_after_atomic();
                return;
            }
            busy_cycle();
        }

        let mtx_addr = self as *const Self as *const ();
        let w = Waiter::new(mtx_addr);

        loop {
            let owner = self.owner.load(Ordering::Relaxed);

            // Barging is always allowed: any thread is happy to take
            // the lock even while others are parked.
            if owner & ISLOCKED == 0 && cas(&self.owner, owner, owner | me) == owner {
                break;
            }

            // Make sure HASPARKED is set before we park; a spurious
            // failure here is fine, the next loop around will retry.
            let _ = cas(&self.owner, owner, owner | HASPARKED);

            w.mtx.store(mtx_addr as *mut (), Ordering::Relaxed);
            let parked = {
                let g = park::enter_for(mtx_addr);
                let owner = self.owner.load(Ordering::Relaxed);
                let cond = owner & (ISLOCKED | HASPARKED) == (ISLOCKED | HASPARKED);
                if cond {
                    g.push_back(&w);
                }
                cond
            };

            if parked {
                while !w.mtx.load(Ordering::Acquire).is_null() {
                    busy_cycle();
                }
            }
        }

        acquire_after_atomic();
    }

    unsafe fn leave(&self) {
        release_before_atomic();
        let me = self_word();

        let owner = cas(&self.owner, me, 0);
        if owner != me {
            if owner != (me | HASPARKED) {
                process::abort();
            }

            let mtx_addr = self as *const Self as *const ();
            let g = park::enter_for(mtx_addr);
            let _ = g.pop_first_matching(mtx_addr);
            let still_parked = g.first_matching(mtx_addr).is_some();
            self.owner
                .store(if still_parked { HASPARKED } else { 0 }, Ordering::Relaxed);
        }
    }
}
