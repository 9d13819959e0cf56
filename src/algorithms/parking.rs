//! WTF::Lock-inspired parking mutex, non-fair variant.
//!
//! Grounded on `parking/mutex.c`. The owner word packs a thread
//! identity plus a single "contended" bit (bit 0, kept clear by
//! [`crate::ident`] for exactly this purpose): `0` is unheld, `id` is
//! held uncontended, `id | 1` is held with at least one thread parked
//! in [`crate::park`] waiting for it. A spinning waiter that gives up
//! registers itself in the parking lot slot its mutex hashes to, then
//! alternates between trying to set the contended bit and sleeping on
//! its own descriptor until woken — it stays in the slot's list for
//! the whole wait, so a racing "barging" acquirer never has to pay for
//! a list removal and reinsertion.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::process;

use crate::atomic::{acquire_after_atomic, busy_cycle, consumer, full, producer, release_before_atomic};
use crate::ident;
use crate::lock::RawLock;
use crate::park::{self, Waiter};

const NONE: usize = 0;
const CONTENDED: usize = 1;
/// Iterations of the adaptive spin before a non-contended owner forces
/// this thread to fall back to parking (`for (i = 0; i < 40; i++)` in
/// the C source).
const SPIN_LIMIT: u32 = 40;

fn cas(word: &AtomicUsize, old: usize, new: usize) -> usize {
    word.compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire)
        .unwrap_or_else(|found| found)
}

/// `struct mutex { mtx_owner }` from `parking/mutex.c`.
pub struct RawParking {
    owner: AtomicUsize,
}

unsafe impl RawLock for RawParking {
    const INIT: Self = RawParking {
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
            // locking against myself
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
            debug_assert_ne!(owner, NONE);

            w.mtx.store(mtx_addr as *mut (), Ordering::Relaxed);
            full();
            let o = cas(&self.owner, owner, owner | CONTENDED);
            if o == owner {
                while !w.mtx.load(Ordering::Acquire).is_null() {
                    busy_cycle();
                }
                consumer();
            } else if o != NONE {
                owner = o;
                continue;
            }

            owner = cas(&self.owner, NONE, me);
            if owner == NONE {
                break;
            }
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
                // releasing a lock this thread doesn't own
                process::abort();
            }

            let mtx_addr = self as *const Self as *const ();
            let g = park::enter_for(mtx_addr);
            self.owner.store(NONE, Ordering::Relaxed);
            producer();
            g.wake_first_matching(mtx_addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::Mutex;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn smoke() {
        let m: Mutex<RawParking, u32> = Mutex::new(0);
        *m.enter() += 1;
        assert_eq!(*m.enter(), 1);
    }

    #[test]
    fn try_enter_contended() {
        let m: Mutex<RawParking, ()> = Mutex::new(());
        let g = m.enter();
        assert!(m.try_enter().is_none());
        drop(g);
        assert!(m.try_enter().is_some());
    }

    #[test]
    fn lots_of_threads() {
        const THREADS: usize = 6;
        const ITERS: usize = 20_000;
        let m = Arc::new(Mutex::<RawParking, u64>::new(0));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let m = m.clone();
                thread::spawn(move || {
                    for _ in 0..ITERS {
                        *m.enter() += 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*m.enter(), (THREADS * ITERS) as u64);
    }

    #[test]
    fn parked_waiters_eventually_all_get_in() {
        // Heavier contention than the adaptive spin limit can absorb,
        // forcing threads through the parking path.
        const THREADS: usize = 16;
        const ITERS: usize = 200;
        let m = Arc::new(Mutex::<RawParking, u64>::new(0));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let m = m.clone();
                thread::spawn(move || {
                    for _ in 0..ITERS {
                        *m.enter() += 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*m.enter(), (THREADS * ITERS) as u64);
    }
}
