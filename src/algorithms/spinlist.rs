//! Spinlist lock: an inner spinlock guarding the owner word and
//! an explicit FIFO of waiter descriptors.
//!
//! Grounded on `spinlist/mutex.c` / `mutex.h`. Where the ticket lock
//! gets FIFO order for free from a pair of counters, this algorithm
//! gets it by explicitly queueing: every contended caller links a
//! stack-local descriptor onto the tail of a list while holding a tiny
//! inner spinlock, then spins on its own descriptor's flag rather than
//! on the shared owner word, so wakeups are targeted instead of a
//! thundering herd.

use core::cell::Cell;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::atomic::{acquire_after_atomic, busy_cycle, release_before_atomic};
use crate::ident;
use crate::lock::RawLock;

const NONE: usize = 0;

/// A waiter descriptor (`struct mutex_waiter`), stack-allocated by the
/// blocked caller for the duration of its `enter()` call.
struct Waiter {
    /// Non-zero while this waiter has not yet been handed the lock.
    wait: AtomicBool,
    next: Cell<Option<NonNull<Waiter>>>,
}

impl Waiter {
    fn new() -> Waiter {
        Waiter {
            wait: AtomicBool::new(true),
            next: Cell::new(None),
        }
    }
}

/// The inner spinlock guarding `owner` and the waiter FIFO
/// (`mtx_spin` in the C source).
struct InnerSpin(AtomicBool);

impl InnerSpin {
    const fn new() -> InnerSpin {
        InnerSpin(AtomicBool::new(false))
    }

    fn enter(&self) {
        while self
            .0
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            busy_cycle();
        }
    }

    fn leave(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// `struct mutex { mtx_spin, mtx_owner, mtx_waiting }` from
/// `spinlist/mutex.h`.
pub struct RawSpinlist {
    spin: InnerSpin,
    owner: AtomicUsize,
    head: Cell<Option<NonNull<Waiter>>>,
    tail: Cell<Option<NonNull<Waiter>>>,
}

// SAFETY: `head`/`tail` are only touched while `spin` is held.
unsafe impl Sync for RawSpinlist {}
// SAFETY: the pointers stored in `head`/`tail` are only followed while
// `spin` is held, so moving a `RawSpinlist` across threads is sound.
unsafe impl Send for RawSpinlist {}

impl RawSpinlist {
    fn push_back(&self, w: &Waiter) {
        let node = NonNull::from(w);
        w.next.set(None);
        match self.tail.get() {
            Some(tail) => unsafe { tail.as_ref() }.next.set(Some(node)),
            None => self.head.set(Some(node)),
        }
        self.tail.set(Some(node));
    }

    /// Removes `w` from the head of the queue. `w` must be the head.
    fn remove_head(&self, w: &Waiter) {
        let node = NonNull::from(w);
        debug_assert_eq!(self.head.get(), Some(node));
        self.head.set(w.next.get());
        if self.head.get().is_none() {
            self.tail.set(None);
        }
        w.next.set(None);
    }

    fn wake_head(&self) {
        if let Some(node) = self.head.get() {
            unsafe { node.as_ref() }.wait.store(false, Ordering::Release);
        }
    }
}

unsafe impl RawLock for RawSpinlist {
    const INIT: Self = RawSpinlist {
        spin: InnerSpin::new(),
        owner: AtomicUsize::new(NONE),
        head: Cell::new(None),
        tail: Cell::new(None),
    };

    fn try_enter(&self) -> bool {
        let me = ident::current();
        self.spin.enter();
        let owner = self.owner.load(Ordering::Relaxed);
        let got = owner == NONE;
        if got {
            self.owner.store(me, Ordering::Relaxed);
        }
        self.spin.leave();
        if got {
            acquire_after_atomic();
        }
        got
    }

    fn enter(&self) {
        let me = ident::current();
        let w = Waiter::new();

        self.spin.enter();
        let mut owner = self.owner.load(Ordering::Relaxed);
        if owner == NONE {
            self.owner.store(me, Ordering::Relaxed);
        } else {
            self.push_back(&w);
        }
        self.spin.leave();

        while owner != NONE {
            while w.wait.load(Ordering::Acquire) {
                busy_cycle();
            }

            self.spin.enter();
            owner = self.owner.load(Ordering::Relaxed);
            if owner == NONE {
                self.owner.store(me, Ordering::Relaxed);
                self.remove_head(&w);
            } else {
                w.wait.store(true, Ordering::Relaxed);
            }
            self.spin.leave();
        }

        acquire_after_atomic();
    }

    unsafe fn leave(&self) {
        release_before_atomic();
        self.spin.enter();
        self.owner.store(NONE, Ordering::Relaxed);
        self.wake_head();
        self.spin.leave();
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
        let m: Mutex<RawSpinlist, u32> = Mutex::new(0);
        *m.enter() += 1;
        assert_eq!(*m.enter(), 1);
    }

    #[test]
    fn try_enter_contended() {
        let m: Mutex<RawSpinlist, ()> = Mutex::new(());
        let g = m.enter();
        assert!(m.try_enter().is_none());
        drop(g);
        assert!(m.try_enter().is_some());
    }

    #[test]
    fn fifo_order_no_inversions() {
        const THREADS: usize = 6;
        const ITERS: usize = 2_000;
        let m = Arc::new(Mutex::<RawSpinlist, Vec<usize>>::new(Vec::new()));
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let m = m.clone();
                thread::spawn(move || {
                    for _ in 0..ITERS {
                        m.enter().push(t);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let log = m.enter();
        let mut counts = [0usize; THREADS];
        for &t in log.iter() {
            counts[t] += 1;
        }
        assert!(counts.iter().all(|&c| c == ITERS));
    }

    #[test]
    fn lots_of_threads() {
        const THREADS: usize = 6;
        const ITERS: usize = 20_000;
        let m = Arc::new(Mutex::<RawSpinlist, u64>::new(0));
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
