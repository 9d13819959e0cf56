//! K42 MCS queue lock, atomic-swap variant.
//!
//! Grounded on `k42alt/mutex.c`: the same queue representation as
//! [`crate::algorithms::mcs::RawMcs`], but `enter` joins the queue with
//! a single unconditional `swap` on the tail pointer instead of a
//! CAS-retry loop, at the cost of briefly publishing a half-initialised
//! node (its `tail` field is set to "locked" only after the swap, not
//! before, matching the C source's ordering).

use core::ptr;
use core::sync::atomic::{fence, AtomicPtr, Ordering};

use crate::atomic::busy_cycle;
use crate::lock::RawLock;

struct Node {
    next: AtomicPtr<Node>,
    tail: AtomicPtr<Node>,
}

impl Node {
    const fn new() -> Node {
        Node {
            next: AtomicPtr::new(ptr::null_mut()),
            tail: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

/// `struct mutex { mtx_next, mtx_tail }` from `k42alt/mutex.c`.
pub struct RawMcsAlt {
    node: Node,
}

fn cas(p: &AtomicPtr<Node>, old: *mut Node, new: *mut Node) -> *mut Node {
    p.compare_exchange(old, new, Ordering::AcqRel, Ordering::Acquire)
        .unwrap_or_else(|found| found)
}

unsafe impl RawLock for RawMcsAlt {
    const INIT: Self = RawMcsAlt { node: Node::new() };

    #[inline]
    fn try_enter(&self) -> bool {
        let me = &self.node as *const Node as *mut Node;
        let tail = cas(&self.node.tail, ptr::null_mut(), me);
        if tail.is_null() {
            fence(Ordering::Acquire);
            true
        } else {
            false
        }
    }

    fn enter(&self) {
        let mtx = &self.node as *const Node as *mut Node;
        let local = Node::new();
        let local_ptr = &local as *const Node as *mut Node;

        let v = self.node.tail.swap(local_ptr, Ordering::AcqRel);
        if !v.is_null() {
            // queue was non-empty: mark ourselves locked, link our
            // predecessor to us, then wait for it to clear us.
            local.tail.store(local_ptr, Ordering::Relaxed);
            unsafe { &*v }.next.store(local_ptr, Ordering::Release);

            while !local.tail.load(Ordering::Acquire).is_null() {
                busy_cycle();
            }
        }

        let mut succ = local.next.load(Ordering::Acquire);
        if succ.is_null() {
            if cas(&self.node.tail, local_ptr, mtx) != local_ptr {
                loop {
                    succ = local.next.load(Ordering::Acquire);
                    if !succ.is_null() {
                        break;
                    }
                    busy_cycle();
                }
            }
        }
        self.node.next.store(succ, Ordering::Relaxed);
    }

    unsafe fn leave(&self) {
        fence(Ordering::Release);
        let mtx = &self.node as *const Node as *mut Node;

        let mut v = self.node.next.load(Ordering::Relaxed);
        if v.is_null() {
            if cas(&self.node.tail, mtx, ptr::null_mut()) == mtx {
                return;
            }
            loop {
                v = self.node.next.load(Ordering::Acquire);
                if !v.is_null() {
                    break;
                }
                busy_cycle();
            }
        }
        (*v).tail.store(ptr::null_mut(), Ordering::Release);
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
        let m: Mutex<RawMcsAlt, u32> = Mutex::new(0);
        *m.enter() += 1;
        assert_eq!(*m.enter(), 1);
    }

    #[test]
    fn try_enter_contended() {
        let m: Mutex<RawMcsAlt, ()> = Mutex::new(());
        let g = m.enter();
        assert!(m.try_enter().is_none());
        drop(g);
        assert!(m.try_enter().is_some());
    }

    #[test]
    fn lots_of_threads() {
        const THREADS: usize = 6;
        const ITERS: usize = 20_000;
        let m = Arc::new(Mutex::<RawMcsAlt, u64>::new(0));
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
    fn queue_drains_after_heavy_contention() {
        const THREADS: usize = 8;
        let m = Arc::new(Mutex::<RawMcsAlt, ()>::new(()));
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let m = m.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let _g = m.enter();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(m.try_enter().is_some());
    }
}
