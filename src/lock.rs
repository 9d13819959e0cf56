//! The abstract four-operation mutex contract and the single generic
//! `Mutex`/`MutexGuard` pair layered on top of it.
//!
//! A `RawLock` trait that each of the nine algorithms in
//! [`crate::algorithms`] implements once, plus a single data-bearing
//! `Mutex<R, T>` built against the trait instead of against any one
//! algorithm, so swapping algorithms never touches call sites.

use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};

/// The four operations every algorithm in [`crate::algorithms`]
/// implements: `INIT` (construct unheld), `try_enter`, `enter`, and
/// `leave`.
///
/// # Safety
///
/// Implementors must uphold mutual exclusion: at most one
/// thread may believe `try_enter`/`enter` succeeded for it at a time,
/// until the matching `leave`. `leave` must only be called by the
/// current owner; callers of this trait (i.e. [`Mutex`]) uphold that
/// half of the contract by construction, since a [`MutexGuard`] can
/// only be created by a successful `try_enter`/`enter` and `leave` is
/// only ever called from that guard's `Drop`.
pub unsafe trait RawLock {
    /// The unheld state. No concurrency is possible while constructing
    /// this value.
    const INIT: Self;

    /// Attempts to take the lock without blocking. Returns `true` iff
    /// the caller is now the owner. Some algorithms (ticket) may
    /// legitimately always return `false`.
    fn try_enter(&self) -> bool;

    /// Blocks until the caller becomes the owner.
    fn enter(&self);

    /// Releases the lock. The caller must currently be the owner.
    ///
    /// # Safety
    ///
    /// Calling this when the current thread is not the owner is
    /// undefined behaviour, except that the parking-style algorithms
    /// are documented to abort the process when they can detect it.
    unsafe fn leave(&self);
}

/// A mutex generic over which [`RawLock`] algorithm backs it, wrapping a
/// protected value of type `T`.
pub struct Mutex<R, T: ?Sized> {
    raw: R,
    data: UnsafeCell<T>,
}

unsafe impl<R: RawLock + Send, T: ?Sized + Send> Send for Mutex<R, T> {}
unsafe impl<R: RawLock + Sync, T: ?Sized + Send> Sync for Mutex<R, T> {}

impl<R: RawLock, T> Mutex<R, T> {
    /// Creates a new mutex, unheld, wrapping `value`.
    pub const fn new(value: T) -> Mutex<R, T> {
        Mutex {
            raw: R::INIT,
            data: UnsafeCell::new(value),
        }
    }

    /// Consumes the mutex, returning the protected value.
    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<R: RawLock, T: ?Sized> Mutex<R, T> {
    /// Attempts to acquire the mutex without blocking.
    #[inline]
    pub fn try_enter(&self) -> Option<MutexGuard<'_, R, T>> {
        self.raw.try_enter().then(|| MutexGuard { lock: self })
    }

    /// Blocks until the mutex is acquired.
    #[inline]
    pub fn enter(&self) -> MutexGuard<'_, R, T> {
        self.raw.enter();
        MutexGuard { lock: self }
    }

    /// Returns a mutable reference to the protected value without
    /// locking; the borrow checker already guarantees exclusivity here.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<R: RawLock + Default, T: Default> Default for Mutex<R, T> {
    fn default() -> Self {
        Mutex::new(T::default())
    }
}

impl<R, T: ?Sized> fmt::Debug for Mutex<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutex").finish_non_exhaustive()
    }
}

/// An RAII guard for a held [`Mutex`]. Releases the lock (calls
/// [`RawLock::leave`]) when dropped.
#[must_use = "if unused the Mutex will immediately unlock"]
pub struct MutexGuard<'a, R: RawLock, T: ?Sized> {
    lock: &'a Mutex<R, T>,
}

// A guard carries no thread affinity of its own; whether it may cross
// threads is entirely a property of the algorithm backing it (e.g. the
// parking-style algorithms assume the releasing thread is the acquiring
// thread, per `leave`'s contract, so their `RawLock` impls are not
// `Sync`-only — they stay `Send`-agnostic and rely on this bound).
unsafe impl<R: RawLock + Sync, T: ?Sized + Sync> Sync for MutexGuard<'_, R, T> {}

impl<R: RawLock, T: ?Sized> Deref for MutexGuard<'_, R, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<R: RawLock, T: ?Sized> DerefMut for MutexGuard<'_, R, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<R: RawLock, T: ?Sized> Drop for MutexGuard<'_, R, T> {
    fn drop(&mut self) {
        unsafe { self.lock.raw.leave() }
    }
}
