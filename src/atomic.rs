//! Atomic primitives shared by every mutex algorithm in this crate.
//!
//! Grounded on `atomic.h` from the original C harness: a busy-cycle hint,
//! a family of named memory fences, and `READ_ONCE`/`WRITE_ONCE` helpers.
//! Rust's `core::sync::atomic` already gives every algorithm
//! compare-exchange, swap and fetch-add directly on `AtomicUsize` /
//! `AtomicPtr`, so this module only adds the vocabulary the C source
//! names that the standard library doesn't: the architecture-neutral
//! pause hint and the fence names each algorithm's acquire/release path
//! is written against.

use core::ptr;
use core::sync::atomic::{fence, AtomicPtr, Ordering};

pub(crate) use crate::pause::pause as busy_cycle;

/// Issued immediately after a successful acquiring CAS or swap
/// (`membar_enter_after_atomic` in the C source): orders later loads and
/// stores after the atomic that just granted ownership.
#[inline(always)]
pub(crate) fn acquire_after_atomic() {
    fence(Ordering::Acquire);
}

/// Issued before a release store becomes visible to other threads
/// (`membar_exit`/`membar_exit_before_atomic`): orders earlier loads and
/// stores before the release.
#[inline(always)]
pub(crate) fn release_before_atomic() {
    fence(Ordering::Release);
}

/// Data-dependency consumer barrier (`membar_datadep_consumer`): used by
/// MCS waiters right after reading a pointer they are about to
/// dereference. Every architecture Rust currently targets already
/// orders a dependent load after the load that produced its address, so
/// this is a named no-op — it documents the requirement at the call
/// site rather than emitting an instruction.
#[inline(always)]
pub(crate) fn consumer() {}

/// Producer barrier (`membar_producer`, StoreStore): used by the
/// parking-style algorithms to order the write that publishes a waiter
/// before the owner-word update that a releaser might observe.
#[inline(always)]
pub(crate) fn producer() {
    fence(Ordering::Release);
}

/// Full barrier, reserved for the park-slot's own spinlock acquisition.
#[inline(always)]
pub(crate) fn full() {
    fence(Ordering::SeqCst);
}

/// `READ_ONCE`: a relaxed load that also issues a [`consumer`] barrier,
/// for pointers that are about to be followed.
#[inline(always)]
pub(crate) fn read_once_ptr<T>(a: &AtomicPtr<T>) -> *mut T {
    let v = a.load(Ordering::Relaxed);
    consumer();
    v
}

/// `WRITE_ONCE` for pointers: a plain relaxed store, named to match the
/// call sites that mirror the C source's `WRITE_ONCE(v->next, &self)`.
#[inline(always)]
pub(crate) fn write_once_ptr<T>(a: &AtomicPtr<T>, val: *mut T) {
    a.store(val, Ordering::Relaxed);
}

/// Shorthand for the null sentinel, used so algorithm code reads
/// `none()` rather than a bare `ptr::null_mut()` at every "unheld" check.
#[inline(always)]
pub(crate) fn none<T>() -> *mut T {
    ptr::null_mut()
}
