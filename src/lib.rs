//! A family of interchangeable kernel-style mutex algorithms behind one
//! [`RawLock`] contract, plus the generic [`Mutex`]/[`MutexGuard`]
//! pair every algorithm is used through.
//!
//! Exactly one algorithm is compiled in per build, chosen by Cargo
//! feature (see [`algorithms`]); `SelectedMutex<T>` is the convenience
//! alias the `mtxbench` binary locks against so its own code doesn't
//! need to name the active algorithm.
//!
//! Every algorithm here needs real OS threads (thread identity
//! tagging, a parking lot built on `std::sync::OnceLock`), so `no_std`
//! is not offered even though the `std` Cargo feature is kept for
//! parity with the rest of the dependency story.

pub mod algorithms;
mod atomic;
mod ident;
mod lock;
mod park;
mod pause;

pub use lock::{Mutex, MutexGuard, RawLock};

pub use algorithms::SelectedRaw;

/// A [`Mutex`] backed by whichever algorithm this build was compiled
/// with. The `mtxbench` binary and the crate's own integration tests
/// are written against this alias rather than against any one
/// algorithm's raw type.
pub type SelectedMutex<T> = Mutex<SelectedRaw, T>;

/// Process-wide `(parks, unparks)` counts accumulated by the
/// parking-style algorithms (`parking`, `parkingfair`, `wtflock`).
/// Zero and unused under every other algorithm.
pub fn park_counts() -> (u64, u64) {
    park::counts()
}
