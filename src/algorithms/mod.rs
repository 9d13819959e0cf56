//! The nine interchangeable [`crate::lock::RawLock`] algorithms, and
//! the `SelectedRaw` alias the `bench-cli` binary links against.
//!
//! Exactly one `algorithms/*` Cargo feature is meant to be enabled per
//! binary; the `compile_error!` below turns "zero selected" or "more
//! than one selected" into a build failure instead of a
//! silently-arbitrary pick.

pub mod backoff;
pub mod mcs;
pub mod mcs_alt;
pub mod parking;
pub mod parkingfair;
pub mod spinlist;
pub mod spinlockrd;
pub mod ticket;
pub mod wtflock;

pub use backoff::RawBackoff;
pub use mcs::RawMcs;
pub use mcs_alt::RawMcsAlt;
pub use parking::RawParking;
pub use parkingfair::RawParkingFair;
pub use spinlist::RawSpinlist;
pub use spinlockrd::RawSpinlockRd;
pub use ticket::RawTicket;
pub use wtflock::RawWtfLock;

#[cfg(any(
    all(feature = "backoff", feature = "spinlockrd"),
    all(feature = "backoff", feature = "ticket"),
    all(feature = "backoff", feature = "mcs"),
    all(feature = "backoff", feature = "mcs-alt"),
    all(feature = "backoff", feature = "spinlist"),
    all(feature = "backoff", feature = "parking"),
    all(feature = "backoff", feature = "parkingfair"),
    all(feature = "backoff", feature = "wtflock"),
    all(feature = "spinlockrd", feature = "ticket"),
    all(feature = "spinlockrd", feature = "mcs"),
    all(feature = "spinlockrd", feature = "mcs-alt"),
    all(feature = "spinlockrd", feature = "spinlist"),
    all(feature = "spinlockrd", feature = "parking"),
    all(feature = "spinlockrd", feature = "parkingfair"),
    all(feature = "spinlockrd", feature = "wtflock"),
    all(feature = "ticket", feature = "mcs"),
    all(feature = "ticket", feature = "mcs-alt"),
    all(feature = "ticket", feature = "spinlist"),
    all(feature = "ticket", feature = "parking"),
    all(feature = "ticket", feature = "parkingfair"),
    all(feature = "ticket", feature = "wtflock"),
    all(feature = "mcs", feature = "mcs-alt"),
    all(feature = "mcs", feature = "spinlist"),
    all(feature = "mcs", feature = "parking"),
    all(feature = "mcs", feature = "parkingfair"),
    all(feature = "mcs", feature = "wtflock"),
    all(feature = "mcs-alt", feature = "spinlist"),
    all(feature = "mcs-alt", feature = "parking"),
    all(feature = "mcs-alt", feature = "parkingfair"),
    all(feature = "mcs-alt", feature = "wtflock"),
    all(feature = "spinlist", feature = "parking"),
    all(feature = "spinlist", feature = "parkingfair"),
    all(feature = "spinlist", feature = "wtflock"),
    all(feature = "parking", feature = "parkingfair"),
    all(feature = "parking", feature = "wtflock"),
    all(feature = "parkingfair", feature = "wtflock"),
))]
compile_error!(
    "exactly one of the `algorithms/*` features (backoff, spinlockrd, ticket, \
     mcs, mcs-alt, spinlist, parking, parkingfair, wtflock) may be enabled at \
     a time — a binary links exactly one mutex algorithm"
);

#[cfg(not(any(
    feature = "backoff",
    feature = "spinlockrd",
    feature = "ticket",
    feature = "mcs",
    feature = "mcs-alt",
    feature = "spinlist",
    feature = "parking",
    feature = "parkingfair",
    feature = "wtflock",
)))]
compile_error!(
    "no `algorithms/*` feature is enabled — pick exactly one (backoff, \
     spinlockrd, ticket, mcs, mcs-alt, spinlist, parking, parkingfair, wtflock)"
);

#[cfg(feature = "backoff")]
pub type SelectedRaw = RawBackoff;
#[cfg(feature = "spinlockrd")]
pub type SelectedRaw = RawSpinlockRd;
#[cfg(feature = "ticket")]
pub type SelectedRaw = RawTicket;
#[cfg(feature = "mcs")]
pub type SelectedRaw = RawMcs;
#[cfg(feature = "mcs-alt")]
pub type SelectedRaw = RawMcsAlt;
#[cfg(feature = "spinlist")]
pub type SelectedRaw = RawSpinlist;
#[cfg(feature = "parking")]
pub type SelectedRaw = RawParking;
#[cfg(feature = "parkingfair")]
pub type SelectedRaw = RawParkingFair;
#[cfg(feature = "wtflock")]
pub type SelectedRaw = RawWtfLock;

/// Name of the algorithm linked into this binary, for log/JSON output.
pub const SELECTED_NAME: &str = {
    #[cfg(feature = "backoff")]
    {
        "backoff"
    }
    #[cfg(feature = "spinlockrd")]
    {
        "spinlockrd"
    }
    #[cfg(feature = "ticket")]
    {
        "ticket"
    }
    #[cfg(feature = "mcs")]
    {
        "mcs"
    }
    #[cfg(feature = "mcs-alt")]
    {
        "mcs-alt"
    }
    #[cfg(feature = "spinlist")]
    {
        "spinlist"
    }
    #[cfg(feature = "parking")]
    {
        "parking"
    }
    #[cfg(feature = "parkingfair")]
    {
        "parkingfair"
    }
    #[cfg(feature = "wtflock")]
    {
        "wtflock"
    }
};
