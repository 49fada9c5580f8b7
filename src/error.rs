//! Operational errors.
//!
//! Contract violations by the caller (enqueueing a linked request, merging a request
//! that is not queued, releasing a queued record) are not represented here: they
//! panic at the call site. An empty dispatch is `None`, never an error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backing storage for the request table could not be reserved.
    #[error("failed to allocate request table for {capacity} requests")]
    AllocationFailed { capacity: u32 },

    #[error("invalid request table capacity {capacity}")]
    InvalidCapacity { capacity: u32 },

    /// Zero length, length above the per-request maximum, or a range past the end of
    /// the sector space.
    #[error("invalid request: {length} sectors at sector {start_sector}")]
    InvalidRequest { start_sector: u64, length: u32 },

    /// Every request slot is in use.
    #[error("request table exhausted ({capacity} requests in use)")]
    TableExhausted { capacity: u32 },

    /// The queue still held requests at teardown. Their completion was never
    /// signalled to the host.
    #[error("queue torn down with {pending} pending requests")]
    NotEmpty { pending: u32 },

    /// Dispatched requests were never completed before shutdown.
    #[error("{count} dispatched requests never completed")]
    InFlight { count: u32 },

    #[error("elevator '{name}' is already registered")]
    DuplicateElevator { name: &'static str },

    #[error("no elevator named '{name}'")]
    UnknownElevator { name: String },
}
