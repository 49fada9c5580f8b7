//! Shortest-seek-time-first I/O scheduling for block request queues.
//!
//! [`sstf::SstfQueue`] orders pending requests by start sector and always dispatches
//! the lowest one. The remaining modules model what surrounds it in a storage stack:
//! the request records it orders ([`table`]), the scheduler plug-in interface
//! ([`elevator`]) and a per-device queue that drives it under a lock ([`block_queue`]).

pub mod block_queue;
pub mod constants;
pub mod elevator;
pub mod error;
pub mod request;
pub mod sstf;
pub mod table;

#[cfg(test)]
pub(crate) mod test_utils;

pub use block_queue::{BlockQueue, Dispatched, QueueConfig, Submitted};
pub use elevator::{Elevator, ElevatorRegistry, ElevatorType};
pub use error::{Error, Result};
pub use request::{QueueLink, QueueTag, Request, RequestId, Sector};
pub use sstf::SstfQueue;
pub use table::RequestTable;
