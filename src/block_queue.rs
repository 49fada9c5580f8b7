//! Per-device request queue of the host storage stack.
//!
//! [`BlockQueue`] is the collaborator the scheduler is written against: it owns the
//! [`RequestTable`] and an [`Elevator`] instance, and holds one queue lock across every
//! scheduler callback. Submission, dispatch and completion may come from any number of
//! threads; the lock serializes them.
//!
//! # Request lifecycle
//!
//! ```text
//! submit ──► queued ──dispatch──► in flight ──complete──► released
//!              │
//!              └──merged into a neighbour──► released
//! ```
//!
//! Merging is the host's job: after a submit it asks the elevator for the new
//! request's queue neighbours, tests them for sector adjacency, extends the survivor's
//! range and tells the elevator which request was absorbed.

use log::{debug, warn};
use parking_lot::Mutex;

use crate::constants::{QUEUE_DEPTH_DEFAULT, REQUEST_SECTORS_MAX, SSTF_NAME};
use crate::elevator::{Elevator, ElevatorRegistry};
use crate::error::{Error, Result};
use crate::request::{RequestId, Sector};
use crate::table::RequestTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Registered elevator name.
    pub elevator: &'static str,
    /// Request slots, queued and in flight combined.
    pub capacity: u32,
    /// Coalesce contiguous requests on submit.
    pub merge: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            elevator: SSTF_NAME,
            capacity: QUEUE_DEPTH_DEFAULT,
            merge: true,
        }
    }
}

/// Outcome of [`BlockQueue::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submitted {
    /// The queued request now carrying the submitted range.
    pub id: RequestId,
    /// True if the range was coalesced with a neighbour.
    pub merged: bool,
}

/// A request handed to the device. Must be passed back to [`BlockQueue::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatched {
    pub id: RequestId,
    pub start_sector: Sector,
    pub length: u32,
}

struct Inner {
    table: RequestTable,
    elevator: Box<dyn Elevator>,
    in_flight: u32,
}

pub struct BlockQueue {
    inner: Mutex<Inner>,
    merge: bool,
}

impl BlockQueue {
    /// Allocates the request table and initializes the configured elevator. Any
    /// failure aborts activation and leaves nothing behind.
    pub fn new(config: QueueConfig, registry: &ElevatorRegistry) -> Result<Self> {
        let table = RequestTable::init(config.capacity)?;
        let elevator = registry.init(config.elevator)?;

        debug!(
            "block queue activated: elevator={} capacity={} merge={}",
            config.elevator, config.capacity, config.merge
        );

        Ok(Self {
            inner: Mutex::new(Inner {
                table,
                elevator,
                in_flight: 0,
            }),
            merge: config.merge,
        })
    }

    /// Queues a request for `length` sectors at `start_sector`.
    ///
    /// A merge frees the absorbed request's slot, so an id returned by an earlier
    /// submit is stale once that request has been merged into a neighbour.
    ///
    /// Fails with [`Error::InvalidRequest`] for an empty, oversized or overflowing range
    /// and with [`Error::TableExhausted`] when every slot is queued or in flight. A
    /// failed submit leaves the queue unchanged.
    pub fn submit(&self, start_sector: Sector, length: u32) -> Result<Submitted> {
        let mut guard = self.inner.lock();
        let Inner { table, elevator, .. } = &mut *guard;

        let id = table.acquire(start_sector, length)?;
        elevator.add_request(table, id);

        if !self.merge {
            return Ok(Submitted { id, merged: false });
        }

        let mut survivor = id;
        let mut merged = false;

        // Back merge: the new request ends where its successor starts.
        if let Some(next) = elevator.latter_request(table, id) {
            if try_coalesce(table, id, next) {
                elevator.merged_requests(table, id, next);
                table.release(next);
                debug!("back merge {} <- {}", id, next);
                merged = true;
            }
        }

        // Front merge: the predecessor ends where the new request starts.
        if let Some(prev) = elevator.former_request(table, id) {
            if try_coalesce(table, prev, id) {
                elevator.merged_requests(table, prev, id);
                table.release(id);
                debug!("front merge {} <- {}", prev, id);
                survivor = prev;
                merged = true;
            }
        }

        Ok(Submitted {
            id: survivor,
            merged,
        })
    }

    /// Takes the next request for the device, or `None` when nothing is queued.
    pub fn dispatch(&self) -> Option<Dispatched> {
        let mut guard = self.inner.lock();
        let Inner {
            table,
            elevator,
            in_flight,
        } = &mut *guard;

        let id = elevator.dispatch(table, false)?;
        *in_flight += 1;

        let request = table.get(id);
        Some(Dispatched {
            id,
            start_sector: request.start_sector(),
            length: request.length(),
        })
    }

    /// Signals device completion of a dispatched request and frees its slot.
    ///
    /// # Panics
    /// If `id` is still queued or was never dispatched.
    pub fn complete(&self, id: RequestId) {
        let mut guard = self.inner.lock();
        let Inner { table, in_flight, .. } = &mut *guard;

        assert!(*in_flight > 0, "complete: nothing in flight");
        assert!(
            !table.get(id).is_linked(),
            "complete: request still queued"
        );

        table.release(id);
        *in_flight -= 1;
    }

    /// Requests waiting in the elevator.
    pub fn pending(&self) -> u32 {
        self.inner.lock().elevator.len()
    }

    /// Requests dispatched but not yet completed.
    pub fn in_flight(&self) -> u32 {
        self.inner.lock().in_flight
    }

    /// Tears the queue down.
    ///
    /// Fails with [`Error::NotEmpty`] if requests are still queued, otherwise with
    /// [`Error::InFlight`] if dispatched requests were never completed.
    pub fn shutdown(self) -> Result<()> {
        let Inner {
            elevator,
            in_flight,
            ..
        } = self.inner.into_inner();

        let name = elevator.name();
        elevator.exit()?;

        if in_flight > 0 {
            warn!("{} requests still in flight at shutdown", in_flight);
            return Err(Error::InFlight { count: in_flight });
        }

        debug!("block queue shut down: elevator={}", name);
        Ok(())
    }
}

/// Extends `front` over `back` when `back` starts exactly where `front` ends and the
/// combined request stays within [`REQUEST_SECTORS_MAX`].
fn try_coalesce(table: &mut RequestTable, front: RequestId, back: RequestId) -> bool {
    let (front_rq, back_rq) = (table.get(front), table.get(back));
    if !front_rq.is_adjacent_to(back_rq) {
        return false;
    }

    let combined = front_rq.length() as u64 + back_rq.length() as u64;
    if combined > REQUEST_SECTORS_MAX as u64 {
        return false;
    }

    table.set_length(front, combined as u32);
    true
}
