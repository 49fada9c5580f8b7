//! Pluggable scheduler interface and registration.
//!
//! The host storage stack drives its I/O scheduler ("elevator") through the
//! [`Elevator`] callbacks and picks one by name from an [`ElevatorRegistry`]. The
//! registry is an ordinary value: there is no process-wide scheduler list, so any
//! number of registries (and elevator instances) can coexist.

use log::debug;

use crate::constants::SSTF_NAME;
use crate::error::{Error, Result};
use crate::request::RequestId;
use crate::sstf::SstfQueue;
use crate::table::RequestTable;

/// Scheduler callbacks invoked by the host under its queue lock.
pub trait Elevator: Send {
    fn name(&self) -> &'static str;

    /// A new request was submitted.
    fn add_request(&mut self, table: &mut RequestTable, id: RequestId);

    /// Next request for the device, or `None` when no work is queued. `force` asks the
    /// scheduler to hand over work it might otherwise hold back.
    fn dispatch(&mut self, table: &mut RequestTable, force: bool) -> Option<RequestId>;

    /// The host coalesced `absorbed` into `survivor`; `absorbed` leaves the queue.
    fn merged_requests(
        &mut self,
        table: &mut RequestTable,
        survivor: RequestId,
        absorbed: RequestId,
    );

    fn former_request(&self, table: &RequestTable, id: RequestId) -> Option<RequestId>;

    fn latter_request(&self, table: &RequestTable, id: RequestId) -> Option<RequestId>;

    /// Requests currently queued.
    fn len(&self) -> u32;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tears the scheduler down. Fails with [`Error::NotEmpty`] if requests remain.
    fn exit(self: Box<Self>) -> Result<()>;
}

impl Elevator for SstfQueue {
    fn name(&self) -> &'static str {
        SSTF_NAME
    }

    fn add_request(&mut self, table: &mut RequestTable, id: RequestId) {
        self.enqueue(table, id);
    }

    // SSTF never defers work, so `force` changes nothing.
    fn dispatch(&mut self, table: &mut RequestTable, _force: bool) -> Option<RequestId> {
        SstfQueue::dispatch(self, table)
    }

    fn merged_requests(
        &mut self,
        table: &mut RequestTable,
        survivor: RequestId,
        absorbed: RequestId,
    ) {
        self.merge(table, survivor, absorbed);
    }

    fn former_request(&self, table: &RequestTable, id: RequestId) -> Option<RequestId> {
        self.former(table, id)
    }

    fn latter_request(&self, table: &RequestTable, id: RequestId) -> Option<RequestId> {
        self.latter(table, id)
    }

    fn len(&self) -> u32 {
        SstfQueue::len(self)
    }

    fn is_empty(&self) -> bool {
        SstfQueue::is_empty(self)
    }

    fn exit(self: Box<Self>) -> Result<()> {
        (*self).teardown()
    }
}

fn sstf_init() -> Box<dyn Elevator> {
    Box::new(SstfQueue::init())
}

/// A registrable scheduler: its name and a factory for fresh, empty instances.
#[derive(Clone, Copy)]
pub struct ElevatorType {
    pub name: &'static str,
    pub init: fn() -> Box<dyn Elevator>,
}

impl ElevatorType {
    pub fn sstf() -> Self {
        Self {
            name: SSTF_NAME,
            init: sstf_init,
        }
    }
}

impl core::fmt::Debug for ElevatorType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ElevatorType")
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct ElevatorRegistry {
    types: Vec<ElevatorType>,
}

impl ElevatorRegistry {
    pub fn new() -> Self {
        Self { types: Vec::new() }
    }

    /// A registry with the built-in `sstf` scheduler.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.types.push(ElevatorType::sstf());

        assert!(registry.contains(SSTF_NAME));
        registry
    }

    pub fn register(&mut self, elevator: ElevatorType) -> Result<()> {
        if self.contains(elevator.name) {
            return Err(Error::DuplicateElevator {
                name: elevator.name,
            });
        }

        self.types.push(elevator);
        debug!("registered elevator '{}'", elevator.name);

        Ok(())
    }

    pub fn unregister(&mut self, name: &str) -> Result<()> {
        let Some(index) = self.types.iter().position(|t| t.name == name) else {
            return Err(Error::UnknownElevator {
                name: name.to_string(),
            });
        };

        self.types.remove(index);
        debug!("unregistered elevator '{}'", name);

        Ok(())
    }

    /// Creates a new, empty instance of the elevator registered as `name`.
    pub fn init(&self, name: &str) -> Result<Box<dyn Elevator>> {
        let Some(elevator) = self.types.iter().find(|t| t.name == name) else {
            return Err(Error::UnknownElevator {
                name: name.to_string(),
            });
        };

        let instance = (elevator.init)();
        assert!(instance.is_empty(), "elevator init returned a non-empty queue");
        debug!("initialized elevator '{}'", name);

        Ok(instance)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.types.iter().any(|t| t.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.types.iter().map(|t| t.name)
    }
}
