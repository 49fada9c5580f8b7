//! Block requests and their queue link state.
//!
//! A [`Request`] is owned by the host's [`RequestTable`](crate::table::RequestTable) and
//! addressed by a [`RequestId`]. The scheduler never owns requests; it only threads
//! them together through the embedded [`QueueLink`].

use core::fmt;

use crate::constants::REQUEST_SECTORS_MAX;
use crate::error::{Error, Result};

/// Logical block address, in sectors.
pub type Sector = u64;

/// Stable handle to a request slot in a [`RequestTable`](crate::table::RequestTable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub(crate) u32);

impl RequestId {
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rq#{}", self.0)
    }
}

/// Identity of one queue instance, recorded in the links it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueTag(pub(crate) u32);

/// Position of a request within a scheduler queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueLink {
    pub(crate) prev: Option<RequestId>,
    pub(crate) next: Option<RequestId>,
    // Head (prev=None) and tail (next=None) are otherwise indistinguishable from
    // an unlinked request.
    pub(crate) linked: bool,
    // Queue the request is linked into. Several queues may share one table.
    pub(crate) owner: Option<QueueTag>,
}

impl QueueLink {
    pub const fn new() -> Self {
        Self {
            prev: None,
            next: None,
            linked: false,
            owner: None,
        }
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        assert!(self.linked == self.owner.is_some());
        self.linked
    }

    #[inline]
    pub fn is_linked_in(&self, tag: QueueTag) -> bool {
        self.is_linked() && self.owner == Some(tag)
    }

    pub fn reset(&mut self) {
        self.prev = None;
        self.next = None;
        self.linked = false;
        self.owner = None;

        assert!(!self.is_linked());
    }
}

impl Default for QueueLink {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    start_sector: Sector,
    length: u32,
    pub(crate) link: QueueLink,
}

impl Request {
    /// Checks caller-supplied request bounds without building a request.
    pub fn validate(start_sector: Sector, length: u32) -> Result<()> {
        let in_range = length > 0
            && length <= REQUEST_SECTORS_MAX
            && start_sector.checked_add(length as u64).is_some();

        if !in_range {
            return Err(Error::InvalidRequest {
                start_sector,
                length,
            });
        }
        Ok(())
    }

    /// # Panics
    /// If `length` is zero or exceeds [`REQUEST_SECTORS_MAX`], or the range overflows.
    pub fn new(start_sector: Sector, length: u32) -> Self {
        assert!(length > 0, "request length must be non-zero");
        assert!(length <= REQUEST_SECTORS_MAX, "request length exceeds maximum");
        assert!(
            start_sector.checked_add(length as u64).is_some(),
            "request range overflows sector space"
        );

        Self {
            start_sector,
            length,
            link: QueueLink::new(),
        }
    }

    #[inline]
    pub fn start_sector(&self) -> Sector {
        self.start_sector
    }

    /// Length in sectors.
    #[inline]
    pub fn length(&self) -> u32 {
        self.length
    }

    /// First sector past the end of this request.
    #[inline]
    pub fn end_sector(&self) -> Sector {
        self.start_sector + self.length as u64
    }

    /// True when `next` begins exactly where `self` ends.
    #[inline]
    pub fn is_adjacent_to(&self, next: &Request) -> bool {
        self.end_sector() == next.start_sector
    }

    #[inline]
    pub fn link(&self) -> &QueueLink {
        &self.link
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.link.is_linked()
    }

    /// Extends or shrinks the sector range. The start sector never moves.
    pub(crate) fn set_length(&mut self, length: u32) {
        assert!(length > 0, "request length must be non-zero");
        assert!(length <= REQUEST_SECTORS_MAX, "request length exceeds maximum");
        assert!(
            self.start_sector.checked_add(length as u64).is_some(),
            "request range overflows sector space"
        );

        self.length = length;
    }
}
