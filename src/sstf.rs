//! Shortest-seek-time-first request queue.
//!
//! [`SstfQueue`] keeps pending requests in ascending start-sector order, so the next
//! request to dispatch is always the head. Insertion walks from the lowest sector and
//! lands after every request with a start sector `<=` the new one, which keeps equal
//! sectors in submission order.
//!
//! # Design
//!
//! The queue is intrusive over a [`RequestTable`]: the prev/next handles live in each
//! request's [`QueueLink`](crate::request::QueueLink), and the queue itself stores only
//! head, tail and length. It never acquires or releases table slots. Every operation
//! therefore borrows the table the requests live in.
//!
//! Several queues may share one table. Each queue carries a unique
//! [`QueueTag`] that it stamps into every link it owns, so handing a queue a request
//! linked into another queue fails its assertions instead of corrupting both lists.
//!
//! Insertion is O(n) in the queue length. Queue depth is bounded by the table capacity
//! ([`REQUESTS_MAX`](crate::constants::REQUESTS_MAX) at most), which is the scalability
//! ceiling of this scheduler.
//!
//! # Locking
//!
//! The queue has no internal lock. Callers serialize every operation on one queue
//! (including `former`/`latter` when interleaved with mutation) under the same mutual
//! exclusion, the way [`BlockQueue`](crate::block_queue::BlockQueue) holds its queue
//! lock across each scheduler callback.
//!
//! # Example
//!
//! ```
//! use sstf::sstf::SstfQueue;
//! use sstf::table::RequestTable;
//!
//! let mut table = RequestTable::init(8).unwrap();
//! let mut queue = SstfQueue::init();
//!
//! for sector in [50, 10, 30] {
//!     let id = table.acquire(sector, 8).unwrap();
//!     queue.enqueue(&mut table, id);
//! }
//!
//! let first = queue.dispatch(&mut table).unwrap();
//! assert_eq!(table.get(first).start_sector(), 10);
//! assert_eq!(queue.len(), 2);
//! ```

use std::sync::atomic::{AtomicU32, Ordering};

use log::{trace, warn};

use crate::constants::REQUESTS_MAX;
use crate::error::{Error, Result};
use crate::request::{QueueTag, RequestId, Sector};
use crate::table::RequestTable;

static NEXT_TAG: AtomicU32 = AtomicU32::new(0);

#[derive(Debug)]
pub struct SstfQueue {
    head: Option<RequestId>,
    tail: Option<RequestId>,
    len: u32,
    tag: QueueTag,
}

impl Default for SstfQueue {
    fn default() -> Self {
        Self::init()
    }
}

impl SstfQueue {
    pub fn init() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
            tag: QueueTag(NEXT_TAG.fetch_add(1, Ordering::Relaxed)),
        }
    }

    #[inline]
    pub fn tag(&self) -> QueueTag {
        self.tag
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        let empty = self.head.is_none();

        assert!(empty == (self.len == 0));
        assert!(empty == self.tail.is_none());

        empty
    }

    #[inline]
    pub fn len(&self) -> u32 {
        // Invariant: len == 0 iff head/tail are None
        assert!((self.len == 0) == self.head.is_none());
        assert!((self.len == 0) == self.tail.is_none());

        self.len
    }

    /// The request `dispatch` would return next.
    #[inline]
    pub fn peek(&self) -> Option<RequestId> {
        self.head
    }

    /// Links `id` into sector order.
    ///
    /// # Panics
    /// If `id` is already linked.
    pub fn enqueue(&mut self, table: &mut RequestTable, id: RequestId) {
        let old_len = self.len;

        assert!(
            !table.get(id).is_linked(),
            "enqueue: request already linked"
        );
        assert!(old_len < REQUESTS_MAX, "queue length overflow");

        let sector = table.get(id).start_sector();

        // Fast path: ascending submission appends at the tail.
        let at = match self.tail {
            Some(tail) if table.get(tail).start_sector() <= sector => None,
            _ => self.first_after(table, sector),
        };

        match at {
            Some(next) => self.link_before(table, id, next),
            None => self.link_back(table, id),
        }

        self.len += 1;

        assert!(self.len == old_len + 1);
        assert!(table.get(id).is_linked());
        trace!(
            "enqueue {} sector={} len={}",
            id,
            table.get(id).start_sector(),
            self.len
        );
    }

    /// Unlinks and returns the lowest-sector request, or `None` when there is no work.
    pub fn dispatch(&mut self, table: &mut RequestTable) -> Option<RequestId> {
        let head = self.head?;
        let old_len = self.len;

        assert!(old_len > 0, "head exists but len is 0");
        assert!(
            table.get(head).link.prev.is_none(),
            "head has non-null prev"
        );

        self.unlink(table, head);

        assert!(self.len == old_len - 1);
        assert!(!table.get(head).is_linked());
        trace!(
            "dispatch {} sector={} len={}",
            head,
            table.get(head).start_sector(),
            self.len
        );

        Some(head)
    }

    /// Drops `absorbed` from the queue after the host coalesced it into `survivor`.
    ///
    /// The survivor keeps its position. Extending its sector range is the caller's job.
    ///
    /// # Panics
    /// If `absorbed` is not linked in this queue, or `survivor == absorbed`.
    pub fn merge(&mut self, table: &mut RequestTable, survivor: RequestId, absorbed: RequestId) {
        let old_len = self.len;
        let link = table.get(absorbed).link();

        assert!(survivor != absorbed, "merge: request merged into itself");
        assert!(link.is_linked(), "merge: absorbed not linked");
        assert!(
            link.is_linked_in(self.tag),
            "merge: absorbed linked in another queue"
        );

        self.unlink(table, absorbed);

        assert!(self.len == old_len - 1);
        trace!("merge {} into {} len={}", absorbed, survivor, self.len);
    }

    /// The request immediately before `id` in sector order.
    ///
    /// # Panics
    /// If `id` is not linked in this queue.
    pub fn former(&self, table: &RequestTable, id: RequestId) -> Option<RequestId> {
        let link = table.get(id).link();
        assert!(link.is_linked(), "former: request not linked");
        assert!(
            link.is_linked_in(self.tag),
            "former: request in another queue"
        );

        if link.prev.is_none() {
            assert!(self.head == Some(id), "node has no prev but is not head");
        }
        link.prev
    }

    /// The request immediately after `id` in sector order.
    ///
    /// # Panics
    /// If `id` is not linked in this queue.
    pub fn latter(&self, table: &RequestTable, id: RequestId) -> Option<RequestId> {
        let link = table.get(id).link();
        assert!(link.is_linked(), "latter: request not linked");
        assert!(
            link.is_linked_in(self.tag),
            "latter: request in another queue"
        );

        if link.next.is_none() {
            assert!(self.tail == Some(id), "node has no next but is not tail");
        }
        link.next
    }

    /// Consumes the queue. A queue that still holds requests is reported as
    /// [`Error::NotEmpty`]: those requests were never dispatched or completed.
    pub fn teardown(self) -> Result<()> {
        let pending = self.len();
        if pending > 0 {
            warn!("sstf queue torn down with {} pending requests", pending);
            return Err(Error::NotEmpty { pending });
        }

        Ok(())
    }

    /// Handles in queue (ascending sector) order.
    pub fn iter<'a>(&self, table: &'a RequestTable) -> Iter<'a> {
        Iter {
            table,
            next: self.head,
            remaining: self.len,
        }
    }

    /// True when `id` is an acquired request linked into this queue.
    pub fn contains(&self, table: &RequestTable, id: RequestId) -> bool {
        table.is_acquired(id) && table.get(id).link().is_linked_in(self.tag)
    }

    /// Walks the whole queue verifying sector order, ownership and link consistency.
    /// O(n); compiled in every build, called from tests and when debugging.
    pub fn check_invariants(&self, table: &RequestTable) {
        if self.len == 0 {
            assert!(self.head.is_none(), "len=0 but head is Some");
            assert!(self.tail.is_none(), "len=0 but tail is Some");
            return;
        }

        assert!(self.head.is_some(), "len>0 but head is None");
        assert!(self.tail.is_some(), "len>0 but tail is None");

        let mut count: u32 = 0;
        let mut current = self.head;
        let mut last: Option<RequestId> = None;

        while let Some(id) = current {
            count += 1;
            assert!(count <= self.len, "forward: more requests than len indicates");

            let request = table.get(id);
            let link = request.link();
            assert!(link.is_linked(), "request not marked linked");
            assert!(link.is_linked_in(self.tag), "request owned by another queue");
            assert!(link.prev == last, "broken next->prev link");

            if let Some(prev) = last {
                assert!(
                    table.get(prev).start_sector() <= request.start_sector(),
                    "sector order violated at {}",
                    id
                );
            }

            last = current;
            current = link.next;
        }

        assert!(
            count == self.len,
            "forward: counted {} requests but len is {}",
            count,
            self.len
        );
        assert!(last == self.tail, "last forward request is not tail");
    }

    /// First linked request with a start sector strictly above `sector`.
    fn first_after(&self, table: &RequestTable, sector: Sector) -> Option<RequestId> {
        let mut current = self.head;
        let mut visited: u32 = 0;

        while let Some(id) = current {
            visited += 1;
            assert!(visited <= self.len, "cycle detected in queue");

            let request = table.get(id);
            if request.start_sector() > sector {
                return Some(id);
            }
            current = request.link().next;
        }

        None
    }

    fn link_back(&mut self, table: &mut RequestTable, id: RequestId) {
        {
            let link = &mut table.get_mut(id).link;
            link.prev = self.tail;
            link.next = None;
            link.linked = true;
            link.owner = Some(self.tag);
        }

        match self.tail {
            None => {
                assert!(self.head.is_none());
                assert!(self.len == 0);

                self.head = Some(id);
            }
            Some(tail) => {
                let link = &mut table.get_mut(tail).link;
                assert!(link.next.is_none(), "tail node has non-null next");
                assert!(link.is_linked());

                link.next = Some(id);
            }
        }

        self.tail = Some(id);
    }

    fn link_before(&mut self, table: &mut RequestTable, id: RequestId, next: RequestId) {
        let prev = table.get(next).link.prev;
        assert!(
            table.get(next).link().is_linked_in(self.tag),
            "insert point not linked"
        );

        {
            let link = &mut table.get_mut(id).link;
            link.prev = prev;
            link.next = Some(next);
            link.linked = true;
            link.owner = Some(self.tag);
        }

        table.get_mut(next).link.prev = Some(id);

        match prev {
            Some(prev) => {
                let link = &mut table.get_mut(prev).link;
                assert!(link.next == Some(next), "broken prev->next link");

                link.next = Some(id);
            }
            None => {
                assert!(self.head == Some(next), "node has no prev but is not head");

                self.head = Some(id);
            }
        }
    }

    fn unlink(&mut self, table: &mut RequestTable, id: RequestId) {
        assert!(self.len > 0, "remove from empty queue");

        let link = *table.get(id).link();
        assert!(link.is_linked_in(self.tag), "remove: request not linked");

        match link.prev {
            Some(prev) => {
                let prev_link = &mut table.get_mut(prev).link;
                assert!(prev_link.next == Some(id), "broken prev->next link");

                prev_link.next = link.next;
            }
            None => {
                assert!(self.head == Some(id), "node has no prev but is not head");

                self.head = link.next;
            }
        }

        match link.next {
            Some(next) => {
                let next_link = &mut table.get_mut(next).link;
                assert!(next_link.prev == Some(id), "broken next->prev link");

                next_link.prev = link.prev;
            }
            None => {
                assert!(self.tail == Some(id), "node has no next but is not tail");

                self.tail = link.prev;
            }
        }

        self.len -= 1;
        table.get_mut(id).link.reset();

        assert!(self.is_empty() == (self.len == 0));
    }
}

/// Iterator over queued handles, lowest sector first.
pub struct Iter<'a> {
    table: &'a RequestTable,
    next: Option<RequestId>,
    remaining: u32,
}

impl Iterator for Iter<'_> {
    type Item = RequestId;

    fn next(&mut self) -> Option<RequestId> {
        let id = self.next?;
        assert!(self.remaining > 0, "cycle detected in queue");

        self.remaining -= 1;
        self.next = self.table.get(id).link().next;

        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}
