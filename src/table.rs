//! Host-owned storage for request records.
//!
//! The table is a fixed-capacity arena: every slot is reserved at [`RequestTable::init`]
//! and handed out through stable [`RequestId`] handles. Schedulers thread requests
//! together through each record's [`QueueLink`](crate::request::QueueLink) but never
//! acquire or release slots themselves.

use log::trace;

use crate::constants::REQUESTS_MAX;
use crate::error::{Error, Result};
use crate::request::{Request, RequestId, Sector};

pub struct RequestTable {
    slots: Vec<Option<Request>>,
    // LIFO free list of slot indices.
    free: Vec<u32>,
    in_use: u32,
}

impl RequestTable {
    /// Reserves `capacity` request slots.
    ///
    /// Fails with [`Error::InvalidCapacity`] outside `1..=REQUESTS_MAX` and with
    /// [`Error::AllocationFailed`] when the backing storage cannot be reserved.
    pub fn init(capacity: u32) -> Result<Self> {
        if capacity == 0 || capacity > REQUESTS_MAX {
            return Err(Error::InvalidCapacity { capacity });
        }

        let mut slots: Vec<Option<Request>> = Vec::new();
        slots
            .try_reserve_exact(capacity as usize)
            .map_err(|_| Error::AllocationFailed { capacity })?;
        let mut free: Vec<u32> = Vec::new();
        free.try_reserve_exact(capacity as usize)
            .map_err(|_| Error::AllocationFailed { capacity })?;

        slots.resize_with(capacity as usize, || None);
        // Reverse so the lowest index is handed out first.
        free.extend((0..capacity).rev());

        let table = Self {
            slots,
            free,
            in_use: 0,
        };

        assert!(table.capacity() == capacity);
        assert!(table.in_use() == 0);
        assert!(table.available() == capacity);

        Ok(table)
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    #[inline]
    pub fn in_use(&self) -> u32 {
        assert!(self.in_use as usize + self.free.len() == self.slots.len());
        self.in_use
    }

    #[inline]
    pub fn available(&self) -> u32 {
        let avail = self.free.len() as u32;
        assert!(self.in_use + avail == self.capacity());
        avail
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.free.is_empty()
    }

    /// Stores a new, unlinked request and returns its handle.
    ///
    /// Fails with [`Error::InvalidRequest`] for bounds [`Request::validate`] rejects and
    /// with [`Error::TableExhausted`] when no slot is free. Neither failure changes the
    /// table.
    pub fn acquire(&mut self, start_sector: Sector, length: u32) -> Result<RequestId> {
        Request::validate(start_sector, length)?;
        let old_in_use = self.in_use();

        let Some(index) = self.free.pop() else {
            return Err(Error::TableExhausted {
                capacity: self.capacity(),
            });
        };

        let slot = &mut self.slots[index as usize];
        assert!(slot.is_none(), "free list holds an occupied slot");
        *slot = Some(Request::new(start_sector, length));

        self.in_use += 1;

        assert!(self.in_use == old_in_use + 1);
        assert!(self.in_use + self.available() == self.capacity());

        let id = RequestId(index);
        trace!("acquired {} at sector {} (+{})", id, start_sector, length);

        Ok(id)
    }

    /// Returns a slot to the free list.
    ///
    /// # Panics
    /// If `id` is already free, or its request is still linked in a queue.
    pub fn release(&mut self, id: RequestId) {
        assert!(self.contains(id), "release: handle out of range");

        let slot = &mut self.slots[id.as_usize()];
        let Some(request) = slot.take() else {
            panic!("release: double release detected");
        };
        assert!(!request.is_linked(), "release: request still linked");

        let old_in_use = self.in_use;
        assert!(old_in_use > 0);

        self.free.push(id.index());
        self.in_use -= 1;

        assert!(self.in_use == old_in_use - 1);
        assert!(self.in_use + self.available() == self.capacity());

        trace!("released {}", id);
    }

    /// # Panics
    /// If `id` does not refer to an acquired slot.
    #[inline]
    pub fn get(&self, id: RequestId) -> &Request {
        assert!(self.contains(id), "get: handle out of range");
        match &self.slots[id.as_usize()] {
            Some(request) => request,
            None => panic!("get on non-acquired slot"),
        }
    }

    /// # Panics
    /// If `id` does not refer to an acquired slot.
    #[inline]
    pub fn get_mut(&mut self, id: RequestId) -> &mut Request {
        assert!(self.contains(id), "get_mut: handle out of range");
        match &mut self.slots[id.as_usize()] {
            Some(request) => request,
            None => panic!("get_mut on non-acquired slot"),
        }
    }

    /// True when `id` addresses a slot of this table, acquired or not.
    #[inline]
    pub fn contains(&self, id: RequestId) -> bool {
        id.as_usize() < self.slots.len()
    }

    #[inline]
    pub fn is_acquired(&self, id: RequestId) -> bool {
        self.contains(id) && self.slots[id.as_usize()].is_some()
    }

    /// Resizes a request's sector range, as the host does when coalescing a merge.
    ///
    /// # Panics
    /// If `length` is zero, exceeds [`REQUEST_SECTORS_MAX`](crate::constants::REQUEST_SECTORS_MAX)
    /// or runs past the end of the sector space.
    pub fn set_length(&mut self, id: RequestId, length: u32) {
        self.get_mut(id).set_length(length);
    }
}

impl core::fmt::Debug for RequestTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RequestTable")
            .field("capacity", &self.capacity())
            .field("in_use", &self.in_use)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::REQUEST_SECTORS_MAX;

    #[test]
    fn init_rejects_zero_capacity() {
        assert_eq!(
            RequestTable::init(0).unwrap_err(),
            Error::InvalidCapacity { capacity: 0 }
        );
    }

    #[test]
    fn init_rejects_oversized_capacity() {
        assert_eq!(
            RequestTable::init(REQUESTS_MAX + 1).unwrap_err(),
            Error::InvalidCapacity {
                capacity: REQUESTS_MAX + 1
            }
        );
    }

    #[test]
    fn acquire_hands_out_lowest_index_first() {
        let mut table = RequestTable::init(4).unwrap();

        let a = table.acquire(10, 1).unwrap();
        let b = table.acquire(20, 1).unwrap();

        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(table.in_use(), 2);
        assert_eq!(table.available(), 2);
    }

    #[test]
    fn acquire_until_exhausted() {
        let mut table = RequestTable::init(2).unwrap();

        table.acquire(0, 1).unwrap();
        table.acquire(1, 1).unwrap();

        assert!(table.is_exhausted());
        assert_eq!(
            table.acquire(2, 1).unwrap_err(),
            Error::TableExhausted { capacity: 2 }
        );
        assert_eq!(table.in_use(), 2);
    }

    #[test]
    fn rejected_request_leaves_table_usable() {
        let mut table = RequestTable::init(2).unwrap();

        assert_eq!(
            table.acquire(0, 0).unwrap_err(),
            Error::InvalidRequest {
                start_sector: 0,
                length: 0
            }
        );
        assert!(matches!(
            table.acquire(u64::MAX, 1),
            Err(Error::InvalidRequest { .. })
        ));
        assert!(matches!(
            table.acquire(0, REQUEST_SECTORS_MAX + 1),
            Err(Error::InvalidRequest { .. })
        ));

        assert_eq!(table.in_use(), 0);
        assert_eq!(table.available(), 2);

        let a = table.acquire(8, 1).unwrap();
        let b = table.acquire(16, 1).unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert!(table.is_exhausted());
    }

    #[test]
    #[should_panic(expected = "request length exceeds maximum")]
    fn panic_set_length_above_maximum() {
        let mut table = RequestTable::init(1).unwrap();
        let a = table.acquire(0, 1).unwrap();

        table.set_length(a, REQUEST_SECTORS_MAX + 1);
    }

    #[test]
    fn release_makes_slot_reusable() {
        let mut table = RequestTable::init(1).unwrap();

        let a = table.acquire(5, 2).unwrap();
        table.release(a);

        assert!(!table.is_acquired(a));
        assert_eq!(table.available(), 1);

        let b = table.acquire(7, 3).unwrap();
        assert_eq!(a, b);
        assert_eq!(table.get(b).start_sector(), 7);
    }

    #[test]
    fn set_length_updates_record() {
        let mut table = RequestTable::init(1).unwrap();
        let a = table.acquire(0, 10).unwrap();

        table.set_length(a, 15);

        assert_eq!(table.get(a).end_sector(), 15);
    }

    #[test]
    #[should_panic(expected = "release: double release detected")]
    fn panic_double_release() {
        let mut table = RequestTable::init(1).unwrap();
        let a = table.acquire(0, 1).unwrap();

        table.release(a);
        table.release(a);
    }

    #[test]
    #[should_panic(expected = "release: request still linked")]
    fn panic_release_linked() {
        let mut table = RequestTable::init(1).unwrap();
        let a = table.acquire(0, 1).unwrap();
        let link = &mut table.get_mut(a).link;
        link.linked = true;
        link.owner = Some(crate::request::QueueTag(0));

        table.release(a);
    }

    #[test]
    #[should_panic(expected = "get on non-acquired slot")]
    fn panic_get_free_slot() {
        let table = RequestTable::init(2).unwrap();
        let _ = table.get(RequestId(1));
    }

    #[test]
    #[should_panic(expected = "get: handle out of range")]
    fn panic_get_out_of_range() {
        let table = RequestTable::init(2).unwrap();
        let _ = table.get(RequestId(2));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        const PROPTEST_CASES: u32 = 16;

        proptest! {
        #![proptest_config(ProptestConfig::with_cases(
            crate::test_utils::proptest_cases(PROPTEST_CASES)
        ))]
        /// Property: in_use + available == capacity after any acquire/release sequence.
        #[test]
        fn prop_accounting_balanced(ops in prop::collection::vec(any::<bool>(), 0..100)) {
            let mut table = RequestTable::init(8).unwrap();
            let mut held: Vec<RequestId> = Vec::new();

            for (i, &acquire) in ops.iter().enumerate() {
                if acquire {
                    match table.acquire(i as u64, 1) {
                        Ok(id) => held.push(id),
                        Err(err) => prop_assert_eq!(err, Error::TableExhausted { capacity: 8 }),
                    }
                } else if let Some(id) = held.pop() {
                    table.release(id);
                }

                prop_assert_eq!(table.in_use() as usize, held.len());
                prop_assert_eq!(table.in_use() + table.available(), table.capacity());
            }
        }
        }
    }
}
