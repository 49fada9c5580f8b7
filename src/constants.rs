//! Scheduler and request-table constants.
//!
//! # Design Decisions
//!
//! Counts use `u32` instead of `usize` so handles and lengths have the same width on
//! every platform. All invariants are verified at compile time via `const` assertions.

// =============================================================================
// Platform verification
// =============================================================================

// Compile-time proof that u32 -> usize is safe on this platform.
const _: () = assert!(
    size_of::<usize>() >= size_of::<u32>(),
    "Platform must have at least 32-bit addressing"
);

// =============================================================================
// Geometry
// =============================================================================

/// Logical sector size in bytes. Requests are positioned and sized in sectors.
pub const SECTOR_SIZE: u32 = 512;

/// Largest single request, in sectors (1 MiB of data).
pub const REQUEST_SECTORS_MAX: u32 = (1 << 20) / SECTOR_SIZE;

// =============================================================================
// Queue limits
// =============================================================================

/// Upper bound on request records a single [`RequestTable`](crate::table::RequestTable)
/// may hold. Insertion is a linear scan, so this is also the scalability ceiling.
pub const REQUESTS_MAX: u32 = 1 << 16;

/// Default per-device queue depth for [`QueueConfig`](crate::block_queue::QueueConfig).
pub const QUEUE_DEPTH_DEFAULT: u32 = 128;

/// Name under which the SSTF elevator registers.
pub const SSTF_NAME: &str = "sstf";

// =============================================================================
// Compile-time design integrity assertions
// =============================================================================

const _: () = assert!(SECTOR_SIZE > 0);
const _: () = assert!(
    SECTOR_SIZE.is_power_of_two(),
    "Sector size must be power of two for alignment arithmetic"
);

const _: () = assert!(REQUEST_SECTORS_MAX > 0);

const _: () = assert!(REQUESTS_MAX > 0);
// Every RequestId index must fit in u32 with room for `capacity` itself.
const _: () = assert!(REQUESTS_MAX < u32::MAX);

const _: () = assert!(QUEUE_DEPTH_DEFAULT > 0);
const _: () = assert!(QUEUE_DEPTH_DEFAULT <= REQUESTS_MAX);

const _: () = assert!(!SSTF_NAME.is_empty());
