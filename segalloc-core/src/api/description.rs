//! Description of various properties of the heap and its allocations.

use core::{fmt, mem};

pub use crate::utils::PowerOf2;

/// The size of a word, in bytes.
///
/// Headers and footers are each a single word.
pub const WORD_SIZE: usize = mem::size_of::<usize>();

/// The alignment of every payload handed out, a double word.
//  Safety:
//  -   Twice a power of 2 is a power of 2.
pub const ALIGNMENT: PowerOf2 = unsafe { PowerOf2::new_unchecked(2 * WORD_SIZE) };

/// The number of buckets of the free-list index.
pub const NUMBER_BUCKETS: usize = 29;

/// AllocationSize
///
/// The effective size of a given block: header, payload, and padding.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct AllocationSize(usize);

impl AllocationSize {
    /// Creates a new instance with a specific value.
    pub const fn new(value: usize) -> Self { Self(value) }

    /// Returns the underlying value.
    pub const fn value(&self) -> usize { self.0 }
}

/// OutOfMemory
///
/// The platform could not grow the heap sufficiently to satisfy a request.
///
/// The heap remains consistent, and smaller requests may still succeed.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub struct OutOfMemory;

impl fmt::Display for OutOfMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("out of memory") }
}

/// HeapStatistics
///
/// A snapshot of the heap occupancy, as seen by the free-list index.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub struct HeapStatistics {
    /// Number of bytes obtained from the platform, and in use by the heap.
    pub heap_size: usize,
    /// Number of free blocks.
    pub free_blocks: usize,
    /// Total size of the free blocks, metadata included.
    pub free_bytes: usize,
    /// Number of free blocks in each bucket.
    pub buckets: [usize; NUMBER_BUCKETS],
}
