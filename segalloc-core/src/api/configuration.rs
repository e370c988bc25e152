//! The configuration of segalloc-core.
//!
//! A Configuration is a set of compile-time constants tuning the behavior of a `Heap`:
//!
//! -   How much the heap grows, at the very least, when no free block fits a request.
//! -   Which side of a split free block is handed out, depending on the size of the request.
//!
//! The layout itself (word size, alignment, minimum block size) is not configurable.

use core::{cmp, num};

use crate::internals::layout::MINIMUM_BLOCK_SIZE;

use super::{AllocationSize, ALIGNMENT, WORD_SIZE};

/// Configuration
///
/// The Configuration instance allows adjusting the heap growth and the placement policy.
pub trait Configuration {
    /// The minimum number of bytes the heap is grown by, when no free block fits a request.
    ///
    /// Rounded up to a multiple of `ALIGNMENT`, and to no less than the minimum block size.
    const CHUNK_SIZE: usize;

    /// The split threshold.
    ///
    /// When splitting a free block, allocations of an adjusted size less than or equal to the threshold are carved
    /// from the front of the block, and allocations above the threshold are carved from its back, keeping the free
    /// remainder in front.
    ///
    /// `usize::MAX` always carves from the front.
    const MIDSIZE: usize;
}

/// Properties
///
/// Properties of a given Configuration.
///
/// Work-around for the inability to implement static methods directly on a trait.
pub struct Properties<C>(C);

impl<C> Properties<C>
    where
        C: Configuration
{
    /// Returns the minimum size of a block.
    ///
    /// A free block must hold its header, the 2 links of its free list, and its footer.
    pub fn minimum_block_size() -> AllocationSize { AllocationSize::new(MINIMUM_BLOCK_SIZE) }

    /// Returns the minimum number of bytes the heap is grown by.
    ///
    /// The heap always grows by at least a block large enough to be listed as free.
    pub fn chunk_size() -> AllocationSize {
        AllocationSize::new(cmp::max(ALIGNMENT.round_up(C::CHUNK_SIZE), MINIMUM_BLOCK_SIZE))
    }

    /// Returns the adjusted size of a block able to hold `size` bytes of payload.
    ///
    /// Returns None if the adjusted size cannot be represented.
    pub fn adjusted_size(size: num::NonZeroUsize) -> Option<AllocationSize> {
        let size = size.get();

        if size <= MINIMUM_BLOCK_SIZE - WORD_SIZE {
            return Some(Self::minimum_block_size());
        }

        let with_header = size.checked_add(WORD_SIZE)?;

        ALIGNMENT.checked_round_up(with_header).map(AllocationSize::new)
    }

    /// Returns the number of bytes to grow the heap by, to fit a block of `size` bytes.
    pub fn extension_size(size: AllocationSize) -> AllocationSize { cmp::max(size, Self::chunk_size()) }

    /// Returns whether a block of `size` bytes is carved from the back of a split free block.
    pub fn places_at_back(size: AllocationSize) -> bool { size.value() > C::MIDSIZE }
}
