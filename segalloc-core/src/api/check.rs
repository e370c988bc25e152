//! Consistency checks of the heap.
//!
//! The checker walks the chain of blocks, from prologue to epilogue, then each bucket of the free-list index, and
//! reports what it finds through a `Reporter`. It is a diagnostic tool, not meant for the allocation path.

use core::fmt;

/// BlockInfo
///
/// The state of a block, as recorded in its header.
///
/// The epilogue, ending the chain, is reported as an allocated block of size 0.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct BlockInfo {
    /// Offset of the payload, from the base of the heap.
    pub offset: usize,
    /// Size of the block, metadata included.
    pub size: usize,
    /// Whether the block is allocated.
    pub allocated: bool,
    /// Whether the preceding block is allocated, as recorded in the header.
    pub prev_allocated: bool,
}

impl BlockInfo {
    /// Returns whether this is the epilogue, ending the chain.
    pub fn is_epilogue(&self) -> bool { self.size == 0 }
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_epilogue() {
            return write!(f, "{:#x}: EOL", self.offset);
        }

        let state = if self.allocated { 'a' } else { 'f' };
        let prev = if self.prev_allocated { 'a' } else { 'f' };

        write!(f, "{:#x}: [{}:{}] prev: [{}]", self.offset, self.size, state, prev)
    }
}

/// Inconsistency
///
/// A violation of the invariants of the heap. Offsets are those of the payload of the block at fault.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Inconsistency {
    /// The prologue is not an allocated block of 2 words, with a matching footer.
    BadPrologue {
        /// Raw header of the prologue.
        header: usize,
        /// Raw footer of the prologue.
        footer: usize,
    },
    /// The chain does not end with an allocated block of size 0, at the very end of the heap.
    BadEpilogue {
        /// Offset at which the chain ended.
        offset: usize,
    },
    /// The chain runs past the end of the heap.
    OutOfBounds {
        /// Offset of the block overflowing the heap.
        offset: usize,
    },
    /// The payload of a block is not aligned.
    Misaligned {
        /// Offset of the block.
        offset: usize,
    },
    /// The size of a block is not a multiple of the alignment, or below the minimum.
    BadSize {
        /// Offset of the block.
        offset: usize,
        /// Size of the block.
        size: usize,
    },
    /// The header and footer of a free block differ.
    TagMismatch {
        /// Offset of the block.
        offset: usize,
        /// Raw header.
        header: usize,
        /// Raw footer.
        footer: usize,
    },
    /// The prev_allocated bit of a block does not reflect the state of its predecessor.
    PrevAllocatedMismatch {
        /// Offset of the block.
        offset: usize,
    },
    /// A free block follows another free block.
    AdjacentFree {
        /// Offset of the second block.
        offset: usize,
    },
    /// A free block is absent from its bucket.
    Unlisted {
        /// Offset of the block.
        offset: usize,
    },
    /// An allocated block is listed in a bucket.
    ListedAllocated {
        /// Offset of the block.
        offset: usize,
        /// Bucket listing the block.
        bucket: usize,
    },
    /// A free block is listed in the wrong bucket.
    WrongBucket {
        /// Offset of the block.
        offset: usize,
        /// Bucket listing the block.
        bucket: usize,
    },
    /// A bucket is not sorted by ascending size.
    Unsorted {
        /// Offset of the first block out of order.
        offset: usize,
        /// Bucket at fault.
        bucket: usize,
    },
    /// The links of a bucket are inconsistent: predecessor mismatch, dangling link, or cycle.
    BrokenLink {
        /// Offset of the block at which the issue was detected.
        offset: usize,
        /// Bucket at fault.
        bucket: usize,
    },
    /// The number of free blocks in the chain and in the buckets differ.
    FreeCountMismatch {
        /// Number of free blocks in the chain.
        walked: usize,
        /// Number of blocks in the buckets.
        listed: usize,
    },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Inconsistency::*;

        match *self {
            BadPrologue { header, footer } => write!(f, "bad prologue: header {:#x}, footer {:#x}", header, footer),
            BadEpilogue { offset } => write!(f, "bad epilogue header at {:#x}", offset),
            OutOfBounds { offset } => write!(f, "block at {:#x} runs past the end of the heap", offset),
            Misaligned { offset } => write!(f, "block at {:#x} is not aligned", offset),
            BadSize { offset, size } => write!(f, "block at {:#x} has invalid size {}", offset, size),
            TagMismatch { offset, header, footer } =>
                write!(f, "block at {:#x}: header {:#x} does not match footer {:#x}", offset, header, footer),
            PrevAllocatedMismatch { offset } =>
                write!(f, "block at {:#x}: prev_allocated bit does not match its predecessor", offset),
            AdjacentFree { offset } => write!(f, "block at {:#x} and its predecessor are both free", offset),
            Unlisted { offset } => write!(f, "free block at {:#x} is not listed", offset),
            ListedAllocated { offset, bucket } =>
                write!(f, "allocated block at {:#x} is listed in bucket {}", offset, bucket),
            WrongBucket { offset, bucket } => write!(f, "block at {:#x} is listed in wrong bucket {}", offset, bucket),
            Unsorted { offset, bucket } => write!(f, "bucket {} is unsorted at {:#x}", bucket, offset),
            BrokenLink { offset, bucket } => write!(f, "bucket {} has a broken link at {:#x}", bucket, offset),
            FreeCountMismatch { walked, listed } =>
                write!(f, "{} free blocks in the heap, but {} listed", walked, listed),
        }
    }
}

/// Reporter
///
/// Receives the findings of a consistency check.
pub trait Reporter {
    /// Receives each block of the chain, in order, then the epilogue, when checking verbosely.
    fn block(&mut self, _block: BlockInfo) {}

    /// Receives each inconsistency detected.
    fn inconsistency(&mut self, inconsistency: Inconsistency);
}

/// Discards all findings; the summary still counts them.
impl Reporter for () {
    fn inconsistency(&mut self, _: Inconsistency) {}
}

/// HeapSummary
///
/// The outcome of a consistency check.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Hash)]
pub struct HeapSummary {
    /// Number of blocks in the chain, sentinels excluded.
    pub blocks: usize,
    /// Number of free blocks in the chain.
    pub free_blocks: usize,
    /// Total size of the free blocks in the chain.
    pub free_bytes: usize,
    /// Number of inconsistencies reported.
    pub inconsistencies: usize,
}

impl HeapSummary {
    /// Returns whether no inconsistency was reported.
    pub fn is_consistent(&self) -> bool { self.inconsistencies == 0 }
}
