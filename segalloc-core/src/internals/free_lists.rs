//! The free-list index.
//!
//! Free blocks are segregated by size into buckets, bucket `i` holding blocks whose size lies in `[2^(i+4), 2^(i+5))`,
//! with the last bucket also holding anything larger.
//!
//! Within a bucket, blocks form a doubly-linked list sorted by ascending size, hence the first fit within a bucket is
//! also the best fit within this bucket.

use crate::NUMBER_BUCKETS;
use crate::utils;

use super::{arena::Arena, layout::Block};

/// FreeLists.
///
/// The links are stored within the payload of the free blocks themselves, only the heads are stored here.
pub(crate) struct FreeLists {
    heads: [Option<Block>; NUMBER_BUCKETS],
}

impl FreeLists {
    /// Creates an empty instance.
    pub(crate) const fn new() -> Self { Self { heads: [None; NUMBER_BUCKETS] } }

    /// Returns the bucket in which a free block of `size` bytes belongs.
    pub(crate) fn bucket_for(size: usize) -> usize {
        debug_assert!(size > 0);

        let log2 = utils::floor_log2(size);

        core::cmp::min(log2.saturating_sub(4), NUMBER_BUCKETS - 1)
    }

    /// Returns the head of the list of `bucket`, if any.
    pub(crate) fn head(&self, bucket: usize) -> Option<Block> { self.heads[bucket] }

    /// Overrides the head of `bucket`, for corrupting the index under test.
    #[cfg(test)]
    pub(crate) fn set_head(&mut self, bucket: usize, head: Option<Block>) { self.heads[bucket] = head; }

    /// Returns an iterator over the blocks of `bucket`, in list order.
    ///
    /// #   Safety
    ///
    /// -   Assumes that the lists are well-formed, and not modified while iterating.
    pub(crate) unsafe fn blocks<'a>(&self, arena: &'a Arena, bucket: usize) -> Blocks<'a> {
        Blocks { arena, next: self.heads[bucket] }
    }

    /// Inserts `block` in its bucket, before the first block of greater or equal size.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `block` is free, and its tags up to date.
    /// -   Assumes that `block` is not already present.
    pub(crate) unsafe fn insert(&mut self, arena: &mut Arena, block: Block) {
        let size = block.size(arena);
        let bucket = Self::bucket_for(size);

        let head = match self.heads[bucket] {
            Some(head) => head,
            None => {
                block.set_predecessor(arena, None);
                block.set_successor(arena, None);
                self.heads[bucket] = Some(block);
                return;
            },
        };

        if size <= head.size(arena) {
            block.set_predecessor(arena, None);
            block.set_successor(arena, Some(head));
            head.set_predecessor(arena, Some(block));
            self.heads[bucket] = Some(block);
            return;
        }

        //  Invariant: `current` is strictly smaller than `block`.
        let mut current = head;

        loop {
            match current.successor(arena) {
                Some(next) if next.size(arena) < size => current = next,
                next => {
                    block.set_predecessor(arena, Some(current));
                    block.set_successor(arena, next);

                    if let Some(next) = next {
                        next.set_predecessor(arena, Some(block));
                    }

                    current.set_successor(arena, Some(block));
                    return;
                },
            }
        }
    }

    /// Removes `block` from its bucket.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `block` is present, and that its size has not changed since its insertion.
    pub(crate) unsafe fn remove(&mut self, arena: &mut Arena, block: Block) {
        let predecessor = block.predecessor(arena);
        let successor = block.successor(arena);

        match predecessor {
            Some(predecessor) => predecessor.set_successor(arena, successor),
            None => {
                let bucket = Self::bucket_for(block.size(arena));

                debug_assert_eq!(Some(block), self.heads[bucket]);

                self.heads[bucket] = successor;
            },
        }

        if let Some(successor) = successor {
            successor.set_predecessor(arena, predecessor);
        }
    }

    /// Returns the first block of at least `size` bytes, searching from the bucket of `size` upward.
    ///
    /// #   Safety
    ///
    /// -   Assumes that the lists are well-formed.
    pub(crate) unsafe fn find_fit(&self, arena: &Arena, size: usize) -> Option<Block> {
        for bucket in Self::bucket_for(size)..NUMBER_BUCKETS {
            let fit = self.blocks(arena, bucket).find(|block| block.size(arena) >= size);

            if fit.is_some() {
                return fit;
            }
        }

        None
    }
}

/// Iterator over the blocks of a bucket.
pub(crate) struct Blocks<'a> {
    arena: &'a Arena,
    next: Option<Block>,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Block;

    fn next(&mut self) -> Option<Block> {
        let current = self.next?;

        //  Safety:
        //  -   The lists are well-formed, as per the pre-conditions of `FreeLists::blocks`.
        self.next = unsafe { current.successor(self.arena) };

        Some(current)
    }
}
