//! The heap checker.
//!
//! Walks the chain of blocks, then the free-list index, validating every invariant it can without trusting the
//! content of the heap: any offset read from the heap is bounds-checked before being followed.

use crate::{BlockInfo, HeapSummary, Inconsistency, Reporter, ALIGNMENT, NUMBER_BUCKETS, WORD_SIZE};
use crate::utils;

use super::arena::Arena;
use super::free_lists::FreeLists;
use super::layout::{Block, Tag, MINIMUM_BLOCK_SIZE, PROLOGUE, PROLOGUE_SIZE};
use super::segregated_heap::SegregatedHeap;

/// Checks the consistency of `heap`, reporting each inconsistency, and each block if `verbose`, to `reporter`.
///
/// An uninitialized heap is trivially consistent.
pub(crate) fn check<C, R>(heap: &SegregatedHeap<C>, verbose: bool, reporter: &mut R) -> HeapSummary
    where
        R: Reporter,
{
    let mut summary = HeapSummary::default();

    if !heap.is_initialized() {
        return summary;
    }

    let mut checker = Checker { arena: heap.arena(), free_lists: heap.free_lists(), reporter, inconsistencies: 0 };

    checker.check_prologue();
    checker.walk_chain(verbose, &mut summary);

    let listed = checker.walk_buckets();

    if listed != summary.free_blocks {
        checker.report(Inconsistency::FreeCountMismatch { walked: summary.free_blocks, listed });
    }

    summary.inconsistencies = checker.inconsistencies;
    summary
}

//
//  Implementation Details
//

const FIRST_BLOCK: usize = PROLOGUE.offset() + PROLOGUE_SIZE;

struct Checker<'a, R> {
    arena: &'a Arena,
    free_lists: &'a FreeLists,
    reporter: &'a mut R,
    inconsistencies: usize,
}

impl<'a, R> Checker<'a, R>
    where
        R: Reporter,
{
    fn report(&mut self, inconsistency: Inconsistency) {
        self.inconsistencies += 1;
        self.reporter.inconsistency(inconsistency);
    }

    //  Returns the maximum number of blocks the heap could hold, bounding any walk.
    fn step_limit(&self) -> usize { self.arena.len() / MINIMUM_BLOCK_SIZE + 1 }

    //  Reads the word at `offset`, which must be word-aligned and within bounds.
    fn read(&self, offset: usize) -> usize {
        debug_assert!(offset % WORD_SIZE == 0);
        debug_assert!(offset + WORD_SIZE <= self.arena.len());

        //  Safety:
        //  -   `offset` is word-aligned, and within the bytes in use.
        unsafe { self.arena.read(offset) }
    }

    //  Returns whether `block` may be a free block: aligned, with header and links within the heap, sentinels excluded.
    fn is_plausible(&self, block: Block) -> bool {
        let offset = block.offset();

        offset >= FIRST_BLOCK
            && utils::is_aligned_on(offset, ALIGNMENT)
            && offset + 3 * WORD_SIZE <= self.arena.len()
    }

    fn check_prologue(&mut self) {
        let header = Tag::from_raw(self.read(PROLOGUE.header_offset()));
        let footer = Tag::from_raw(self.read(PROLOGUE.offset()));

        if header.size() != PROLOGUE_SIZE || !header.is_allocated() || header != footer {
            self.report(Inconsistency::BadPrologue { header: header.raw(), footer: footer.raw() });
        }
    }

    fn walk_chain(&mut self, verbose: bool, summary: &mut HeapSummary) {
        let length = self.arena.len();

        let mut block = Block::new(FIRST_BLOCK);
        let mut prev_allocated = true;

        loop {
            let offset = block.offset();

            if offset > length {
                self.report(Inconsistency::OutOfBounds { offset });
                return;
            }

            let header = Tag::from_raw(self.read(block.header_offset()));
            let size = header.size();

            if header.is_prev_allocated() != prev_allocated {
                self.report(Inconsistency::PrevAllocatedMismatch { offset });
            }

            if !utils::is_aligned_on(offset, ALIGNMENT) {
                self.report(Inconsistency::Misaligned { offset });
            }

            if size == 0 {
                if verbose {
                    self.reporter.block(BlockInfo {
                        offset,
                        size,
                        allocated: header.is_allocated(),
                        prev_allocated: header.is_prev_allocated(),
                    });
                }

                if !header.is_allocated() || offset != length {
                    self.report(Inconsistency::BadEpilogue { offset });
                }
                return;
            }

            if size % ALIGNMENT != 0 || size < MINIMUM_BLOCK_SIZE {
                self.report(Inconsistency::BadSize { offset, size });

                if size < MINIMUM_BLOCK_SIZE {
                    return;
                }
            }

            //  The block must end before the header of the epilogue.
            if size > length - offset {
                self.report(Inconsistency::OutOfBounds { offset });
                return;
            }

            if verbose {
                self.reporter.block(BlockInfo {
                    offset,
                    size,
                    allocated: header.is_allocated(),
                    prev_allocated: header.is_prev_allocated(),
                });
            }

            summary.blocks += 1;

            if !header.is_allocated() {
                self.check_free_block(block, header, prev_allocated);

                summary.free_blocks += 1;
                summary.free_bytes += size;
            }

            prev_allocated = header.is_allocated();
            block = Block::new(offset + size);
        }
    }

    fn check_free_block(&mut self, block: Block, header: Tag, prev_allocated: bool) {
        let offset = block.offset();

        let footer = Tag::from_raw(self.read(offset + header.size() - 2 * WORD_SIZE));

        if footer != header {
            self.report(Inconsistency::TagMismatch { offset, header: header.raw(), footer: footer.raw() });
        }

        if !prev_allocated {
            self.report(Inconsistency::AdjacentFree { offset });
        }

        if !self.is_listed(block, FreeLists::bucket_for(header.size())) {
            self.report(Inconsistency::Unlisted { offset });
        }
    }

    fn is_listed(&self, block: Block, bucket: usize) -> bool {
        let mut current = self.free_lists.head(bucket);

        for _ in 0..self.step_limit() {
            let candidate = match current {
                Some(candidate) if self.is_plausible(candidate) => candidate,
                _ => return false,
            };

            if candidate == block {
                return true;
            }

            current = Self::decode(self.read(candidate.offset() + WORD_SIZE));
        }

        false
    }

    //  Returns the number of blocks listed, across all buckets.
    fn walk_buckets(&mut self) -> usize {
        (0..NUMBER_BUCKETS).map(|bucket| self.walk_bucket(bucket)).sum()
    }

    fn walk_bucket(&mut self, bucket: usize) -> usize {
        let limit = self.step_limit();

        let mut listed = 0;
        let mut previous: Option<Block> = None;
        let mut previous_size = 0;
        let mut current = self.free_lists.head(bucket);

        while let Some(block) = current {
            let offset = block.offset();

            if listed == limit || !self.is_plausible(block) {
                self.report(Inconsistency::BrokenLink { offset, bucket });
                break;
            }

            let header = Tag::from_raw(self.read(block.header_offset()));

            if header.is_allocated() {
                self.report(Inconsistency::ListedAllocated { offset, bucket });
                break;
            }

            let size = header.size();

            if size == 0 || FreeLists::bucket_for(size) != bucket {
                self.report(Inconsistency::WrongBucket { offset, bucket });
            }

            if size < previous_size {
                self.report(Inconsistency::Unsorted { offset, bucket });
            }

            if Self::decode(self.read(offset)) != previous {
                self.report(Inconsistency::BrokenLink { offset, bucket });
            }

            listed += 1;
            previous = Some(block);
            previous_size = size;
            current = Self::decode(self.read(offset + WORD_SIZE));
        }

        listed
    }

    fn decode(raw: usize) -> Option<Block> {
        if raw == 0 { None } else { Some(Block::new_unchecked(raw)) }
    }
}
