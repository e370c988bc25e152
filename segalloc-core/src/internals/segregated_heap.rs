//! The Segregated Heap.
//!
//! The engine of the allocator: a chain of blocks delimited by boundary tags, whose free blocks are indexed by size in
//! segregated free lists.
//!
//! Invariants, outside of a call:
//!
//! -   The chain starts with the prologue, and ends with the epilogue, both allocated.
//! -   No two physically adjacent blocks are free.
//! -   The prev_allocated bit of each block reflects the state of its predecessor.
//! -   Each free block has identical header and footer, and is listed exactly once, in the bucket of its size.

use core::{cmp, marker, num};

use crate::{AllocationSize, Configuration, HeapStatistics, OutOfMemory, Platform, Properties, NUMBER_BUCKETS, WORD_SIZE};

use super::arena::Arena;
use super::free_lists::FreeLists;
use super::layout::{Block, Tag, MINIMUM_BLOCK_SIZE, PROLOGUE, PROLOGUE_SIZE, SENTINELS_SIZE};

/// SegregatedHeap.
pub(crate) struct SegregatedHeap<C> {
    arena: Arena,
    free_lists: FreeLists,
    _configuration: marker::PhantomData<fn() -> C>,
}

impl<C> SegregatedHeap<C> {
    /// Creates an uninitialized instance.
    pub(crate) const fn new() -> Self {
        Self { arena: Arena::new(), free_lists: FreeLists::new(), _configuration: marker::PhantomData }
    }

    /// Returns whether the sentinels are in place.
    pub(crate) fn is_initialized(&self) -> bool { self.arena.len() >= SENTINELS_SIZE }

    /// Returns the arena.
    pub(crate) fn arena(&self) -> &Arena { &self.arena }

    /// Returns the free-list index.
    pub(crate) fn free_lists(&self) -> &FreeLists { &self.free_lists }

    /// Returns the number of payload bytes of an allocated block.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `block` is allocated.
    pub(crate) unsafe fn usable_size(&self, block: Block) -> usize { block.size(&self.arena) - WORD_SIZE }

    /// Returns the occupancy of the heap.
    pub(crate) fn statistics(&self) -> HeapStatistics {
        let mut statistics = HeapStatistics { heap_size: self.arena.len(), ..HeapStatistics::default() };

        for bucket in 0..NUMBER_BUCKETS {
            //  Safety:
            //  -   The lists are well-formed outside of calls.
            for block in unsafe { self.free_lists.blocks(&self.arena, bucket) } {
                statistics.free_blocks += 1;
                statistics.free_bytes += unsafe { block.size(&self.arena) };
                statistics.buckets[bucket] += 1;
            }
        }

        statistics
    }

    /// Returns the arena and the free-list index, for corrupting a heap under test.
    #[cfg(test)]
    pub(crate) fn parts_mut(&mut self) -> (&mut Arena, &mut FreeLists) { (&mut self.arena, &mut self.free_lists) }

    /// Deallocates a block, coalescing it with its free neighbours.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `block` is allocated.
    pub(crate) unsafe fn deallocate(&mut self, block: Block) {
        let header = block.header(&self.arena);

        debug_assert!(header.is_allocated(), "Double free of {:?}", block);

        block.set_tags(&mut self.arena, Tag::new(header.size(), false, header.is_prev_allocated()));
        block.next(&self.arena).set_prev_allocated(&mut self.arena, false);

        self.coalesce(block);
    }

    //  Merges the free, unlisted, `block` with its free neighbours, then lists the result.
    //
    //  The successor of `block` must already know its predecessor is free.
    unsafe fn coalesce(&mut self, block: Block) -> Block {
        let header = block.header(&self.arena);
        let next = block.next(&self.arena);
        let next_tag = next.header(&self.arena);

        debug_assert!(!header.is_allocated());
        debug_assert!(!next_tag.is_prev_allocated());

        let (start, size) = match (header.is_prev_allocated(), next_tag.is_allocated()) {
            (true, true) => (block, header.size()),
            (true, false) => {
                self.free_lists.remove(&mut self.arena, next);

                (block, header.size() + next_tag.size())
            },
            (false, true) => {
                let prev = block.prev(&self.arena);
                self.free_lists.remove(&mut self.arena, prev);

                (prev, prev.size(&self.arena) + header.size())
            },
            (false, false) => {
                let prev = block.prev(&self.arena);
                self.free_lists.remove(&mut self.arena, prev);
                self.free_lists.remove(&mut self.arena, next);

                (prev, prev.size(&self.arena) + header.size() + next_tag.size())
            },
        };

        let prev_allocated = start.header(&self.arena).is_prev_allocated();

        start.set_tags(&mut self.arena, Tag::new(size, false, prev_allocated));
        self.free_lists.insert(&mut self.arena, start);

        start
    }
}

impl<C> SegregatedHeap<C>
    where
        C: Configuration,
{
    /// Initializes the heap: empties the free-list index, lays out the sentinels, and grows by a chunk.
    ///
    /// Re-initializing discards every block, reusing the memory already obtained from the platform.
    ///
    /// The sentinels may be in place even on failure, in which case the heap is usable, if empty.
    pub(crate) fn initialize<P>(&mut self, platform: &P) -> Result<(), OutOfMemory>
        where
            P: Platform,
    {
        self.free_lists = FreeLists::new();
        self.arena.reset();

        let start = self.arena.extend(platform, SENTINELS_SIZE)?;
        debug_assert_eq!(0, start);

        let prologue = Tag::new(PROLOGUE_SIZE, true, true);

        //  Safety:
        //  -   The 4 words written are within the bytes in use.
        unsafe {
            self.arena.write(0, 0);
            self.arena.write(PROLOGUE.header_offset(), prologue.raw());
            self.arena.write(PROLOGUE.offset(), prologue.raw());
            PROLOGUE.next(&self.arena).set_header(&mut self.arena, Tag::new(0, true, true));
        }

        self.extend(platform, Properties::<C>::chunk_size())?;

        Ok(())
    }

    /// Allocates a block with at least `size` bytes of payload.
    ///
    /// Returns None if `size` is 0, initializing the heap first if need be.
    pub(crate) fn allocate<P>(&mut self, platform: &P, size: usize) -> Result<Option<Block>, OutOfMemory>
        where
            P: Platform,
    {
        let size = match num::NonZeroUsize::new(size) {
            Some(size) => size,
            None => return Ok(None),
        };

        if !self.is_initialized() {
            self.initialize(platform)?;
        }

        let size = Properties::<C>::adjusted_size(size).ok_or(OutOfMemory)?;

        self.allocate_adjusted(platform, size).map(Some)
    }

    /// Resizes a block to hold at least `size` bytes of payload, in place if possible.
    ///
    /// On failure, the block is left untouched.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `block` is allocated.
    pub(crate) unsafe fn reallocate<P>(&mut self, platform: &P, block: Block, size: num::NonZeroUsize)
        -> Result<Block, OutOfMemory>
        where
            P: Platform,
    {
        let size = Properties::<C>::adjusted_size(size).ok_or(OutOfMemory)?.value();

        let header = block.header(&self.arena);
        let current = header.size();

        debug_assert!(header.is_allocated(), "Reallocation of free {:?}", block);

        //  Shrink, giving back the tail if large enough to form a block.
        if size <= current {
            if current - size >= MINIMUM_BLOCK_SIZE {
                block.set_header(&mut self.arena, Tag::new(size, true, header.is_prev_allocated()));

                let rest = block.next(&self.arena);
                rest.set_tags(&mut self.arena, Tag::new(current - size, false, true));
                rest.next(&self.arena).set_prev_allocated(&mut self.arena, false);

                self.coalesce(rest);
            }

            return Ok(block);
        }

        //  Grow in place, absorbing the next block if free and large enough.
        let next = block.next(&self.arena);
        let next_tag = next.header(&self.arena);

        if !next_tag.is_allocated() && current + next_tag.size() >= size {
            self.free_lists.remove(&mut self.arena, next);

            let total = current + next_tag.size();

            if total - size >= MINIMUM_BLOCK_SIZE {
                block.set_header(&mut self.arena, Tag::new(size, true, header.is_prev_allocated()));

                let rest = block.next(&self.arena);
                rest.set_tags(&mut self.arena, Tag::new(total - size, false, true));

                self.free_lists.insert(&mut self.arena, rest);
            } else {
                block.set_header(&mut self.arena, Tag::new(total, true, header.is_prev_allocated()));
                block.next(&self.arena).set_prev_allocated(&mut self.arena, true);
            }

            return Ok(block);
        }

        //  Relocate.
        let fresh = self.allocate_adjusted(platform, AllocationSize::new(size))?;

        let count = cmp::min(current, fresh.size(&self.arena)) - WORD_SIZE;
        self.arena.copy(block.offset(), fresh.offset(), count);

        self.deallocate(block);

        Ok(fresh)
    }

    //  Allocates a block of `size` bytes, growing the heap if no free block fits.
    fn allocate_adjusted<P>(&mut self, platform: &P, size: AllocationSize) -> Result<Block, OutOfMemory>
        where
            P: Platform,
    {
        //  Safety:
        //  -   The lists are well-formed outside of calls.
        let fit = unsafe { self.free_lists.find_fit(&self.arena, size.value()) };

        let block = match fit {
            Some(block) => block,
            None => self.extend(platform, Properties::<C>::extension_size(size))?,
        };

        //  Safety:
        //  -   `block` is free, listed, and of at least `size` bytes.
        Ok(unsafe { self.place(block, size) })
    }

    //  Grows the heap by `size` bytes, turning the former epilogue into the header of a new free block.
    //
    //  Returns the new free block, after coalescing with its predecessor.
    fn extend<P>(&mut self, platform: &P, size: AllocationSize) -> Result<Block, OutOfMemory>
        where
            P: Platform,
    {
        let start = self.arena.extend(platform, size.value())?;

        //  Safety:
        //  -   The former epilogue header lies just before `start`, and the new epilogue at the end of the arena.
        unsafe {
            let block = Block::new(start);
            let epilogue = block.header(&self.arena);

            block.set_tags(&mut self.arena, Tag::new(size.value(), false, epilogue.is_prev_allocated()));
            block.next(&self.arena).set_header(&mut self.arena, Tag::new(0, true, false));

            Ok(self.coalesce(block))
        }
    }

    //  Carves a block of `size` bytes out of the free `block`, returning the allocated block.
    //
    //  The remainder, if large enough, is kept as a free block: after the allocated block for sizes up to the
    //  midsize, before it otherwise.
    unsafe fn place(&mut self, block: Block, size: AllocationSize) -> Block {
        let size = size.value();
        let header = block.header(&self.arena);
        let total = header.size();

        debug_assert!(!header.is_allocated());
        debug_assert!(total >= size, "{} < {}", total, size);

        self.free_lists.remove(&mut self.arena, block);

        let remainder = total - size;

        if remainder < MINIMUM_BLOCK_SIZE {
            block.set_header(&mut self.arena, Tag::new(total, true, header.is_prev_allocated()));
            block.next(&self.arena).set_prev_allocated(&mut self.arena, true);

            return block;
        }

        if !Properties::<C>::places_at_back(AllocationSize::new(size)) {
            block.set_header(&mut self.arena, Tag::new(size, true, header.is_prev_allocated()));

            let rest = block.next(&self.arena);
            rest.set_tags(&mut self.arena, Tag::new(remainder, false, true));
            self.free_lists.insert(&mut self.arena, rest);

            return block;
        }

        block.set_tags(&mut self.arena, Tag::new(remainder, false, header.is_prev_allocated()));
        self.free_lists.insert(&mut self.arena, block);

        let allocated = block.next(&self.arena);
        allocated.set_header(&mut self.arena, Tag::new(size, true, false));
        allocated.next(&self.arena).set_prev_allocated(&mut self.arena, true);

        allocated
    }
}

#[cfg(test)]
mod tests {

use super::*;

use crate::internals::checker;
use crate::internals::test::{FrontConfiguration, HeapStore, TestHeap, TestPlatform};

fn assert_consistent<C>(heap: &SegregatedHeap<C>) {
    let mut findings = crate::internals::test::Findings::default();
    let summary = checker::check(heap, false, &mut findings);

    assert_eq!(0, findings.count(), "{:?}", findings.get(0));
    assert!(summary.is_consistent());
}

fn allocate<C: Configuration>(heap: &mut SegregatedHeap<C>, platform: &TestPlatform, size: usize) -> Block {
    heap.allocate(platform, size).expect("Enough memory").expect("Non-zero size")
}

fn size_of<C>(heap: &SegregatedHeap<C>, block: Block) -> usize { unsafe { block.size(heap.arena()) } }

fn is_allocated<C>(heap: &SegregatedHeap<C>, block: Block) -> bool {
    unsafe { block.header(heap.arena()).is_allocated() }
}

#[test]
fn segregated_heap_initialize() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = TestHeap::new();
    assert!(!heap.is_initialized());

    heap.initialize(&platform).expect("Enough memory");

    assert!(heap.is_initialized());
    assert_consistent(&heap);

    let chunk = Properties::<crate::internals::test::TestConfiguration>::chunk_size().value();
    let statistics = heap.statistics();

    assert_eq!(SENTINELS_SIZE + chunk, statistics.heap_size);
    assert_eq!(1, statistics.free_blocks);
    assert_eq!(chunk, statistics.free_bytes);
    assert_eq!(1, statistics.buckets[FreeLists::bucket_for(chunk)]);
}

#[test]
fn segregated_heap_initialize_failure() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);
    platform.set_limit(SENTINELS_SIZE);

    let mut heap = TestHeap::new();

    assert_eq!(Err(OutOfMemory), heap.initialize(&platform));

    //  The sentinels are in place, hence the heap is usable, if empty.
    assert!(heap.is_initialized());
    assert_consistent(&heap);
    assert_eq!(Err(OutOfMemory), heap.allocate(&platform, 1));
    assert_consistent(&heap);
}

#[test]
fn segregated_heap_reinitialize() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = TestHeap::new();
    heap.initialize(&platform).expect("Enough memory");

    let first = allocate(&mut heap, &platform, 100);
    let _ = allocate(&mut heap, &platform, 10_000);

    let used = platform.used();

    heap.initialize(&platform).expect("Enough memory");
    assert_consistent(&heap);

    //  The memory previously obtained is reused, rather than obtained anew.
    assert_eq!(used, platform.used());
    assert_eq!(1, heap.statistics().free_blocks);

    assert_eq!(first, allocate(&mut heap, &platform, 100));
}

#[test]
fn segregated_heap_allocate_zero() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = TestHeap::new();

    assert_eq!(Ok(None), heap.allocate(&platform, 0));

    //  No initialization for a spurious request.
    assert!(!heap.is_initialized());
    assert_eq!(0, platform.used());
}

#[test]
fn segregated_heap_allocate_lazily_initializes() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = TestHeap::new();

    let block = allocate(&mut heap, &platform, 24);

    assert!(heap.is_initialized());
    assert_eq!(MINIMUM_BLOCK_SIZE, size_of(&heap, block));
    assert_consistent(&heap);
}

#[test]
fn segregated_heap_allocate_front_placement() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = TestHeap::new();
    heap.initialize(&platform).expect("Enough memory");

    let first = PROLOGUE.offset() + PROLOGUE_SIZE;

    //  Small requests are carved from the front, one after another.
    let a = allocate(&mut heap, &platform, 100);
    let b = allocate(&mut heap, &platform, 8);

    assert_eq!(first, a.offset());
    assert_eq!(first + 112, b.offset());
    assert_eq!(112, size_of(&heap, a));
    assert_eq!(32, size_of(&heap, b));

    assert_consistent(&heap);
}

#[test]
fn segregated_heap_allocate_back_placement() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = TestHeap::new();
    heap.initialize(&platform).expect("Enough memory");

    let end = heap.arena().len() - WORD_SIZE;

    //  Large requests are carved from the back, leaving the free remainder in front.
    let a = allocate(&mut heap, &platform, 1000);

    assert_eq!(1008, size_of(&heap, a));
    assert_eq!(end, a.offset() + size_of(&heap, a) - WORD_SIZE);

    let b = allocate(&mut heap, &platform, 1000);

    assert_eq!(a.offset() - 1008, b.offset());

    assert_consistent(&heap);
}

#[test]
fn segregated_heap_allocate_front_only() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = SegregatedHeap::<FrontConfiguration>::new();
    heap.initialize(&platform).expect("Enough memory");

    let first = PROLOGUE.offset() + PROLOGUE_SIZE;

    let a = allocate(&mut heap, &platform, 1000);

    assert_eq!(first, a.offset());
    assert_consistent(&heap);
}

#[test]
fn segregated_heap_allocate_whole_block() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = TestHeap::new();
    heap.initialize(&platform).expect("Enough memory");

    let chunk = heap.statistics().free_bytes;

    //  A remainder of 16 bytes cannot form a block: the whole block is handed out.
    let a = allocate(&mut heap, &platform, chunk - WORD_SIZE - 16);

    assert_eq!(chunk, size_of(&heap, a));
    assert_eq!(0, heap.statistics().free_blocks);

    assert_consistent(&heap);
}

#[test]
fn segregated_heap_allocate_extends() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = TestHeap::new();
    heap.initialize(&platform).expect("Enough memory");

    let calls = platform.calls();

    //  Larger than a chunk: the heap is grown by exactly the adjusted size, merged with the free chunk.
    let a = allocate(&mut heap, &platform, 10_000);

    assert_eq!(calls + 1, platform.calls());
    assert_eq!(10_016, size_of(&heap, a));

    assert_consistent(&heap);
}

#[test]
fn segregated_heap_allocate_out_of_memory() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = TestHeap::new();
    heap.initialize(&platform).expect("Enough memory");

    let a = allocate(&mut heap, &platform, 100);

    assert_eq!(Err(OutOfMemory), heap.allocate(&platform, HeapStore::CAPACITY));
    assert_eq!(Err(OutOfMemory), heap.allocate(&platform, usize::MAX));
    assert_eq!(Err(OutOfMemory), heap.allocate(&platform, usize::MAX - 64));

    assert_consistent(&heap);

    //  Smaller requests still succeed.
    let b = allocate(&mut heap, &platform, 100);
    assert_ne!(a, b);

    assert_consistent(&heap);
}

#[test]
fn segregated_heap_deallocate_coalesce_cases() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = SegregatedHeap::<FrontConfiguration>::new();
    heap.initialize(&platform).expect("Enough memory");

    let blocks = [
        allocate(&mut heap, &platform, 40),
        allocate(&mut heap, &platform, 40),
        allocate(&mut heap, &platform, 40),
        allocate(&mut heap, &platform, 40),
        allocate(&mut heap, &platform, 40),
    ];

    let initial = heap.statistics().free_blocks;

    unsafe {
        //  Both neighbours allocated.
        heap.deallocate(blocks[1]);
        assert_eq!(initial + 1, heap.statistics().free_blocks);
        assert_consistent(&heap);

        //  Previous free.
        heap.deallocate(blocks[2]);
        assert_eq!(initial + 1, heap.statistics().free_blocks);
        assert_eq!(96, size_of(&heap, blocks[1]));
        assert_consistent(&heap);

        //  Next free.
        heap.deallocate(blocks[0]);
        assert_eq!(initial + 1, heap.statistics().free_blocks);
        assert_eq!(144, size_of(&heap, blocks[0]));
        assert_consistent(&heap);

        //  Both free: the last block merges with everything, the tail of the chunk included.
        heap.deallocate(blocks[4]);
        assert_eq!(initial + 1, heap.statistics().free_blocks);
        heap.deallocate(blocks[3]);
        assert_eq!(1, heap.statistics().free_blocks);
        assert_consistent(&heap);
    }
}

#[test]
fn segregated_heap_reallocate_shrink() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = SegregatedHeap::<FrontConfiguration>::new();
    heap.initialize(&platform).expect("Enough memory");

    let a = allocate(&mut heap, &platform, 200);
    let _guard = allocate(&mut heap, &platform, 8);

    unsafe {
        //  Too small a difference to split.
        let b = heap.reallocate(&platform, a, num::NonZeroUsize::new(180).unwrap()).unwrap();
        assert_eq!(a, b);
        assert_eq!(208, size_of(&heap, a));

        //  Split, the tail becoming free.
        let b = heap.reallocate(&platform, a, num::NonZeroUsize::new(100).unwrap()).unwrap();
        assert_eq!(a, b);
        assert_eq!(112, size_of(&heap, a));

        let rest = a.next(heap.arena());
        assert!(!is_allocated(&heap, rest));
        assert_eq!(96, size_of(&heap, rest));
    }

    assert_consistent(&heap);
}

#[test]
fn segregated_heap_reallocate_shrink_coalesces() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = SegregatedHeap::<FrontConfiguration>::new();
    heap.initialize(&platform).expect("Enough memory");

    let a = allocate(&mut heap, &platform, 200);

    unsafe {
        let b = heap.reallocate(&platform, a, num::NonZeroUsize::new(100).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    //  The tail merged with the rest of the chunk.
    assert_eq!(1, heap.statistics().free_blocks);
    assert_consistent(&heap);
}

#[test]
fn segregated_heap_reallocate_grow_in_place() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = SegregatedHeap::<FrontConfiguration>::new();
    heap.initialize(&platform).expect("Enough memory");

    let a = allocate(&mut heap, &platform, 100);
    let b = allocate(&mut heap, &platform, 200);
    let _guard = allocate(&mut heap, &platform, 8);

    unsafe {
        heap.deallocate(b);

        //  Absorbs part of the next block, the remainder staying free.
        let c = heap.reallocate(&platform, a, num::NonZeroUsize::new(200).unwrap()).unwrap();
        assert_eq!(a, c);
        assert_eq!(208, size_of(&heap, a));

        let rest = a.next(heap.arena());
        assert!(!is_allocated(&heap, rest));
        assert_eq!(112, size_of(&heap, rest));
        assert_consistent(&heap);

        //  Absorbs the whole next block, the remainder being too small.
        let c = heap.reallocate(&platform, a, num::NonZeroUsize::new(300).unwrap()).unwrap();
        assert_eq!(a, c);
        assert_eq!(320, size_of(&heap, a));
        assert!(is_allocated(&heap, a.next(heap.arena())));
    }

    assert_consistent(&heap);
}

#[test]
fn segregated_heap_reallocate_relocate() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = SegregatedHeap::<FrontConfiguration>::new();
    heap.initialize(&platform).expect("Enough memory");

    let a = allocate(&mut heap, &platform, 64);
    let _guard = allocate(&mut heap, &platform, 8);

    unsafe {
        let pointer = heap.arena().pointer(a.offset()).as_ptr();
        for i in 0..64 {
            *pointer.add(i) = i as u8;
        }

        let b = heap.reallocate(&platform, a, num::NonZeroUsize::new(500).unwrap()).unwrap();
        assert_ne!(a, b);
        assert!(!is_allocated(&heap, a));

        let pointer = heap.arena().pointer(b.offset()).as_ptr();
        for i in 0..64 {
            assert_eq!(i as u8, *pointer.add(i));
        }
    }

    assert_consistent(&heap);
}

#[test]
fn segregated_heap_reallocate_failure() {
    let store = HeapStore::new();
    let platform = TestPlatform::new(&store);

    let mut heap = TestHeap::new();
    heap.initialize(&platform).expect("Enough memory");

    let a = allocate(&mut heap, &platform, 64);
    let _guard = allocate(&mut heap, &platform, 8);

    platform.set_limit(platform.used());

    unsafe {
        let result = heap.reallocate(&platform, a, num::NonZeroUsize::new(HeapStore::CAPACITY).unwrap());
        assert_eq!(Err(OutOfMemory), result);
        assert!(is_allocated(&heap, a));
        assert_eq!(80, size_of(&heap, a));
    }

    assert_consistent(&heap);
}

}
