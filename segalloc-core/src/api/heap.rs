//! Heap.
//!
//! A Heap is a single, growable, run of memory obtained from a `Platform`, carved into blocks on demand.
//!
//! The Heap is not thread-safe: concurrent use requires serializing all calls, for example behind a lock.

use core::{num, ptr::NonNull};

use crate::{Configuration, HeapStatistics, HeapSummary, OutOfMemory, Platform, Reporter};
use crate::internals::{checker, layout::Block, segregated_heap::SegregatedHeap};

/// Heap.
///
/// A segregated-fit heap, serving allocations of any size with a single alignment, `ALIGNMENT`.
pub struct Heap<C, P> {
    heap: SegregatedHeap<C>,
    platform: P,
}

impl<C, P> Heap<C, P> {
    /// Creates an uninitialized Heap, which will obtain its memory from `platform`.
    ///
    /// No memory is obtained until the first call to `initialize`, or `allocate`.
    pub const fn new(platform: P) -> Self { Self { heap: SegregatedHeap::new(), platform } }

    /// Returns a reference to the platform.
    pub fn platform(&self) -> &P { &self.platform }

    /// Returns whether the Heap is initialized.
    pub fn is_initialized(&self) -> bool { self.heap.is_initialized() }

    /// Returns the occupancy of the Heap.
    pub fn statistics(&self) -> HeapStatistics { self.heap.statistics() }

    /// Checks the consistency of the Heap.
    ///
    /// Each inconsistency detected is passed to `reporter`, as well as each block, in order, if `verbose`.
    pub fn check<R>(&self, verbose: bool, reporter: &mut R) -> HeapSummary
        where
            R: Reporter,
    {
        checker::check(&self.heap, verbose, reporter)
    }

    /// Returns the number of bytes usable at `pointer`, at least as many as requested.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `pointer` was allocated by this Heap, and not deallocated since.
    pub unsafe fn usable_size(&self, pointer: NonNull<u8>) -> usize { self.heap.usable_size(self.block_of(pointer)) }

    /// Deallocates the memory at `pointer`, if any.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `pointer` was allocated by this Heap, and not deallocated since.
    pub unsafe fn deallocate(&mut self, pointer: Option<NonNull<u8>>) {
        if let Some(pointer) = pointer {
            let block = self.block_of(pointer);
            self.heap.deallocate(block);
        }
    }

    fn pointer_of(&self, block: Block) -> NonNull<u8> {
        //  Safety:
        //  -   `block` is a block of the heap.
        unsafe { self.heap.arena().pointer(block.offset()) }
    }

    unsafe fn block_of(&self, pointer: NonNull<u8>) -> Block { Block::new(self.heap.arena().offset_of(pointer)) }
}

impl<C, P> Heap<C, P>
    where
        C: Configuration,
        P: Platform,
{
    /// Initializes, or re-initializes, the Heap.
    ///
    /// Re-initializing discards all allocations at once, reusing the memory already obtained from the platform.
    pub fn initialize(&mut self) -> Result<(), OutOfMemory> { self.heap.initialize(&self.platform) }

    /// Allocates at least `size` bytes, aligned on `ALIGNMENT`.
    ///
    /// Returns `Ok(None)` if `size` is 0, and `Err(OutOfMemory)` if the platform cannot supply the memory.
    ///
    /// Initializes the Heap, if need be.
    pub fn allocate(&mut self, size: usize) -> Result<Option<NonNull<u8>>, OutOfMemory> {
        let block = self.heap.allocate(&self.platform, size)?;

        Ok(block.map(|block| self.pointer_of(block)))
    }

    /// Resizes the memory at `pointer` to at least `size` bytes, preserving its content up to the lesser size.
    ///
    /// -   If `pointer` is None, this is equivalent to `allocate(size)`.
    /// -   If `size` is 0, this is equivalent to `deallocate(pointer)`, and returns `Ok(None)`.
    ///
    /// The memory may be moved, in which case the original pointer is deallocated. On failure, the original pointer
    /// is left untouched.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `pointer` was allocated by this Heap, and not deallocated since.
    pub unsafe fn reallocate(&mut self, pointer: Option<NonNull<u8>>, size: usize)
        -> Result<Option<NonNull<u8>>, OutOfMemory>
    {
        let pointer = match pointer {
            Some(pointer) => pointer,
            None => return self.allocate(size),
        };

        let size = match num::NonZeroUsize::new(size) {
            Some(size) => size,
            None => {
                self.deallocate(Some(pointer));
                return Ok(None);
            },
        };

        let block = self.block_of(pointer);
        let block = self.heap.reallocate(&self.platform, block, size)?;

        Ok(Some(self.pointer_of(block)))
    }
}

#[cfg(test)]
mod tests {

use core::slice;

use super::*;

use crate::{Properties, ALIGNMENT, WORD_SIZE};
use crate::internals::test::{Findings, FrontConfiguration, HeapStore, TestConfiguration, TestPlatform};

type TestHeap = Heap<TestConfiguration, TestPlatform>;

fn assert_consistent<C, P>(heap: &Heap<C, P>) {
    let mut findings = Findings::default();
    let summary = heap.check(false, &mut findings);

    assert_eq!(0, findings.count(), "{:?}", findings.get(0));
    assert!(summary.is_consistent());
}

fn allocate<C: Configuration, P: Platform>(heap: &mut Heap<C, P>, size: usize) -> NonNull<u8> {
    heap.allocate(size).expect("Enough memory").expect("Non-zero size")
}

//  Deallocating requires neither a Configuration nor a Platform.
fn release<C, P>(heap: &mut Heap<C, P>, pointer: NonNull<u8>) { unsafe { heap.deallocate(Some(pointer)) } }

fn address(pointer: NonNull<u8>) -> usize { pointer.as_ptr() as usize }

unsafe fn fill(pointer: NonNull<u8>, size: usize, seed: u8) {
    let bytes = slice::from_raw_parts_mut(pointer.as_ptr(), size);

    for (i, byte) in bytes.iter_mut().enumerate() {
        *byte = seed.wrapping_add(i as u8);
    }
}

unsafe fn verify(pointer: NonNull<u8>, size: usize, seed: u8) {
    let bytes = slice::from_raw_parts(pointer.as_ptr(), size);

    for (i, byte) in bytes.iter().enumerate() {
        assert_eq!(seed.wrapping_add(i as u8), *byte, "at {}", i);
    }
}

#[test]
fn heap_initialize_allocate() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    heap.initialize().expect("Enough memory");

    let pointer = allocate(&mut heap, 100);

    assert_eq!(0, address(pointer) % ALIGNMENT.value());
    assert!(unsafe { heap.usable_size(pointer) } >= 100);
    assert_consistent(&heap);
}

#[test]
fn heap_allocate_lazily_initializes() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    assert!(!heap.is_initialized());
    assert_eq!(0, heap.platform().used());

    let _ = allocate(&mut heap, 1);

    assert!(heap.is_initialized());
    assert_consistent(&heap);
}

#[test]
fn heap_deallocate_unbounded() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    heap.initialize().expect("Enough memory");
    let before = heap.statistics();

    let first = allocate(&mut heap, 100);
    let second = allocate(&mut heap, 1000);

    release(&mut heap, first);
    release(&mut heap, second);

    assert_eq!(before, heap.statistics());
    assert_consistent(&heap);
}

#[test]
fn heap_allocate_zero() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    assert_eq!(Ok(None), heap.allocate(0));

    heap.initialize().expect("Enough memory");
    let before = heap.statistics();

    assert_eq!(Ok(None), heap.allocate(0));
    assert_eq!(before, heap.statistics());
}

#[test]
fn heap_reuses_freed_space() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    heap.initialize().expect("Enough memory");

    let p1 = allocate(&mut heap, 100);
    let _p2 = allocate(&mut heap, 200);

    let range = address(p1)..address(p1) + unsafe { heap.usable_size(p1) };
    let used = heap.platform().used();

    unsafe { heap.deallocate(Some(p1)) };

    let p3 = allocate(&mut heap, 50);

    assert!(range.contains(&address(p3)), "{:x} not in {:x?}", address(p3), range);
    assert_eq!(used, heap.platform().used());
    assert_consistent(&heap);
}

#[test]
fn heap_immediate_reuse() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    heap.initialize().expect("Enough memory");

    let p = allocate(&mut heap, 64);
    unsafe { heap.deallocate(Some(p)) };

    let q = allocate(&mut heap, 64);

    assert_eq!(p, q);
    assert_consistent(&heap);
}

#[test]
fn heap_merges_three_blocks() {
    let store = HeapStore::new();
    let mut heap = Heap::<FrontConfiguration, _>::new(TestPlatform::new(&store));

    heap.initialize().expect("Enough memory");

    let first = allocate(&mut heap, 40);
    let middle = allocate(&mut heap, 40);
    let last = allocate(&mut heap, 40);
    let _guard = allocate(&mut heap, 40);

    let block_size = unsafe { heap.usable_size(first) } + WORD_SIZE;

    let before = heap.statistics().free_blocks;

    unsafe {
        heap.deallocate(Some(first));
        heap.deallocate(Some(last));
    }

    assert_eq!(before + 2, heap.statistics().free_blocks);

    unsafe { heap.deallocate(Some(middle)) };

    assert_eq!(before + 1, heap.statistics().free_blocks);
    assert_consistent(&heap);

    //  The merged block spans the three, and is reused from its start.
    let merged = allocate(&mut heap, 3 * block_size - WORD_SIZE);

    assert_eq!(first, merged);
    assert_consistent(&heap);
}

#[test]
fn heap_reallocate_relocates() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    heap.initialize().expect("Enough memory");

    let p = allocate(&mut heap, 4000);
    unsafe { fill(p, 4000, 7) };

    let q = unsafe { heap.reallocate(Some(p), 8000) }.expect("Enough memory").expect("Non-zero size");

    assert_ne!(p, q);
    assert!(unsafe { heap.usable_size(q) } >= 8000);
    unsafe { verify(q, 4000, 7) };

    //  The original block was freed, and merged with the remainder of the initial chunk.
    let statistics = heap.statistics();
    assert_eq!(1, statistics.free_blocks);
    assert_eq!(Properties::<TestConfiguration>::chunk_size().value(), statistics.free_bytes);

    assert_consistent(&heap);
}

#[test]
fn heap_reallocate_shrink_in_place() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    let p = allocate(&mut heap, 1000);
    unsafe { fill(p, 1000, 3) };

    let q = unsafe { heap.reallocate(Some(p), 100) }.expect("Enough memory").expect("Non-zero size");

    assert_eq!(p, q);
    assert!(unsafe { heap.usable_size(q) } < 1000);
    unsafe { verify(q, 100, 3) };
    assert_consistent(&heap);
}

#[test]
fn heap_reallocate_grow_in_place() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    let p = allocate(&mut heap, 100);
    unsafe { fill(p, 100, 11) };

    //  The remainder of the chunk follows `p`.
    let q = unsafe { heap.reallocate(Some(p), 1000) }.expect("Enough memory").expect("Non-zero size");

    assert_eq!(p, q);
    unsafe { verify(q, 100, 11) };
    assert_consistent(&heap);
}

#[test]
fn heap_reallocate_degenerate() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    let p = unsafe { heap.reallocate(None, 100) }.expect("Enough memory");
    assert!(p.is_some());

    let before = heap.statistics().free_bytes;

    assert_eq!(Ok(None), unsafe { heap.reallocate(p, 0) });
    assert!(heap.statistics().free_bytes > before);

    assert_eq!(Ok(None), unsafe { heap.reallocate(None, 0) });
    assert_consistent(&heap);
}

#[test]
fn heap_reallocate_failure() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    let p = allocate(&mut heap, 100);
    let _guard = allocate(&mut heap, 100);
    unsafe { fill(p, 100, 5) };

    assert_eq!(Err(OutOfMemory), unsafe { heap.reallocate(Some(p), HeapStore::CAPACITY) });

    unsafe { verify(p, 100, 5) };
    assert_consistent(&heap);

    unsafe { heap.deallocate(Some(p)) };
    assert_consistent(&heap);
}

#[test]
fn heap_out_of_memory() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    heap.platform().set_limit(1 << 13);

    let mut count = 0;

    while let Ok(pointer) = heap.allocate(500) {
        assert!(pointer.is_some());
        count += 1;
    }

    assert!(count > 0);
    assert_consistent(&heap);

    //  Still usable for smaller requests, served by the tail of the chunk.
    assert_eq!(1, heap.statistics().free_blocks);

    let smallest = allocate(&mut heap, 8);
    assert_eq!(0, address(smallest) % ALIGNMENT.value());

    assert_consistent(&heap);
}

#[test]
fn heap_out_of_memory_before_initialization() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    heap.platform().set_limit(0);

    assert_eq!(Err(OutOfMemory), heap.allocate(8));
    assert_eq!(Err(OutOfMemory), heap.initialize());
    assert_consistent(&heap);
}

#[test]
fn heap_reinitialize() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    let p = allocate(&mut heap, 100);
    let _ = allocate(&mut heap, 20_000);

    let used = heap.platform().used();

    heap.initialize().expect("Enough memory");

    assert_eq!(used, heap.platform().used());
    assert_eq!(1, heap.statistics().free_blocks);
    assert_eq!(p, allocate(&mut heap, 100));
    assert_consistent(&heap);
}

#[test]
fn heap_statistics_round_trip() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    heap.initialize().expect("Enough memory");

    let _a = allocate(&mut heap, 300);
    let before = heap.statistics();

    for size in [1, 24, 100, 144, 145, 1000, 3000].iter() {
        let p = allocate(&mut heap, *size);
        unsafe { heap.deallocate(Some(p)) };

        assert_eq!(before, heap.statistics(), "size {}", size);
    }
}

#[test]
fn heap_back_placement() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    heap.initialize().expect("Enough memory");

    let small = allocate(&mut heap, 100);
    let large = allocate(&mut heap, 1000);
    let other = allocate(&mut heap, 100);

    //  Small blocks are carved from the front of the free block, large ones from its back.
    assert!(address(small) < address(other));
    assert!(address(other) < address(large));
    assert_consistent(&heap);
}

#[test]
fn heap_verbose_check() {
    let store = HeapStore::new();
    let mut heap = TestHeap::new(TestPlatform::new(&store));

    let _a = allocate(&mut heap, 100);
    let _b = allocate(&mut heap, 1000);

    let mut findings = Findings::default();
    let summary = heap.check(true, &mut findings);

    assert_eq!(3, summary.blocks);
    assert_eq!(4, findings.blocks());
    assert_eq!(Some(heap.statistics().heap_size), findings.last_block().map(|block| block.offset));
    assert_eq!(1, summary.free_blocks);
    assert!(summary.is_consistent());
}

}
