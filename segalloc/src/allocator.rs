//! Allocator

use core::{
    alloc::{GlobalAlloc, Layout},
    ptr::{self, NonNull},
};

use spin::Mutex;

use segalloc_core::{Heap, HeapStatistics, HeapSummary, OutOfMemory, ALIGNMENT};

use crate::{LogReporter, MmapPlatform, SegConfiguration};

/// Segregated-Fit Allocator.
///
/// A single heap, serialized behind a spin lock.
///
/// The allocation paths never log, hence an instance may serve as the global allocator.
pub struct SegAllocator(Mutex<Heap<SegConfiguration, MmapPlatform>>);

impl SegAllocator {
    /// Creates an instance, backed by an `MmapPlatform` of default capacity.
    pub const fn new() -> Self { Self::with_platform(MmapPlatform::new()) }

    /// Creates an instance, backed by `platform`.
    pub const fn with_platform(platform: MmapPlatform) -> Self { Self(Mutex::new(Heap::new(platform))) }

    /// Initializes the heap, or resets it if already initialized.
    ///
    /// Resetting discards all allocations at once; any pointer previously allocated is invalidated.
    ///
    /// Calling this function is optional, the first allocation initializes the heap if need be.
    #[cold]
    pub fn initialize(&self) -> Result<(), OutOfMemory> {
        let result = self.0.lock().initialize();

        match result {
            Ok(()) => log::debug!("Initialized heap"),
            Err(error) => log::error!("Could not initialize heap: {}", error),
        }

        result
    }

    /// Allocates `size` bytes of memory, aligned on `ALIGNMENT`.
    ///
    /// Returns `Ok(None)` if `size` is 0.
    pub fn allocate(&self, size: usize) -> Result<Option<NonNull<u8>>, OutOfMemory> { self.0.lock().allocate(size) }

    /// Deallocates the memory located at `pointer`, if any.
    ///
    /// #   Safety
    ///
    /// -   Assumes `pointer` has been returned by a prior call to `allocate` or `reallocate`.
    /// -   Assumes `pointer` has not been deallocated since its allocation.
    /// -   Assumes the memory pointed by `pointer` is no longer in use.
    pub unsafe fn deallocate(&self, pointer: Option<NonNull<u8>>) { self.0.lock().deallocate(pointer) }

    /// Resizes the memory located at `pointer` to `size` bytes, moving it if need be.
    ///
    /// A None `pointer` is allocated, a `size` of 0 is deallocated. On failure, `pointer` is left untouched.
    ///
    /// #   Safety
    ///
    /// -   Assumes `pointer` has been returned by a prior call to `allocate` or `reallocate`.
    /// -   Assumes `pointer` has not been deallocated since its allocation.
    pub unsafe fn reallocate(&self, pointer: Option<NonNull<u8>>, size: usize)
        -> Result<Option<NonNull<u8>>, OutOfMemory>
    {
        self.0.lock().reallocate(pointer, size)
    }

    /// Returns the number of bytes usable at `pointer`.
    ///
    /// #   Safety
    ///
    /// -   Assumes `pointer` has been returned by a prior call to `allocate` or `reallocate`.
    /// -   Assumes `pointer` has not been deallocated since its allocation.
    pub unsafe fn usable_size(&self, pointer: NonNull<u8>) -> usize { self.0.lock().usable_size(pointer) }

    /// Returns the occupancy of the heap.
    pub fn statistics(&self) -> HeapStatistics { self.0.lock().statistics() }

    /// Checks the consistency of the heap, logging each inconsistency, and each block if `verbose`.
    ///
    /// #   Warning
    ///
    /// The heap is locked while logging: this instance must not be the global allocator of a logger which allocates.
    #[cold]
    pub fn check(&self, verbose: bool) -> HeapSummary {
        let mut reporter = LogReporter::new();

        let summary = self.0.lock().check(verbose, &mut reporter);

        if summary.is_consistent() {
            log::debug!("Heap consistent: {} blocks, {} free, {} bytes free",
                summary.blocks, summary.free_blocks, summary.free_bytes);
        } else {
            log::error!("Heap inconsistent: {} inconsistencies", summary.inconsistencies);
        }

        summary
    }
}

impl Default for SegAllocator {
    fn default() -> Self { Self::new() }
}

unsafe impl GlobalAlloc for SegAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        if layout.align() > ALIGNMENT.value() {
            return ptr::null_mut();
        }

        into_raw(self.allocate(layout.size()))
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _: Layout) { self.deallocate(NonNull::new(ptr)) }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        if layout.align() > ALIGNMENT.value() {
            return ptr::null_mut();
        }

        into_raw(self.reallocate(NonNull::new(ptr), new_size))
    }
}

//
//  Implementation Details
//

fn into_raw(result: Result<Option<NonNull<u8>>, OutOfMemory>) -> *mut u8 {
    result.ok().flatten().map(|pointer| pointer.as_ptr()).unwrap_or(ptr::null_mut())
}
