#![deny(missing_docs)]

//! Exposition of the SegAllocator API via a C ABI.
//!
//! Mirrors the classic `mm_init`, `mm_malloc`, `mm_free`, `mm_realloc` and `mm_checkheap` interface.

use std::ptr::{self, NonNull};

use segalloc::{OutOfMemory, SegAllocator};

/// Initializes the heap, or resets it if already initialized, discarding all allocations.
///
/// Returns 0 on success, and -1 otherwise.
#[cold]
#[no_mangle]
pub extern fn sa_init() -> i32 { if ALLOCATOR.initialize().is_ok() { 0 } else { -1 } }

/// Allocates `size` bytes of memory, aligned on 2 words.
///
/// Returns NULL if `size` is 0, or if the allocation fails.
#[no_mangle]
pub extern fn sa_malloc(size: usize) -> *mut u8 { into_raw(ALLOCATOR.allocate(size)) }

/// Deallocates the memory located at `pointer`; does nothing if `pointer` is NULL.
///
/// #   Safety
///
/// -   Assumes `pointer` has been returned by a prior call to `sa_malloc` or `sa_realloc`.
/// -   Assumes `pointer` has not been deallocated since its allocation.
/// -   Assumes the memory pointed by `pointer` is no longer in use.
#[no_mangle]
pub unsafe extern fn sa_free(pointer: *mut u8) { ALLOCATOR.deallocate(NonNull::new(pointer)) }

/// Resizes the memory located at `pointer` to `size` bytes, possibly moving it.
///
/// A NULL `pointer` is equivalent to `sa_malloc(size)`, a `size` of 0 to `sa_free(pointer)`, returning NULL.
///
/// Returns NULL if the allocation fails, in which case `pointer` is left untouched.
///
/// #   Safety
///
/// -   Assumes `pointer` has been returned by a prior call to `sa_malloc` or `sa_realloc`.
/// -   Assumes `pointer` has not been deallocated since its allocation.
#[no_mangle]
pub unsafe extern fn sa_realloc(pointer: *mut u8, size: usize) -> *mut u8 {
    into_raw(ALLOCATOR.reallocate(NonNull::new(pointer), size))
}

/// Checks the consistency of the heap, logging the blocks if `verbose` is non-zero.
///
/// Returns the number of inconsistencies detected.
#[cold]
#[no_mangle]
pub extern fn sa_checkheap(verbose: i32) -> usize { ALLOCATOR.check(verbose != 0).inconsistencies }

//
//  Implementation
//

static ALLOCATOR: SegAllocator = SegAllocator::new();

fn into_raw(result: Result<Option<NonNull<u8>>, OutOfMemory>) -> *mut u8 {
    result.ok().flatten().map(|pointer| pointer.as_ptr()).unwrap_or(ptr::null_mut())
}
