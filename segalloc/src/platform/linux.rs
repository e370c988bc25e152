//! Implementation of Linux specific calls.

use core::{cell::Cell, ptr::{self, NonNull}};

use segalloc_core::{Configuration, Platform};

/// Implementation of the Configuration trait, for Linux.
#[derive(Default)]
pub struct SegConfiguration;

impl Configuration for SegConfiguration {
    //  4 KB, plus a little to accomodate the boundary tags of a page-sized block.
    const CHUNK_SIZE: usize = (1 << 12) + 64;

    //  18 words.
    const MIDSIZE: usize = 144;
}

/// Implementation of the Platform trait, for Linux.
///
/// Reserves a single range of address space on first use, without committing memory, and hands it out piece by piece.
pub struct MmapPlatform {
    base: Cell<*mut u8>,
    used: Cell<usize>,
    capacity: usize,
}

impl MmapPlatform {
    /// The default capacity, 1 GB.
    pub const DEFAULT_CAPACITY: usize = 1 << 30;

    /// Creates an instance, with the default capacity.
    pub const fn new() -> Self { Self::with_capacity(Self::DEFAULT_CAPACITY) }

    /// Creates an instance, which will hand out at most `capacity` bytes.
    pub const fn with_capacity(capacity: usize) -> Self {
        Self { base: Cell::new(ptr::null_mut()), used: Cell::new(0), capacity }
    }

    /// Returns the maximum number of bytes handed out.
    pub fn capacity(&self) -> usize { self.capacity }

    /// Returns the number of bytes handed out so far.
    pub fn used(&self) -> usize { self.used.get() }

    //  Returns the base of the reserved range, reserving it if need be.
    #[cold]
    fn reserve(&self) -> Option<NonNull<u8>> {
        if let Some(base) = NonNull::new(self.base.get()) {
            return Some(base);
        }

        let base = mmap_reserve(self.capacity)?;
        self.base.set(base.as_ptr());

        Some(base)
    }
}

impl Default for MmapPlatform {
    fn default() -> Self { Self::new() }
}

impl Drop for MmapPlatform {
    fn drop(&mut self) {
        if let Some(base) = NonNull::new(self.base.get()) {
            //  Safety:
            //  -   `base` points to a mapping of `capacity` bytes, no longer in use.
            unsafe { munmap_deallocate(base.as_ptr(), self.capacity) };
        }
    }
}

impl Platform for MmapPlatform {
    unsafe fn grow(&self, increment: usize) -> Option<NonNull<u8>> {
        let base = self.reserve()?;
        let used = self.used.get();

        if increment > self.capacity - used {
            return None;
        }

        self.used.set(used + increment);

        NonNull::new(base.as_ptr().add(used))
    }
}

//  Safety:
//  -   The mapping is exclusively owned by the instance.
unsafe impl Send for MmapPlatform {}

//
//  Implementation Details
//

//  Reserves `size` bytes of address space, committed lazily by the OS on first touch.
//
//  The result is page-aligned.
fn mmap_reserve(size: usize) -> Option<NonNull<u8>> {
    if size == 0 {
        return None;
    }

    let length = size;
    let prot = libc::PROT_READ | libc::PROT_WRITE;
    let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE;

    //  No specific address hint.
    let addr = ptr::null_mut();
    //  When used in conjunction with MAP_ANONYMOUS, fd is mandated to be -1 on some implementations.
    let fd = -1;
    //  When used in conjunction with MAP_ANONYMOUS, offset is mandated to be 0 on some implementations.
    let offset = 0;

    //  Safety:
    //  -   `addr`, `fd`, and `offset` are suitable for MAP_ANONYMOUS.
    let result = unsafe { libc::mmap(addr, length, prot, flags, fd, offset) };

    let result = if result != libc::MAP_FAILED { result as *mut u8 } else { ptr::null_mut() };
    NonNull::new(result)
}

//  Wrapper around `munmap`.
//
//  #   Panics
//
//  If `munmap` returns a non-0 result.
//
//  #   Safety
//
//  -   Assumes that `pointer` points to a mapping of `size` bytes.
//  -   Assumes that the mapping is no longer in use.
unsafe fn munmap_deallocate(pointer: *mut u8, size: usize) {
    let result = libc::munmap(pointer as *mut libc::c_void, size);
    assert!(result == 0, "Could not munmap {:x}, {}: {}", pointer as usize, size, result);
}
