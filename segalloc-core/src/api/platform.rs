//! Platform
//!
//! The Platform trait is used to request memory directly from the Platform. By abstracting the underlying platform,
//! it becomes possible to easily port the code to a different OS, a simulated memory system, or even to a bare-metal
//! target.

use core::ptr::NonNull;

/// Abstraction of platform specific memory growth.
///
/// The heap is a single contiguous range of memory, which only ever grows at its end: the platform is akin to `sbrk`.
pub trait Platform {
    /// Grows the memory range by `increment` bytes, returning a pointer to the first of those fresh bytes.
    ///
    /// May return None if the request cannot be satisfied.
    ///
    /// #   Safety
    ///
    /// The caller may assume that if the returned pointer is not None then:
    /// -   The `increment` bytes starting at the pointer are usable, and not otherwise in use.
    ///
    /// The implementer may assume that:
    /// -   `increment` is non-zero, and a multiple of `ALIGNMENT`.
    ///
    /// The heap further expects that:
    /// -   The first range returned is aligned on `ALIGNMENT`.
    /// -   Each range returned starts exactly where the previous one ended.
    ///
    /// A platform failing to honor either expectation is treated as out of memory.
    unsafe fn grow(&self, increment: usize) -> Option<NonNull<u8>>;
}
