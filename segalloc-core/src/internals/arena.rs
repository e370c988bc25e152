//! The Arena.
//!
//! The Arena is the contiguous range of memory obtained from the Platform. Blocks, tags and links are all expressed as
//! offsets from the base of the Arena, and every access to the underlying memory goes through it.

use core::ptr::{self, NonNull};

use crate::{OutOfMemory, Platform, ALIGNMENT, WORD_SIZE};
use crate::utils;

/// Arena.
pub(crate) struct Arena {
    //  Base of the memory obtained from the platform, dangling until the first successful extension.
    base: NonNull<u8>,
    //  Number of bytes in use by the heap.
    length: usize,
    //  Number of bytes obtained from the platform; greater than `length` after a reset.
    reserved: usize,
}

impl Arena {
    /// Creates an empty instance.
    pub(crate) const fn new() -> Self { Self { base: NonNull::dangling(), length: 0, reserved: 0 } }

    /// Returns the number of bytes in use.
    pub(crate) fn len(&self) -> usize { self.length }

    /// Returns the number of bytes obtained from the platform.
    #[cfg(test)]
    pub(crate) fn reserved(&self) -> usize { self.reserved }

    /// Forgets about the bytes in use, keeping those obtained from the platform for further extensions.
    pub(crate) fn reset(&mut self) { self.length = 0; }

    /// Extends the bytes in use by `increment`, returning the offset of the first of those bytes.
    ///
    /// Bytes previously obtained from the platform are reused first, the platform is only asked for the remainder.
    ///
    /// The arena is unchanged on failure.
    pub(crate) fn extend<P>(&mut self, platform: &P, increment: usize) -> Result<usize, OutOfMemory>
        where
            P: Platform,
    {
        debug_assert!(increment > 0);
        debug_assert!(increment % ALIGNMENT == 0, "{} % {} != 0", increment, ALIGNMENT.value());

        let start = self.length;
        let end = start.checked_add(increment).ok_or(OutOfMemory)?;

        if end > self.reserved {
            let missing = end - self.reserved;

            //  Safety:
            //  -   `missing` is non-zero, and a multiple of ALIGNMENT, as `end` and `reserved` are.
            let fresh = unsafe { platform.grow(missing) }.ok_or(OutOfMemory)?;

            if self.reserved == 0 {
                if !utils::is_aligned_on(fresh.as_ptr() as usize, ALIGNMENT) {
                    return Err(OutOfMemory);
                }

                self.base = fresh;
            } else if fresh.as_ptr() as usize != self.base.as_ptr() as usize + self.reserved {
                return Err(OutOfMemory);
            }

            self.reserved = end;
        }

        self.length = end;

        Ok(start)
    }

    /// Reads the word at `offset`.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `offset` is word-aligned, and the word lies within the bytes in use.
    pub(crate) unsafe fn read(&self, offset: usize) -> usize {
        debug_assert!(offset % WORD_SIZE == 0, "{} % {} != 0", offset, WORD_SIZE);
        debug_assert!(offset + WORD_SIZE <= self.length, "{} + {} > {}", offset, WORD_SIZE, self.length);

        ptr::read(self.base.as_ptr().add(offset) as *const usize)
    }

    /// Writes `value` to the word at `offset`.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `offset` is word-aligned, and the word lies within the bytes in use.
    /// -   Assumes that the word is not part of an allocated payload.
    pub(crate) unsafe fn write(&mut self, offset: usize, value: usize) {
        debug_assert!(offset % WORD_SIZE == 0, "{} % {} != 0", offset, WORD_SIZE);
        debug_assert!(offset + WORD_SIZE <= self.length, "{} + {} > {}", offset, WORD_SIZE, self.length);

        ptr::write(self.base.as_ptr().add(offset) as *mut usize, value)
    }

    /// Copies `count` bytes from `source` to `destination`.
    ///
    /// #   Safety
    ///
    /// -   Assumes that both ranges lie within the bytes in use, and do not overlap.
    pub(crate) unsafe fn copy(&mut self, source: usize, destination: usize, count: usize) {
        debug_assert!(source + count <= self.length);
        debug_assert!(destination + count <= self.length);
        debug_assert!(source + count <= destination || destination + count <= source);

        let base = self.base.as_ptr();

        ptr::copy_nonoverlapping(base.add(source), base.add(destination), count);
    }

    /// Returns a pointer to the byte at `offset`.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `offset` lies within the bytes in use.
    pub(crate) unsafe fn pointer(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset < self.length, "{} >= {}", offset, self.length);

        //  Safety:
        //  -   `base` is non-null, and `offset` within the range it points to.
        NonNull::new_unchecked(self.base.as_ptr().add(offset))
    }

    /// Returns the offset of the byte pointed to by `pointer`.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `pointer` points within the bytes in use.
    pub(crate) unsafe fn offset_of(&self, pointer: NonNull<u8>) -> usize {
        let offset = (pointer.as_ptr() as usize).wrapping_sub(self.base.as_ptr() as usize);

        debug_assert!(offset < self.length, "{} >= {}", offset, self.length);

        offset
    }
}

//  Safety:
//  -   The Arena exclusively owns the memory it obtained from the platform.
unsafe impl Send for Arena {}
