//! A collection of utilities.

mod power_of_2;

pub use power_of_2::PowerOf2;

/// Returns whether the offset, or address, is a multiple of the given alignment.
pub(crate) fn is_aligned_on(offset: usize, alignment: PowerOf2) -> bool { offset % alignment == 0 }

/// Returns the index of the highest bit set, that is the floor of the base 2 logarithm.
///
/// `value` must be non-zero.
pub(crate) fn floor_log2(value: usize) -> usize {
    debug_assert!(value != 0);

    USIZE_BITS - 1 - value.leading_zeros() as usize
}

const USIZE_BITS: usize = core::mem::size_of::<usize>() * 8;
