//! Replay of traces.

use std::{collections::BTreeMap, error, fmt, ptr::NonNull, slice};

use crate::{Operation, Trace};

/// The allocator interface exercised by `replay`.
pub trait TraceAllocator {
    /// Error signalling the exhaustion of memory.
    type Error: fmt::Debug;

    /// Returns the alignment guaranteed for all allocations.
    fn alignment(&self) -> usize;

    /// Allocates `size` bytes; returns None if `size` is 0.
    fn allocate(&mut self, size: usize) -> Result<Option<NonNull<u8>>, Self::Error>;

    /// Deallocates `pointer`; does nothing if None.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `pointer` is live.
    unsafe fn deallocate(&mut self, pointer: Option<NonNull<u8>>);

    /// Reallocates `pointer` to `size` bytes.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `pointer` is live.
    unsafe fn reallocate(&mut self, pointer: Option<NonNull<u8>>, size: usize)
        -> Result<Option<NonNull<u8>>, Self::Error>;

    /// Returns whether the allocator is internally consistent, invoked after each operation.
    fn check(&mut self) -> bool { true }
}

/// The outcome of a successful replay.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct ReplayReport {
    /// Number of operations replayed.
    pub operations: usize,
    /// Number of allocations and reallocations which failed for lack of memory.
    pub failures: usize,
    /// Maximum number of bytes requested, and live, at any point.
    pub peak_bytes: usize,
    /// Maximum number of live allocations at any point.
    pub peak_allocations: usize,
}

/// ReplayError
///
/// A violation of the allocator contract, at the operation of index `index` in the trace.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ReplayError {
    /// The trace itself is invalid: allocating a live identifier, or freeing a dead one.
    InvalidTrace {
        /// Index of the operation.
        index: usize,
    },
    /// A pointer is not aligned.
    Misaligned {
        /// Index of the operation.
        index: usize,
        /// Address returned.
        address: usize,
    },
    /// A zero-sized request returned memory, or a sized request returned none.
    UnexpectedResult {
        /// Index of the operation.
        index: usize,
    },
    /// Two live allocations overlap.
    Overlap {
        /// Index of the operation.
        index: usize,
        /// Identifier of the allocation overlapped.
        other: usize,
    },
    /// The content of an allocation was altered.
    Corrupted {
        /// Index of the operation.
        index: usize,
        /// Identifier of the allocation.
        id: usize,
    },
    /// The allocator reported an inconsistency.
    Inconsistent {
        /// Index of the operation.
        index: usize,
    },
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ReplayError::InvalidTrace { index } => write!(f, "operation {}: invalid trace", index),
            ReplayError::Misaligned { index, address } => write!(f, "operation {}: {:#x} is misaligned", index, address),
            ReplayError::UnexpectedResult { index } => write!(f, "operation {}: unexpected result", index),
            ReplayError::Overlap { index, other } => write!(f, "operation {}: overlaps with {}", index, other),
            ReplayError::Corrupted { index, id } => write!(f, "operation {}: content of {} corrupted", index, id),
            ReplayError::Inconsistent { index } => write!(f, "operation {}: allocator inconsistent", index),
        }
    }
}

impl error::Error for ReplayError {}

/// Replays `trace` against `allocator`.
///
/// Each live allocation is filled with a pattern specific to its identifier, verified on deallocation, and on
/// reallocation up to the lesser of the old and new sizes.
///
/// On error, the live allocations are leaked.
pub fn replay<A>(allocator: &mut A, trace: &Trace) -> Result<ReplayReport, ReplayError>
    where
        A: TraceAllocator,
{
    let mut replayer = Replayer {
        allocator,
        slots: vec![None; trace.number_ids()],
        ranges: BTreeMap::new(),
        report: ReplayReport::default(),
        live_bytes: 0,
    };

    for (index, operation) in trace.operations().iter().enumerate() {
        replayer.apply(index, *operation)?;
        replayer.report.operations += 1;

        if !replayer.allocator.check() {
            return Err(ReplayError::Inconsistent { index });
        }
    }

    Ok(replayer.report)
}

//
//  Implementation Details
//

#[derive(Clone, Copy, Debug)]
struct Live {
    pointer: Option<NonNull<u8>>,
    size: usize,
}

struct Replayer<'a, A> {
    allocator: &'a mut A,
    slots: Vec<Option<Live>>,
    //  Start address -> (end address, id).
    ranges: BTreeMap<usize, (usize, usize)>,
    report: ReplayReport,
    live_bytes: usize,
}

impl<'a, A> Replayer<'a, A>
    where
        A: TraceAllocator,
{
    fn apply(&mut self, index: usize, operation: Operation) -> Result<(), ReplayError> {
        match operation {
            Operation::Allocate { id, size } => {
                if self.slots[id].is_some() {
                    return Err(ReplayError::InvalidTrace { index });
                }

                match self.allocator.allocate(size) {
                    Ok(pointer) => self.insert(index, id, pointer, size, 0),
                    //  The identifier remains in use, as a null pointer.
                    Err(_) => {
                        self.report.failures += 1;
                        self.slots[id] = Some(Live { pointer: None, size: 0 });
                        Ok(())
                    },
                }
            },
            Operation::Free { id } => {
                let live = self.remove(index, id)?;

                //  Safety:
                //  -   `live.pointer` was allocated, and is not yet freed.
                unsafe { self.allocator.deallocate(live.pointer) };

                Ok(())
            },
            Operation::Reallocate { id, size } => {
                let live = self.remove(index, id)?;

                //  Safety:
                //  -   `live.pointer` was allocated, and is not yet freed.
                match unsafe { self.allocator.reallocate(live.pointer, size) } {
                    Ok(pointer) => {
                        let preserved = std::cmp::min(live.size, size);

                        if let Some(pointer) = pointer {
                            if !verify(pointer, preserved, id) {
                                return Err(ReplayError::Corrupted { index, id });
                            }
                        }

                        //  A reallocation to 0 frees.
                        if size == 0 {
                            return if pointer.is_none() { Ok(()) } else { Err(ReplayError::UnexpectedResult { index }) };
                        }

                        self.insert(index, id, pointer, size, preserved)
                    },
                    Err(_) => {
                        self.report.failures += 1;
                        self.insert(index, id, live.pointer, live.size, live.size)
                    },
                }
            },
        }
    }

    //  Records a new live allocation, filling its content from `filled` onward.
    fn insert(&mut self, index: usize, id: usize, pointer: Option<NonNull<u8>>, size: usize, filled: usize)
        -> Result<(), ReplayError>
    {
        if pointer.is_some() != (size != 0) {
            return Err(ReplayError::UnexpectedResult { index });
        }

        if let Some(pointer) = pointer {
            let start = pointer.as_ptr() as usize;
            let end = start + size;

            if start % self.allocator.alignment() != 0 {
                return Err(ReplayError::Misaligned { index, address: start });
            }

            if let Some((_, &(other_end, other))) = self.ranges.range(..end).next_back() {
                if other_end > start {
                    return Err(ReplayError::Overlap { index, other });
                }
            }

            fill(pointer, filled, size, id);

            self.ranges.insert(start, (end, id));
        }

        self.slots[id] = Some(Live { pointer, size });

        self.live_bytes += size;
        self.report.peak_bytes = std::cmp::max(self.report.peak_bytes, self.live_bytes);

        let allocations = self.ranges.len();
        self.report.peak_allocations = std::cmp::max(self.report.peak_allocations, allocations);

        Ok(())
    }

    //  Forgets a live allocation, after verifying its content.
    fn remove(&mut self, index: usize, id: usize) -> Result<Live, ReplayError> {
        let live = self.slots.get_mut(id).and_then(Option::take).ok_or(ReplayError::InvalidTrace { index })?;

        if let Some(pointer) = live.pointer {
            if !verify(pointer, live.size, id) {
                return Err(ReplayError::Corrupted { index, id });
            }

            self.ranges.remove(&(pointer.as_ptr() as usize));
        }

        self.live_bytes -= live.size;

        Ok(live)
    }
}

fn pattern(id: usize, offset: usize) -> u8 { (id.wrapping_mul(31) ^ offset) as u8 }

fn fill(pointer: NonNull<u8>, from: usize, to: usize, id: usize) {
    //  Safety:
    //  -   `pointer` is live, and points to at least `to` bytes.
    let bytes = unsafe { slice::from_raw_parts_mut(pointer.as_ptr(), to) };

    for (offset, byte) in bytes.iter_mut().enumerate().skip(from) {
        *byte = pattern(id, offset);
    }
}

fn verify(pointer: NonNull<u8>, size: usize, id: usize) -> bool {
    //  Safety:
    //  -   `pointer` is live, and points to at least `size` bytes.
    let bytes = unsafe { slice::from_raw_parts(pointer.as_ptr(), size) };

    bytes.iter().enumerate().all(|(offset, byte)| *byte == pattern(id, offset))
}
