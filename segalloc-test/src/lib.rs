#![deny(missing_docs)]

//! Test support for allocators.
//!
//! -   `Trace`: a sequence of allocations, deallocations and reallocations, parsed from text or generated.
//! -   `replay`: replays a `Trace` against an allocator, validating each result.

mod replay;
mod trace;

pub use replay::{replay, ReplayError, ReplayReport, TraceAllocator};
pub use trace::{Operation, ParseError, Trace};
