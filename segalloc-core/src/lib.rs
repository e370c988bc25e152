#![no_std]

#![deny(missing_docs)]

//! Building blocks for a segregated-fit allocator.
//!
//! segalloc-core manages a single contiguous, growable heap, carved into blocks tagged with boundary tags. It contains:
//! -   A platform trait, used to grow the heap by appending fresh memory at its end.
//! -   A configuration trait, used to tune the heap growth increment and the split policy.
//! -   A `Heap` type, servicing allocation, deallocation and resize requests, and able to check its own consistency.
//!
//! The `Heap` is single-threaded; users wishing to share it across threads must serialize access externally.

mod api;
mod internals;
mod utils;

pub use api::*;
