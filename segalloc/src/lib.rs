#![no_std]
#![deny(missing_docs)]

//! A Segregated-Fit Memory Allocator library.
//!
//! The type `SegAllocator` provides a general-purpose memory allocator, serving requests from a single heap obtained
//! from the OS, and indexing its free blocks by size.
//!
//! #   Warning
//!
//! All calls are serialized behind a single lock: this allocator is not suitable for heavily multi-threaded
//! applications.

mod allocator;
mod platform;
mod reporter;

pub use allocator::SegAllocator;
pub use platform::{MmapPlatform, SegConfiguration};
pub use reporter::LogReporter;

pub use segalloc_core::{BlockInfo, HeapStatistics, HeapSummary, Inconsistency, OutOfMemory, Reporter, ALIGNMENT};
