//! The API of segalloc-core.

mod check;
mod configuration;
mod description;
mod heap;
mod platform;

pub use check::{BlockInfo, HeapSummary, Inconsistency, Reporter};
pub use configuration::{Configuration, Properties};
pub use description::{AllocationSize, HeapStatistics, OutOfMemory, PowerOf2, ALIGNMENT, NUMBER_BUCKETS, WORD_SIZE};
pub use heap::Heap;
pub use platform::Platform;
