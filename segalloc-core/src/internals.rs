//! Internals of segalloc-core.

pub(crate) mod arena;
pub(crate) mod checker;
pub(crate) mod free_lists;
pub(crate) mod layout;
pub(crate) mod segregated_heap;
