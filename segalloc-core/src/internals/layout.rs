//! Layout of blocks.
//!
//! A Block is a run of bytes within the Arena, identified by the offset of its payload.
//!
//! ```text
//!   Allocated block:                          Free block:
//!
//!   ┌────────────────────┐ ← header           ┌────────────────────┐ ← header
//!   │ size | prev | 1    │                    │ size | prev | 0    │
//!   ├────────────────────┤ ← Block            ├────────────────────┤ ← Block
//!   │                    │                    │ predecessor        │
//!   │      payload       │                    │ successor          │
//!   │                    │                    │        ...         │
//!   │                    │                    ├────────────────────┤ ← footer
//!   │                    │                    │ size | prev | 0    │
//!   └────────────────────┘                    └────────────────────┘
//! ```
//!
//! Only free blocks carry a footer, which is what allows walking backward to a free predecessor. Whether the
//! predecessor is free, or not, is recorded in the `prev` bit of the header of each block.
//!
//! The heap itself is bracketed by sentinels:
//!
//! ```text
//!   ┌─────────┬──────────────────┬──────────────────┬─ ─ ─ ─ ─ ─ ─┬──────────────────┐
//!   │ padding │ prologue header  │ prologue footer  │   blocks    │ epilogue header  │
//!   │         │ 2 words | 1 | 1  │ 2 words | 1 | 1  │             │ 0 | prev | 1     │
//!   └─────────┴──────────────────┴──────────────────┴─ ─ ─ ─ ─ ─ ─┴──────────────────┘
//! ```

use crate::{ALIGNMENT, WORD_SIZE};

use super::arena::Arena;

/// The minimum size of a block: header, predecessor and successor links, footer.
pub(crate) const MINIMUM_BLOCK_SIZE: usize = 4 * WORD_SIZE;

/// The number of bytes taken by the padding, the prologue, and the epilogue.
pub(crate) const SENTINELS_SIZE: usize = 4 * WORD_SIZE;

/// The prologue block, a permanently allocated block without payload.
pub(crate) const PROLOGUE: Block = Block(2 * WORD_SIZE);

/// The size of the prologue block.
pub(crate) const PROLOGUE_SIZE: usize = ALIGNMENT.value();

/// Tag.
///
/// The content of a header, or footer, packed in a single word:
///
/// -   Bit 0: whether the block is allocated.
/// -   Bit 1: whether the previous block is allocated.
/// -   Bit 3 and above: size of the block, a multiple of 8.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Tag(usize);

impl Tag {
    const ALLOCATED: usize = 0b001;
    const PREV_ALLOCATED: usize = 0b010;
    const FLAGS: usize = 0b111;

    /// Creates a new Tag.
    pub(crate) fn new(size: usize, allocated: bool, prev_allocated: bool) -> Self {
        debug_assert!(size & Self::FLAGS == 0, "{} is not a multiple of 8", size);

        let allocated = if allocated { Self::ALLOCATED } else { 0 };
        let prev_allocated = if prev_allocated { Self::PREV_ALLOCATED } else { 0 };

        Self(size | allocated | prev_allocated)
    }

    /// Creates a Tag from its raw word.
    pub(crate) fn from_raw(raw: usize) -> Self { Self(raw) }

    /// Returns the raw word.
    pub(crate) fn raw(&self) -> usize { self.0 }

    /// Returns the size of the block.
    pub(crate) fn size(&self) -> usize { self.0 & !Self::FLAGS }

    /// Returns whether the block is allocated.
    pub(crate) fn is_allocated(&self) -> bool { self.0 & Self::ALLOCATED != 0 }

    /// Returns whether the previous block is allocated.
    pub(crate) fn is_prev_allocated(&self) -> bool { self.0 & Self::PREV_ALLOCATED != 0 }

    /// Returns a copy, with the prev_allocated bit set as specified.
    pub(crate) fn with_prev_allocated(&self, prev_allocated: bool) -> Self {
        Self::new(self.size(), self.is_allocated(), prev_allocated)
    }
}

/// Block.
///
/// The offset of the payload of a block within the Arena.
///
/// All the accessors below are unsafe, and share the same pre-conditions:
///
/// -   Assumes that the Block is a valid block of `arena`: either a sentinel, or a block of the chain.
/// -   Assumes that the tags read are up to date, in particular that a block has a footer only if it is free.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub(crate) struct Block(usize);

impl Block {
    /// Creates a Block from the offset of its payload.
    pub(crate) fn new(offset: usize) -> Self {
        debug_assert!(offset >= PROLOGUE.0, "{} < {}", offset, PROLOGUE.0);

        Self(offset)
    }

    /// Creates a Block from an offset read from a possibly corrupted heap.
    pub(crate) const fn new_unchecked(offset: usize) -> Self { Self(offset) }

    /// Returns the offset of the payload.
    pub(crate) const fn offset(&self) -> usize { self.0 }

    /// Returns the offset of the header.
    pub(crate) fn header_offset(&self) -> usize { self.0 - WORD_SIZE }

    /// Returns the offset of the footer, as per the size stored in the header.
    #[cfg(test)]
    pub(crate) unsafe fn footer_offset(&self, arena: &Arena) -> usize { self.0 + self.size(arena) - 2 * WORD_SIZE }

    /// Returns the header.
    pub(crate) unsafe fn header(&self, arena: &Arena) -> Tag { Tag(arena.read(self.header_offset())) }

    /// Returns the footer.
    ///
    /// Only meaningful for free blocks, and the prologue.
    #[cfg(test)]
    pub(crate) unsafe fn footer(&self, arena: &Arena) -> Tag { Tag(arena.read(self.footer_offset(arena))) }

    /// Returns the size, as per the header.
    pub(crate) unsafe fn size(&self, arena: &Arena) -> usize { self.header(arena).size() }

    /// Overwrites the header.
    pub(crate) unsafe fn set_header(&self, arena: &mut Arena, tag: Tag) { arena.write(self.header_offset(), tag.0) }

    /// Overwrites both header and footer, the latter located as per `tag.size()`.
    pub(crate) unsafe fn set_tags(&self, arena: &mut Arena, tag: Tag) {
        debug_assert!(tag.size() >= MINIMUM_BLOCK_SIZE, "{} < {}", tag.size(), MINIMUM_BLOCK_SIZE);

        arena.write(self.header_offset(), tag.0);
        arena.write(self.0 + tag.size() - 2 * WORD_SIZE, tag.0);
    }

    /// Updates the prev_allocated bit of the header, and of the footer if the block is free.
    pub(crate) unsafe fn set_prev_allocated(&self, arena: &mut Arena, prev_allocated: bool) {
        let tag = self.header(arena).with_prev_allocated(prev_allocated);

        if tag.is_allocated() {
            self.set_header(arena, tag);
        } else {
            self.set_tags(arena, tag);
        }
    }

    /// Returns the block physically following this one.
    pub(crate) unsafe fn next(&self, arena: &Arena) -> Block { Block(self.0 + self.size(arena)) }

    /// Returns the block physically preceding this one.
    ///
    /// The preceding block must be free, as its footer is used to locate its header.
    pub(crate) unsafe fn prev(&self, arena: &Arena) -> Block {
        debug_assert!(!self.header(arena).is_prev_allocated());

        let footer = Tag(arena.read(self.0 - 2 * WORD_SIZE));

        Block(self.0 - footer.size())
    }

    /// Returns the predecessor in the free list.
    ///
    /// Only meaningful for free blocks.
    pub(crate) unsafe fn predecessor(&self, arena: &Arena) -> Option<Block> { Self::decode(arena.read(self.0)) }

    /// Returns the successor in the free list.
    ///
    /// Only meaningful for free blocks.
    pub(crate) unsafe fn successor(&self, arena: &Arena) -> Option<Block> {
        Self::decode(arena.read(self.0 + WORD_SIZE))
    }

    /// Overwrites the predecessor in the free list.
    ///
    /// Only valid for free blocks.
    pub(crate) unsafe fn set_predecessor(&self, arena: &mut Arena, block: Option<Block>) {
        arena.write(self.0, Self::encode(block))
    }

    /// Overwrites the successor in the free list.
    ///
    /// Only valid for free blocks.
    pub(crate) unsafe fn set_successor(&self, arena: &mut Arena, block: Option<Block>) {
        arena.write(self.0 + WORD_SIZE, Self::encode(block))
    }

    //  Offset 0 is the padding word, which is never the payload of a block, and thus encodes None.
    fn encode(block: Option<Block>) -> usize { block.map(|b| b.0).unwrap_or(0) }

    fn decode(raw: usize) -> Option<Block> { if raw == 0 { None } else { Some(Block(raw)) } }
}
