//! Reporter forwarding to the `log` facade.

use segalloc_core::{BlockInfo, Inconsistency, Reporter};

/// Reporter logging each block at debug level, and each inconsistency at error level.
#[derive(Debug, Default)]
pub struct LogReporter {
    blocks: usize,
    inconsistencies: usize,
}

impl LogReporter {
    /// Creates an instance.
    pub const fn new() -> Self { Self { blocks: 0, inconsistencies: 0 } }

    /// Returns the number of blocks logged.
    pub fn blocks(&self) -> usize { self.blocks }

    /// Returns the number of inconsistencies logged.
    pub fn inconsistencies(&self) -> usize { self.inconsistencies }
}

impl Reporter for LogReporter {
    fn block(&mut self, block: BlockInfo) {
        self.blocks += 1;
        log::debug!("{}", block);
    }

    fn inconsistency(&mut self, inconsistency: Inconsistency) {
        self.inconsistencies += 1;
        log::error!("{}", inconsistency);
    }
}
