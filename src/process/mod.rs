//! Process control for Linux targets
//!
//! This module provides the seam between the scan engine and the kernel:
//! stopping and resuming a target, and moving single machine words in and
//! out of its address space.

pub mod handle;
pub mod manager;
pub mod mock;

pub use handle::PtraceProcess;
pub use manager::AttachmentGuard;
pub use mock::MockProcess;

use crate::core::types::{Address, MemoryResult, ProcessId, WORD_SIZE};

/// One machine word as laid out in target memory
pub type Word = [u8; WORD_SIZE];

/// Word-level access to a traced process.
///
/// `read_word` and `write_word` are only meaningful between a successful
/// `attach` and the matching `detach`.
pub trait TargetProcess {
    /// Stops the target and blocks until the stop has been observed
    fn attach(&mut self, pid: ProcessId) -> MemoryResult<()>;

    /// Resumes a stopped target
    fn detach(&mut self, pid: ProcessId) -> MemoryResult<()>;

    /// Reads the word starting at `address`, which need not be aligned
    fn read_word(&mut self, pid: ProcessId, address: Address) -> MemoryResult<Word>;

    /// Overwrites the word starting at `address`
    fn write_word(&mut self, pid: ProcessId, address: Address, word: Word) -> MemoryResult<()>;
}
