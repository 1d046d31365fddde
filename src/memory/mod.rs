//! Memory operations module for reading, writing and scanning process memory
//!
//! This module provides the scan engine and everything below it:
//! - Cached word reads and width-sized writes against a stopped target
//! - The swath-based match store
//! - Region listing from `/proc/<pid>/maps`
//! - Population, refinement and snapshot passes

pub mod reader;
pub mod regions;
pub mod scanner;
pub mod store;
pub mod writer;

pub use reader::{PeekBytes, WordCache};
pub use regions::{Permissions, Region, RegionFilter, RegionSource};
pub use scanner::{MemoryScanner, ScanStats};
pub use store::{MatchLocation, MatchStore, Swath};

use crate::core::types::{MemoryResult, ProcessId};
use crate::process::{AttachmentGuard, TargetProcess};

/// A process backend plus the read cache that sits in front of it.
///
/// All target memory traffic goes through an [`AttachmentGuard`] obtained
/// from [`MemoryAccess::attach`], so the target is always stopped while it is
/// read or written and resumed afterwards.
pub struct MemoryAccess<P: TargetProcess> {
    pub(crate) process: P,
    pub(crate) cache: WordCache,
}

impl<P: TargetProcess> MemoryAccess<P> {
    pub fn new(process: P) -> Self {
        MemoryAccess {
            process,
            cache: WordCache::new(),
        }
    }

    /// Stops `pid` for the lifetime of the returned guard
    pub fn attach(&mut self, pid: ProcessId) -> MemoryResult<AttachmentGuard<'_, P>> {
        AttachmentGuard::attach(self, pid)
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    pub fn process_mut(&mut self) -> &mut P {
        &mut self.process
    }

    pub fn cache(&self) -> &WordCache {
        &self.cache
    }

    /// Drops every cached word, e.g. when the target changes
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}
