//! memscan: interactive memory scanner and patcher for Linux processes
//!
//! The crate is layered the way a scan flows:
//! - [`process`] stops and resumes a target and moves words in and out of it
//! - [`memory`] caches reads, stores matches in swaths and runs scan passes
//! - [`session`] binds all of that to one target pid
//! - [`command`] is the prompt language on top

pub mod command;
pub mod config;
pub mod core;
pub mod memory;
pub mod process;
pub mod session;

// Re-export main types from core module
pub use crate::core::types::{
    Address, MatchEntry, MatchReport, MemoryError, MemoryResult, ProcessId, ScanType, TypedValue,
    ValueWidth, WidthFlags, WidthValue,
};

pub use command::{dispatch, Command, Flow};
pub use memory::{MatchStore, MemoryAccess, MemoryScanner, Region, RegionFilter, RegionSource};
pub use process::{MockProcess, PtraceProcess, TargetProcess};
pub use session::{Session, SessionOptions, SetSpec, SetTarget};

// Re-export core directly for full access
pub use crate::core::{AUTHORS, VERSION};
