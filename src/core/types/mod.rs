//! Core type definitions for memscan
//!
//! This module contains all fundamental types used throughout the crate:
//! target addresses, typed values with per-width candidacy, scan modes and
//! error types.

mod address;
mod error;
mod scan_result;
mod value;

// Re-export all public types
pub use address::Address;
pub use error::{MemoryError, MemoryResult};
pub use scan_result::{MatchEntry, MatchReport, ScanType};
pub use value::{TypedValue, ValueWidth, WidthFlags, WidthValue, MAX_VALUE_BYTES};

/// Target process identifier, as understood by the kernel
pub type ProcessId = i32;

/// Size in bytes of one ptrace transfer
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();
