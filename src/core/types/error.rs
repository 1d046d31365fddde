//! Custom error types for memscan

use std::fmt;
use thiserror::Error;

/// Main error type for memory operations
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Invalid memory address: {0}")]
    InvalidAddress(String),

    #[error("Failed to attach to process {pid}: {reason}")]
    AttachFailed { pid: i32, reason: String },

    #[error("Failed to detach from process {pid}: {reason}")]
    DetachFailed { pid: i32, reason: String },

    #[error("Failed to read memory at {address}: {reason}")]
    PeekFailed { address: String, reason: String },

    #[error("Failed to write memory at {address}: {reason}")]
    WriteFailed { address: String, reason: String },

    #[error("Allocation of {requested} bytes for the match store failed")]
    AllocationFailed { requested: usize },

    #[error("Unable to parse `{input}`: {reason}")]
    ParseFailed { input: String, reason: String },

    #[error("No target process is set")]
    NoTarget,

    #[error("No matches are known yet")]
    NoMatches,

    #[error("Match not found: {0}")]
    MatchNotFound(usize),

    #[error("Region not found: {0}")]
    RegionNotFound(usize),

    #[error("No width of match at {address} can hold {value}")]
    WidthMismatch { address: String, value: String },

    #[error("Process {0} is not attached")]
    NotAttached(i32),

    #[error("Malformed maps line: {0}")]
    MapsParse(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

impl MemoryError {
    /// Creates an attach failure for a process
    pub fn attach_failed(pid: i32, reason: impl Into<String>) -> Self {
        MemoryError::AttachFailed {
            pid,
            reason: reason.into(),
        }
    }

    /// Creates a detach failure for a process
    pub fn detach_failed(pid: i32, reason: impl Into<String>) -> Self {
        MemoryError::DetachFailed {
            pid,
            reason: reason.into(),
        }
    }

    /// Creates a read failed error
    pub fn peek_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::PeekFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a write failed error
    pub fn write_failed(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::WriteFailed {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a literal parse error
    pub fn parse_failed(input: impl Into<String>, reason: impl Into<String>) -> Self {
        MemoryError::ParseFailed {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// A failed peek only invalidates one candidate; everything else aborts
    /// the operation that raised it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, MemoryError::PeekFailed { .. })
    }
}
