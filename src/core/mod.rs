//! Core module containing fundamental types for memscan
//!
//! This module provides the foundational building blocks used throughout
//! the scanner, including address handling, typed values, scan modes and
//! error types.

pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    Address, MatchEntry, MemoryError, MemoryResult, ProcessId, ScanType, TypedValue, ValueWidth,
    WidthFlags,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

// Platform verification at compile time
#[cfg(not(any(target_os = "linux", target_os = "android")))]
compile_error!("memscan only supports Linux and Android targets");

#[cfg(not(target_pointer_width = "64"))]
compile_error!("memscan requires 64-bit architecture");
