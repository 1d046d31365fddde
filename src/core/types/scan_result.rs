//! Scan modes and materialized match entries

use super::value::{TypedValue, WidthFlags};
use super::Address;

/// Comparison applied to every live width during a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanType {
    /// Equals a user-supplied literal
    Exact,
    /// Unchanged since the last observation
    Equal,
    /// Greater than the last observation
    Increment,
    /// Less than the last observation
    Decrement,
}

impl ScanType {
    /// Checks if this scan type compares against the previously recorded value
    pub fn requires_previous(&self) -> bool {
        matches!(
            self,
            ScanType::Equal | ScanType::Increment | ScanType::Decrement
        )
    }

    /// Checks if this scan type requires a literal
    pub fn requires_value(&self) -> bool {
        matches!(self, ScanType::Exact)
    }

    /// Evaluates the comparison between the current and the reference value
    pub fn holds(&self, current: u64, reference: u64) -> bool {
        match self {
            ScanType::Exact | ScanType::Equal => current == reference,
            ScanType::Increment => current > reference,
            ScanType::Decrement => current < reference,
        }
    }
}

/// One tracked address as seen through the match store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchEntry {
    pub address: Address,
    pub old_byte: u8,
    pub flags: WidthFlags,
}

impl MatchEntry {
    pub fn new(address: Address, old_byte: u8, flags: WidthFlags) -> Self {
        MatchEntry {
            address,
            old_byte,
            flags,
        }
    }

    /// Entries with no live width only keep bytes for wider neighbours
    pub fn is_match(&self) -> bool {
        !self.flags.is_empty()
    }
}

/// A match resolved for display: its address, last value and owning region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub index: usize,
    pub address: Address,
    pub value: TypedValue,
    pub region: Option<String>,
}
