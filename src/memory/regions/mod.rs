//! Memory regions of a Linux process
//!
//! Regions come from `/proc/<pid>/maps`. Only regions that are both readable
//! and writable are normally scanned; the filter decides which ones the scan
//! engine gets to see.

pub mod enumerator;
pub mod filter;

pub use enumerator::{parse_maps, parse_maps_line, read_maps};
pub use filter::RegionFilter;

use crate::core::types::{Address, MemoryResult, ProcessId};
use std::fmt;

/// Access bits from the `perms` column of a maps line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
    pub exec: bool,
    pub shared: bool,
}

impl Permissions {
    /// Parses a `rwxp`-style column; unknown characters read as absent
    pub fn parse(perms: &str) -> Self {
        let bytes = perms.as_bytes();
        let at = |index: usize, expected: u8| bytes.get(index) == Some(&expected);
        Permissions {
            read: at(0, b'r'),
            write: at(1, b'w'),
            exec: at(2, b'x'),
            shared: at(3, b's'),
        }
    }

    /// Readable and writable, which is what a scan needs
    pub fn is_scannable(&self) -> bool {
        self.read && self.write
    }
}

impl fmt::Display for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}",
            if self.read { 'r' } else { '-' },
            if self.write { 'w' } else { '-' },
            if self.exec { 'x' } else { '-' },
            if self.shared { 's' } else { 'p' }
        )
    }
}

/// One mapping of the target's address space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub start: Address,
    pub size: usize,
    pub permissions: Permissions,
    pub pathname: Option<String>,
}

impl Region {
    /// One past the last address of the region
    pub fn end(&self) -> Address {
        self.start.add(self.size)
    }

    pub fn contains(&self, address: Address) -> bool {
        address.within(self.start, self.end())
    }

    /// The backing path, or `unassociated` for anonymous memory
    pub fn label(&self) -> &str {
        self.pathname.as_deref().unwrap_or("unassociated")
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {} bytes, {}, {}",
            self.start,
            self.size,
            self.permissions,
            self.label()
        )
    }
}

/// Anything that can list the mappings of a process
pub trait RegionSource {
    fn regions(&self, pid: ProcessId) -> MemoryResult<Vec<Region>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_parse() {
        let perms = Permissions::parse("rw-p");
        assert!(perms.read && perms.write);
        assert!(!perms.exec && !perms.shared);
        assert!(perms.is_scannable());
        assert_eq!(perms.to_string(), "rw-p");

        let text = Permissions::parse("r-xs");
        assert!(text.exec && text.shared);
        assert!(!text.is_scannable());
        assert_eq!(Permissions::parse(""), Permissions::default());
    }

    #[test]
    fn test_region_bounds() {
        let region = Region {
            start: Address::new(0x1000),
            size: 0x10,
            permissions: Permissions::parse("rw-p"),
            pathname: None,
        };
        assert_eq!(region.end(), Address::new(0x1010));
        assert!(region.contains(Address::new(0x100f)));
        assert!(!region.contains(Address::new(0x1010)));
        assert_eq!(region.label(), "unassociated");
        assert_eq!(
            region.to_string(),
            "0x000000001000, 16 bytes, rw-p, unassociated"
        );
    }
}
