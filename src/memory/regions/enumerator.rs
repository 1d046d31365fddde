//! `/proc/<pid>/maps` parsing

use super::{Permissions, Region, RegionSource};
use crate::core::types::{Address, MemoryError, MemoryResult, ProcessId};
use crate::process::PtraceProcess;
use std::fs;
use tracing::debug;

/// Parses one line of the form `start-end perms offset dev inode [pathname]`
pub fn parse_maps_line(line: &str) -> MemoryResult<Region> {
    let malformed = || MemoryError::MapsParse(line.to_string());

    let mut rest = line.trim_end();
    let mut fields = [""; 5];
    for field in fields.iter_mut() {
        rest = rest.trim_start();
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        if end == 0 {
            return Err(malformed());
        }
        *field = &rest[..end];
        rest = &rest[end..];
    }

    let (start, end) = fields[0].split_once('-').ok_or_else(malformed)?;
    let start = usize::from_str_radix(start, 16).map_err(|_| malformed())?;
    let end = usize::from_str_radix(end, 16).map_err(|_| malformed())?;
    if end < start {
        return Err(malformed());
    }

    let pathname = rest.trim();
    Ok(Region {
        start: Address::new(start),
        size: end - start,
        permissions: Permissions::parse(fields[1]),
        pathname: (!pathname.is_empty()).then(|| pathname.to_string()),
    })
}

/// Parses a whole maps listing, skipping blank lines
pub fn parse_maps(text: &str) -> MemoryResult<Vec<Region>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_maps_line)
        .collect()
}

/// Reads the current mappings of `pid`
pub fn read_maps(pid: ProcessId) -> MemoryResult<Vec<Region>> {
    let path = format!("/proc/{}/maps", pid);
    let text = fs::read_to_string(&path)?;
    let regions = parse_maps(&text)?;
    debug!(pid, count = regions.len(), "read memory map");
    Ok(regions)
}

impl RegionSource for PtraceProcess {
    fn regions(&self, pid: ProcessId) -> MemoryResult<Vec<Region>> {
        read_maps(pid)
    }
}
