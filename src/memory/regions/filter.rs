//! Memory region filtering functionality

use super::Region;
use crate::config::ScannerConfig;

/// Decides which mappings the scan engine walks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionFilter {
    /// Keep only mappings that are both readable and writable
    pub require_writable: bool,
    /// Skip mappings larger than this; 0 disables the limit
    pub max_region_size: usize,
}

impl Default for RegionFilter {
    fn default() -> Self {
        RegionFilter {
            require_writable: true,
            max_region_size: 0,
        }
    }
}

impl RegionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the filter from the `[scanner]` section
    pub fn from_config(config: &ScannerConfig) -> Self {
        RegionFilter {
            require_writable: config.require_writable,
            max_region_size: config.max_region_size,
        }
    }

    /// Check if a region matches the filter criteria
    pub fn matches(&self, region: &Region) -> bool {
        if region.size == 0 || !region.permissions.read {
            return false;
        }
        if self.require_writable && !region.permissions.write {
            return false;
        }
        if self.max_region_size != 0 && region.size > self.max_region_size {
            return false;
        }
        true
    }

    /// Apply the filter, returning the kept regions sorted by start address
    pub fn apply(&self, regions: Vec<Region>) -> Vec<Region> {
        let mut kept: Vec<Region> = regions
            .into_iter()
            .filter(|region| self.matches(region))
            .collect();
        kept.sort_by_key(|region| region.start);
        kept
    }
}
