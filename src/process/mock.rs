//! In-memory target for tests and benchmarks
//!
//! `MockProcess` behaves like a traced process: reads and writes only work
//! while attached, unmapped addresses fail like `EIO` would, and every word
//! transfer is counted so cache behaviour can be asserted on. Clones share
//! the same state, so a test can keep one handle while a session owns the
//! other.

use super::{TargetProcess, Word};
use crate::core::types::{Address, MemoryError, MemoryResult, ProcessId, WORD_SIZE};
use crate::memory::regions::{Permissions, Region, RegionSource};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct MockRegion {
    start: usize,
    bytes: Vec<u8>,
    permissions: Permissions,
    pathname: Option<String>,
}

impl MockRegion {
    fn end(&self) -> usize {
        self.start + self.bytes.len()
    }
}

#[derive(Debug, Default)]
struct MockState {
    pid: ProcessId,
    regions: Vec<MockRegion>,
    attached: bool,
    refuse_attach: bool,
    word_reads: usize,
    word_writes: usize,
    attaches: usize,
    detaches: usize,
}

impl MockState {
    fn byte(&self, address: usize) -> Option<u8> {
        self.regions
            .iter()
            .find(|region| address >= region.start && address < region.end())
            .map(|region| region.bytes[address - region.start])
    }

    fn byte_mut(&mut self, address: usize) -> Option<&mut u8> {
        self.regions
            .iter_mut()
            .find(|region| address >= region.start && address < region.end())
            .map(|region| &mut region.bytes[address - region.start])
    }

    fn check_traced(&self, pid: ProcessId) -> MemoryResult<()> {
        if pid != self.pid || !self.attached {
            return Err(MemoryError::NotAttached(pid));
        }
        Ok(())
    }
}

/// Simulated target process
#[derive(Debug, Clone)]
pub struct MockProcess {
    state: Arc<Mutex<MockState>>,
}

impl MockProcess {
    /// Creates an empty target with the given pid
    pub fn new(pid: ProcessId) -> Self {
        MockProcess {
            state: Arc::new(Mutex::new(MockState {
                pid,
                ..MockState::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // a panic while holding the lock only happens inside a failing test
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn pid(&self) -> ProcessId {
        self.state().pid
    }

    /// Maps a readable and writable anonymous region holding `bytes`
    pub fn map(&self, start: usize, bytes: Vec<u8>) {
        self.map_with(start, bytes, "rw-p", None);
    }

    /// Maps a region with explicit permissions and backing path
    pub fn map_with(&self, start: usize, bytes: Vec<u8>, perms: &str, pathname: Option<&str>) {
        let mut state = self.state();
        state.regions.push(MockRegion {
            start,
            bytes,
            permissions: Permissions::parse(perms),
            pathname: pathname.map(str::to_string),
        });
        state.regions.sort_by_key(|region| region.start);
    }

    /// Removes `[start, end)` from the address space, splitting regions
    pub fn unmap(&self, start: usize, end: usize) {
        let mut state = self.state();
        let mut remaining = Vec::new();
        for region in state.regions.drain(..) {
            if region.end() <= start || region.start >= end {
                remaining.push(region);
                continue;
            }
            if region.start < start {
                remaining.push(MockRegion {
                    start: region.start,
                    bytes: region.bytes[..start - region.start].to_vec(),
                    ..region.clone()
                });
            }
            if region.end() > end {
                remaining.push(MockRegion {
                    start: end,
                    bytes: region.bytes[end - region.start..].to_vec(),
                    ..region.clone()
                });
            }
        }
        state.regions = remaining;
    }

    /// Changes target memory behind the scanner's back
    pub fn poke_bytes(&self, address: usize, bytes: &[u8]) {
        let mut state = self.state();
        for (offset, value) in bytes.iter().enumerate() {
            if let Some(slot) = state.byte_mut(address + offset) {
                *slot = *value;
            }
        }
    }

    /// Reads target memory directly, `None` for unmapped bytes
    pub fn peek_bytes(&self, address: usize, len: usize) -> Option<Vec<u8>> {
        let state = self.state();
        (0..len).map(|offset| state.byte(address + offset)).collect()
    }

    /// Makes subsequent attaches fail as if permission were denied
    pub fn refuse_attach(&self, refuse: bool) {
        self.state().refuse_attach = refuse;
    }

    pub fn is_attached(&self) -> bool {
        self.state().attached
    }

    pub fn word_reads(&self) -> usize {
        self.state().word_reads
    }

    pub fn word_writes(&self) -> usize {
        self.state().word_writes
    }

    pub fn attaches(&self) -> usize {
        self.state().attaches
    }

    pub fn detaches(&self) -> usize {
        self.state().detaches
    }
}

impl TargetProcess for MockProcess {
    fn attach(&mut self, pid: ProcessId) -> MemoryResult<()> {
        let mut state = self.state();
        if pid != state.pid {
            return Err(MemoryError::attach_failed(pid, "No such process"));
        }
        if state.refuse_attach {
            return Err(MemoryError::attach_failed(pid, "Operation not permitted"));
        }
        state.attached = true;
        state.attaches += 1;
        Ok(())
    }

    fn detach(&mut self, pid: ProcessId) -> MemoryResult<()> {
        let mut state = self.state();
        if pid != state.pid || !state.attached {
            return Err(MemoryError::detach_failed(pid, "No such process"));
        }
        state.attached = false;
        state.detaches += 1;
        Ok(())
    }

    fn read_word(&mut self, pid: ProcessId, address: Address) -> MemoryResult<Word> {
        let mut state = self.state();
        state.check_traced(pid)?;
        state.word_reads += 1;

        let mut word = [0u8; WORD_SIZE];
        for (offset, slot) in word.iter_mut().enumerate() {
            *slot = state
                .byte(address.as_usize() + offset)
                .ok_or_else(|| MemoryError::peek_failed(address, "Input/output error"))?;
        }
        Ok(word)
    }

    fn write_word(&mut self, pid: ProcessId, address: Address, word: Word) -> MemoryResult<()> {
        let mut state = self.state();
        state.check_traced(pid)?;

        let base = address.as_usize();
        if (0..WORD_SIZE).any(|offset| state.byte(base + offset).is_none()) {
            return Err(MemoryError::write_failed(address, "Input/output error"));
        }
        for (offset, value) in word.iter().enumerate() {
            if let Some(slot) = state.byte_mut(base + offset) {
                *slot = *value;
            }
        }
        state.word_writes += 1;
        Ok(())
    }
}

impl RegionSource for MockProcess {
    fn regions(&self, pid: ProcessId) -> MemoryResult<Vec<Region>> {
        let state = self.state();
        if pid != state.pid {
            return Err(MemoryError::MapsParse(format!("no maps for process {}", pid)));
        }
        Ok(state
            .regions
            .iter()
            .map(|region| Region {
                start: Address::new(region.start),
                size: region.bytes.len(),
                permissions: region.permissions,
                pathname: region.pathname.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_require_attach() {
        let mut mock = MockProcess::new(42);
        mock.map(0x1000, vec![7; 16]);

        assert!(matches!(
            mock.read_word(42, Address::new(0x1000)),
            Err(MemoryError::NotAttached(42))
        ));

        mock.attach(42).unwrap();
        assert_eq!(mock.read_word(42, Address::new(0x1000)).unwrap(), [7; WORD_SIZE]);
        assert_eq!(mock.word_reads(), 1);
        mock.detach(42).unwrap();
        assert!(!mock.is_attached());
    }

    #[test]
    fn test_attach_wrong_pid() {
        let mut mock = MockProcess::new(42);
        assert!(matches!(
            mock.attach(43),
            Err(MemoryError::AttachFailed { pid: 43, .. })
        ));
        mock.refuse_attach(true);
        assert!(mock.attach(42).is_err());
    }

    #[test]
    fn test_word_crossing_region_end_fails() {
        let mut mock = MockProcess::new(1);
        mock.map(0x1000, vec![0; 12]);
        mock.attach(1).unwrap();
        assert!(mock.read_word(1, Address::new(0x1000)).is_ok());
        assert!(mock.read_word(1, Address::new(0x1008)).is_err());
    }

    #[test]
    fn test_unmap_splits_region() {
        let mock = MockProcess::new(1);
        mock.map(0x1000, (0..32).collect());
        mock.unmap(0x1008, 0x1010);

        let regions = mock.regions(1).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].size, 8);
        assert_eq!(regions[1].start, Address::new(0x1010));
        assert_eq!(mock.peek_bytes(0x1010, 2), Some(vec![16, 17]));
        assert_eq!(mock.peek_bytes(0x1007, 2), None);
    }

    #[test]
    fn test_write_word() {
        let mut mock = MockProcess::new(1);
        mock.map(0x2000, vec![0; 16]);
        mock.attach(1).unwrap();
        mock.write_word(1, Address::new(0x2004), [1, 2, 3, 4, 5, 6, 7, 8])
            .unwrap();
        assert_eq!(mock.peek_bytes(0x2004, 8), Some(vec![1, 2, 3, 4, 5, 6, 7, 8]));
        assert!(mock
            .write_word(1, Address::new(0x200c), [0; WORD_SIZE])
            .is_err());
    }
}
