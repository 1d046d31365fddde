//! Run-length segmented storage for match candidates
//!
//! Tracked addresses are grouped into swaths: a 16-byte header holding the
//! start address and length, followed by one two-byte record (old byte, width
//! flags) per address. Swaths sit back to back in a single `Vec<u8>` and the
//! sequence ends with an all-zero sentinel header. Memory use therefore grows
//! with the number of address-range boundaries, not with one struct per byte.
//!
//! Records whose flags are empty are bookkeeping: they are not matches but
//! keep the bytes a wider neighbouring match needs to rebuild its old value.

mod swath;

pub use swath::{Swath, HEADER_SIZE, RECORD_SIZE};

use crate::core::types::{Address, MatchEntry, MemoryError, MemoryResult, TypedValue, WidthFlags};
use swath::write_header;

/// Position of one record: the header offset of its swath plus its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchLocation {
    pub swath: usize,
    pub index: usize,
}

/// Swath-segmented set of tracked addresses
#[derive(Debug, Clone)]
pub struct MatchStore {
    buffer: Vec<u8>,
    // header offset of the swath accepting appends
    open: Option<usize>,
    last_end: Option<usize>,
    match_count: usize,
    entry_count: usize,
    finalized: bool,
}

impl Default for MatchStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchStore {
    /// An empty, finalized store holding only the sentinel
    pub fn new() -> Self {
        MatchStore {
            buffer: vec![0u8; HEADER_SIZE],
            open: None,
            last_end: None,
            match_count: 0,
            entry_count: 0,
            finalized: true,
        }
    }

    fn grow(&mut self, additional: usize) -> MemoryResult<()> {
        self.buffer
            .try_reserve(additional)
            .map_err(|_| MemoryError::AllocationFailed {
                requested: self.buffer.len() + additional,
            })
    }

    /// Records `address`, extending the open swath when it is exactly one
    /// past the previous address and opening a new one otherwise.
    ///
    /// Addresses must be strictly increasing across all appends.
    pub fn append(&mut self, address: Address, old_byte: u8, flags: WidthFlags) -> MemoryResult<()> {
        let address = address.as_usize();
        if let Some(end) = self.last_end {
            if address < end {
                return Err(MemoryError::InvalidAddress(format!(
                    "{} appended after {}",
                    Address::new(address),
                    Address::new(end - 1)
                )));
            }
        }

        if self.finalized {
            self.buffer.truncate(self.buffer.len() - HEADER_SIZE);
            self.finalized = false;
        }

        match self.open {
            Some(offset) if self.last_end == Some(address) => {
                self.grow(RECORD_SIZE)?;
                self.buffer.push(old_byte);
                self.buffer.push(flags.bits());
                let (start, len) = swath::read_header(&self.buffer, offset);
                write_header(&mut self.buffer, offset, start, len + 1);
            }
            _ => {
                self.grow(HEADER_SIZE + RECORD_SIZE)?;
                let offset = self.buffer.len();
                self.buffer.extend_from_slice(&[0u8; HEADER_SIZE]);
                write_header(&mut self.buffer, offset, address, 1);
                self.buffer.push(old_byte);
                self.buffer.push(flags.bits());
                self.open = Some(offset);
            }
        }

        self.last_end = Some(address + 1);
        self.entry_count += 1;
        if !flags.is_empty() {
            self.match_count += 1;
        }
        Ok(())
    }

    /// Terminates the swath sequence and releases unused capacity
    pub fn finalize(&mut self) -> MemoryResult<()> {
        if !self.finalized {
            self.grow(HEADER_SIZE)?;
            self.buffer.extend_from_slice(&[0u8; HEADER_SIZE]);
            self.finalized = true;
        }
        self.buffer.shrink_to_fit();
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of records with at least one live width
    pub fn count(&self) -> usize {
        self.match_count
    }

    /// Number of records, bookkeeping included
    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    pub fn swath_count(&self) -> usize {
        self.swaths().count()
    }

    /// Bytes currently reserved for the buffer
    pub fn allocated_bytes(&self) -> usize {
        self.buffer.capacity()
    }

    /// Bytes holding swaths, plus the sentinel once finalized
    pub fn used_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Swaths in address order
    pub fn swaths(&self) -> Swaths<'_> {
        Swaths {
            buffer: &self.buffer,
            offset: 0,
        }
    }

    pub fn swath(&self, offset: usize) -> Option<Swath<'_>> {
        Swath::at(&self.buffer, offset)
    }

    /// Every record, bookkeeping included, in address order
    pub fn iter(&self) -> impl Iterator<Item = MatchEntry> + '_ {
        self.swaths().flat_map(|swath| swath.entries())
    }

    /// Live matches with their locations, in address order
    pub fn matches(&self) -> impl Iterator<Item = (MatchLocation, MatchEntry)> + '_ {
        self.swaths().flat_map(|swath| {
            swath.entries().enumerate().filter_map(move |(index, entry)| {
                entry.is_match().then_some((
                    MatchLocation {
                        swath: swath.offset(),
                        index,
                    },
                    entry,
                ))
            })
        })
    }

    /// Resolves match number `n`, counting only live records
    pub fn nth(&self, n: usize) -> Option<MatchLocation> {
        if n >= self.match_count {
            return None;
        }
        self.matches().nth(n).map(|(location, _)| location)
    }

    pub fn entry(&self, location: MatchLocation) -> Option<MatchEntry> {
        let swath = self.swath(location.swath)?;
        (location.index < swath.len()).then(|| swath.entry(location.index))
    }

    /// The last observed value of the record at `location`
    pub fn old_value(&self, location: MatchLocation) -> Option<TypedValue> {
        let swath = self.swath(location.swath)?;
        (location.index < swath.len()).then(|| swath.old_value(location.index))
    }

    /// Looks up the record tracking `address`
    pub fn find(&self, address: Address) -> Option<MatchLocation> {
        self.swaths()
            .take_while(|swath| swath.start() <= address)
            .find(|swath| address < swath.end())
            .map(|swath| MatchLocation {
                swath: swath.offset(),
                index: address.as_usize() - swath.start().as_usize(),
            })
    }

    /// Clears the flags of one record so it is no longer a match.
    ///
    /// The record stays in place as bookkeeping; returns false when there
    /// was no live match at `location`.
    pub fn forget(&mut self, location: MatchLocation) -> bool {
        let live = self
            .entry(location)
            .map_or(false, |entry| entry.is_match());
        if !live {
            return false;
        }
        let flags_at = location.swath + HEADER_SIZE + location.index * RECORD_SIZE + 1;
        self.buffer[flags_at] = WidthFlags::empty().bits();
        self.match_count -= 1;
        true
    }

    /// Removes every record in `[start, end)` and returns the new match count.
    ///
    /// The store is rebuilt into a fresh buffer and only replaced once that
    /// succeeds. Records on either side of the range stay in order, and a
    /// surviving match loses the widths whose bytes fell inside the range.
    pub fn delete_range(&mut self, start: Address, end: Address) -> MemoryResult<usize> {
        if start >= end {
            return Ok(self.match_count);
        }
        let mut rebuilt = MatchStore::new();

        for swath in self.swaths() {
            if swath.end() <= start || swath.start() >= end {
                for entry in swath.entries() {
                    rebuilt.append(entry.address, entry.old_byte, entry.flags)?;
                }
                continue;
            }

            for entry in swath.entries() {
                if entry.address.within(start, end) {
                    continue;
                }
                let run_end = if entry.address < start {
                    start.min(swath.end())
                } else {
                    swath.end()
                };
                let available = run_end.as_usize() - entry.address.as_usize();
                let flags = entry.flags & WidthFlags::fitting(available);
                rebuilt.append(entry.address, entry.old_byte, flags)?;
            }
        }

        rebuilt.finalize()?;
        *self = rebuilt;
        Ok(self.match_count)
    }

    /// Drops every record and the allocation behind them
    pub fn clear(&mut self) {
        *self = MatchStore::new();
    }
}

/// Iterator over the swaths of a store, stopping at the sentinel
#[derive(Debug, Clone)]
pub struct Swaths<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for Swaths<'a> {
    type Item = Swath<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let swath = Swath::at(self.buffer, self.offset)?;
        self.offset = swath.next_offset();
        Some(swath)
    }
}
