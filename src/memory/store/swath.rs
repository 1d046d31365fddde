//! Read-only view of one swath inside the store buffer

use crate::core::types::{Address, MatchEntry, TypedValue, WidthFlags, MAX_VALUE_BYTES};

/// Bytes taken by a swath header: start address then length, both u64 LE
pub const HEADER_SIZE: usize = 16;

/// Bytes taken by one record: old byte then width flags
pub const RECORD_SIZE: usize = 2;

pub(crate) fn read_header(buffer: &[u8], offset: usize) -> (usize, usize) {
    let mut start = [0u8; 8];
    let mut len = [0u8; 8];
    start.copy_from_slice(&buffer[offset..offset + 8]);
    len.copy_from_slice(&buffer[offset + 8..offset + HEADER_SIZE]);
    (
        u64::from_le_bytes(start) as usize,
        u64::from_le_bytes(len) as usize,
    )
}

pub(crate) fn write_header(buffer: &mut [u8], offset: usize, start: usize, len: usize) {
    buffer[offset..offset + 8].copy_from_slice(&(start as u64).to_le_bytes());
    buffer[offset + 8..offset + HEADER_SIZE].copy_from_slice(&(len as u64).to_le_bytes());
}

/// A maximal run of contiguous tracked addresses.
///
/// Borrowed from the store; holds the header offset, never a pointer, so
/// it cannot outlive a buffer reallocation.
#[derive(Debug, Clone, Copy)]
pub struct Swath<'a> {
    buffer: &'a [u8],
    offset: usize,
    start: usize,
    len: usize,
}

impl<'a> Swath<'a> {
    /// Decodes the swath whose header sits at `offset`
    pub(crate) fn at(buffer: &'a [u8], offset: usize) -> Option<Self> {
        if offset + HEADER_SIZE > buffer.len() {
            return None;
        }
        let (start, len) = read_header(buffer, offset);
        if len == 0 || offset + HEADER_SIZE + len * RECORD_SIZE > buffer.len() {
            return None;
        }
        Some(Swath {
            buffer,
            offset,
            start,
            len,
        })
    }

    /// Header offset inside the store buffer
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Offset of the header that follows this swath
    pub fn next_offset(&self) -> usize {
        self.offset + HEADER_SIZE + self.len * RECORD_SIZE
    }

    pub fn start(&self) -> Address {
        Address::new(self.start)
    }

    /// One past the last tracked address
    pub fn end(&self) -> Address {
        Address::new(self.start + self.len)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn address(&self, index: usize) -> Address {
        Address::new(self.start + index)
    }

    fn record(&self, index: usize) -> usize {
        debug_assert!(index < self.len, "swath index {} out of {}", index, self.len);
        self.offset + HEADER_SIZE + index * RECORD_SIZE
    }

    pub fn old_byte(&self, index: usize) -> u8 {
        self.buffer[self.record(index)]
    }

    pub fn flags(&self, index: usize) -> WidthFlags {
        WidthFlags::from_bits_truncate(self.buffer[self.record(index) + 1])
    }

    pub fn entry(&self, index: usize) -> MatchEntry {
        MatchEntry::new(self.address(index), self.old_byte(index), self.flags(index))
    }

    /// Every record in address order
    pub fn entries(&self) -> impl Iterator<Item = MatchEntry> + 'a {
        let swath = *self;
        (0..swath.len).map(move |index| swath.entry(index))
    }

    /// The last observed value at `index`.
    ///
    /// Assembled from the old bytes of this record and the ones after it in
    /// the same swath; widths needing bytes past the swath end are dropped.
    pub fn old_value(&self, index: usize) -> TypedValue {
        let available = (self.len - index).min(MAX_VALUE_BYTES);
        let mut bytes = [0u8; MAX_VALUE_BYTES];
        for (offset, slot) in bytes.iter_mut().take(available).enumerate() {
            *slot = self.old_byte(index + offset);
        }
        TypedValue::from_bytes(&bytes[..available])
            .with_flags(self.flags(index))
            .seen()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ValueWidth, WidthValue};

    fn swath_bytes(start: usize, records: &[(u8, WidthFlags)]) -> Vec<u8> {
        let mut buffer = vec![0u8; HEADER_SIZE];
        write_header(&mut buffer, 0, start, records.len());
        for (byte, flags) in records {
            buffer.push(*byte);
            buffer.push(flags.bits());
        }
        buffer
    }

    #[test]
    fn test_header_round_trip() {
        let mut buffer = vec![0u8; HEADER_SIZE];
        write_header(&mut buffer, 0, 0x7fff_0000_1000, 42);
        assert_eq!(read_header(&buffer, 0), (0x7fff_0000_1000, 42));
    }

    #[test]
    fn test_records() {
        let buffer = swath_bytes(
            0x1000,
            &[(5, WidthFlags::U8 | WidthFlags::U16), (0, WidthFlags::empty())],
        );
        let swath = Swath::at(&buffer, 0).unwrap();

        assert_eq!(swath.len(), 2);
        assert_eq!(swath.end(), Address::new(0x1002));
        assert_eq!(swath.next_offset(), buffer.len());
        assert_eq!(swath.entry(1).address, Address::new(0x1001));
        assert!(!swath.entry(1).is_match());

        let value = swath.old_value(0);
        assert_eq!(value.get(ValueWidth::U16), Some(WidthValue::U16(5)));
        assert!(value.is_seen());
    }

    #[test]
    fn test_old_value_clipped_at_swath_end() {
        let buffer = swath_bytes(0x1000, &[(1, WidthFlags::all()), (2, WidthFlags::U8)]);
        let swath = Swath::at(&buffer, 0).unwrap();

        assert_eq!(swath.old_value(0).flags(), WidthFlags::U8 | WidthFlags::U16);
        assert_eq!(swath.old_value(1).bytes(), &[2]);
    }

    #[test]
    fn test_sentinel_is_not_a_swath() {
        let buffer = vec![0u8; HEADER_SIZE];
        assert!(Swath::at(&buffer, 0).is_none());
        assert!(Swath::at(&buffer, 8).is_none());
    }
}
