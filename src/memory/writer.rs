//! Width-sized writes through read-modify-write of one word

use super::reader::WordCache;
use crate::core::types::{
    Address, MemoryError, MemoryResult, ProcessId, TypedValue, ValueWidth, WORD_SIZE,
};
use crate::process::{TargetProcess, Word};
use tracing::debug;

/// Writes `value` at `address` using exactly `width` bytes.
///
/// Only the aligned words holding `[address, address + width)` are read and
/// written back, so neighbouring bytes keep their contents and nothing past
/// the last written byte has to be mapped. The read cache is flushed
/// whatever the outcome.
pub fn poke<P: TargetProcess>(
    process: &mut P,
    cache: &mut WordCache,
    pid: ProcessId,
    address: Address,
    value: &TypedValue,
    width: ValueWidth,
) -> MemoryResult<()> {
    let bytes = value
        .bytes_for(width)
        .ok_or_else(|| MemoryError::WidthMismatch {
            address: address.to_string(),
            value: value.to_string(),
        })?;

    cache.clear();

    let base = address.align_down(WORD_SIZE);
    let offset = address.misalignment(WORD_SIZE);
    let head = bytes.len().min(WORD_SIZE - offset);

    let mut first = read_for_write(process, pid, base, address)?;
    first[offset..offset + head].copy_from_slice(&bytes[..head]);

    // a width crossing the word boundary also patches the start of the next word
    let second = if head < bytes.len() {
        let next = base.add(WORD_SIZE);
        let mut word = read_for_write(process, pid, next, address)?;
        word[..bytes.len() - head].copy_from_slice(&bytes[head..]);
        Some((next, word))
    } else {
        None
    };

    process.write_word(pid, base, first)?;
    if let Some((next, word)) = second {
        process.write_word(pid, next, word)?;
    }
    debug!(pid, %address, width = width.name(), "wrote value");
    Ok(())
}

fn read_for_write<P: TargetProcess>(
    process: &mut P,
    pid: ProcessId,
    base: Address,
    address: Address,
) -> MemoryResult<Word> {
    process
        .read_word(pid, base)
        .map_err(|err| MemoryError::write_failed(address, err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::MockProcess;

    #[test]
    fn test_poke_keeps_neighbours() {
        let mut mock = MockProcess::new(3);
        mock.map(0x1000, vec![0xee; 16]);
        mock.attach(3).unwrap();
        let mut cache = WordCache::new();

        let value = TypedValue::from_literal("0x1234").unwrap();
        poke(&mut mock, &mut cache, 3, Address::new(0x1002), &value, ValueWidth::U16).unwrap();

        assert_eq!(
            mock.peek_bytes(0x1000, 6),
            Some(vec![0xee, 0xee, 0x34, 0x12, 0xee, 0xee])
        );
    }

    #[test]
    fn test_poke_flushes_cache() {
        let mut mock = MockProcess::new(3);
        mock.map(0x1000, vec![0; 16]);
        mock.attach(3).unwrap();
        let mut cache = WordCache::new();
        cache.insert(3, Address::new(0x1000), [0; 8]);

        let value = TypedValue::from_literal("9").unwrap();
        poke(&mut mock, &mut cache, 3, Address::new(0x1000), &value, ValueWidth::U8).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_poke_rejects_dead_width() {
        let mut mock = MockProcess::new(3);
        mock.map(0x1000, vec![0; 16]);
        mock.attach(3).unwrap();
        let mut cache = WordCache::new();

        let value = TypedValue::from_literal("300").unwrap();
        let result = poke(&mut mock, &mut cache, 3, Address::new(0x1000), &value, ValueWidth::U8);
        assert!(matches!(result, Err(MemoryError::WidthMismatch { .. })));
        assert_eq!(mock.word_writes(), 0);
    }

    #[test]
    fn test_poke_last_byte_of_mapping() {
        let mut mock = MockProcess::new(3);
        mock.map(0x10000, vec![0; 4096]);
        mock.attach(3).unwrap();
        let mut cache = WordCache::new();

        let value = TypedValue::from_literal("43").unwrap();
        poke(&mut mock, &mut cache, 3, Address::new(0x10fff), &value, ValueWidth::U8).unwrap();

        assert_eq!(mock.peek_bytes(0x10ff8, 8), Some(vec![0, 0, 0, 0, 0, 0, 0, 43]));
        assert_eq!(mock.word_writes(), 1);
    }

    #[test]
    fn test_poke_across_word_boundary() {
        let mut mock = MockProcess::new(3);
        mock.map(0x1000, vec![0xee; 16]);
        mock.attach(3).unwrap();
        let mut cache = WordCache::new();

        let value = TypedValue::from_literal("0x44332211").unwrap();
        poke(&mut mock, &mut cache, 3, Address::new(0x1006), &value, ValueWidth::U32).unwrap();

        assert_eq!(
            mock.peek_bytes(0x1004, 8),
            Some(vec![0xee, 0xee, 0x11, 0x22, 0x33, 0x44, 0xee, 0xee])
        );
        assert_eq!(mock.word_writes(), 2);
    }

    #[test]
    fn test_poke_unmapped_is_write_error() {
        let mut mock = MockProcess::new(3);
        mock.map(0x1000, vec![0; 16]);
        mock.attach(3).unwrap();
        let mut cache = WordCache::new();

        let value = TypedValue::from_literal("1").unwrap();
        let result = poke(&mut mock, &mut cache, 3, Address::new(0x3000), &value, ValueWidth::U8);
        assert!(matches!(result, Err(MemoryError::WriteFailed { .. })));
    }
}
