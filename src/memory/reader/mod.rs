//! Cached byte reads on top of word-sized process reads
//!
//! Reads are issued one aligned word at a time. Dense scans walk memory a
//! byte at a time, so the two most recent words are kept and a request that
//! overlaps them only fetches what is missing.

mod cache;

pub use cache::{WordCache, CACHE_WORDS};

use crate::core::types::{Address, MemoryResult, ProcessId, WORD_SIZE};
use crate::process::{TargetProcess, Word};
use tracing::trace;

/// Bytes read starting at one address.
///
/// Normally a full word; shorter when the word after the address could not
/// be read, e.g. at the end of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeekBytes {
    bytes: [u8; WORD_SIZE],
    len: usize,
}

impl PeekBytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn first(&self) -> u8 {
        self.bytes[0]
    }
}

/// Reads up to one word starting at `address`.
///
/// Fails only when the word holding `address` itself cannot be read. A
/// failure on the following word truncates the result instead.
pub fn peek<P: TargetProcess>(
    process: &mut P,
    cache: &mut WordCache,
    pid: ProcessId,
    address: Address,
) -> MemoryResult<PeekBytes> {
    let base = address.align_down(WORD_SIZE);
    let offset = address.misalignment(WORD_SIZE);
    let next = base.add(WORD_SIZE);
    let spans_two = offset != 0;

    // a full miss means the scan moved elsewhere; nothing cached is useful
    if !cache.holds(pid, base) && !(spans_two && cache.holds(pid, next)) {
        cache.clear();
    }

    let first = fetch(process, cache, pid, base)?;
    let head = WORD_SIZE - offset;
    let mut bytes = [0u8; WORD_SIZE];
    bytes[..head].copy_from_slice(&first[offset..]);

    if !spans_two {
        return Ok(PeekBytes {
            bytes,
            len: WORD_SIZE,
        });
    }

    let len = match fetch(process, cache, pid, next) {
        Ok(second) => {
            bytes[head..].copy_from_slice(&second[..offset]);
            WORD_SIZE
        }
        Err(err) if err.is_recoverable() => {
            trace!(%address, %err, "peek truncated at word boundary");
            head
        }
        Err(err) => return Err(err),
    };

    Ok(PeekBytes { bytes, len })
}

fn fetch<P: TargetProcess>(
    process: &mut P,
    cache: &mut WordCache,
    pid: ProcessId,
    base: Address,
) -> MemoryResult<Word> {
    if let Some(word) = cache.get(pid, base) {
        return Ok(word);
    }
    let word = process.read_word(pid, base)?;
    cache.insert(pid, base, word);
    Ok(word)
}
