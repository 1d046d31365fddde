//! Two-word sliding cache in front of word reads

use crate::core::types::{Address, ProcessId};
use crate::process::Word;
use std::collections::VecDeque;

/// Number of words kept; enough to serve any read spanning two words
pub const CACHE_WORDS: usize = 2;

#[derive(Debug, Clone, Copy)]
struct CachedWord {
    pid: ProcessId,
    base: Address,
    word: Word,
}

/// Most recently fetched aligned words, tagged by pid and base address.
///
/// The cache never outlives a stop of the target: it is flushed on every
/// attach and after every write.
#[derive(Debug, Default)]
pub struct WordCache {
    entries: VecDeque<CachedWord>,
    hits: u64,
    misses: u64,
}

impl WordCache {
    pub fn new() -> Self {
        WordCache {
            entries: VecDeque::with_capacity(CACHE_WORDS),
            hits: 0,
            misses: 0,
        }
    }

    /// Looks up the word at `base`, counting the hit or miss
    pub fn get(&mut self, pid: ProcessId, base: Address) -> Option<Word> {
        let found = self
            .entries
            .iter()
            .find(|entry| entry.pid == pid && entry.base == base)
            .map(|entry| entry.word);
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Whether the word at `base` is cached, without touching the counters
    pub fn holds(&self, pid: ProcessId, base: Address) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.pid == pid && entry.base == base)
    }

    /// Adds a word, evicting the oldest one when full
    pub fn insert(&mut self, pid: ProcessId, base: Address, word: Word) {
        self.entries
            .retain(|entry| !(entry.pid == pid && entry.base == base));
        if self.entries.len() == CACHE_WORDS {
            self.entries.pop_front();
        }
        self.entries.push_back(CachedWord { pid, base, word });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
