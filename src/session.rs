//! Scanning session bound to one target process
//!
//! A [`Session`] owns everything that only makes sense for a single target:
//! the process backend and its read cache, the filtered region list and the
//! match store. Changing the target rebuilds all of it.

use crate::config::Config;
use crate::core::types::{
    Address, MatchEntry, MatchReport, MemoryError, MemoryResult, ProcessId, ScanType, TypedValue,
    ValueWidth,
};
use crate::memory::{
    MatchStore, MemoryAccess, MemoryScanner, Region, RegionFilter, RegionSource, ScanStats,
};
use crate::process::TargetProcess;
use std::collections::HashMap;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Tunables taken from the configuration file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub filter: RegionFilter,
    /// Length of one repeat-loop tick
    pub tick: Duration,
    /// How often a sleeping loop checks for cancellation
    pub poll: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions::from_config(&Config::default())
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        SessionOptions {
            filter: RegionFilter::from_config(&config.scanner),
            tick: config.set.tick(),
            poll: config.set.poll(),
        }
    }
}

/// Which matches a `set` block writes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetTarget {
    All,
    Matches(Vec<usize>),
}

/// One block of a `set` command: `[ids=]value[/seconds]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetSpec {
    pub targets: SetTarget,
    pub value: TypedValue,
    /// Repeat every this many ticks; `None` writes once
    pub every: Option<u64>,
}

impl FromStr for SetSpec {
    type Err = MemoryError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (targets, rest) = match text.split_once('=') {
            Some((ids, rest)) => {
                let ids = ids
                    .split(',')
                    .map(|id| {
                        id.trim()
                            .parse::<usize>()
                            .map_err(|e| MemoryError::parse_failed(id, e.to_string()))
                    })
                    .collect::<MemoryResult<Vec<_>>>()?;
                (SetTarget::Matches(ids), rest)
            }
            None => (SetTarget::All, text),
        };

        let (value, every) = match rest.split_once('/') {
            Some((value, seconds)) => {
                let every = seconds
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| MemoryError::parse_failed(seconds, e.to_string()))?;
                if every == 0 {
                    return Err(MemoryError::parse_failed(seconds, "interval must be positive"));
                }
                (value, Some(every))
            }
            None => (rest, None),
        };

        Ok(SetSpec {
            targets,
            value: TypedValue::from_literal(value)?,
            every,
        })
    }
}

struct ResolvedSet<'s> {
    writes: Vec<(Address, ValueWidth)>,
    value: &'s TypedValue,
    every: Option<u64>,
}

/// Interactive scanning state for one target
pub struct Session<P: TargetProcess + RegionSource> {
    access: MemoryAccess<P>,
    options: SessionOptions,
    target: Option<ProcessId>,
    regions: Vec<Region>,
    store: MatchStore,
    last_stats: ScanStats,
}

impl<P: TargetProcess + RegionSource> Session<P> {
    pub fn new(process: P, options: SessionOptions) -> Self {
        Session {
            access: MemoryAccess::new(process),
            options,
            target: None,
            regions: Vec::new(),
            store: MatchStore::new(),
            last_stats: ScanStats::default(),
        }
    }

    pub fn target(&self) -> Option<ProcessId> {
        self.target
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn store(&self) -> &MatchStore {
        &self.store
    }

    pub fn match_count(&self) -> usize {
        self.store.count()
    }

    /// Counters of the last scan pass
    pub fn last_stats(&self) -> ScanStats {
        self.last_stats
    }

    pub fn process(&self) -> &P {
        self.access.process()
    }

    fn require_target(&self) -> MemoryResult<ProcessId> {
        self.target.ok_or(MemoryError::NoTarget)
    }

    /// Switches to `pid`, discarding every match and cached word.
    ///
    /// Nothing changes when the target's regions cannot be listed.
    pub fn bind(&mut self, pid: ProcessId) -> MemoryResult<usize> {
        let regions = self.list_regions(pid)?;
        self.target = Some(pid);
        self.store.clear();
        self.access.clear_cache();
        self.regions = regions;
        info!(pid, regions = self.regions.len(), "target set");
        Ok(self.regions.len())
    }

    /// Forgets all matches and re-reads the target's regions
    pub fn reset(&mut self) -> MemoryResult<()> {
        self.store.clear();
        self.access.clear_cache();
        self.regions.clear();
        if let Some(pid) = self.target {
            self.regions = self.list_regions(pid)?;
            info!(pid, regions = self.regions.len(), "session reset");
        }
        Ok(())
    }

    fn list_regions(&self, pid: ProcessId) -> MemoryResult<Vec<Region>> {
        let listed = self.access.process().regions(pid)?;
        Ok(self.options.filter.apply(listed))
    }

    /// Narrows by exact value, populating the store first if it is empty
    pub fn search_value(&mut self, literal: &TypedValue) -> MemoryResult<usize> {
        self.search(ScanType::Exact, Some(literal))
    }

    /// Narrows the existing matches by a relative comparison
    pub fn compare(&mut self, scan_type: ScanType) -> MemoryResult<usize> {
        if self.store.count() == 0 {
            return Err(MemoryError::NoMatches);
        }
        self.search(scan_type, None)
    }

    fn search(&mut self, scan_type: ScanType, literal: Option<&TypedValue>) -> MemoryResult<usize> {
        let pid = self.require_target()?;
        let mut scanner = MemoryScanner::new(&mut self.access, pid);
        let store = if self.store.count() == 0 {
            scanner.scan_regions(&self.regions, scan_type, literal)?
        } else {
            scanner.refine(&self.store, scan_type, literal)?
        };
        self.last_stats = scanner.stats();
        self.store = store;
        Ok(self.store.count())
    }

    /// Records every readable address of every region
    pub fn snapshot(&mut self) -> MemoryResult<usize> {
        let pid = self.require_target()?;
        let mut scanner = MemoryScanner::new(&mut self.access, pid);
        let store = scanner.snapshot(&self.regions)?;
        self.last_stats = scanner.stats();
        self.store = store;
        Ok(self.store.count())
    }

    fn region_label(&self, address: Address) -> Option<String> {
        self.regions
            .iter()
            .find(|region| region.contains(address))
            .and_then(|region| region.pathname.clone())
    }

    /// All matches with their last observed values
    pub fn matches(&self) -> Vec<MatchReport> {
        self.store
            .matches()
            .enumerate()
            .filter_map(|(index, (location, entry))| {
                let value = self.store.old_value(location)?;
                Some(MatchReport {
                    index,
                    address: entry.address,
                    value,
                    region: self.region_label(entry.address),
                })
            })
            .collect()
    }

    /// Match number `index`
    pub fn match_at(&self, index: usize) -> MemoryResult<MatchReport> {
        let location = self
            .store
            .nth(index)
            .ok_or(MemoryError::MatchNotFound(index))?;
        let entry = self
            .store
            .entry(location)
            .ok_or(MemoryError::MatchNotFound(index))?;
        let value = self
            .store
            .old_value(location)
            .ok_or(MemoryError::MatchNotFound(index))?;
        Ok(MatchReport {
            index,
            address: entry.address,
            value,
            region: self.region_label(entry.address),
        })
    }

    /// Stops tracking match number `index`; returns the remaining count
    pub fn delete_match(&mut self, index: usize) -> MemoryResult<usize> {
        let location = self
            .store
            .nth(index)
            .ok_or(MemoryError::MatchNotFound(index))?;
        self.store.forget(location);
        Ok(self.store.count())
    }

    /// Drops region number `index` and every match inside it
    pub fn delete_region(&mut self, index: usize) -> MemoryResult<usize> {
        let region = self
            .regions
            .get(index)
            .cloned()
            .ok_or(MemoryError::RegionNotFound(index))?;
        let remaining = self.store.delete_range(region.start, region.end())?;
        self.regions.remove(index);
        info!(region = %region, remaining, "region removed");
        Ok(remaining)
    }

    /// Picks the address and write width of every match a block targets.
    ///
    /// The store is walked once per block however many ids it names.
    fn resolve<'s>(&self, spec: &'s SetSpec) -> MemoryResult<ResolvedSet<'s>> {
        let count = self.store.count();
        let targeted: Vec<MatchEntry> = match &spec.targets {
            SetTarget::All => self.store.matches().map(|(_, entry)| entry).collect(),
            SetTarget::Matches(ids) => {
                if let Some(&missing) = ids.iter().find(|&&id| id >= count) {
                    return Err(MemoryError::MatchNotFound(missing));
                }
                let mut wanted = ids.clone();
                wanted.sort_unstable();
                wanted.dedup();

                let mut found = HashMap::with_capacity(wanted.len());
                let mut pending = wanted.iter().peekable();
                for (index, (_, entry)) in self.store.matches().enumerate() {
                    let Some(&&next) = pending.peek() else {
                        break;
                    };
                    if index == next {
                        found.insert(index, entry);
                        pending.next();
                    }
                }
                ids.iter()
                    .map(|id| found.get(id).copied().ok_or(MemoryError::MatchNotFound(*id)))
                    .collect::<MemoryResult<_>>()?
            }
        };

        let writes = targeted
            .into_iter()
            .map(|entry| {
                (entry.flags & spec.value.flags())
                    .narrowest()
                    .map(|width| (entry.address, width))
                    .ok_or_else(|| MemoryError::WidthMismatch {
                        address: entry.address.to_string(),
                        value: spec.value.to_string(),
                    })
            })
            .collect::<MemoryResult<Vec<_>>>()?;

        Ok(ResolvedSet {
            writes,
            value: &spec.value,
            every: spec.every,
        })
    }

    /// Writes values into matches.
    ///
    /// Every block is written on the first tick. Blocks with an interval are
    /// written again every `every` ticks until `cancel` fires; the token is
    /// checked before each attach, and the target is always resumed before
    /// this returns. Returns the number of writes performed.
    pub fn set_values(
        &mut self,
        specs: &[SetSpec],
        cancel: &CancellationToken,
    ) -> MemoryResult<usize> {
        let pid = self.require_target()?;
        if self.store.count() == 0 {
            return Err(MemoryError::NoMatches);
        }
        let blocks = specs
            .iter()
            .map(|spec| self.resolve(spec))
            .collect::<MemoryResult<Vec<_>>>()?;
        let repeating = blocks.iter().any(|block| block.every.is_some());

        let mut writes = 0;
        let mut tick: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                debug!(pid, tick, "set loop cancelled");
                break;
            }

            let due: Vec<&ResolvedSet<'_>> = blocks
                .iter()
                .filter(|block| tick == 0 || block.every.is_some_and(|every| tick % every == 0))
                .collect();
            if !due.is_empty() {
                let mut guard = self.access.attach(pid)?;
                for block in due {
                    for &(address, width) in &block.writes {
                        guard.poke(address, block.value, width)?;
                        writes += 1;
                    }
                }
                guard.detach()?;
            }

            if !repeating {
                break;
            }
            tick += 1;
            if !sleep_unless_cancelled(self.options.tick, self.options.poll, cancel) {
                debug!(pid, tick, "set loop cancelled");
                break;
            }
        }

        info!(pid, writes, "values written");
        Ok(writes)
    }

    /// Re-reads match `index` every tick and reports each change of its
    /// value, starting with the first reading, until `cancel` fires.
    pub fn watch<F>(
        &mut self,
        index: usize,
        cancel: &CancellationToken,
        mut on_change: F,
    ) -> MemoryResult<usize>
    where
        F: FnMut(&MatchReport),
    {
        let pid = self.require_target()?;
        let mut report = self.match_at(index)?;
        let flags = report.value.flags();
        let mut last: Option<String> = None;
        let mut changes = 0;

        while !cancel.is_cancelled() {
            let peeked = {
                let mut guard = self.access.attach(pid)?;
                let peeked = guard.peek(report.address)?;
                guard.detach()?;
                peeked
            };
            let current = TypedValue::from_bytes(peeked.as_slice())
                .with_flags(flags)
                .seen();

            let shown = current.to_string();
            if last.as_deref() != Some(shown.as_str()) {
                report.value = current;
                on_change(&report);
                changes += 1;
                last = Some(shown);
            }

            if !sleep_unless_cancelled(self.options.tick, self.options.poll, cancel) {
                break;
            }
        }
        Ok(changes)
    }
}

/// Sleeps for `total` in `poll` slices; false when cancelled first
fn sleep_unless_cancelled(total: Duration, poll: Duration, cancel: &CancellationToken) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(poll.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::MockProcess;

    fn session(bytes: Vec<u8>) -> (MockProcess, Session<MockProcess>) {
        let mock = MockProcess::new(77);
        mock.map(0x4000, bytes);
        let mut session = Session::new(mock.clone(), SessionOptions::default());
        session.bind(77).unwrap();
        (mock, session)
    }

    #[test]
    fn test_set_spec_parse() {
        let spec: SetSpec = "42".parse().unwrap();
        assert_eq!(spec.targets, SetTarget::All);
        assert_eq!(spec.every, None);

        let spec: SetSpec = "0,2=0x10/5".parse().unwrap();
        assert_eq!(spec.targets, SetTarget::Matches(vec![0, 2]));
        assert_eq!(spec.value, TypedValue::from_literal("16").unwrap());
        assert_eq!(spec.every, Some(5));

        assert!("a=1".parse::<SetSpec>().is_err());
        assert!("1/0".parse::<SetSpec>().is_err());
        assert!("1/x".parse::<SetSpec>().is_err());
    }

    #[test]
    fn test_requires_target() {
        let mut session = Session::new(MockProcess::new(1), SessionOptions::default());
        let value = TypedValue::from_literal("1").unwrap();
        assert!(matches!(
            session.search_value(&value),
            Err(MemoryError::NoTarget)
        ));
        assert!(matches!(session.snapshot(), Err(MemoryError::NoTarget)));
    }

    #[test]
    fn test_failed_bind_keeps_target() {
        let (_, mut session) = session(vec![1; 16]);
        let one = TypedValue::from_literal("1").unwrap();
        session.search_value(&one).unwrap();

        assert!(session.bind(78).is_err());
        assert_eq!(session.target(), Some(77));
        assert_eq!(session.match_count(), 16);
    }

    #[test]
    fn test_bind_filters_regions() {
        let mock = MockProcess::new(5);
        mock.map(0x1000, vec![0; 16]);
        mock.map_with(0x2000, vec![0; 16], "r-xp", Some("/bin/true"));
        let mut session = Session::new(mock, SessionOptions::default());

        assert_eq!(session.bind(5).unwrap(), 1);
        assert_eq!(session.regions()[0].start, Address::new(0x1000));
    }

    #[test]
    fn test_compare_without_matches() {
        let (_, mut session) = session(vec![0; 16]);
        assert!(matches!(
            session.compare(ScanType::Increment),
            Err(MemoryError::NoMatches)
        ));
    }

    #[test]
    fn test_delete_match_keeps_others() {
        let (_, mut session) = session(vec![9; 16]);
        let nine = TypedValue::from_literal("9").unwrap();
        assert_eq!(session.search_value(&nine).unwrap(), 16);

        assert_eq!(session.delete_match(3).unwrap(), 15);
        let addresses: Vec<_> = session
            .matches()
            .iter()
            .map(|report| report.address.as_usize())
            .collect();
        assert!(!addresses.contains(&0x4003));
        assert!(matches!(
            session.delete_match(15),
            Err(MemoryError::MatchNotFound(15))
        ));
    }

    #[test]
    fn test_set_once() {
        let (mock, mut session) = session(vec![0; 16]);
        mock.poke_bytes(0x4008, &[100]);
        let value = TypedValue::from_literal("100").unwrap();
        session.search_value(&value).unwrap();

        let specs = vec!["7".parse::<SetSpec>().unwrap()];
        let writes = session
            .set_values(&specs, &CancellationToken::new())
            .unwrap();
        assert_eq!(writes, 1);
        // narrowest common width is u8, so the byte after is untouched
        assert_eq!(mock.peek_bytes(0x4008, 2), Some(vec![7, 0]));
        assert!(!mock.is_attached());
    }

    #[test]
    fn test_set_width_mismatch() {
        let (mock, mut session) = session(vec![0; 16]);
        mock.poke_bytes(0x4000, &[1, 1, 1]);
        let value = TypedValue::from_literal("257").unwrap();
        session.search_value(&value).unwrap();
        let only = session.match_at(0).unwrap();
        assert_eq!(only.value.flags(), crate::core::types::WidthFlags::U16);

        // 511 fits the live u16 width
        let specs = vec!["0=511".parse::<SetSpec>().unwrap()];
        session.set_values(&specs, &CancellationToken::new()).unwrap();
        assert_eq!(mock.peek_bytes(0x4000, 2), Some(vec![0xff, 0x01]));

        // 70000 needs u32, which this match is not
        let specs = vec!["0=70000".parse::<SetSpec>().unwrap()];
        assert!(matches!(
            session.set_values(&specs, &CancellationToken::new()),
            Err(MemoryError::WidthMismatch { .. })
        ));
    }

    #[test]
    fn test_set_ids_in_any_order() {
        let (mock, mut session) = session(vec![9; 16]);
        let nine = TypedValue::from_literal("9").unwrap();
        session.search_value(&nine).unwrap();

        let specs = vec!["5,1,5=4".parse::<SetSpec>().unwrap()];
        let writes = session
            .set_values(&specs, &CancellationToken::new())
            .unwrap();
        assert_eq!(writes, 3);
        assert_eq!(mock.peek_bytes(0x4000, 6), Some(vec![9, 4, 9, 9, 9, 4]));

        let specs = vec!["3,16=1".parse::<SetSpec>().unwrap()];
        assert!(matches!(
            session.set_values(&specs, &CancellationToken::new()),
            Err(MemoryError::MatchNotFound(16))
        ));
    }

    #[test]
    fn test_set_all_after_snapshot_reaches_mapping_end() {
        let mock = MockProcess::new(77);
        mock.map(0x10000, vec![0xaa; 4096]);
        let mut session = Session::new(mock.clone(), SessionOptions::default());
        session.bind(77).unwrap();
        assert_eq!(session.snapshot().unwrap(), 4096);

        let specs = vec!["0".parse::<SetSpec>().unwrap()];
        let writes = session
            .set_values(&specs, &CancellationToken::new())
            .unwrap();
        assert_eq!(writes, 4096);
        assert_eq!(mock.peek_bytes(0x10000, 4096), Some(vec![0; 4096]));
    }

    #[test]
    fn test_cancelled_set_never_attaches() {
        let (mock, mut session) = session(vec![3; 16]);
        let three = TypedValue::from_literal("3").unwrap();
        session.search_value(&three).unwrap();
        let attaches = mock.attaches();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let specs = vec!["4/1".parse::<SetSpec>().unwrap()];
        assert_eq!(session.set_values(&specs, &cancel).unwrap(), 0);
        assert_eq!(mock.attaches(), attaches);
    }

    #[test]
    fn test_sleep_unless_cancelled() {
        let cancel = CancellationToken::new();
        assert!(sleep_unless_cancelled(
            Duration::from_millis(5),
            Duration::from_millis(1),
            &cancel
        ));
        cancel.cancel();
        assert!(!sleep_unless_cancelled(
            Duration::from_secs(60),
            Duration::from_millis(1),
            &cancel
        ));
    }
}
