//! Population, refinement and snapshot passes over target memory
//!
//! Every pass stops the target once, walks addresses in increasing order and
//! writes what survives into a fresh [`MatchStore`]. The caller swaps the new
//! store in only when the pass succeeds, so a fatal error leaves the previous
//! store untouched.
//!
//! A match at one address may be live at widths up to eight bytes wide, and
//! its old value is rebuilt later from the old bytes of the records that
//! follow it. After each match the pass therefore keeps the next few
//! addresses as bookkeeping records (empty flags) until the widest live width
//! is covered.

use super::regions::Region;
use super::store::MatchStore;
use super::MemoryAccess;
use crate::core::types::{
    Address, MemoryError, MemoryResult, ProcessId, ScanType, TypedValue, WidthFlags,
};
use crate::process::{AttachmentGuard, TargetProcess};
use tracing::{debug, trace, warn};

/// Counters from the most recent pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Regions walked
    pub regions: usize,
    /// Regions abandoned part way through after a failed read
    pub regions_truncated: usize,
    /// Addresses read
    pub addresses: u64,
    /// Matches written to the new store
    pub kept: usize,
    /// Matches of the old store that did not survive
    pub dropped: usize,
    /// Reads that failed and were skipped
    pub peek_failures: usize,
}

/// Keeps the running count of bookkeeping records still owed to the last
/// wide match.
#[derive(Debug, Default)]
struct Recorder {
    pending: usize,
}

impl Recorder {
    fn record(
        &mut self,
        store: &mut MatchStore,
        address: Address,
        old_byte: u8,
        flags: WidthFlags,
    ) -> MemoryResult<()> {
        if let Some(widest) = flags.widest() {
            store.append(address, old_byte, flags)?;
            self.pending = self.pending.saturating_sub(1).max(widest.size() - 1);
        } else if self.pending > 0 {
            store.append(address, old_byte, WidthFlags::empty())?;
            self.pending -= 1;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.pending = 0;
    }
}

/// Runs scan passes against one target
pub struct MemoryScanner<'a, P: TargetProcess> {
    access: &'a mut MemoryAccess<P>,
    pid: ProcessId,
    stats: ScanStats,
}

impl<'a, P: TargetProcess> MemoryScanner<'a, P> {
    pub fn new(access: &'a mut MemoryAccess<P>, pid: ProcessId) -> Self {
        MemoryScanner {
            access,
            pid,
            stats: ScanStats::default(),
        }
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// First search: every address of every region is compared against
    /// `literal` and the survivors form the new store.
    ///
    /// Only exact comparisons can populate; the relative modes need a
    /// previous observation and fail with `NoMatches`.
    pub fn scan_regions(
        &mut self,
        regions: &[Region],
        scan_type: ScanType,
        literal: Option<&TypedValue>,
    ) -> MemoryResult<MatchStore> {
        if scan_type.requires_previous() {
            return Err(MemoryError::NoMatches);
        }
        let literal = required_literal(scan_type, literal)?;
        self.walk_regions(regions, |current| {
            current.narrow(ScanType::Exact, literal).flags()
        })
    }

    /// Records every readable address with all widths live, as a baseline
    /// for later relative comparisons.
    pub fn snapshot(&mut self, regions: &[Region]) -> MemoryResult<MatchStore> {
        self.walk_regions(regions, |current| current.flags())
    }

    fn walk_regions<F>(&mut self, regions: &[Region], mut evaluate: F) -> MemoryResult<MatchStore>
    where
        F: FnMut(&TypedValue) -> WidthFlags,
    {
        self.stats = ScanStats::default();
        let mut store = MatchStore::new();
        let mut recorder = Recorder::default();
        let mut guard = self.access.attach(self.pid)?;

        for region in regions {
            self.stats.regions += 1;
            recorder.reset();
            let end = region.end();
            let mut address = region.start;

            while address < end {
                let peeked = match guard.peek(address) {
                    Ok(peeked) => peeked,
                    Err(err) if err.is_recoverable() => {
                        warn!(
                            region = %region.start,
                            %address,
                            %err,
                            "region became unreadable, skipping the rest"
                        );
                        self.stats.peek_failures += 1;
                        self.stats.regions_truncated += 1;
                        break;
                    }
                    Err(err) => return Err(err),
                };
                self.stats.addresses += 1;

                // values never straddle the end of their region
                let available = peeked.len().min(end.as_usize() - address.as_usize());
                let current = TypedValue::from_bytes(&peeked.as_slice()[..available]);
                let flags = evaluate(&current);
                if !flags.is_empty() {
                    self.stats.kept += 1;
                }
                recorder.record(&mut store, address, peeked.first(), flags)?;
                address = address.add(1);
            }
        }

        store.finalize()?;
        finish(guard);
        debug!(
            pid = self.pid,
            regions = self.stats.regions,
            addresses = self.stats.addresses,
            matches = store.count(),
            swaths = store.swath_count(),
            "region pass complete"
        );
        Ok(store)
    }

    /// Later search: re-reads every tracked match and keeps those for which
    /// `scan_type` still holds at one or more of their live widths.
    ///
    /// `Exact` compares against `literal`; the relative modes compare
    /// against the value recorded for the same address by the previous pass.
    pub fn refine(
        &mut self,
        store: &MatchStore,
        scan_type: ScanType,
        literal: Option<&TypedValue>,
    ) -> MemoryResult<MatchStore> {
        let literal = if scan_type.requires_value() {
            Some(required_literal(scan_type, literal)?)
        } else {
            None
        };

        self.stats = ScanStats::default();
        let mut refined = MatchStore::new();
        let mut recorder = Recorder::default();
        let mut guard = self.access.attach(self.pid)?;

        for swath in store.swaths() {
            recorder.reset();
            for index in 0..swath.len() {
                let entry = swath.entry(index);
                if !entry.is_match() && recorder.pending == 0 {
                    continue;
                }

                let peeked = match guard.peek(entry.address) {
                    Ok(peeked) => peeked,
                    Err(err) if err.is_recoverable() => {
                        trace!(address = %entry.address, %err, "dropping unreadable match");
                        self.stats.peek_failures += 1;
                        if entry.is_match() {
                            self.stats.dropped += 1;
                        }
                        recorder.reset();
                        continue;
                    }
                    Err(err) => return Err(err),
                };
                self.stats.addresses += 1;

                let flags = if entry.is_match() {
                    let current = TypedValue::from_bytes(peeked.as_slice())
                        .with_flags(entry.flags)
                        .seen();
                    let narrowed = match literal {
                        Some(literal) => current.narrow(scan_type, literal),
                        None => current.narrow(scan_type, &swath.old_value(index)),
                    };
                    if narrowed.is_candidate() {
                        self.stats.kept += 1;
                    } else {
                        self.stats.dropped += 1;
                    }
                    narrowed.flags()
                } else {
                    WidthFlags::empty()
                };

                recorder.record(&mut refined, entry.address, peeked.first(), flags)?;
            }
        }

        refined.finalize()?;
        finish(guard);
        debug!(
            pid = self.pid,
            ?scan_type,
            before = store.count(),
            after = refined.count(),
            "refine pass complete"
        );
        Ok(refined)
    }
}

fn required_literal(scan_type: ScanType, literal: Option<&TypedValue>) -> MemoryResult<&TypedValue> {
    literal.ok_or_else(|| {
        MemoryError::parse_failed(format!("{:?}", scan_type), "comparison needs a value")
    })
}

// a detach failure after a completed pass does not invalidate what was read
fn finish<P: TargetProcess>(guard: AttachmentGuard<'_, P>) {
    let pid = guard.pid();
    if let Err(err) = guard.detach() {
        warn!(pid, %err, "detach after scan failed");
    }
}
