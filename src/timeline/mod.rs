//! Versioned interval timeline
//!
//! The core range index of the broker. For one data source it maps time
//! intervals to versioned segment sets and resolves which version is visible
//! at every point in time: a higher version overshadows lower versions over
//! the range where their intervals overlap, while the lower versions' data
//! outside the overlap stays visible under its own version.
//!
//! The timeline keeps every announced entry in `all_entries` and derives two
//! non-overlapping chunk maps from it, one for complete partition sets and one
//! for incomplete ones. Lookups navigate the derived maps with
//! `BTreeMap::range`, so query cost scales with the chunks intersecting the
//! query rather than with total index size. Mutations rebuild the derived
//! maps only over the mutated interval; visibility outside it cannot change.

mod holder;

pub use holder::PartitionHolder;

use crate::interval::Interval;
use crate::segment::SegmentDescriptor;
use crate::selector::{ServerSelector, ServerSelectorStrategy};
use crate::server::QueryableServer;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;
use tracing::{debug, warn};

/// One (interval, version) entry with its partition holder.
///
/// Entries are immutable once published; structural changes replace the entry
/// wholesale so concurrent readers always see either the old or the new
/// state, never a holder mid-mutation.
pub struct TimelineEntry {
    interval: Interval,
    version: String,
    holder: PartitionHolder,
}

impl TimelineEntry {
    fn new(interval: Interval, version: String, holder: PartitionHolder) -> Self {
        Self {
            interval,
            version,
            holder,
        }
    }

    /// The full interval the entry was announced for, independent of how much
    /// of it is currently visible.
    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn holder(&self) -> &PartitionHolder {
        &self.holder
    }
}

/// One non-overlapping result chunk from a timeline lookup.
#[derive(Clone)]
pub struct TimelineChunk {
    interval: Interval,
    entry: Arc<TimelineEntry>,
}

impl TimelineChunk {
    /// Effective interval: the sub-range of the entry's interval that this
    /// chunk is the visible answer for, clipped to the query bounds.
    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn version(&self) -> &str {
        self.entry.version()
    }

    pub fn holder(&self) -> &PartitionHolder {
        self.entry.holder()
    }

    pub fn is_complete(&self) -> bool {
        self.entry.holder().is_complete()
    }
}

/// Versioned interval timeline for one data source.
///
/// Not internally synchronized: the view controller serializes mutations per
/// data source behind a write lock and readers share the read side (see
/// `SharedTimeline`).
pub struct VersionedTimeline {
    strategy: Arc<dyn ServerSelectorStrategy>,
    /// Authoritative state: interval -> version -> entry
    all_entries: BTreeMap<Interval, BTreeMap<String, Arc<TimelineEntry>>>,
    /// Visible chunks of complete entries, keyed by effective interval
    complete: BTreeMap<Interval, Arc<TimelineEntry>>,
    /// Visible chunks of incomplete entries, resolved among themselves
    incomplete: BTreeMap<Interval, Arc<TimelineEntry>>,
}

impl VersionedTimeline {
    pub fn new(strategy: Arc<dyn ServerSelectorStrategy>) -> Self {
        Self {
            strategy,
            all_entries: BTreeMap::new(),
            complete: BTreeMap::new(),
            incomplete: BTreeMap::new(),
        }
    }

    /// Index a segment announcement from `server`.
    ///
    /// Locates or creates the partition holder for the segment's
    /// (interval, version), locates or creates the selector for its partition
    /// number, and registers the server as a candidate. Both levels are
    /// idempotent. Returns the selector so callers can keep reverse maps.
    pub fn add(
        &mut self,
        segment: &SegmentDescriptor,
        server: Arc<QueryableServer>,
    ) -> Arc<ServerSelector> {
        if let Some(entry) = self
            .all_entries
            .get(&segment.interval)
            .and_then(|versions| versions.get(&segment.version))
        {
            if let Some(selector) = entry.holder().get(segment.partition_num) {
                // Known partition: only the candidate set changes
                let selector = Arc::clone(selector);
                selector.add_server(server);
                return selector;
            }
        }

        let selector = Arc::new(ServerSelector::new(
            segment.clone(),
            Arc::clone(&self.strategy),
        ));
        selector.add_server(server);

        {
            let versions = self.all_entries.entry(segment.interval).or_default();
            let mut holder = match versions.get(&segment.version) {
                Some(existing) => {
                    if existing.holder().expected() != segment.total_partitions {
                        warn!(
                            "Segment {} declares {} partitions, holder expects {}",
                            segment.id(),
                            segment.total_partitions,
                            existing.holder().expected()
                        );
                    }
                    existing.holder().clone()
                }
                None => PartitionHolder::new(segment.total_partitions),
            };
            holder.insert(segment.partition_num, Arc::clone(&selector));
            versions.insert(
                segment.version.clone(),
                Arc::new(TimelineEntry::new(
                    segment.interval,
                    segment.version.clone(),
                    holder,
                )),
            );
        }

        self.refresh_visible(segment.interval);
        selector
    }

    /// Withdraw `server_name` as a candidate for the given coordinate.
    ///
    /// When the last candidate disappears the partition's selector leaves the
    /// index, then the version entry when its last partition leaves, then the
    /// interval when its last version leaves. Returns the removed selector on
    /// structural removal, `None` otherwise (including redundant removes).
    pub fn remove(
        &mut self,
        interval: &Interval,
        version: &str,
        partition_num: u32,
        server_name: &str,
    ) -> Option<Arc<ServerSelector>> {
        let entry = match self
            .all_entries
            .get(interval)
            .and_then(|versions| versions.get(version))
        {
            Some(entry) => Arc::clone(entry),
            None => {
                debug!(
                    "Remove for unknown coordinate {} {} from {}",
                    interval, version, server_name
                );
                return None;
            }
        };
        let selector = match entry.holder().get(partition_num) {
            Some(selector) => Arc::clone(selector),
            None => {
                debug!(
                    "Remove for unknown partition {} of {} {} from {}",
                    partition_num, interval, version, server_name
                );
                return None;
            }
        };

        if selector.remove_server(server_name) {
            // Other replicas remain; the index structure is unchanged
            return None;
        }

        let mut holder = entry.holder().clone();
        let removed = holder.remove(partition_num);
        debug_assert!(removed.is_some(), "selector present but partition missing");

        if holder.is_empty() {
            let interval_empty = match self.all_entries.get_mut(interval) {
                Some(versions) => {
                    versions.remove(version);
                    versions.is_empty()
                }
                None => false,
            };
            if interval_empty {
                self.all_entries.remove(interval);
            }
        } else if let Some(versions) = self.all_entries.get_mut(interval) {
            versions.insert(
                version.to_string(),
                Arc::new(TimelineEntry::new(*interval, version.to_string(), holder)),
            );
        }

        self.refresh_visible(*interval);
        Some(selector)
    }

    /// Resolve a range query into non-overlapping chunks ordered by start.
    ///
    /// Each point of `query` is attributed to the highest version among the
    /// complete entries whose interval contains it; ranges with no complete
    /// entry are absent from the result. The first and last chunks are
    /// clipped to the query bounds.
    pub fn lookup(&self, query: Interval) -> Vec<TimelineChunk> {
        Self::lookup_in(&self.complete, query)
    }

    /// Like [`lookup`](Self::lookup), but ranges with no complete entry fall
    /// back to the incomplete entries visible there. Complete chunks always
    /// win where both exist.
    pub fn lookup_with_incomplete(&self, query: Interval) -> Vec<TimelineChunk> {
        let complete = Self::lookup_in(&self.complete, query);
        let mut result = Vec::with_capacity(complete.len());
        let mut cursor = query.start;
        for chunk in complete {
            if chunk.interval.start > cursor {
                let gap = Interval::new(cursor, chunk.interval.start);
                result.extend(Self::lookup_in(&self.incomplete, gap));
            }
            cursor = chunk.interval.end;
            result.push(chunk);
        }
        if cursor < query.end {
            let gap = Interval::new(cursor, query.end);
            result.extend(Self::lookup_in(&self.incomplete, gap));
        }
        result
    }

    /// Point lookup for a known exact coordinate, bypassing overshadow
    /// resolution. Used for removal bookkeeping and direct segment queries.
    pub fn find_chunk(
        &self,
        interval: &Interval,
        version: &str,
        partition_num: u32,
    ) -> Option<Arc<ServerSelector>> {
        self.all_entries
            .get(interval)?
            .get(version)?
            .holder()
            .get(partition_num)
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.all_entries.is_empty()
    }

    /// Number of stored (interval, version) entries, visible or not.
    pub fn entry_count(&self) -> usize {
        self.all_entries.values().map(|versions| versions.len()).sum()
    }

    fn lookup_in(
        map: &BTreeMap<Interval, Arc<TimelineEntry>>,
        query: Interval,
    ) -> Vec<TimelineChunk> {
        if query.is_empty() {
            return Vec::new();
        }
        Self::chunks_overlapping(map, &query)
            .into_iter()
            .filter_map(|key| {
                let entry = map.get(&key)?;
                let effective = key.intersect(&query)?;
                Some(TimelineChunk {
                    interval: effective,
                    entry: Arc::clone(entry),
                })
            })
            .collect()
    }

    /// Keys of `map` overlapping `within`. Relies on the map holding
    /// non-overlapping intervals: only the predecessor of `within.start` can
    /// straddle it, every other overlapping chunk starts inside `within`.
    fn chunks_overlapping(
        map: &BTreeMap<Interval, Arc<TimelineEntry>>,
        within: &Interval,
    ) -> Vec<Interval> {
        // Probe keys order before any real interval sharing their start
        let lo = Interval {
            start: within.start,
            end: i64::MIN,
        };
        let hi = Interval {
            start: within.end,
            end: i64::MIN,
        };

        let mut keys = Vec::new();
        if let Some((key, _)) = map.range(..lo).next_back() {
            if key.end > within.start {
                keys.push(*key);
            }
        }
        for (key, _) in map.range(lo..hi) {
            keys.push(*key);
        }
        keys
    }

    /// Rebuild both visible maps over `within` from the authoritative state.
    fn refresh_visible(&mut self, within: Interval) {
        let candidates: Vec<Arc<TimelineEntry>> = self
            .all_entries
            .iter()
            .filter(|(interval, _)| interval.overlaps(&within))
            .flat_map(|(_, versions)| versions.values().cloned())
            .collect();

        let complete: Vec<Arc<TimelineEntry>> = candidates
            .iter()
            .filter(|entry| entry.holder().is_complete())
            .cloned()
            .collect();
        let incomplete: Vec<Arc<TimelineEntry>> = candidates
            .into_iter()
            .filter(|entry| !entry.holder().is_complete())
            .collect();

        Self::refresh_map(&mut self.complete, within, &complete);
        Self::refresh_map(&mut self.incomplete, within, &incomplete);
    }

    /// Replace the visible chunks of `map` inside `within` with a fresh
    /// pointwise-maximum-version partitioning of `candidates`. Chunk portions
    /// outside `within` are preserved unchanged.
    fn refresh_map(
        map: &mut BTreeMap<Interval, Arc<TimelineEntry>>,
        within: Interval,
        candidates: &[Arc<TimelineEntry>],
    ) {
        // Detach chunks overlapping the refreshed range, keeping remainders
        for key in Self::chunks_overlapping(map, &within) {
            if let Some(entry) = map.remove(&key) {
                if key.start < within.start {
                    map.insert(Interval::new(key.start, within.start), Arc::clone(&entry));
                }
                if key.end > within.end {
                    map.insert(Interval::new(within.end, key.end), entry);
                }
            }
        }

        // Sweep the elementary sub-intervals induced by candidate boundaries
        let mut bounds = BTreeSet::new();
        bounds.insert(within.start);
        bounds.insert(within.end);
        for entry in candidates {
            for bound in [entry.interval.start, entry.interval.end] {
                if bound > within.start && bound < within.end {
                    bounds.insert(bound);
                }
            }
        }
        let bounds: Vec<i64> = bounds.into_iter().collect();

        for pair in bounds.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            let winner = candidates
                .iter()
                .filter(|entry| entry.interval.start <= lo && entry.interval.end >= hi)
                .max_by(|a, b| {
                    a.version
                        .cmp(&b.version)
                        .then_with(|| a.interval.cmp(&b.interval))
                });
            if let Some(entry) = winner {
                map.insert(Interval::new(lo, hi), Arc::clone(entry));
            }
        }

        Self::coalesce(map, &within);
    }

    /// Merge abutting chunks that resolve to the same entry, so one entry
    /// visible over a contiguous range yields one chunk.
    fn coalesce(map: &mut BTreeMap<Interval, Arc<TimelineEntry>>, within: &Interval) {
        let mut keys = Self::chunks_overlapping(map, within);
        if let Some(first) = keys.first().copied() {
            if let Some((prev, _)) = map.range(..first).next_back() {
                keys.insert(0, *prev);
            }
        }
        if let Some(last) = keys.last().copied() {
            if let Some((next, _)) = map
                .range((Bound::Excluded(last), Bound::Unbounded))
                .next()
            {
                keys.push(*next);
            }
        }

        let mut i = 0;
        while i + 1 < keys.len() {
            let a = keys[i];
            let b = keys[i + 1];
            let same_entry = a.end == b.start
                && match (map.get(&a), map.get(&b)) {
                    (Some(x), Some(y)) => Arc::ptr_eq(x, y),
                    _ => false,
                };
            if same_entry {
                if let Some(entry) = map.remove(&a) {
                    map.remove(&b);
                    let merged = Interval::new(a.start, b.end);
                    map.insert(merged, entry);
                    keys[i] = merged;
                    keys.remove(i + 1);
                    continue;
                }
            }
            i += 1;
        }
    }
}
