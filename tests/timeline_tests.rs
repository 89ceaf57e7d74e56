//! Property-style tests for the versioned timeline
//!
//! Checks the timeline against a brute-force reference resolution over
//! randomized segment populations, and that arbitrary removal orders drain
//! the index completely.

use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use segview::{
    Interval, QueryableServer, RandomServerSelectorStrategy, SegmentDescriptor, ServerMetadata,
    ServerType, VersionedTimeline,
};
use std::collections::BTreeSet;
use std::sync::Arc;

const DAY: i64 = 86_400_000_000_000;

fn server(name: &str) -> Arc<QueryableServer> {
    Arc::new(QueryableServer::new(ServerMetadata::new(
        name,
        format!("{}:8083", name),
        ServerType::Historical,
    )))
}

fn random_segments(rng: &mut SmallRng, count: usize) -> Vec<SegmentDescriptor> {
    (0..count)
        .map(|i| {
            let start_day = rng.gen_range(0..30);
            let len_days = rng.gen_range(1..8);
            let interval = Interval::new(start_day * DAY, (start_day + len_days) * DAY);
            let version = format!("v{:02}", rng.gen_range(0..10));
            // Same (interval, version) may repeat; partition numbers keep ids unique
            SegmentDescriptor::new("events", interval, version).with_partition(i as u32, 0)
        })
        .collect()
}

/// Reference resolution: for every elementary sub-interval of `query`, the
/// winning segment is the one with the highest version whose interval covers
/// it (ties by interval ordering).
fn reference_resolution(
    segments: &[SegmentDescriptor],
    query: Interval,
) -> Vec<(Interval, String)> {
    let mut bounds: BTreeSet<i64> = BTreeSet::new();
    bounds.insert(query.start);
    bounds.insert(query.end);
    for seg in segments {
        for b in [seg.interval.start, seg.interval.end] {
            if b > query.start && b < query.end {
                bounds.insert(b);
            }
        }
    }
    let bounds: Vec<i64> = bounds.into_iter().collect();

    let mut resolved: Vec<(Interval, String)> = Vec::new();
    for pair in bounds.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        let winner = segments
            .iter()
            .filter(|seg| seg.interval.start <= lo && seg.interval.end >= hi)
            .max_by(|a, b| {
                a.version
                    .cmp(&b.version)
                    .then_with(|| a.interval.cmp(&b.interval))
            });
        if let Some(seg) = winner {
            resolved.push((Interval::new(lo, hi), seg.version.clone()));
        }
    }
    resolved
}

/// Flatten chunks into elementary sub-intervals for comparison with the
/// reference, splitting at the same boundary set.
fn flatten(chunks: &[(Interval, String)], bounds: &[i64]) -> Vec<(Interval, String)> {
    let mut flat = Vec::new();
    for (interval, version) in chunks {
        let mut cursor = interval.start;
        for &b in bounds {
            if b > cursor && b < interval.end {
                flat.push((Interval::new(cursor, b), version.clone()));
                cursor = b;
            }
        }
        flat.push((Interval::new(cursor, interval.end), version.clone()));
    }
    flat
}

#[test]
fn test_lookup_matches_reference_resolution() {
    let mut rng = SmallRng::seed_from_u64(2024);

    for round in 0..20 {
        let segments = random_segments(&mut rng, 40);
        let mut timeline =
            VersionedTimeline::new(Arc::new(RandomServerSelectorStrategy::with_seed(round)));
        for (i, seg) in segments.iter().enumerate() {
            timeline.add(seg, server(&format!("hist-{}", i)));
        }

        let query = Interval::new(0, 40 * DAY);
        let chunks = timeline.lookup(query);

        // Chunks are sorted and non-overlapping
        for pair in chunks.windows(2) {
            assert!(pair[0].interval().end <= pair[1].interval().start);
        }

        let got: Vec<(Interval, String)> = chunks
            .iter()
            .map(|c| (c.interval(), c.version().to_string()))
            .collect();
        let expected = reference_resolution(&segments, query);

        let mut bounds: Vec<i64> = segments
            .iter()
            .flat_map(|s| [s.interval.start, s.interval.end])
            .collect();
        bounds.sort_unstable();
        bounds.dedup();

        assert_eq!(
            flatten(&got, &bounds),
            expected,
            "round {} diverged from reference",
            round
        );
    }
}

#[test]
fn test_random_removal_order_drains_timeline() {
    let mut rng = SmallRng::seed_from_u64(7);

    for round in 0..10 {
        let segments = random_segments(&mut rng, 25);
        let mut timeline =
            VersionedTimeline::new(Arc::new(RandomServerSelectorStrategy::with_seed(round)));

        let mut coordinates = Vec::new();
        for (i, seg) in segments.iter().enumerate() {
            let name = format!("hist-{}", i);
            timeline.add(seg, server(&name));
            coordinates.push((seg.interval, seg.version.clone(), seg.partition_num, name));
        }

        coordinates.shuffle(&mut rng);
        for (interval, version, partition_num, name) in coordinates {
            assert!(timeline
                .remove(&interval, &version, partition_num, &name)
                .is_some());
        }

        assert!(timeline.is_empty());
        assert!(timeline.lookup(Interval::new(0, 40 * DAY)).is_empty());
        assert!(timeline
            .lookup_with_incomplete(Interval::new(0, 40 * DAY))
            .is_empty());
    }
}

#[test]
fn test_interleaved_adds_and_removes_converge() {
    let mut rng = SmallRng::seed_from_u64(99);
    let segments = random_segments(&mut rng, 30);
    let mut timeline =
        VersionedTimeline::new(Arc::new(RandomServerSelectorStrategy::with_seed(1)));

    // Add everything, remove a random half, and check the survivors resolve
    // exactly like a timeline built from the survivors alone.
    for (i, seg) in segments.iter().enumerate() {
        timeline.add(seg, server(&format!("hist-{}", i)));
    }
    let mut keep = Vec::new();
    for (i, seg) in segments.iter().enumerate() {
        if rng.gen_bool(0.5) {
            timeline.remove(
                &seg.interval,
                &seg.version,
                seg.partition_num,
                &format!("hist-{}", i),
            );
        } else {
            keep.push(seg.clone());
        }
    }

    let mut fresh = VersionedTimeline::new(Arc::new(RandomServerSelectorStrategy::with_seed(2)));
    for (i, seg) in keep.iter().enumerate() {
        fresh.add(seg, server(&format!("fresh-{}", i)));
    }

    let query = Interval::new(0, 40 * DAY);
    let views = |timeline: &VersionedTimeline| {
        timeline
            .lookup(query)
            .iter()
            .map(|c| (c.interval(), c.version().to_string()))
            .collect::<Vec<_>>()
    };
    assert_eq!(views(&timeline), views(&fresh));
}
