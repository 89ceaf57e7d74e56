//! Timeline lookup benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use segview::{
    Interval, QueryableServer, RandomServerSelectorStrategy, SegmentDescriptor, ServerMetadata,
    ServerType, VersionedTimeline,
};
use std::sync::Arc;

const DAY: i64 = 86_400_000_000_000;

fn populated_timeline(segment_count: usize) -> VersionedTimeline {
    let mut rng = SmallRng::seed_from_u64(42);
    let mut timeline =
        VersionedTimeline::new(Arc::new(RandomServerSelectorStrategy::with_seed(42)));

    let servers: Vec<Arc<QueryableServer>> = (0..16)
        .map(|i| {
            Arc::new(QueryableServer::new(ServerMetadata::new(
                format!("hist-{}", i),
                format!("10.0.1.{}:8083", i),
                ServerType::Historical,
            )))
        })
        .collect();

    for i in 0..segment_count {
        let start_day = rng.gen_range(0..365);
        let len_days = rng.gen_range(1..5);
        let interval = Interval::new(start_day * DAY, (start_day + len_days) * DAY);
        let version = format!("v{:02}", rng.gen_range(0..4));
        let segment =
            SegmentDescriptor::new("events", interval, version).with_partition(i as u32, 0);
        timeline.add(&segment, Arc::clone(&servers[i % servers.len()]));
    }
    timeline
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("timeline_lookup");

    for segment_count in [100, 1_000, 10_000] {
        let timeline = populated_timeline(segment_count);
        let week = Interval::new(100 * DAY, 107 * DAY);

        group.throughput(Throughput::Elements(1));
        group.bench_function(format!("week_query_{}_segments", segment_count), |b| {
            b.iter(|| black_box(timeline.lookup(black_box(week))))
        });

        let year = Interval::new(0, 365 * DAY);
        group.bench_function(format!("year_query_{}_segments", segment_count), |b| {
            b.iter(|| black_box(timeline.lookup(black_box(year))))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lookup);
criterion_main!(benches);
