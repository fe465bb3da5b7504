use std::hint::black_box;
use std::time::Duration;

use capsule_core::aggregate::{self, Bucket, Dimension, Metric};
use capsule_core::{CanonicalLog, HistoryConsolidator, NormalizeConfig, RawBatch, TimeMachineIndex};
use chrono::DateTime;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::{Value, json};

const TIERS: [(&str, usize); 3] = [("small", 1_000), ("medium", 10_000), ("large", 100_000)];
const BATCH_SIZE: usize = 10_000;

/// Deterministic synthetic export: a few hundred tracks, plays spread over
/// two years, with a small share of overlapping duplicates.
fn synthetic_batches(records: usize, seed: u64) -> Vec<RawBatch> {
    let mut state = seed;
    let mut next = || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        state >> 33
    };

    let mut all = Vec::with_capacity(records);
    for _ in 0..records {
        let secs = 1_609_459_200 + i64::try_from(next() % 63_072_000).unwrap_or(0);
        let track = next() % 400;
        all.push(json!({
            "ts": DateTime::from_timestamp(secs, 0).map(|t| t.to_rfc3339()),
            "master_metadata_track_name": format!("Track {track}"),
            "master_metadata_album_artist_name": format!("Artist {}", track % 60),
            "ms_played": next() % 360_000,
            "platform": "Android OS 9 API 28",
        }));
    }

    all.chunks(BATCH_SIZE)
        .enumerate()
        .map(|(i, chunk)| RawBatch::new(format!("Streaming_History_{i}.json"), Value::Array(chunk.to_vec())))
        .collect()
}

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline.ingest");
    let config = NormalizeConfig::default();

    for (name, records) in TIERS {
        let batches = synthetic_batches(records, 0xCA75_u64 + records as u64);
        group.throughput(Throughput::Elements(records as u64));
        group.bench_with_input(BenchmarkId::new("ingest", name), &batches, |b, batches| {
            b.iter(|| black_box(HistoryConsolidator::new(&config).ingest(batches)));
        });
    }

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline.query");
    let config = NormalizeConfig::default();

    for (name, records) in TIERS {
        let batches = synthetic_batches(records, 0xCA75_u64 + records as u64);
        let log: CanonicalLog = HistoryConsolidator::new(&config).ingest(&batches).log;
        let probe = log
            .as_slice()
            .get(log.len() / 2)
            .map_or_else(chrono::Utc::now, |e| e.played_at);

        group.bench_with_input(BenchmarkId::new("top_artists", name), &log, |b, log| {
            b.iter(|| black_box(aggregate::top_entities(log, Dimension::Artist, Metric::TotalMsPlayed, 10)));
        });
        group.bench_with_input(BenchmarkId::new("monthly_trend", name), &log, |b, log| {
            b.iter(|| black_box(aggregate::bucketed_trend(log, Bucket::Month, Metric::PlayCount)));
        });
        group.bench_with_input(BenchmarkId::new("window", name), &log, |b, log| {
            let index = TimeMachineIndex::new(log);
            b.iter(|| black_box(index.nearest_events_at(probe, Duration::from_secs(300))));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ingest, bench_queries);
criterion_main!(benches);
