// Matcher and search benchmarks over synthetic multi-source listings
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dishx_core::{RawRecord, RunContext, SourceId};
use dishx_index::{HashEmbedder, IndexSnapshot};
use dishx_matching::{normalize, normalize_all, MatchConfig, Matcher, Scorer};
use rand::prelude::*;

const WORDS: &[&str] = &[
    "joe's", "pizza", "katz's", "deli", "golden", "dragon", "noodle", "bar", "taqueria", "sushi", "bistro", "cafe",
    "grill", "house", "kitchen", "ramen", "trattoria", "bagel", "oyster", "smoke",
];
const STREETS: &[&str] = &["Carmine St", "Bleecker Street", "W 4th St", "Broadway", "Houston St", "Avenue A"];

/// `n` restaurants, each listed by two to four sources with small variations.
fn generate_records(n: usize, rng: &mut StdRng) -> Vec<RawRecord> {
    let now = Utc::now();
    let mut records = Vec::with_capacity(n * 3);

    for i in 0..n {
        let name = format!(
            "{} {}",
            WORDS[rng.random_range(0..WORDS.len())],
            WORDS[rng.random_range(0..WORDS.len())]
        );
        let number = rng.random_range(1..999);
        let street = STREETS[rng.random_range(0..STREETS.len())];
        let lat = 40.70 + rng.random_range(0.0..0.08);
        let lon = -74.02 + rng.random_range(0.0..0.06);

        let listings = rng.random_range(2..=4);
        for source in SourceId::ALL.iter().take(listings) {
            let variant = if rng.random_bool(0.5) {
                name.to_uppercase()
            } else {
                format!("{name} inc")
            };
            let mut record = RawRecord::new(
                *source,
                format!("{source}-{i}"),
                variant,
                format!("{number} {street}, New York"),
                now,
            );
            if source.is_mapping() {
                record = record.with_coordinates(lat + rng.random_range(-0.0002..0.0002), lon);
            }
            records.push(record);
        }
    }
    records
}

fn benchmark_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("match");
    let mut rng = StdRng::seed_from_u64(42);

    for size in [100, 1000, 5000].iter() {
        let records = generate_records(*size, &mut rng);
        group.bench_with_input(BenchmarkId::new("normalize_and_match", size), &records, |b, records| {
            let matcher = Matcher::new(MatchConfig::default());
            b.iter(|| {
                let ctx = RunContext::new();
                let normalized = normalize_all(&ctx, records.clone());
                black_box(matcher.match_records(&ctx, normalized))
            });
        });
    }

    group.finish();
}

fn benchmark_score(c: &mut Criterion) {
    let now = Utc::now();
    let a = normalize(RawRecord::new(SourceId::Google, "g1", "Joe's Pizza", "7 Carmine St, New York, NY", now));
    let b = normalize(RawRecord::new(SourceId::OpenTable, "o1", "Joes Pizza Inc", "7 Carmine Street, New York", now));
    let scorer = Scorer::new(MatchConfig::default());

    c.bench_function("pair_score", |bench| bench.iter(|| black_box(scorer.score(black_box(&a), black_box(&b)))));
}

fn benchmark_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");
    let embedder = HashEmbedder::new(256);
    let mut rng = StdRng::seed_from_u64(7);

    let entities: Vec<_> = (0..10_000)
        .map(|i| {
            let name = format!("{} {} {i}", WORDS[rng.random_range(0..WORDS.len())], WORDS[rng.random_range(0..WORDS.len())]);
            let mut entity = dishx_core::CanonicalEntity::new(format!("rst_{i:016}"), name.clone(), SourceId::Google, Utc::now());
            entity.embedding = Some(dishx_core::Vector::new(embedder.hash_text(&name)));
            entity
        })
        .collect();
    let snapshot = IndexSnapshot::build(&entities, 256);
    let query = dishx_core::Vector::new(embedder.hash_text("late night ramen"));

    for k in [5, 50].iter() {
        group.bench_with_input(BenchmarkId::new("linear_scan_10k", k), k, |b, &k| {
            b.iter(|| black_box(snapshot.search(black_box(&query), k, |_| true)));
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_match, benchmark_score, benchmark_search);
criterion_main!(benches);
