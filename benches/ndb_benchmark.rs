use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use notedb::crypto::signature::NoteSigner;
use notedb::{Config, FieldKind, Filter, Ndb, Note, SortOrder, TextSearchConfig};
use rand::Rng;
use tempfile::TempDir;

const WORDS: [&str; 12] = [
    "bitcoin", "nostr", "relay", "zap", "lightning", "note", "client", "key", "signature", "gm",
    "pleb", "sats",
];

/// Helper to create signed notes with random content
fn create_notes(count: usize, start: u64) -> Vec<Note> {
    let mut rng = rand::thread_rng();
    let signers: Vec<NoteSigner> = (1..=4u8)
        .map(|seed| NoteSigner::from_secret(&[seed; 32]).unwrap())
        .collect();

    (0..count)
        .map(|i| {
            let content = (0..rng.gen_range(5..40))
                .map(|_| WORDS[rng.gen_range(0..WORDS.len())])
                .collect::<Vec<_>>()
                .join(" ");
            let kind = if i % 5 == 0 { 7 } else { 1 };
            let tags = vec![vec!["t".to_string(), WORDS[i % WORDS.len()].to_string()]];
            signers[i % signers.len()]
                .sign_note(start + i as u64, kind, tags, content)
                .unwrap()
        })
        .collect()
}

fn to_jsonl(notes: &[Note]) -> Vec<u8> {
    notes
        .iter()
        .map(|n| n.to_json().unwrap())
        .collect::<Vec<_>>()
        .join("\n")
        .into_bytes()
}

fn open_populated(count: usize) -> (TempDir, Ndb) {
    let dir = tempfile::tempdir().unwrap();
    let ndb = Ndb::open(dir.path(), Config::default().with_mapsize(1 << 30)).unwrap();
    ndb.process_notes(&create_notes(count, 1_700_000_000)).unwrap();
    (dir, ndb)
}

/// Benchmark line-delimited import
fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");
    group.sample_size(10);

    for count in [100, 1000].iter() {
        let input = to_jsonl(&create_notes(*count, 1_700_000_000));
        for verify in [true, false] {
            let id = format!("{}_{}", count, if verify { "verified" } else { "unverified" });
            group.bench_with_input(BenchmarkId::from_parameter(id), &input, |b, input| {
                b.iter(|| {
                    let dir = tempfile::tempdir().unwrap();
                    let config = Config::default()
                        .with_mapsize(1 << 30)
                        .with_skip_verification(!verify);
                    let ndb = Ndb::open(dir.path(), config).unwrap();
                    black_box(ndb.process_events(input).unwrap());
                });
            });
        }
    }

    group.finish();
}

/// Benchmark filter queries over each index
fn bench_query(c: &mut Criterion) {
    let (_dir, ndb) = open_populated(5000);
    let mut group = c.benchmark_group("query");

    let mut kinds = Filter::builder();
    kinds.int_field(FieldKind::Kinds, &[1]).unwrap().int_field(FieldKind::Limit, &[100]).unwrap();
    let mut tags = Filter::builder();
    tags.str_field(FieldKind::Tags('t'), &["bitcoin", "zap"]).unwrap();
    let mut window = Filter::builder();
    window
        .int_field(FieldKind::Since, &[1_700_001_000])
        .unwrap()
        .int_field(FieldKind::Until, &[1_700_002_000])
        .unwrap();

    for (name, builder) in [("kinds", kinds), ("tags", tags), ("time_window", window)] {
        let filters = [builder.finish().unwrap()];
        group.bench_function(name, |b| {
            b.iter(|| {
                let txn = ndb.begin_query();
                black_box(txn.query(&filters, 500).unwrap().len())
            });
        });
    }

    group.finish();
}

/// Benchmark ranked and chronological text search
fn bench_text_search(c: &mut Criterion) {
    let (_dir, ndb) = open_populated(5000);
    let mut group = c.benchmark_group("text_search");

    for (name, order) in [("ranked", SortOrder::Desc), ("oldest_first", SortOrder::Asc)] {
        let config = TextSearchConfig::default().with_order(order).with_limit(20);
        group.bench_function(name, |b| {
            b.iter(|| {
                let txn = ndb.begin_query();
                black_box(txn.text_search("bitcoin lightning", &config).unwrap().len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_ingest, bench_query, bench_text_search);
criterion_main!(benches);
