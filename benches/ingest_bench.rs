//! Benchmarks for Zine parsing, indexing and archive building
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::Value;
use tempfile::tempdir;
use zine::index::{tokenize, DesignDocument, IndexKind};
use zine::ingest::{parse_post, PostRef};
use zine::query::build_archive;
use zine::store::{Document, DocumentStore, QueryOptions, Row, SqliteStore, StoreConfig};

fn raw_post(i: usize) -> String {
    format!(
        "datetime: 2020-01-{:02}T10:00:00\ntags: rust, storage, bench{}\npeople: ada, grace\ntitle: Post {}\n\n{}",
        i % 28 + 1,
        i % 7,
        i,
        "The quick brown fox jumps over the lazy dog. ".repeat(40)
    )
}

fn create_test_docs(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            let post = PostRef {
                path: format!("txt/post-{}.md", i),
                id: format!("post-{}", i),
            };
            parse_post(&raw_post(i), &post)
        })
        .collect()
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    let raw = raw_post(1);
    let post = PostRef {
        path: "txt/post-1.md".to_string(),
        id: "post-1".to_string(),
    };

    group.throughput(Throughput::Bytes(raw.len() as u64));
    group.bench_function("parse_post", |b| {
        b.iter(|| parse_post(black_box(&raw), black_box(&post)))
    });

    group.bench_function("tokenize", |b| {
        b.iter(|| tokenize(black_box(&raw)).count())
    });

    group.finish();
}

fn bench_archive(c: &mut Criterion) {
    let mut group = c.benchmark_group("archive");

    for days in [30, 365, 3650] {
        // one post every third day
        let rows: Vec<Row> = (0..days)
            .step_by(3)
            .map(|d| {
                let date = chrono::NaiveDate::from_ymd_opt(2010, 1, 1).unwrap()
                    + chrono::Duration::days(d as i64);
                Row::reduced(Value::String(date.to_string()), 1)
            })
            .collect();

        group.throughput(Throughput::Elements(days as u64));
        group.bench_function(format!("build_{}_days", days), |b| {
            b.iter(|| build_archive(black_box(&rows)))
        });
    }

    group.finish();
}

fn bench_views(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    let mut group = c.benchmark_group("views");

    for size in [100, 1000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("build_text_{}", size), |b| {
            b.iter_custom(|iters| {
                rt.block_on(async {
                    let mut total = std::time::Duration::ZERO;

                    for _ in 0..iters {
                        let dir = tempdir().unwrap();
                        let store = SqliteStore::open(StoreConfig::new(dir.path()))
                            .await
                            .unwrap();
                        store.bulk_insert(create_test_docs(size)).await.unwrap();
                        store.put_design(DesignDocument::standard()).await.unwrap();

                        let start = std::time::Instant::now();
                        store
                            .query(IndexKind::Text, QueryOptions::new().keys(["fox"]))
                            .await
                            .unwrap();
                        total += start.elapsed();
                    }

                    total
                })
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_archive, bench_views);
criterion_main!(benches);
