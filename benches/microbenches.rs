//! Criterion microbenches for the merge pipeline.
//!
//! Run with: `cargo bench`
//!
//! These benchmarks measure the performance of:
//! - COCO JSON parsing (from_coco_slice)
//! - Merging several sources (merge_sources)
//! - Enrichment of a merged corpus (enrich_dataset)
//! - Instance index build and lookups (InstanceIndex)

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use partmerge::enrich::enrich_dataset;
use partmerge::index::InstanceIndex;
use partmerge::ir::io_coco_json::{from_coco_slice, to_coco_string};
use partmerge::ir::{Annotation, Category, Dataset, Image, Source};
use partmerge::merge::merge_sources;

const CATEGORIES: [&str; 8] = [
    "Head", "Torso", "Arm", "Hand", "Leg", "Foot", "Tail", "Wing",
];

/// A source with `images` images and four annotations per image.
fn synthetic_source(name: &str, images: u64) -> Source {
    let mut dataset = Dataset {
        categories: CATEGORIES
            .iter()
            .enumerate()
            .map(|(i, n)| Category::with_supercategory(i as u64 + 1, *n, "Animal"))
            .collect(),
        ..Default::default()
    };
    let mut next_ann = 1u64;
    for id in 1..=images {
        dataset
            .images
            .push(Image::new(id, format!("{name}/train/{id:06}.jpg"), 640, 480));
        for k in 0..4u64 {
            let category = (id + k / 2) % CATEGORIES.len() as u64 + 1;
            dataset.annotations.push(
                Annotation::new(next_ann, id, category).with_bbox([1.0, 2.0, 30.0, 40.0]),
            );
            next_ann += 1;
        }
    }
    Source::new(name, dataset)
}

fn sources() -> Vec<Source> {
    (0..4)
        .map(|i| synthetic_source(&format!("part{i}"), 500))
        .collect()
}

/// Benchmark COCO JSON parsing from byte slice.
fn bench_coco_parse(c: &mut Criterion) {
    let json = to_coco_string(&synthetic_source("parse", 500).dataset).unwrap();
    let bytes = json.as_bytes();
    let mut group = c.benchmark_group("coco_parse");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("from_coco_slice", |b| {
        b.iter(|| {
            let ds = from_coco_slice(black_box(bytes)).unwrap();
            black_box(ds)
        })
    });

    group.finish();
}

/// Benchmark validation, remapping and unification of four sources.
fn bench_merge(c: &mut Criterion) {
    let sources = sources();
    let annotations: usize = sources.iter().map(|s| s.dataset.annotations.len()).sum();
    let mut group = c.benchmark_group("merge");
    group.throughput(Throughput::Elements(annotations as u64));

    group.bench_function("merge_sources", |b| {
        b.iter(|| {
            let outcome = merge_sources(black_box(&sources)).unwrap();
            black_box(outcome)
        })
    });

    group.finish();
}

/// Benchmark the single enrichment pass.
///
/// The merged corpus is built once; each iteration enriches a clone.
fn bench_enrich(c: &mut Criterion) {
    let merged = merge_sources(&sources()).unwrap().dataset;
    let mut group = c.benchmark_group("enrich");
    group.throughput(Throughput::Elements(merged.annotations.len() as u64));

    group.bench_function("enrich_dataset", |b| {
        b.iter(|| {
            let mut ds = merged.clone();
            let summary = enrich_dataset(black_box(&mut ds)).unwrap();
            black_box(summary)
        })
    });

    group.finish();
}

/// Benchmark index construction and name-based lookups.
fn bench_index(c: &mut Criterion) {
    let mut merged = merge_sources(&sources()).unwrap().dataset;
    enrich_dataset(&mut merged).unwrap();
    let mut group = c.benchmark_group("index");

    group.bench_function("build", |b| {
        b.iter(|| {
            let index = InstanceIndex::build(black_box(&merged));
            black_box(index.len())
        })
    });

    let index = InstanceIndex::build(&merged);
    group.bench_function("lookup_by_name", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for image in merged.images.iter().take(200) {
                for name in CATEGORIES {
                    hits += index.get(index.by_name(image.id, black_box(name))).len();
                }
            }
            black_box(hits)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_coco_parse,
    bench_merge,
    bench_enrich,
    bench_index,
);
criterion_main!(benches);
