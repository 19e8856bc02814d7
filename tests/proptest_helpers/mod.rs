#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use partmerge::enrich::CompositeKey;
use partmerge::ir::{Annotation, Category, CategoryId, Dataset, Image, ImageId, Source};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

/// Category names drawn by every generated source, so sources overlap.
pub const CATEGORY_POOL: [&str; 6] = ["Leg", "Arm", "Head", "Tail", "Wing", "Body"];

const SPLIT_DIRS: [&str; 4] = ["train/", "val/", "test/", ""];

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn assert_valid_references(dataset: &Dataset) -> Result<(), String> {
    let image_ids: BTreeSet<ImageId> = dataset.images.iter().map(|img| img.id).collect();
    let category_ids: BTreeSet<CategoryId> = dataset.categories.iter().map(|cat| cat.id).collect();

    for ann in &dataset.annotations {
        if !image_ids.contains(&ann.image_id) {
            return Err(format!(
                "annotation {} references missing image_id {}",
                ann.id.as_u64(),
                ann.image_id.as_u64()
            ));
        }
        if !category_ids.contains(&ann.category_id) {
            return Err(format!(
                "annotation {} references missing category_id {}",
                ann.id.as_u64(),
                ann.category_id.as_u64()
            ));
        }
    }

    Ok(())
}

/// Instance ids grouped by composite key, in annotation order.
pub fn instance_ids_by_key(dataset: &Dataset) -> BTreeMap<CompositeKey, Vec<u32>> {
    let mut out: BTreeMap<CompositeKey, Vec<u32>> = BTreeMap::new();
    for ann in &dataset.annotations {
        out.entry(CompositeKey::new(ann.image_id, ann.category_id))
            .or_default()
            .push(ann.instance_id.unwrap_or(u32::MAX));
    }
    out
}

/// Keys and instance ids in annotation order, for comparing two runs.
pub fn enrichment_fingerprint(dataset: &Dataset) -> Vec<(Option<String>, Option<u32>)> {
    dataset
        .annotations
        .iter()
        .map(|a| (a.image_category_key.clone(), a.instance_id))
        .collect()
}

/// (image seed, category seed) per annotation.
type AnnSeed = (u16, u16);

/// One source with sparse ids, names from [`CATEGORY_POOL`] and file names
/// under random split directories.
pub fn arb_source(name: String, max_images: usize, max_anns: usize) -> BoxedStrategy<Source> {
    assert!(max_images > 0, "max_images must be > 0");

    (
        1usize..=max_images,
        1usize..=CATEGORY_POOL.len(),
        proptest::collection::vec(any::<AnnSeed>(), 0..=max_anns),
        1u64..50,
        proptest::collection::vec(0usize..SPLIT_DIRS.len(), max_images),
    )
        .prop_map(move |(image_count, category_count, seeds, stride, dirs)| {
            build_source(&name, image_count, category_count, &seeds, stride, &dirs)
        })
        .boxed()
}

/// Between one and `max_sources` sources named `s0`, `s1`, ...
pub fn arb_sources(max_sources: usize, max_images: usize, max_anns: usize) -> BoxedStrategy<Vec<Source>> {
    (1usize..=max_sources)
        .prop_flat_map(move |count| {
            (0..count)
                .map(|i| arb_source(format!("s{i}"), max_images, max_anns))
                .collect::<Vec<_>>()
        })
        .boxed()
}

fn build_source(
    name: &str,
    image_count: usize,
    category_count: usize,
    seeds: &[AnnSeed],
    stride: u64,
    dirs: &[usize],
) -> Source {
    // Sparse, non-contiguous ids exercise the remapper.
    let sparse = |idx: usize| 7 + idx as u64 * stride;

    let images: Vec<Image> = (0..image_count)
        .map(|idx| {
            let dir = SPLIT_DIRS[dirs[idx]];
            Image::new(sparse(idx), format!("{name}/{dir}img_{idx}.jpg"), 64, 48)
        })
        .collect();

    let categories: Vec<Category> = CATEGORY_POOL[..category_count]
        .iter()
        .enumerate()
        .map(|(idx, cat)| Category::new(sparse(idx) + 1000, *cat))
        .collect();

    let annotations: Vec<Annotation> = seeds
        .iter()
        .enumerate()
        .map(|(idx, (image_seed, category_seed))| {
            let image = &images[*image_seed as usize % images.len()];
            let category = &categories[*category_seed as usize % categories.len()];
            Annotation::new(sparse(idx) + 5000, image.id, category.id).with_bbox([1.0, 1.0, 4.0, 4.0])
        })
        .collect();

    Source::new(
        name,
        Dataset {
            images,
            categories,
            annotations,
            ..Default::default()
        },
    )
}
