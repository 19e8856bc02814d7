//! Fuzz target for COCO parsing followed by merge and enrichment.
//!
//! Arbitrary bytes are parsed as a COCO document; anything that parses is
//! merged with itself and enriched. Errors are expected, panics are not.
//!
//! Run with:
//!   cargo +nightly fuzz run coco_merge

#![no_main]

use libfuzzer_sys::fuzz_target;
use partmerge::index::InstanceIndex;
use partmerge::ir::io_coco_json::from_coco_slice;
use partmerge::ir::Source;
use partmerge::pipeline::build_corpus;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(dataset) = from_coco_slice(data) else {
        return;
    };

    let sources = [
        Source::new("first", dataset.clone()),
        Source::new("second", dataset),
    ];
    if let Ok(corpus) = build_corpus(&sources) {
        let index = InstanceIndex::build(&corpus.dataset);
        for annotation in &corpus.dataset.annotations {
            let found = index.get(index.by_ids(annotation.image_id, annotation.category_id));
            assert!(!found.is_empty());
        }
    }
});
