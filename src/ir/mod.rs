//! Dataset representation shared by every pipeline stage.
//!
//! Sources, the merged corpus and emitted splits all use the same
//! COCO-shaped [`Dataset`]. Ids are newtypes so image, annotation and
//! category id spaces cannot be mixed up while remapping.
//!
//! # Example
//!
//! ```
//! use partmerge::ir::{Annotation, Category, Dataset, Image};
//!
//! let dataset = Dataset {
//!     images: vec![Image::new(1u64, "train/cat.jpg", 640, 480)],
//!     categories: vec![Category::with_supercategory(1u64, "Quadruped Head", "Quadruped")],
//!     annotations: vec![Annotation::new(1u64, 1u64, 1u64).with_bbox([10.0, 20.0, 30.0, 40.0])],
//!     ..Default::default()
//! };
//! assert_eq!(dataset.annotations[0].area, 1200.0);
//! ```

mod ids;
pub mod io_coco_json;
mod model;

pub use ids::{AnnotationId, CategoryId, ImageId};
pub use io_coco_json::Source;
pub use model::{Annotation, Category, Dataset, Image, Rle, RleCounts, Segmentation};
