//! Core dataset model.
//!
//! The model mirrors the COCO instance-segmentation layout closely because
//! every source, the merged corpus and every emitted split share it. Fields
//! that the merge never interprets (`info`, `licenses`) are kept as raw JSON
//! so they travel through untouched.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use super::ids::{AnnotationId, CategoryId, ImageId};

/// One annotation document: a single source collection, the merged corpus,
/// or one emitted split.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Dataset-level info block, passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<serde_json::Value>,

    /// License entries, passed through verbatim.
    #[serde(default)]
    pub licenses: Vec<serde_json::Value>,

    pub images: Vec<Image>,

    pub categories: Vec<Category>,

    pub annotations: Vec<Annotation>,
}

impl Dataset {
    /// Returns true if the document holds no images, categories or annotations.
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.categories.is_empty() && self.annotations.is_empty()
    }
}

/// An image entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,

    /// Path or URL of the image; must be unique within a dataset.
    pub file_name: String,

    pub width: u32,

    pub height: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_captured: Option<String>,

    /// Payload reference. Dropped in annotations-only emission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coco_url: Option<String>,

    /// Payload reference. Dropped in annotations-only emission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flickr_url: Option<String>,

    /// Keys the model does not name, carried through as read.
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Image {
    /// Creates a new image with the given properties.
    pub fn new(
        id: impl Into<ImageId>,
        file_name: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            width,
            height,
            license: None,
            date_captured: None,
            coco_url: None,
            flickr_url: None,
            extra: BTreeMap::new(),
        }
    }

    /// Sets the `coco_url` payload reference.
    pub fn with_coco_url(mut self, url: impl Into<String>) -> Self {
        self.coco_url = Some(url.into());
        self
    }

    /// Returns true if the entry points at pixel data anywhere.
    pub fn has_payload_reference(&self) -> bool {
        self.coco_url.is_some() || self.flickr_url.is_some()
    }

    /// Removes every payload reference, keeping name and dimensions.
    pub fn strip_payload_references(&mut self) {
        self.coco_url = None;
        self.flickr_url = None;
    }
}

/// A category (class label).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,

    /// Canonical join key across sources. Compared case-sensitively.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supercategory: Option<String>,
}

impl Category {
    /// Creates a new category without a supercategory.
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            supercategory: None,
        }
    }

    /// Creates a new category with a supercategory.
    pub fn with_supercategory(
        id: impl Into<CategoryId>,
        name: impl Into<String>,
        supercategory: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            supercategory: Some(supercategory.into()),
        }
    }
}

/// Run-length counts, either the compressed string form or the raw list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RleCounts {
    Compressed(String),
    Uncompressed(Vec<u32>),
}

/// A run-length-encoded mask. `size` is `[height, width]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rle {
    pub counts: RleCounts,
    pub size: [u32; 2],
}

/// Segmentation of one annotation, carried through without decoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segmentation {
    Rle(Rle),
    Polygons(Vec<Vec<f64>>),
}

impl Segmentation {
    /// Returns the mask dimensions `[height, width]` for RLE masks.
    pub fn rle_size(&self) -> Option<[u32; 2]> {
        match self {
            Segmentation::Rle(rle) => Some(rle.size),
            Segmentation::Polygons(_) => None,
        }
    }
}

/// One annotated instance.
///
/// `image_id`, `category_id` and `segmentation` are authoritative; the three
/// enrichment fields are derived by [`crate::enrich`] and recomputed whenever
/// the category table changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,

    pub image_id: ImageId,

    pub category_id: CategoryId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Segmentation>,

    /// COCO `[x, y, width, height]`.
    #[serde(deserialize_with = "deserialize_bbox")]
    pub bbox: [f64; 4],

    #[serde(default)]
    pub area: f64,

    #[serde(default)]
    pub iscrowd: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_category_key: Option<String>,

    /// Exporter-specific keys such as CVAT's `attributes`, carried through
    /// as read.
    #[serde(flatten, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Annotation {
    /// Creates an annotation with an empty box and no segmentation.
    pub fn new(
        id: impl Into<AnnotationId>,
        image_id: impl Into<ImageId>,
        category_id: impl Into<CategoryId>,
    ) -> Self {
        Self {
            id: id.into(),
            image_id: image_id.into(),
            category_id: category_id.into(),
            segmentation: None,
            bbox: [0.0; 4],
            area: 0.0,
            iscrowd: 0,
            category_name: None,
            instance_id: None,
            image_category_key: None,
            extra: BTreeMap::new(),
        }
    }

    /// Sets the bounding box and derives the area from it.
    pub fn with_bbox(mut self, bbox: [f64; 4]) -> Self {
        self.bbox = bbox;
        self.area = bbox[2] * bbox[3];
        self
    }

    /// Sets the segmentation.
    pub fn with_segmentation(mut self, segmentation: Segmentation) -> Self {
        self.segmentation = Some(segmentation);
        self
    }

    /// Drops all derived fields.
    pub fn clear_enrichment(&mut self) {
        self.category_name = None;
        self.instance_id = None;
        self.image_category_key = None;
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BBoxRepr {
    Flat([f64; 4]),
    Nested(Vec<[f64; 4]>),
}

/// Accepts `[x,y,w,h]` and the `[[x,y,w,h], ...]` shape some exporters emit,
/// keeping the first box of a nested list.
fn deserialize_bbox<'de, D>(deserializer: D) -> Result<[f64; 4], D::Error>
where
    D: Deserializer<'de>,
{
    match BBoxRepr::deserialize(deserializer)? {
        BBoxRepr::Flat(bbox) => Ok(bbox),
        BBoxRepr::Nested(boxes) => boxes
            .into_iter()
            .next()
            .ok_or_else(|| D::Error::custom("nested bbox list is empty")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_bbox_is_flattened() {
        let json = r#"{"id": 1, "image_id": 1, "category_id": 1, "bbox": [[1, 2, 3, 4], [9, 9, 9, 9]]}"#;
        let ann: Annotation = serde_json::from_str(json).unwrap();
        assert_eq!(ann.bbox, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_empty_nested_bbox_is_rejected() {
        let json = r#"{"id": 1, "image_id": 1, "category_id": 1, "bbox": []}"#;
        assert!(serde_json::from_str::<Annotation>(json).is_err());
    }

    #[test]
    fn test_segmentation_variants_parse() {
        let compressed: Segmentation =
            serde_json::from_str(r#"{"counts": "abc", "size": [4, 5]}"#).unwrap();
        assert_eq!(compressed.rle_size(), Some([4, 5]));
        assert!(matches!(
            compressed,
            Segmentation::Rle(Rle {
                counts: RleCounts::Compressed(_),
                ..
            })
        ));

        let raw: Segmentation =
            serde_json::from_str(r#"{"counts": [3, 2, 15], "size": [4, 5]}"#).unwrap();
        assert!(matches!(
            raw,
            Segmentation::Rle(Rle {
                counts: RleCounts::Uncompressed(_),
                ..
            })
        ));

        let poly: Segmentation = serde_json::from_str("[[0, 0, 4, 0, 4, 4]]").unwrap();
        assert_eq!(poly.rle_size(), None);
    }

    #[test]
    fn test_enrichment_fields_are_omitted_until_set() {
        let ann = Annotation::new(1u64, 2u64, 3u64).with_bbox([0.0, 0.0, 2.0, 5.0]);
        assert_eq!(ann.area, 10.0);
        let value = serde_json::to_value(&ann).unwrap();
        assert!(value.get("instance_id").is_none());
        assert!(value.get("category_name").is_none());
        assert!(value.get("image_category_key").is_none());
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let json = r#"{"id": 4, "image_id": 1, "category_id": 2, "bbox": [0, 0, 1, 1],
            "attributes": {"occluded": true, "track_id": 3}}"#;
        let ann: Annotation = serde_json::from_str(json).unwrap();
        assert_eq!(ann.extra["attributes"]["occluded"], true);

        let value = serde_json::to_value(&ann).unwrap();
        assert_eq!(value["attributes"], serde_json::json!({"occluded": true, "track_id": 3}));
        assert_eq!(value["bbox"], serde_json::json!([0.0, 0.0, 1.0, 1.0]));

        let json = r#"{"id": 1, "file_name": "a.jpg", "width": 4, "height": 3, "tags": ["night"]}"#;
        let image: Image = serde_json::from_str(json).unwrap();
        let value = serde_json::to_value(&image).unwrap();
        assert_eq!(value["tags"], serde_json::json!(["night"]));
        assert!(Image::new(1u64, "a.jpg", 4, 3).extra.is_empty());
    }

    #[test]
    fn test_strip_payload_references() {
        let mut image = Image::new(1u64, "a.jpg", 10, 10).with_coco_url("http://x/a.jpg");
        assert!(image.has_payload_reference());
        image.strip_payload_references();
        assert!(!image.has_payload_reference());
        assert_eq!(image.file_name, "a.jpg");
    }
}
