#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// A minimal 24-bit BMP, enough for `imagesize` to read its dimensions.
pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
    let row_stride = (width * 3).div_ceil(4) * 4;
    let pixel_array_size = row_stride * height;
    let file_size = 54 + pixel_array_size;

    let mut bytes = Vec::with_capacity(file_size as usize);
    bytes.extend_from_slice(b"BM");
    bytes.extend_from_slice(&file_size.to_le_bytes());
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes.extend_from_slice(&54u32.to_le_bytes());

    bytes.extend_from_slice(&40u32.to_le_bytes());
    bytes.extend_from_slice(&(width as i32).to_le_bytes());
    bytes.extend_from_slice(&(height as i32).to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&24u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&2835u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    bytes.resize(file_size as usize, 0);
    bytes
}

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

/// A valid biped export: two images under train/ and val/, three "Leg"
/// annotations, one of them an RLE mask.
pub const BIPED_JSON: &str = r#"{
  "info": {"description": "Biped parts", "year": 2024},
  "licenses": [{"id": 1, "name": "CC BY 4.0"}],
  "images": [
    {"id": 11, "file_name": "https://bucket/spin/train/n01_1.jpg", "width": 64, "height": 48,
     "coco_url": "https://bucket/spin/train/n01_1.jpg"},
    {"id": 12, "file_name": "https://bucket/spin/val/n01_2.jpg", "width": 64, "height": 48}
  ],
  "categories": [{"id": 3, "name": "Leg", "supercategory": "Biped"}],
  "annotations": [
    {"id": 1, "image_id": 11, "category_id": 3, "bbox": [1, 2, 3, 4], "area": 12, "iscrowd": 0,
     "segmentation": {"counts": "PPY3", "size": [48, 64]}},
    {"id": 2, "image_id": 11, "category_id": 3, "bbox": [[5, 5, 2, 2]], "area": 4, "iscrowd": 0},
    {"id": 3, "image_id": 12, "category_id": 3, "bbox": [0, 0, 1, 1], "area": 1, "iscrowd": 0}
  ]
}"#;

/// A second export sharing the "Leg" category and adding "Arm".
pub const ARMS_JSON: &str = r#"{
  "images": [
    {"id": 1, "file_name": "https://bucket/spin/test/n02_1.jpg", "width": 64, "height": 48}
  ],
  "categories": [
    {"id": 1, "name": "Arm", "supercategory": "Biped"},
    {"id": 2, "name": "Leg", "supercategory": "Biped"}
  ],
  "annotations": [
    {"id": 1, "image_id": 1, "category_id": 2, "bbox": [1, 1, 2, 2], "area": 4, "iscrowd": 0},
    {"id": 2, "image_id": 1, "category_id": 1, "bbox": [3, 3, 2, 2], "area": 4, "iscrowd": 0,
     "attributes": {"occluded": true}}
  ]
}"#;

/// An export whose annotation points at image 99, which does not exist.
pub const BROKEN_JSON: &str = r#"{
  "images": [{"id": 1, "file_name": "x/train/a.jpg", "width": 8, "height": 8}],
  "categories": [{"id": 1, "name": "Leg"}],
  "annotations": [{"id": 7, "image_id": 99, "category_id": 1, "bbox": [0, 0, 1, 1]}]
}"#;

pub fn write_json(dir: &Path, file_name: &str, contents: &str) -> PathBuf {
    fs::create_dir_all(dir).expect("create fixture dir");
    let path = dir.join(file_name);
    fs::write(&path, contents).expect("write fixture");
    path
}
