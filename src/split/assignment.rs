//! Split assignments: which image goes to train, val or test.
//!
//! An assignment comes from an external split map, from the directory
//! conventions of the exported file names, or from a seeded random draw.
//! It is keyed by merged image id.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::PartmergeError;
use crate::ir::{Dataset, ImageId};

/// One of the three dataset partitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    /// All splits in emission order.
    pub const ALL: [Split; 3] = [Split::Train, Split::Val, Split::Test];

    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    /// Capitalised name for human-facing text.
    pub fn title(&self) -> &'static str {
        match self {
            Split::Train => "Train",
            Split::Val => "Val",
            Split::Test => "Test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = PartmergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(Split::Train),
            "val" | "validation" => Ok(Split::Val),
            "test" => Ok(Split::Test),
            _ => Err(PartmergeError::UnsupportedSplit(s.to_string())),
        }
    }
}

/// Fractions of images per split for random assignment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SplitRatios {
    pub train: f64,
    pub val: f64,
    pub test: f64,
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.8,
            val: 0.1,
            test: 0.1,
        }
    }
}

impl SplitRatios {
    /// Checks the ratios are non-negative and sum to 1.
    pub fn validated(self) -> Result<Self, PartmergeError> {
        let parts = [self.train, self.val, self.test];
        if parts.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(PartmergeError::InvalidOptions {
                message: "split ratios must be non-negative".to_string(),
            });
        }
        if (parts.iter().sum::<f64>() - 1.0).abs() > 1e-6 {
            return Err(PartmergeError::InvalidOptions {
                message: "split ratios must sum to 1.0".to_string(),
            });
        }
        Ok(self)
    }
}

impl FromStr for SplitRatios {
    type Err = PartmergeError;

    /// Parses `train,val,test`, e.g. `0.8,0.1,0.1`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| PartmergeError::InvalidOptions {
                message: format!("'{}' is not a list of three numbers", s),
            })?;
        match parts.as_slice() {
            [train, val, test] => SplitRatios {
                train: *train,
                val: *val,
                test: *test,
            }
            .validated(),
            _ => Err(PartmergeError::InvalidOptions {
                message: format!("expected three ratios (train,val,test), got '{}'", s),
            }),
        }
    }
}

/// Mapping from merged image id to split.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SplitAssignment {
    by_image: BTreeMap<ImageId, Split>,
}

impl SplitAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns (or reassigns) one image.
    pub fn assign(&mut self, image_id: impl Into<ImageId>, split: Split) {
        self.by_image.insert(image_id.into(), split);
    }

    pub fn get(&self, image_id: ImageId) -> Option<Split> {
        self.by_image.get(&image_id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_image.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_image.is_empty()
    }

    /// Derives splits from a `train`, `val` or `test` directory segment in
    /// each image's file name (a path or URL). Images without one are left
    /// unassigned.
    pub fn from_paths(dataset: &Dataset) -> Self {
        let mut assignment = Self::new();
        for image in &dataset.images {
            if let Some(split) = split_from_path(&image.file_name) {
                assignment.assign(image.id, split);
            }
        }
        log::debug!(
            "derived splits for {} of {} image(s) from paths",
            assignment.len(),
            dataset.images.len()
        );
        assignment
    }

    /// Assigns images whose file name appears in `map`.
    pub fn from_file_names(dataset: &Dataset, map: &HashMap<String, Split>) -> Self {
        let mut assignment = Self::new();
        for image in &dataset.images {
            if let Some(split) = map.get(&image.file_name) {
                assignment.assign(image.id, *split);
            }
        }
        let unmatched = unmatched_entries(dataset, map);
        if unmatched > 0 {
            log::warn!("{} split map entr(ies) matched no image", unmatched);
        }
        assignment
    }

    /// Seeded random assignment by ratio. Images are ordered by file name and
    /// id before shuffling, so the same corpus and seed give the same result.
    pub fn random(dataset: &Dataset, ratios: SplitRatios, seed: u64) -> Result<Self, PartmergeError> {
        let ratios = ratios.validated()?;

        let mut rows: Vec<(&str, ImageId)> = dataset
            .images
            .iter()
            .map(|image| (image.file_name.as_str(), image.id))
            .collect();
        rows.sort();

        let mut ids: Vec<ImageId> = rows.into_iter().map(|(_, id)| id).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        ids.shuffle(&mut rng);

        let total = ids.len();
        let n_train = ((total as f64) * ratios.train).round() as usize;
        let n_val = (((total as f64) * ratios.val).round() as usize).min(total - n_train.min(total));

        let mut assignment = Self::new();
        for (pos, id) in ids.into_iter().enumerate() {
            let split = if pos < n_train {
                Split::Train
            } else if pos < n_train + n_val {
                Split::Val
            } else {
                Split::Test
            };
            assignment.assign(id, split);
        }
        Ok(assignment)
    }

    /// Per-split image counts.
    pub fn counts(&self) -> BTreeMap<Split, usize> {
        let mut counts = BTreeMap::new();
        for split in self.by_image.values() {
            *counts.entry(*split).or_insert(0) += 1;
        }
        counts
    }
}

/// The split named by a directory segment of a path or URL.
pub fn split_from_path(file_name: &str) -> Option<Split> {
    let path = file_name
        .split(['?', '#'])
        .next()
        .unwrap_or(file_name);

    let mut segments: Vec<&str> = path.split(['/', '\\']).collect();
    // The final segment is the file itself, never a directory.
    segments.pop();

    segments.into_iter().find_map(|segment| match segment {
        "train" => Some(Split::Train),
        "val" => Some(Split::Val),
        "test" => Some(Split::Test),
        _ => None,
    })
}

/// Split map keys that no image's file name hit.
fn unmatched_entries(dataset: &Dataset, map: &HashMap<String, Split>) -> usize {
    let matched: HashSet<&str> = dataset
        .images
        .iter()
        .map(|image| image.file_name.as_str())
        .filter(|name| map.contains_key(*name))
        .collect();
    map.len() - matched.len()
}

#[derive(Deserialize)]
struct SplitMapRow {
    file_name: String,
    split: String,
}

/// Reads an external split map keyed by original file name.
///
/// `.csv` files need a `file_name,split` header; anything else is read as a
/// JSON object `{ "<file_name>": "<split>" }`.
pub fn read_split_map(path: &Path) -> Result<HashMap<String, Split>, PartmergeError> {
    let parse_error = |message: String| PartmergeError::SplitMapParse {
        path: path.to_path_buf(),
        message,
    };

    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    let raw: Vec<(String, String)> = if is_csv {
        let mut reader = csv::Reader::from_path(path).map_err(|e| parse_error(e.to_string()))?;
        reader
            .deserialize::<SplitMapRow>()
            .map(|row| row.map(|r| (r.file_name, r.split)))
            .collect::<Result<_, _>>()
            .map_err(|e| parse_error(e.to_string()))?
    } else {
        let file = File::open(path)?;
        let map: BTreeMap<String, String> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| parse_error(e.to_string()))?;
        map.into_iter().collect()
    };

    let mut map = HashMap::with_capacity(raw.len());
    for (file_name, split) in raw {
        let split = split
            .parse::<Split>()
            .map_err(|_| parse_error(format!("'{}' has unknown split '{}'", file_name, split)))?;
        map.insert(file_name, split);
    }
    Ok(map)
}
