use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::ReduceError;

// Supported image formats
pub const IMG_FORMATS: &[&str] = &[
    "bmp", "dng", "jpeg", "jpg", "mpo", "png", "tif", "tiff", "webp", "pfm",
];

/// Identifier an annotation uses to point at its image.
///
/// COCO files in the wild use both integers and strings here, so the source
/// representation is kept as-is and written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageKey {
    Int(i64),
    Str(String),
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKey::Int(id) => write!(f, "{}", id),
            ImageKey::Str(id) => f.write_str(id),
        }
    }
}

/// COCO category record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// COCO annotation record. Fields other than the three the reducer reads
/// (bbox, segmentation, area, ...) live in `extra` and pass through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default)]
    pub id: i64,
    pub image_id: ImageKey,
    pub category_id: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// COCO image record. Only `file_name` is required; `id` stays in `extra`
/// with its source value and is read through [`Image::id_key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub file_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Image {
    /// The `id` field as an image key, if it is an integer or a string
    pub fn id_key(&self) -> Option<ImageKey> {
        match self.extra.get("id")? {
            Value::Number(number) => number.as_i64().map(ImageKey::Int),
            Value::String(id) => Some(ImageKey::Str(id.clone())),
            _ => None,
        }
    }
}

/// A record in `annotations` or `images` that could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordIssue {
    pub collection: &'static str,
    pub index: usize,
    pub message: String,
}

impl fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.collection, self.index, self.message)
    }
}

/// Parsed source annotation file
#[derive(Debug, Clone, Default)]
pub struct CocoDocument {
    pub categories: Vec<Category>,
    pub annotations: Vec<Annotation>,
    pub images: Vec<Image>,
    /// Records skipped while loading, in file order
    pub issues: Vec<RecordIssue>,
}

/// The reduced annotation file. Field order is the key order of the output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReducedDataset {
    pub categories: Vec<Category>,
    pub annotations: Vec<Annotation>,
    pub images: Vec<Image>,
}

/// Number of distinct images accepted per category id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassCounter {
    counts: BTreeMap<i64, usize>,
}

impl ClassCounter {
    /// Zero-initialized counter for the given category ids
    pub fn new(category_ids: &[i64]) -> Self {
        Self {
            counts: category_ids.iter().map(|&id| (id, 0)).collect(),
        }
    }

    pub fn get(&self, category_id: i64) -> Option<usize> {
        self.counts.get(&category_id).copied()
    }

    pub fn increment(&mut self, category_id: i64) {
        if let Some(count) = self.counts.get_mut(&category_id) {
            *count += 1;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, usize)> + '_ {
        self.counts.iter().map(|(&id, &count)| (id, count))
    }
}

/// Image keys accepted during the annotation scan, in first-seen order
#[derive(Debug, Clone, Default)]
pub struct AcceptedImages {
    order: Vec<ImageKey>,
    seen: HashSet<ImageKey>,
}

impl AcceptedImages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the key was not seen before
    pub fn insert(&mut self, key: &ImageKey) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.order.push(key.clone());
        true
    }

    pub fn contains(&self, key: &ImageKey) -> bool {
        self.seen.contains(key)
    }

    /// Whether a file-name stem refers to one of the accepted keys. Integer
    /// keys also match zero-padded stems (`000031` for `31`).
    pub fn matches_stem(&self, stem: &str) -> bool {
        if self.seen.contains(&ImageKey::Str(stem.to_string())) {
            return true;
        }
        stem.parse::<i64>()
            .map(|id| self.seen.contains(&ImageKey::Int(id)))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageKey> {
        self.order.iter()
    }
}

// Struct to hold reduction statistics
#[derive(Debug, Default, Clone)]
pub struct ReduceStats {
    pub source_categories: usize,
    pub source_annotations: usize,
    pub source_images: usize,
    pub selected_categories: usize,
    pub unmatched_target_names: Vec<String>,
    pub per_category_quota: usize,
    pub image_cap: usize,
    pub annotations_scanned: usize,
    pub annotations_accepted: usize,
    pub images_accepted: usize,
    pub images_written: usize,
    /// Distinct images per selected category, keyed by category name
    pub images_per_category: Vec<(String, usize)>,
    pub stopped_at_cap: bool,
    pub record_issues: Vec<RecordIssue>,
    /// Accepted image keys with no matching image record
    pub dangling_image_ids: Vec<ImageKey>,
}

impl ReduceStats {
    pub fn print_summary(&self) {
        log::info!("=== Reduction Summary ===");
        log::info!(
            "Source: {} categories, {} annotations, {} images",
            self.source_categories,
            self.source_annotations,
            self.source_images
        );
        log::info!("Selected categories: {}", self.selected_categories);
        log::info!(
            "Per-category quota: {}, image cap: {}",
            self.per_category_quota,
            self.image_cap
        );
        log::info!(
            "Annotations scanned: {}, accepted: {}",
            self.annotations_scanned,
            self.annotations_accepted
        );
        log::info!(
            "Images accepted: {}, written: {}",
            self.images_accepted,
            self.images_written
        );
        for (name, count) in &self.images_per_category {
            log::info!("  {}: {} images", name, count);
        }
        if self.stopped_at_cap {
            log::info!("Scan stopped early at the image cap");
        }

        if !self.unmatched_target_names.is_empty() {
            log::warn!(
                "Target categories not found in source: {}",
                self.unmatched_target_names.join(", ")
            );
        }
        if !self.record_issues.is_empty() {
            log::warn!("Skipped {} malformed records", self.record_issues.len());
        }
        if !self.dangling_image_ids.is_empty() {
            log::warn!(
                "{} accepted image ids have no image record",
                self.dangling_image_ids.len()
            );
        }
    }
}

// Struct to hold the outcome of a directory split
#[derive(Debug, Default)]
pub struct SplitSummary {
    pub train_copied: usize,
    pub val_copied: usize,
    pub test_copied: usize,
    pub skipped_over_total: usize,
    pub missing_pairs: Vec<ReduceError>,
    pub failed_copies: Vec<ReduceError>,
}

impl SplitSummary {
    pub fn total_copied(&self) -> usize {
        self.train_copied + self.val_copied + self.test_copied
    }

    pub fn print_summary(&self) {
        log::info!("=== Split Summary ===");
        log::info!("Train pairs copied: {}", self.train_copied);
        log::info!("Val pairs copied: {}", self.val_copied);
        log::info!("Test pairs copied: {}", self.test_copied);
        if self.skipped_over_total > 0 {
            log::info!(
                "Images beyond the requested total: {}",
                self.skipped_over_total
            );
        }

        if !self.missing_pairs.is_empty() {
            log::warn!("Missing label files: {}", self.missing_pairs.len());
            for err in &self.missing_pairs {
                log::warn!("  {}", err);
            }
        }
        if !self.failed_copies.is_empty() {
            log::warn!("Failed copies: {}", self.failed_copies.len());
            for err in &self.failed_copies {
                log::warn!("  {}", err);
            }
        }
    }
}
