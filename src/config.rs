use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::error::{ReduceError, Result};

/// Command-line arguments for reducing a COCO annotation file.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct ReduceArgs {
    /// Root directory of the COCO dataset
    #[arg(short = 'd', long = "source_dir")]
    pub source_dir: String,

    /// Directory under source_dir holding the annotation file
    #[arg(long = "annotations_dir", default_value = "annotations")]
    pub annotations_dir: String,

    /// Name of the COCO annotation JSON file
    #[arg(short = 'a', long = "annotation_file")]
    pub annotation_file: String,

    /// Path of the reduced annotation file to write
    #[arg(short = 'o', long = "output")]
    pub output: String,

    /// Number of images to keep, shared evenly between the categories
    #[arg(long = "total_images", default_value_t = 500)]
    pub total_images: usize,

    /// Hard cap on distinct images accepted (defaults to total_images)
    #[arg(long = "image_cap")]
    pub image_cap: Option<usize>,

    /// How images are matched to annotation image ids
    #[arg(long = "match_by", value_enum, default_value = "stem")]
    pub match_by: MatchBy,

    /// Fail on the first malformed annotation or image record
    #[arg(long = "strict")]
    pub strict: bool,

    /// Names of the categories to keep
    #[arg(value_delimiter = ',', required = true)]
    pub category_names: Vec<String>,
}

// How image records are associated to annotation image ids
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum MatchBy {
    /// File name without its extension
    #[default]
    Stem,
    /// The image record's `id` field
    Id,
}

/// Validated settings for one reduction run
#[derive(Debug, Clone)]
pub struct ReduceConfig {
    pub source_dir: PathBuf,
    pub annotations_dir: PathBuf,
    pub annotation_file: String,
    pub output: PathBuf,
    pub total_images: usize,
    pub image_cap: usize,
    pub category_names: Vec<String>,
    pub match_by: MatchBy,
    pub strict: bool,
}

impl ReduceConfig {
    /// Create a configuration with the global cap equal to `total_images`
    pub fn new(
        source_dir: impl Into<PathBuf>,
        annotation_file: impl Into<String>,
        output: impl Into<PathBuf>,
        total_images: usize,
        category_names: Vec<String>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            annotations_dir: PathBuf::from("annotations"),
            annotation_file: annotation_file.into(),
            output: output.into(),
            total_images,
            image_cap: total_images,
            category_names,
            match_by: MatchBy::Stem,
            strict: false,
        }
    }

    pub fn with_image_cap(mut self, image_cap: usize) -> Self {
        self.image_cap = image_cap;
        self
    }

    pub fn with_annotations_dir(mut self, annotations_dir: impl Into<PathBuf>) -> Self {
        self.annotations_dir = annotations_dir.into();
        self
    }

    pub fn with_match_by(mut self, match_by: MatchBy) -> Self {
        self.match_by = match_by;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Full path of the source annotation file
    pub fn annotation_path(&self) -> PathBuf {
        self.source_dir
            .join(&self.annotations_dir)
            .join(&self.annotation_file)
    }

    /// Target category names with duplicates removed, first occurrence kept
    pub fn target_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.category_names.len());
        for name in &self.category_names {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Maximum number of distinct images a single category may contribute
    pub fn per_category_quota(&self) -> Result<usize> {
        let categories = self.target_names().len();
        if categories == 0 {
            return Err(ReduceError::Configuration(
                "at least one target category name is required".to_string(),
            ));
        }
        Ok(self.total_images / categories)
    }

    /// Check the configuration before any file is read
    pub fn validate(&self) -> Result<()> {
        if self.category_names.iter().any(|name| name.trim().is_empty()) {
            return Err(ReduceError::Configuration(
                "category names must not be empty".to_string(),
            ));
        }
        if self.total_images == 0 {
            return Err(ReduceError::Configuration(
                "total_images must be greater than zero".to_string(),
            ));
        }
        if self.image_cap == 0 {
            return Err(ReduceError::Configuration(
                "image_cap must be greater than zero".to_string(),
            ));
        }

        let quota = self.per_category_quota()?;
        if quota == 0 {
            return Err(ReduceError::Configuration(format!(
                "total_images ({}) is smaller than the number of categories ({}), quota would be zero",
                self.total_images,
                self.target_names().len()
            )));
        }

        let distinct = self.target_names().len();
        if distinct != self.category_names.len() {
            log::warn!(
                "Duplicate category names ignored: {} given, {} distinct",
                self.category_names.len(),
                distinct
            );
        }
        if self.image_cap != self.total_images {
            log::warn!(
                "image_cap ({}) differs from total_images ({}); total_images only sets the per-category quota, image_cap bounds the distinct images kept",
                self.image_cap,
                self.total_images
            );
        }
        Ok(())
    }
}

impl ReduceArgs {
    pub fn to_reduce_config(&self) -> ReduceConfig {
        ReduceConfig {
            source_dir: PathBuf::from(&self.source_dir),
            annotations_dir: PathBuf::from(&self.annotations_dir),
            annotation_file: self.annotation_file.clone(),
            output: PathBuf::from(&self.output),
            total_images: self.total_images,
            image_cap: self.image_cap.unwrap_or(self.total_images),
            category_names: self.category_names.clone(),
            match_by: self.match_by,
            strict: self.strict,
        }
    }
}

/// Command-line arguments for splitting an image/label directory into train/val/test.
#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
pub struct SplitArgs {
    /// Directory containing the image and label folders
    #[arg(short = 's', long = "source_dir")]
    pub source_dir: String,

    /// Image folder under source_dir
    #[arg(long = "images_dir", default_value = "images")]
    pub images_dir: String,

    /// Label folder under source_dir
    #[arg(long = "labels_dir", default_value = "labels2")]
    pub labels_dir: String,

    /// Destination root for the train/val/test folders
    #[arg(short = 'o', long = "save_dir")]
    pub save_dir: String,

    /// Number of images to distribute over the splits
    #[arg(short = 'n', long = "total")]
    pub total: usize,

    /// Shuffle images with this seed before splitting
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Class names written to data.yaml, in class id order
    #[arg(long = "names", value_delimiter = ',')]
    pub names: Vec<String>,
}

/// Validated settings for a directory split
#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub source_dir: PathBuf,
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub save_dir: PathBuf,
    pub total: usize,
    pub seed: Option<u64>,
    pub names: Vec<String>,
}

impl SplitConfig {
    pub fn new(source_dir: impl Into<PathBuf>, save_dir: impl Into<PathBuf>, total: usize) -> Self {
        Self {
            source_dir: source_dir.into(),
            images_dir: PathBuf::from("images"),
            labels_dir: PathBuf::from("labels2"),
            save_dir: save_dir.into(),
            total,
            seed: None,
            names: Vec::new(),
        }
    }

    pub fn image_source(&self) -> PathBuf {
        self.source_dir.join(&self.images_dir)
    }

    pub fn label_source(&self) -> PathBuf {
        self.source_dir.join(&self.labels_dir)
    }

    pub fn validate(&self) -> Result<()> {
        if self.total == 0 {
            return Err(ReduceError::Configuration(
                "total must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl SplitArgs {
    pub fn to_split_config(&self) -> SplitConfig {
        SplitConfig {
            source_dir: PathBuf::from(&self.source_dir),
            images_dir: PathBuf::from(&self.images_dir),
            labels_dir: PathBuf::from(&self.labels_dir),
            save_dir: PathBuf::from(&self.save_dir),
            total: self.total,
            seed: self.seed,
            names: self.names.clone(),
        }
    }
}
