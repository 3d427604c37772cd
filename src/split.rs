//! Split a flat image/label directory into train/val/test folders.

use glob::{glob_with, MatchOptions};
use indicatif::ProgressBar;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::SplitConfig;
use crate::error::{ReduceError, Result};
use crate::io::create_dataset_yaml;
use crate::types::{SplitSummary, IMG_FORMATS};
use crate::utils::{create_output_directory, create_progress_bar, file_stem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Val,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Val => "val",
            Split::Test => "test",
        }
    }

    pub fn all() -> [Split; 3] {
        [Split::Train, Split::Val, Split::Test]
    }
}

/// Images assigned to each split
#[derive(Debug, Clone, Default)]
pub struct SplitPlan {
    pub train: Vec<PathBuf>,
    pub val: Vec<PathBuf>,
    pub test: Vec<PathBuf>,
    /// Images left out because more than `total` were available
    pub skipped_over_total: usize,
}

impl SplitPlan {
    pub fn images(&self, split: Split) -> &[PathBuf] {
        match split {
            Split::Train => &self.train,
            Split::Val => &self.val,
            Split::Test => &self.test,
        }
    }
}

/// Train/val/test sizes for `total` images: 70% / 20% / remainder
pub fn split_counts(total: usize) -> (usize, usize, usize) {
    let train = total * 7 / 10;
    let val = total * 2 / 10;
    (train, val, total - train - val)
}

/// Image files directly inside `images_dir`, sorted by path
pub fn discover_images(images_dir: &Path) -> Result<Vec<PathBuf>> {
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };

    let mut images = Vec::new();
    for ext in IMG_FORMATS {
        let pattern = format!("{}/*.{}", glob::Pattern::escape(&images_dir.to_string_lossy()), ext);
        let entries = glob_with(&pattern, options)
            .map_err(|e| ReduceError::Configuration(format!("bad image pattern {}: {}", pattern, e)))?;
        images.extend(
            entries
                .filter_map(|entry| entry.ok())
                .filter(|path| path.is_file()),
        );
    }
    images.sort();
    images.dedup();
    Ok(images)
}

/// Assign images to splits.
///
/// Split sizes come from the configured `total`, not from the number of
/// images found; with fewer images the later splits come up short.
pub fn plan_split(mut images: Vec<PathBuf>, total: usize, seed: Option<u64>) -> SplitPlan {
    if let Some(seed) = seed {
        let mut rng = StdRng::seed_from_u64(seed);
        images.shuffle(&mut rng);
    }

    let skipped_over_total = images.len().saturating_sub(total);
    images.truncate(total);

    let (train_size, val_size, _) = split_counts(total);
    let train_size = train_size.min(images.len());
    let train = images.drain(0..train_size).collect();
    let val_size = val_size.min(images.len());
    let val = images.drain(0..val_size).collect();
    let test = images;

    SplitPlan {
        train,
        val,
        test,
        skipped_over_total,
    }
}

enum PairOutcome {
    Copied,
    Missing(ReduceError),
    Failed(ReduceError),
}

fn copy_pair(image: &Path, label_source: &Path, images_dst: &Path, labels_dst: &Path) -> PairOutcome {
    let Some(file_name) = image.file_name().and_then(|name| name.to_str()) else {
        return PairOutcome::Failed(ReduceError::Configuration(format!(
            "unusable image file name: {}",
            image.display()
        )));
    };

    let label_name = format!("{}.txt", file_stem(file_name));
    let label = label_source.join(&label_name);
    if !label.is_file() {
        return PairOutcome::Missing(ReduceError::MissingPair {
            image: image.to_path_buf(),
            label,
        });
    }

    let image_dst = images_dst.join(file_name);
    if let Err(e) = fs::copy(image, &image_dst) {
        return PairOutcome::Failed(ReduceError::io(image, e));
    }
    if let Err(e) = fs::copy(&label, labels_dst.join(&label_name)) {
        // keep the split paired
        let _ = fs::remove_file(&image_dst);
        return PairOutcome::Failed(ReduceError::io(&label, e));
    }
    PairOutcome::Copied
}

/// Copy the image/label pairs of one split in parallel
fn copy_split(
    images: &[PathBuf],
    label_source: &Path,
    images_dst: &Path,
    labels_dst: &Path,
    pb: &ProgressBar,
    summary: &mut SplitSummary,
) -> usize {
    let outcomes: Vec<PairOutcome> = images
        .par_iter()
        .map(|image| {
            let outcome = copy_pair(image, label_source, images_dst, labels_dst);
            pb.inc(1);
            outcome
        })
        .collect();

    let mut copied = 0;
    for outcome in outcomes {
        match outcome {
            PairOutcome::Copied => copied += 1,
            PairOutcome::Missing(e) => summary.missing_pairs.push(e),
            PairOutcome::Failed(e) => summary.failed_copies.push(e),
        }
    }
    copied
}

/// Split the configured source directory into `train`, `val` and `test`
pub fn split_directory(config: &SplitConfig) -> Result<SplitSummary> {
    config.validate()?;

    let image_source = config.image_source();
    let label_source = config.label_source();
    for dir in [&image_source, &label_source] {
        if !dir.is_dir() {
            return Err(ReduceError::SourceNotFound { path: dir.clone() });
        }
    }

    let images = discover_images(&image_source)?;
    info!("Found {} images in {}", images.len(), image_source.display());
    if images.len() < config.total {
        warn!(
            "Only {} images available, fewer than the requested total of {}",
            images.len(),
            config.total
        );
    }

    let plan = plan_split(images, config.total, config.seed);
    let mut summary = SplitSummary {
        skipped_over_total: plan.skipped_over_total,
        ..SplitSummary::default()
    };

    for split in Split::all() {
        let split_dir = config.save_dir.join(split.as_str());
        let images_dst = create_output_directory(&split_dir.join("images"))
            .map_err(|e| ReduceError::io(&split_dir, e))?;
        let labels_dst = create_output_directory(&split_dir.join("labels"))
            .map_err(|e| ReduceError::io(&split_dir, e))?;

        let split_images = plan.images(split);
        if split_images.is_empty() {
            continue;
        }
        let label = split.as_str();
        let pb = create_progress_bar(split_images.len() as u64, label);
        let copied = copy_split(
            split_images,
            &label_source,
            &images_dst,
            &labels_dst,
            &pb,
            &mut summary,
        );
        pb.finish_with_message(format!("{} split complete", label));

        match split {
            Split::Train => summary.train_copied = copied,
            Split::Val => summary.val_copied = copied,
            Split::Test => summary.test_copied = copied,
        }
    }

    if !config.names.is_empty() {
        let yaml = create_dataset_yaml(&config.save_dir, &config.names)?;
        info!("Wrote {}", yaml.display());
    }

    Ok(summary)
}
