//! COCO dataset reduction
//!
//! Selects a class-balanced, size-bounded subset of a COCO annotation file.
//! The run is a fixed sequence of stages, each a function over explicit
//! inputs:
//!
//! 1. [`select_categories`] keeps the categories whose name is a target name.
//! 2. [`build_category_index`] collects their ids and zeroes a per-category
//!    image counter.
//! 3. [`select_annotations`] walks the annotations in file order under the
//!    per-category quota and the global image cap, renumbering accepted ones.
//! 4. [`select_images`] keeps the images referenced by accepted annotations.
//!
//! [`reduce`] chains the stages, writes the result and returns it.

use log::{info, warn};
use std::collections::HashSet;

use crate::config::{MatchBy, ReduceConfig};
use crate::error::{ReduceError, Result};
use crate::io::{load_document, write_reduced_dataset};
use crate::types::{
    AcceptedImages, Annotation, Category, ClassCounter, CocoDocument, Image, ImageKey,
    ReduceStats, ReducedDataset,
};
use crate::utils::{create_progress_bar, file_stem};

/// Annotations accepted by [`select_annotations`]
#[derive(Debug, Clone, Default)]
pub struct AnnotationSelection {
    /// Accepted annotations with ids renumbered from 1
    pub annotations: Vec<Annotation>,
    /// Distinct image ids of accepted annotations, first-seen order
    pub image_ids: AcceptedImages,
    pub scanned: usize,
    /// Whether the scan ended because the image cap was reached
    pub stopped_at_cap: bool,
}

/// A reduced dataset together with the statistics of the run that built it
#[derive(Debug, Clone)]
pub struct Reduction {
    pub dataset: ReducedDataset,
    pub stats: ReduceStats,
}

/// Categories whose name is in `target_names`, in source order
pub fn select_categories(document: &CocoDocument, target_names: &[String]) -> Vec<Category> {
    let targets: HashSet<&str> = target_names.iter().map(String::as_str).collect();
    let selected: Vec<Category> = document
        .categories
        .iter()
        .filter(|category| targets.contains(category.name.as_str()))
        .cloned()
        .collect();

    if selected.is_empty() {
        warn!(
            "None of the target categories [{}] exist in the source; the output will be empty",
            target_names.join(", ")
        );
    }
    selected
}

/// Target names that matched no source category
pub fn unmatched_target_names(selected: &[Category], target_names: &[String]) -> Vec<String> {
    let found: HashSet<&str> = selected.iter().map(|c| c.name.as_str()).collect();
    target_names
        .iter()
        .filter(|name| !found.contains(name.as_str()))
        .cloned()
        .collect()
}

/// Selected category ids and a zeroed counter keyed by them
pub fn build_category_index(selected: &[Category]) -> (Vec<i64>, ClassCounter) {
    let category_ids: Vec<i64> = selected.iter().map(|category| category.id).collect();
    let counters = ClassCounter::new(&category_ids);
    (category_ids, counters)
}

/// Walk annotations in source order and accept those within the limits.
///
/// An annotation is accepted when its category is selected, that category has
/// contributed fewer than `per_category_quota` distinct images, and fewer
/// than `global_image_cap` distinct images have been accepted overall. A
/// category's counter goes up the first time it claims an image, even when
/// another category already claimed that image. Scanning stops as soon as the
/// cap is reached.
pub fn select_annotations(
    document: &CocoDocument,
    category_ids: &[i64],
    counters: &mut ClassCounter,
    per_category_quota: usize,
    global_image_cap: usize,
) -> AnnotationSelection {
    let selected_ids: HashSet<i64> = category_ids.iter().copied().collect();
    let mut claimed: HashSet<(i64, ImageKey)> = HashSet::new();
    let mut selection = AnnotationSelection::default();
    let mut next_id: i64 = 0;

    if global_image_cap == 0 {
        selection.stopped_at_cap = true;
        return selection;
    }

    let pb = create_progress_bar(document.annotations.len() as u64, "Annotations");
    for annotation in &document.annotations {
        selection.scanned += 1;
        pb.inc(1);

        if !selected_ids.contains(&annotation.category_id) {
            continue;
        }
        let under_quota = counters
            .get(annotation.category_id)
            .is_some_and(|count| count < per_category_quota);
        if !under_quota {
            continue;
        }

        next_id += 1;
        let mut accepted = annotation.clone();
        accepted.id = next_id;

        if claimed.insert((accepted.category_id, accepted.image_id.clone())) {
            counters.increment(accepted.category_id);
        }
        selection.image_ids.insert(&accepted.image_id);
        selection.annotations.push(accepted);

        if selection.image_ids.len() >= global_image_cap {
            selection.stopped_at_cap = true;
            break;
        }
    }
    pb.finish_and_clear();

    selection
}

/// Images referenced by the accepted image ids, in source order
pub fn select_images(
    document: &CocoDocument,
    accepted_image_ids: &AcceptedImages,
    match_by: MatchBy,
) -> Vec<Image> {
    document
        .images
        .iter()
        .filter(|image| image_matches(image, accepted_image_ids, match_by))
        .cloned()
        .collect()
}

fn image_matches(image: &Image, accepted: &AcceptedImages, match_by: MatchBy) -> bool {
    match match_by {
        MatchBy::Stem => accepted.matches_stem(file_stem(&image.file_name)),
        MatchBy::Id => image.id_key().is_some_and(|id| accepted.contains(&id)),
    }
}

/// Accepted image ids that no selected image record refers to
fn dangling_image_ids(
    accepted: &AcceptedImages,
    images: &[Image],
    match_by: MatchBy,
) -> Vec<ImageKey> {
    let mut referenced = AcceptedImages::new();
    for image in images {
        match match_by {
            MatchBy::Stem => {
                let stem = file_stem(&image.file_name);
                referenced.insert(&ImageKey::Str(stem.to_string()));
                if let Ok(id) = stem.parse::<i64>() {
                    referenced.insert(&ImageKey::Int(id));
                }
            }
            MatchBy::Id => {
                if let Some(id) = image.id_key() {
                    referenced.insert(&id);
                }
            }
        }
    }
    accepted
        .iter()
        .filter(|key| !referenced.contains(key))
        .cloned()
        .collect()
}

/// Run every stage on an already loaded document. `config` is expected to
/// have passed [`ReduceConfig::validate`].
pub fn reduce_document(document: &CocoDocument, config: &ReduceConfig) -> Result<Reduction> {
    let target_names = config.target_names();
    let quota = config.per_category_quota()?;

    let categories = select_categories(document, &target_names);
    let unmatched = unmatched_target_names(&categories, &target_names);
    if !categories.is_empty() && !unmatched.is_empty() {
        warn!("Target categories not found: {}", unmatched.join(", "));
    }

    let (category_ids, mut counters) = build_category_index(&categories);
    let selection = select_annotations(
        document,
        &category_ids,
        &mut counters,
        quota,
        config.image_cap,
    );
    let images = select_images(document, &selection.image_ids, config.match_by);
    let dangling = dangling_image_ids(&selection.image_ids, &images, config.match_by);
    if !dangling.is_empty() {
        warn!(
            "{} accepted image ids have no image record (first: {})",
            dangling.len(),
            dangling[0]
        );
    }

    let images_per_category = categories
        .iter()
        .map(|category| {
            (
                category.name.clone(),
                counters.get(category.id).unwrap_or_default(),
            )
        })
        .collect();

    let stats = ReduceStats {
        source_categories: document.categories.len(),
        source_annotations: document.annotations.len(),
        source_images: document.images.len(),
        selected_categories: categories.len(),
        unmatched_target_names: unmatched,
        per_category_quota: quota,
        image_cap: config.image_cap,
        annotations_scanned: selection.scanned,
        annotations_accepted: selection.annotations.len(),
        images_accepted: selection.image_ids.len(),
        images_written: images.len(),
        images_per_category,
        stopped_at_cap: selection.stopped_at_cap,
        record_issues: document.issues.clone(),
        dangling_image_ids: dangling,
    };

    Ok(Reduction {
        dataset: ReducedDataset {
            categories,
            annotations: selection.annotations,
            images,
        },
        stats,
    })
}

/// Validate the configuration, load the source file and reduce it without
/// writing anything
pub fn build(config: &ReduceConfig) -> Result<Reduction> {
    config.validate()?;

    if !config.source_dir.is_dir() {
        return Err(ReduceError::SourceNotFound {
            path: config.source_dir.clone(),
        });
    }
    let annotation_path = config.annotation_path();
    info!("Loading {}", annotation_path.display());
    let document = load_document(&annotation_path, config.strict)?;
    info!(
        "Loaded {} categories, {} annotations, {} images",
        document.categories.len(),
        document.annotations.len(),
        document.images.len()
    );

    reduce_document(&document, config)
}

/// Reduce the configured annotation file and write the result to
/// `config.output`
pub fn reduce(config: &ReduceConfig) -> Result<ReducedDataset> {
    let Reduction { dataset, stats } = build(config)?;

    info!("Writing {}", config.output.display());
    write_reduced_dataset(&dataset, &config.output)?;
    stats.print_summary();
    Ok(dataset)
}
