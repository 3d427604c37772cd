//! COCO annotation reducer
//!
//! This library selects a class-balanced, size-bounded subset of a COCO
//! annotation file and splits paired image/label directories into
//! train/val/test folders for YOLO training.

pub mod backend;
pub mod config;
pub mod error;
pub mod io;
pub mod reducer;
pub mod split;
pub mod types;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{MatchBy, ReduceArgs, ReduceConfig, SplitArgs, SplitConfig};
pub use error::{ReduceError, Result};
pub use io::{load_document, write_reduced_dataset};
pub use reducer::{
    build, build_category_index, reduce, reduce_document, select_annotations, select_categories,
    select_images, AnnotationSelection, Reduction,
};
pub use split::split_directory;
pub use types::{
    AcceptedImages, Annotation, Category, ClassCounter, CocoDocument, Image, ImageKey,
    ReduceStats, ReducedDataset, SplitSummary,
};
pub use utils::file_stem;
