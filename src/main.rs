use clap::Parser;
use log::{error, info};
use std::path::PathBuf;

use coco_reduce::{reduce, ReduceArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = ReduceArgs::parse();

    let dirname = PathBuf::from(&args.source_dir);
    if !dirname.exists() {
        error!("The specified source_dir does not exist: {}", args.source_dir);
        std::process::exit(1);
    }

    info!(
        "Reducing {} to categories [{}]...",
        args.annotation_file,
        args.category_names.join(", ")
    );

    let config = args.to_reduce_config();
    match reduce(&config) {
        Ok(dataset) => info!(
            "Wrote {} categories, {} annotations, {} images to {}",
            dataset.categories.len(),
            dataset.annotations.len(),
            dataset.images.len(),
            config.output.display()
        ),
        Err(e) => {
            error!("Failed to reduce dataset: {}", e);
            std::process::exit(1);
        }
    }
}
