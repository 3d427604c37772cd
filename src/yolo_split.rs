use clap::Parser;
use log::{error, info};

use coco_reduce::{split_directory, SplitArgs};

fn main() {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = SplitArgs::parse();

    info!(
        "Splitting {} images from {} into {}...",
        args.total, args.source_dir, args.save_dir
    );

    match split_directory(&args.to_split_config()) {
        Ok(summary) => {
            summary.print_summary();
            if !summary.missing_pairs.is_empty() || !summary.failed_copies.is_empty() {
                error!("Split finished with problems, see the summary above");
                std::process::exit(1);
            }
            info!("Split complete: {} pairs copied", summary.total_copied());
        }
        Err(e) => {
            error!("Failed to split dataset: {}", e);
            std::process::exit(1);
        }
    }
}
