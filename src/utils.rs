use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;

/// File name with the extension after the final `.` removed.
///
/// Extensions of any length are handled (`photo.jpeg` -> `photo`). A dot
/// that starts the base name (`.hidden`) or sits in a directory component
/// (`v1.2/img`) is not treated as an extension separator.
pub fn file_stem(file_name: &str) -> &str {
    let base_start = file_name.rfind(['/', '\\']).map_or(0, |idx| idx + 1);
    match file_name[base_start..].rfind('.') {
        Some(0) | None => file_name,
        Some(dot) => &file_name[..base_start + dot],
    }
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Safely create output directories and return their paths
pub fn create_output_directory(path: &Path) -> std::io::Result<std::path::PathBuf> {
    if path.exists() {
        log::warn!(
            "Directory {:?} already exists. Deleting and recreating it.",
            path
        );
        fs::remove_dir_all(path).and_then(|_| fs::create_dir_all(path))?;
    } else {
        fs::create_dir_all(path)?;
    }
    Ok(path.to_path_buf())
}
