use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{ReduceError, Result};
use crate::types::{Category, CocoDocument, RecordIssue, ReducedDataset};

const OUTPUT_INDENT: &[u8] = b"    ";

/// Load a COCO annotation file.
///
/// The three top-level arrays must be present. A malformed category is fatal
/// because every later stage depends on the category list. Malformed
/// annotation and image records are skipped and reported in
/// [`CocoDocument::issues`], unless `strict` is set, in which case the first
/// one aborts the load.
pub fn load_document(path: &Path, strict: bool) -> Result<CocoDocument> {
    if !path.is_file() {
        return Err(ReduceError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    let file = File::open(path).map_err(|e| ReduceError::io(path, e))?;
    let value: Value = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| ReduceError::malformed(path.display().to_string(), e.to_string()))?;

    let Value::Object(mut root) = value else {
        return Err(ReduceError::malformed(
            "document",
            "top level must be a JSON object",
        ));
    };

    let raw_categories = take_array(&mut root, "categories")?;
    let raw_annotations = take_array(&mut root, "annotations")?;
    let raw_images = take_array(&mut root, "images")?;

    let categories = raw_categories
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            serde_json::from_value::<Category>(record)
                .map_err(|e| ReduceError::malformed(format!("categories[{}]", index), e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut issues = Vec::new();
    let annotations = parse_records(raw_annotations, "annotations", strict, &mut issues)?;
    let images = parse_records(raw_images, "images", strict, &mut issues)?;

    if !issues.is_empty() {
        warn!(
            "Skipped {} malformed records in {}",
            issues.len(),
            path.display()
        );
    }

    Ok(CocoDocument {
        categories,
        annotations,
        images,
        issues,
    })
}

fn take_array(root: &mut Map<String, Value>, key: &str) -> Result<Vec<Value>> {
    match root.remove(key) {
        Some(Value::Array(records)) => Ok(records),
        Some(other) => Err(ReduceError::malformed(
            key,
            format!("expected an array, found {}", json_kind(&other)),
        )),
        None => Err(ReduceError::malformed(key, "missing top-level key")),
    }
}

fn parse_records<T: DeserializeOwned>(
    records: Vec<Value>,
    collection: &'static str,
    strict: bool,
    issues: &mut Vec<RecordIssue>,
) -> Result<Vec<T>> {
    let mut parsed = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<T>(record) {
            Ok(value) => parsed.push(value),
            Err(e) if strict => {
                return Err(ReduceError::malformed(
                    format!("{}[{}]", collection, index),
                    e.to_string(),
                ));
            }
            Err(e) => {
                debug!("Skipping {}[{}]: {}", collection, index, e);
                issues.push(RecordIssue {
                    collection,
                    index,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(parsed)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Serialize the reduced dataset as 4-space indented JSON
pub fn to_pretty_json<W: Write>(dataset: &ReducedDataset, writer: W) -> Result<()> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(OUTPUT_INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
    dataset.serialize(&mut serializer)?;
    Ok(())
}

/// Write the reduced dataset to `output`.
///
/// The JSON goes to a temporary file next to `output` that is renamed over it
/// only after everything was written, so a failed run leaves no output file.
pub fn write_reduced_dataset(dataset: &ReducedDataset, output: &Path) -> Result<()> {
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| ReduceError::io(&parent, e))?;

    let temp = NamedTempFile::new_in(&parent).map_err(|e| ReduceError::io(&parent, e))?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        to_pretty_json(dataset, &mut writer)?;
        writer.flush().map_err(|e| ReduceError::io(temp.path(), e))?;
    }
    temp.persist(output)
        .map_err(|e| ReduceError::io(output, e.error))?;
    Ok(())
}

/// Create the data.yaml file describing a split dataset for YOLO training
pub fn create_dataset_yaml(save_dir: &Path, names: &[String]) -> Result<PathBuf> {
    let dataset_yaml_path = save_dir.join("data.yaml");
    let absolute_path = fs::canonicalize(save_dir).map_err(|e| ReduceError::io(save_dir, e))?;

    let mut yaml_content = format!(
        "path: {}\ntrain: train/images\nval: val/images\ntest: test/images\n",
        absolute_path.to_string_lossy()
    );
    yaml_content.push_str("\nnames:\n");
    for (id, name) in names.iter().enumerate() {
        yaml_content.push_str(&format!("    {}: {}\n", id, name));
    }

    let mut dataset_yaml = BufWriter::new(
        File::create(&dataset_yaml_path).map_err(|e| ReduceError::io(&dataset_yaml_path, e))?,
    );
    dataset_yaml
        .write_all(yaml_content.as_bytes())
        .and_then(|_| dataset_yaml.flush())
        .map_err(|e| ReduceError::io(&dataset_yaml_path, e))?;
    Ok(dataset_yaml_path)
}
