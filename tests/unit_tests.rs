use coco_reduce::config::{MatchBy, ReduceConfig};
use coco_reduce::error::ReduceError;
use coco_reduce::reducer::unmatched_target_names;
use coco_reduce::types::{AcceptedImages, Annotation, Category, CocoDocument, Image, ImageKey};
use coco_reduce::{
    build_category_index, file_stem, select_annotations, select_categories, select_images,
};
use serde_json::{json, Map};

fn category(id: i64, name: &str) -> Category {
    Category {
        id,
        name: name.to_string(),
        extra: Map::new(),
    }
}

fn annotation(id: i64, image_id: i64, category_id: i64) -> Annotation {
    Annotation {
        id,
        image_id: ImageKey::Int(image_id),
        category_id,
        extra: Map::new(),
    }
}

fn image(file_name: &str) -> Image {
    Image {
        file_name: file_name.to_string(),
        extra: Map::new(),
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|name| name.to_string()).collect()
}

/// Two categories `a` (1) and `b` (2), `count` annotations alternating
/// between them, each on its own image.
fn alternating_document(count: i64) -> CocoDocument {
    CocoDocument {
        categories: vec![category(1, "a"), category(2, "b")],
        annotations: (1..=count)
            .map(|i| annotation(100 + i, i, if i % 2 == 1 { 1 } else { 2 }))
            .collect(),
        images: (1..=count).map(|i| image(&format!("{}.jpg", i))).collect(),
        issues: Vec::new(),
    }
}

#[test]
fn test_file_stem() {
    assert_eq!(file_stem("photo.jpeg"), "photo");
    assert_eq!(file_stem("photo.jpg"), "photo");
    assert_eq!(file_stem("scan.tiff"), "scan");
    assert_eq!(file_stem("frame.tif"), "frame");
    assert_eq!(file_stem("archive.tar.gz"), "archive.tar");
    assert_eq!(file_stem("noext"), "noext");
    assert_eq!(file_stem(".hidden"), ".hidden");
    assert_eq!(file_stem("train/000031.png"), "train/000031");
    assert_eq!(file_stem("v1.2/img"), "v1.2/img");
}

#[test]
fn test_zero_categories_is_configuration_error() {
    let config = ReduceConfig::new("data", "instances.json", "out.json", 10, vec![]);
    assert!(matches!(
        config.validate(),
        Err(ReduceError::Configuration(_))
    ));
    assert!(matches!(
        config.per_category_quota(),
        Err(ReduceError::Configuration(_))
    ));
}

#[test]
fn test_config_validation() {
    let zero_total = ReduceConfig::new("data", "a.json", "o.json", 0, names(&["a"]));
    assert!(matches!(
        zero_total.validate(),
        Err(ReduceError::Configuration(_))
    ));

    let zero_cap = ReduceConfig::new("data", "a.json", "o.json", 10, names(&["a"])).with_image_cap(0);
    assert!(matches!(
        zero_cap.validate(),
        Err(ReduceError::Configuration(_))
    ));

    let zero_quota = ReduceConfig::new("data", "a.json", "o.json", 2, names(&["a", "b", "c"]));
    assert!(matches!(
        zero_quota.validate(),
        Err(ReduceError::Configuration(_))
    ));

    let empty_name = ReduceConfig::new("data", "a.json", "o.json", 10, names(&["a", " "]));
    assert!(matches!(
        empty_name.validate(),
        Err(ReduceError::Configuration(_))
    ));

    let ok = ReduceConfig::new("data", "a.json", "o.json", 10, names(&["a", "b"]));
    assert!(ok.validate().is_ok());
    assert_eq!(ok.per_category_quota().unwrap(), 5);
    assert_eq!(ok.image_cap, 10);
}

#[test]
fn test_duplicate_target_names_are_collapsed() {
    let config = ReduceConfig::new("data", "a.json", "o.json", 10, names(&["a", "a", "b"]));
    assert_eq!(config.target_names(), names(&["a", "b"]));
    assert_eq!(config.per_category_quota().unwrap(), 5);
}

#[test]
fn test_annotation_path() {
    let config = ReduceConfig::new("/data/fashion", "instances.json", "o.json", 10, names(&["a"]));
    assert_eq!(
        config.annotation_path(),
        std::path::PathBuf::from("/data/fashion/annotations/instances.json")
    );
    let flat = config.with_annotations_dir(".");
    assert_eq!(
        flat.annotation_path(),
        std::path::PathBuf::from("/data/fashion/./instances.json")
    );
}

#[test]
fn test_select_categories_preserves_source_order() {
    let document = CocoDocument {
        categories: vec![
            category(3, "short sleeve top"),
            category(7, "vest"),
            category(9, "trousers"),
        ],
        ..CocoDocument::default()
    };

    let selected = select_categories(&document, &names(&["trousers", "short sleeve top"]));
    let ids: Vec<i64> = selected.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![3, 9]);

    let unmatched = unmatched_target_names(&selected, &names(&["trousers", "skirt"]));
    assert_eq!(unmatched, names(&["skirt"]));
}

#[test]
fn test_build_category_index() {
    let (ids, counters) = build_category_index(&[category(4, "a"), category(2, "b")]);
    assert_eq!(ids, vec![4, 2]);
    assert_eq!(counters.get(4), Some(0));
    assert_eq!(counters.get(2), Some(0));
    assert_eq!(counters.get(1), None);
}

#[test]
fn test_balanced_selection_two_categories() {
    let document = alternating_document(20);
    let (ids, mut counters) = build_category_index(&document.categories);

    let selection = select_annotations(&document, &ids, &mut counters, 5, 10);

    assert_eq!(selection.annotations.len(), 10);
    assert_eq!(selection.image_ids.len(), 10);
    assert_eq!(counters.get(1), Some(5));
    assert_eq!(counters.get(2), Some(5));
    assert!(selection.stopped_at_cap);
    assert_eq!(selection.scanned, 10);

    let new_ids: Vec<i64> = selection.annotations.iter().map(|a| a.id).collect();
    assert_eq!(new_ids, (1..=10).collect::<Vec<i64>>());

    let images = select_images(&document, &selection.image_ids, MatchBy::Stem);
    assert_eq!(images.len(), 10);
}

#[test]
fn test_shared_image_counts_once() {
    let document = CocoDocument {
        categories: vec![category(1, "a")],
        annotations: vec![annotation(50, 7, 1), annotation(51, 7, 1)],
        images: vec![image("7.jpg")],
        issues: Vec::new(),
    };
    let (ids, mut counters) = build_category_index(&document.categories);

    let selection = select_annotations(&document, &ids, &mut counters, 5, 10);

    assert_eq!(selection.annotations.len(), 2);
    assert_eq!(selection.annotations[0].id, 1);
    assert_eq!(selection.annotations[1].id, 2);
    assert_eq!(counters.get(1), Some(1));
    assert_eq!(selection.image_ids.len(), 1);
}

#[test]
fn test_per_category_quota_skips_without_stopping() {
    let document = CocoDocument {
        categories: vec![category(1, "a"), category(2, "b")],
        annotations: vec![
            annotation(1, 1, 1),
            annotation(2, 2, 1),
            annotation(3, 3, 1),
            annotation(4, 4, 2),
        ],
        images: Vec::new(),
        issues: Vec::new(),
    };
    let (ids, mut counters) = build_category_index(&document.categories);

    let selection = select_annotations(&document, &ids, &mut counters, 2, 100);

    let kept: Vec<ImageKey> = selection.annotations.iter().map(|a| a.image_id.clone()).collect();
    assert_eq!(
        kept,
        vec![ImageKey::Int(1), ImageKey::Int(2), ImageKey::Int(4)]
    );
    assert_eq!(selection.scanned, 4);
    assert!(!selection.stopped_at_cap);
}

#[test]
fn test_global_cap_stops_scan() {
    let document = alternating_document(20);
    let (ids, mut counters) = build_category_index(&document.categories);

    let selection = select_annotations(&document, &ids, &mut counters, 5, 3);

    assert_eq!(selection.image_ids.len(), 3);
    assert_eq!(selection.annotations.len(), 3);
    assert_eq!(selection.scanned, 3);
    assert!(selection.stopped_at_cap);
}

#[test]
fn test_category_claims_shared_image_against_its_quota() {
    let document = CocoDocument {
        categories: vec![category(1, "a"), category(2, "b")],
        annotations: vec![
            annotation(1, 1, 1),
            annotation(2, 1, 2),
            annotation(3, 2, 2),
        ],
        images: vec![image("1.jpg"), image("2.jpg")],
        issues: Vec::new(),
    };
    let (ids, mut counters) = build_category_index(&document.categories);

    let selection = select_annotations(&document, &ids, &mut counters, 1, 2);

    let kept: Vec<(ImageKey, i64)> = selection
        .annotations
        .iter()
        .map(|a| (a.image_id.clone(), a.category_id))
        .collect();
    assert_eq!(kept, vec![(ImageKey::Int(1), 1), (ImageKey::Int(1), 2)]);
    assert_eq!(counters.get(1), Some(1));
    assert_eq!(counters.get(2), Some(1));
    assert_eq!(selection.image_ids.len(), 1);
    assert_eq!(selection.scanned, 3);
    assert!(!selection.stopped_at_cap);
}

#[test]
fn test_cap_reached_on_last_annotation() {
    let document = CocoDocument {
        categories: vec![category(1, "a")],
        annotations: vec![annotation(1, 1, 1), annotation(2, 2, 1)],
        images: Vec::new(),
        issues: Vec::new(),
    };
    let (ids, mut counters) = build_category_index(&document.categories);

    let selection = select_annotations(&document, &ids, &mut counters, 5, 2);

    assert_eq!(selection.annotations.len(), 2);
    assert_eq!(selection.scanned, 2);
    assert!(selection.stopped_at_cap);
}

#[test]
fn test_unselected_categories_are_ignored() {
    let document = alternating_document(6);
    let mut counters = coco_reduce::ClassCounter::new(&[2]);

    let selection = select_annotations(&document, &[2], &mut counters, 10, 10);

    assert_eq!(selection.annotations.len(), 3);
    assert!(selection.annotations.iter().all(|a| a.category_id == 2));
}

#[test]
fn test_select_images_with_long_extension() {
    let mut accepted = AcceptedImages::new();
    accepted.insert(&ImageKey::Str("photo".to_string()));

    let document = CocoDocument {
        images: vec![image("photo.jpeg"), image("photo.j"), image("other.jpeg")],
        ..CocoDocument::default()
    };

    let images = select_images(&document, &accepted, MatchBy::Stem);
    let files: Vec<&str> = images.iter().map(|i| i.file_name.as_str()).collect();
    assert_eq!(files, vec!["photo.jpeg", "photo.j"]);
}

#[test]
fn test_integer_keys_match_zero_padded_stems() {
    let mut accepted = AcceptedImages::new();
    accepted.insert(&ImageKey::Int(31));
    accepted.insert(&ImageKey::Str("42".to_string()));

    assert!(accepted.matches_stem("000031"));
    assert!(accepted.matches_stem("31"));
    assert!(accepted.matches_stem("42"));
    assert!(!accepted.matches_stem("000042"));
    assert!(!accepted.matches_stem("abc"));
}

#[test]
fn test_accepted_images_keep_first_seen_order() {
    let mut accepted = AcceptedImages::new();
    assert!(accepted.insert(&ImageKey::Int(5)));
    assert!(accepted.insert(&ImageKey::Int(2)));
    assert!(!accepted.insert(&ImageKey::Int(5)));
    let order: Vec<&ImageKey> = accepted.iter().collect();
    assert_eq!(order, vec![&ImageKey::Int(5), &ImageKey::Int(2)]);
}

#[test]
fn test_select_images_by_id() {
    let mut accepted = AcceptedImages::new();
    accepted.insert(&ImageKey::Int(397133));

    let with_id: Image = serde_json::from_value(json!({
        "id": 397133, "file_name": "000000397133.jpg", "width": 640
    }))
    .unwrap();
    let other: Image = serde_json::from_value(json!({
        "id": 1, "file_name": "397133.jpg"
    }))
    .unwrap();
    let document = CocoDocument {
        images: vec![with_id, other, image("no_id.jpg")],
        ..CocoDocument::default()
    };

    let images = select_images(&document, &accepted, MatchBy::Id);
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].file_name, "000000397133.jpg");
    assert_eq!(images[0].extra["width"], json!(640));
}

#[test]
fn test_image_key_accepts_strings_and_integers() {
    let numeric: Annotation =
        serde_json::from_value(json!({"id": 1, "image_id": 12, "category_id": 3})).unwrap();
    let textual: Annotation =
        serde_json::from_value(json!({"id": 2, "image_id": "000012", "category_id": 3})).unwrap();

    assert_eq!(numeric.image_id, ImageKey::Int(12));
    assert_eq!(textual.image_id, ImageKey::Str("000012".to_string()));
    assert_eq!(serde_json::to_value(&textual).unwrap()["image_id"], json!("000012"));
}

#[test]
fn test_reduce_args_to_config() {
    use clap::Parser;
    use coco_reduce::config::ReduceArgs;

    let args = ReduceArgs::try_parse_from([
        "coco-reduce",
        "-d",
        "deep_fashion",
        "-a",
        "instances_train2024.json",
        "-o",
        "reduced.json",
        "--total_images",
        "500",
        "trousers,short sleeve top",
    ])
    .unwrap();
    let config = args.to_reduce_config();

    assert_eq!(config.category_names, names(&["trousers", "short sleeve top"]));
    assert_eq!(config.image_cap, 500);
    assert_eq!(config.match_by, MatchBy::Stem);
    assert!(!config.strict);
    assert_eq!(config.per_category_quota().unwrap(), 250);

    let missing_names = ReduceArgs::try_parse_from([
        "coco-reduce", "-d", "d", "-a", "a.json", "-o", "o.json",
    ]);
    assert!(missing_names.is_err());
}

#[test]
fn test_image_id_key_reads_integers_and_strings_only() {
    let key = |value: serde_json::Value| {
        let image: Image = serde_json::from_value(value).unwrap();
        image.id_key()
    };

    assert_eq!(key(json!({"id": 7, "file_name": "a.jpg"})), Some(ImageKey::Int(7)));
    assert_eq!(
        key(json!({"id": "x7", "file_name": "a.jpg"})),
        Some(ImageKey::Str("x7".to_string()))
    );
    assert_eq!(key(json!({"id": 12.5, "file_name": "a.jpg"})), None);
    assert_eq!(key(json!({"id": {"n": 1}, "file_name": "a.jpg"})), None);
    assert_eq!(key(json!({"id": null, "file_name": "a.jpg"})), None);
    assert_eq!(key(json!({"file_name": "a.jpg"})), None);
}

#[test]
fn test_reduce_document_on_loaded_document() {
    let document = CocoDocument {
        categories: vec![category(1, "a"), category(2, "b")],
        annotations: vec![annotation(1, 1, 1), annotation(2, 2, 2), annotation(3, 3, 1)],
        images: vec![image("1.jpg"), image("2.jpg"), image("3.jpg")],
        issues: Vec::new(),
    };
    let config = ReduceConfig::new("unused", "unused.json", "unused_out.json", 2, names(&["a", "b"]))
        .with_image_cap(5);
    config.validate().unwrap();

    let reduction = coco_reduce::reduce_document(&document, &config).unwrap();

    assert_eq!(reduction.stats.per_category_quota, 1);
    assert_eq!(reduction.stats.image_cap, 5);
    assert_eq!(reduction.dataset.annotations.len(), 2);
    assert_eq!(reduction.dataset.images.len(), 2);
    assert_eq!(reduction.stats.annotations_scanned, 3);
    assert!(!reduction.stats.stopped_at_cap);
}
