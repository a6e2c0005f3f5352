//! The tabular slide-record schema and record-stream tools.
//!
//! One CSV row per slide. `(source_document, source_slide_index)` is the
//! stable identity key; `content_hash` is always recomputable from the
//! live source and never trusted as opaque. Only `style_group` and
//! `layout_kind` are editable; everything else is identity or read-only
//! context for the tools that edit those two columns.

use crate::error::{Error, Result};
use crate::fsutil::write_atomic;
use crate::layout::LayoutKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Fixed column order and names of the tabular record file.
pub const CSV_COLUMNS: [&str; 11] = [
    "source_document",
    "source_slide_index",
    "content_hash",
    "style_group",
    "layout_kind",
    "asset_kinds",
    "title_text",
    "body_text",
    "notes_text",
    "image_locators",
    "image_hashes",
];

/// Delimiter for list-valued cells (`image_locators`, `image_hashes`,
/// `asset_kinds`).
pub const LIST_DELIMITER: char = '|';

/// One slide's record row.
///
/// Fields are kept as raw strings: the tabular surface is hand-editable,
/// and malformed values must surface as per-row validation reports, not
/// as a parse failure that aborts the whole batch. Typed accessors parse
/// on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideRecord {
    /// Source document basename (identity, read-only).
    pub source_document: String,

    /// 1-based slide index in the source (identity, read-only).
    pub source_slide_index: String,

    /// Recomputable content fingerprint (read-only).
    pub content_hash: String,

    /// Selected visual theme (editable).
    pub style_group: String,

    /// Semantic layout kind (editable).
    pub layout_kind: String,

    /// Coarse shape kinds present on the slide (context, read-only).
    pub asset_kinds: String,

    /// Title text (context, read-only).
    pub title_text: String,

    /// Tab-indented body text (context, read-only).
    pub body_text: String,

    /// Speaker notes text (context, read-only).
    pub notes_text: String,

    /// `|`-delimited image locator tokens (read-only).
    pub image_locators: String,

    /// `|`-delimited image content hashes, aligned with the locators
    /// (read-only).
    pub image_hashes: String,
}

impl SlideRecord {
    /// Parse the slide index, if it is a positive integer.
    pub fn slide_index(&self) -> Option<u32> {
        self.source_slide_index
            .parse::<u32>()
            .ok()
            .filter(|v| *v >= 1)
    }

    /// Parse the layout kind against the closed enum.
    pub fn parsed_layout_kind(&self) -> Result<LayoutKind> {
        self.layout_kind.parse()
    }

    /// Split the image locator cell into tokens.
    pub fn locator_list(&self) -> Vec<String> {
        split_list_field(&self.image_locators)
    }

    /// Split the image hash cell into hashes.
    pub fn hash_list(&self) -> Vec<String> {
        split_list_field(&self.image_hashes)
    }
}

/// Split a delimited list cell into items.
pub fn split_list_field(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    value
        .split(LIST_DELIMITER)
        .filter(|item| !item.is_empty())
        .map(|item| item.to_string())
        .collect()
}

/// Join items into a delimited list cell.
pub fn join_list_field(items: &[String]) -> String {
    items.join(&LIST_DELIMITER.to_string())
}

/// Read slide records from a CSV file.
///
/// A header that does not match [`CSV_COLUMNS`] exactly is a fatal
/// [`Error::Schema`]; row values are not validated here (see
/// `validate::validate_records`).
pub fn read_records(path: &Path) -> Result<Vec<SlideRecord>> {
    if !path.exists() {
        return Err(Error::Reference(format!(
            "CSV file not found: {}",
            path.display()
        )));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect();
    if headers != CSV_COLUMNS {
        return Err(Error::Schema(format!(
            "CSV headers do not match expected schema. Expected {:?}, got {:?}",
            CSV_COLUMNS, headers
        )));
    }
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let record: SlideRecord = result?;
        rows.push(record);
    }
    Ok(rows)
}

/// Write slide records to a CSV file with a staged atomic replace.
pub fn write_records(path: &Path, rows: &[SlideRecord]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_COLUMNS)?;
    for row in rows {
        writer.write_record([
            row.source_document.as_str(),
            row.source_slide_index.as_str(),
            row.content_hash.as_str(),
            row.style_group.as_str(),
            row.layout_kind.as_str(),
            row.asset_kinds.as_str(),
            row.title_text.as_str(),
            row.body_text.as_str(),
            row.notes_text.as_str(),
            row.image_locators.as_str(),
            row.image_hashes.as_str(),
        ])?;
    }
    let buffer = writer
        .into_inner()
        .map_err(|e| Error::Schema(format!("CSV buffer flush failed: {}", e)))?;
    write_atomic(path, &buffer)
}

/// Merge record batches in input order, optionally sorting by a column.
///
/// Numeric sorting is auto-detected when every non-empty value in the
/// column is an unsigned integer; non-numeric stragglers sort last.
pub fn merge_records(
    batches: Vec<Vec<SlideRecord>>,
    sort_by: Option<&str>,
) -> Result<Vec<SlideRecord>> {
    let mut rows: Vec<SlideRecord> = batches.into_iter().flatten().collect();
    let Some(column) = sort_by else {
        return Ok(rows);
    };
    if !CSV_COLUMNS.contains(&column) {
        return Err(Error::Schema(format!("unknown sort column: {}", column)));
    }
    let values: Vec<String> = rows.iter().map(|r| column_value(r, column)).collect();
    let use_numeric = values
        .iter()
        .filter(|v| !v.is_empty())
        .all(|v| v.chars().all(|c| c.is_ascii_digit()))
        && values.iter().any(|v| !v.is_empty());
    if use_numeric {
        rows.sort_by_key(|row| {
            let value = column_value(row, column);
            match value.parse::<u64>() {
                Ok(number) => (0u8, number, String::new()),
                Err(_) if !value.is_empty() => (1, 0, value),
                Err(_) => (2, 0, String::new()),
            }
        });
    } else {
        rows.sort_by_key(|row| column_value(row, column).to_lowercase());
    }
    Ok(rows)
}

fn column_value(row: &SlideRecord, column: &str) -> String {
    match column {
        "source_document" => row.source_document.clone(),
        "source_slide_index" => row.source_slide_index.clone(),
        "content_hash" => row.content_hash.clone(),
        "style_group" => row.style_group.clone(),
        "layout_kind" => row.layout_kind.clone(),
        "asset_kinds" => row.asset_kinds.clone(),
        "title_text" => row.title_text.clone(),
        "body_text" => row.body_text.clone(),
        "notes_text" => row.notes_text.clone(),
        "image_locators" => row.image_locators.clone(),
        "image_hashes" => row.image_hashes.clone(),
        _ => String::new(),
    }
}

/// Remove duplicate rows by `content_hash`, keeping the first occurrence
/// per hash in input order. Rows with an empty hash are always kept.
///
/// Returns the deduplicated rows and the removed count.
pub fn dedupe_records(rows: Vec<SlideRecord>) -> (Vec<SlideRecord>, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::new();
    let mut removed = 0;
    for row in rows {
        let hash = row.content_hash.trim().to_string();
        if hash.is_empty() || seen.insert(hash) {
            kept.push(row);
        } else {
            removed += 1;
        }
    }
    (kept, removed)
}

/// Rewrite the editable `style_group` column, optionally restricted to
/// rows from one source document. Returns how many rows changed.
pub fn set_style_group(
    rows: &mut [SlideRecord],
    style_group: &str,
    source_filter: Option<&str>,
) -> usize {
    let mut changed = 0;
    for row in rows.iter_mut() {
        if let Some(filter) = source_filter {
            if row.source_document != filter {
                continue;
            }
        }
        if row.style_group != style_group {
            row.style_group = style_group.to_string();
            changed += 1;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample_record(index: u32) -> SlideRecord {
        SlideRecord {
            source_document: "deck.pptx".to_string(),
            source_slide_index: index.to_string(),
            content_hash: format!("{:016x}", 0x2e17a21f00000000u64 + index as u64),
            style_group: "clean_light".to_string(),
            layout_kind: "title_content".to_string(),
            asset_kinds: "placeholder".to_string(),
            title_text: format!("Slide {}", index),
            body_text: "Point one\n\tDetail".to_string(),
            notes_text: String::new(),
            image_locators: String::new(),
            image_hashes: String::new(),
        }
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.csv");
        let rows = vec![sample_record(1), sample_record(2)];
        write_records(&path, &rows).unwrap();
        let loaded = read_records(&path).unwrap();
        assert_eq!(loaded, rows);
    }

    #[test]
    fn test_round_trip_preserves_embedded_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.csv");
        let mut row = sample_record(1);
        row.body_text = "Line, with comma\n\t\"Quoted\" detail".to_string();
        write_records(&path, &[row.clone()]).unwrap();
        let loaded = read_records(&path).unwrap();
        assert_eq!(loaded[0].body_text, row.body_text);
    }

    #[test]
    fn test_header_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "source_document,slide\na.pptx,1\n").unwrap();
        let err = read_records(&path);
        assert!(matches!(err, Err(Error::Schema(_))));
    }

    #[test]
    fn test_missing_file_is_reference_error() {
        let err = read_records(Path::new("/nonexistent/index.csv"));
        assert!(matches!(err, Err(Error::Reference(_))));
    }

    #[test]
    fn test_list_field_round_trip() {
        let items = vec!["a".to_string(), "b".to_string()];
        let cell = join_list_field(&items);
        assert_eq!(cell, "a|b");
        assert_eq!(split_list_field(&cell), items);
        assert!(split_list_field("").is_empty());
    }

    #[test]
    fn test_merge_numeric_sort() {
        let mut a = sample_record(10);
        a.source_slide_index = "10".to_string();
        let b = sample_record(2);
        let merged = merge_records(vec![vec![a], vec![b]], Some("source_slide_index")).unwrap();
        assert_eq!(merged[0].source_slide_index, "2");
        assert_eq!(merged[1].source_slide_index, "10");
    }

    #[test]
    fn test_merge_preserves_input_order_without_sort() {
        let merged = merge_records(
            vec![vec![sample_record(2)], vec![sample_record(1)]],
            None,
        )
        .unwrap();
        assert_eq!(merged[0].source_slide_index, "2");
    }

    #[test]
    fn test_merge_rejects_unknown_column() {
        assert!(merge_records(vec![], Some("nope")).is_err());
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let mut a = sample_record(1);
        let mut b = sample_record(2);
        let c = sample_record(3);
        a.content_hash = "aaaaaaaaaaaaaaaa".to_string();
        b.content_hash = "aaaaaaaaaaaaaaaa".to_string();
        let (kept, removed) = dedupe_records(vec![a.clone(), b, c]);
        assert_eq!(removed, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].source_slide_index, a.source_slide_index);
    }

    #[test]
    fn test_dedupe_keeps_empty_hashes() {
        let mut a = sample_record(1);
        let mut b = sample_record(2);
        a.content_hash = String::new();
        b.content_hash = String::new();
        let (kept, removed) = dedupe_records(vec![a, b]);
        assert_eq!(removed, 0);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_set_style_group_with_filter() {
        let mut rows = vec![sample_record(1), sample_record(2)];
        rows[1].source_document = "other.pptx".to_string();
        let changed = set_style_group(&mut rows, "clean_dark", Some("deck.pptx"));
        assert_eq!(changed, 1);
        assert_eq!(rows[0].style_group, "clean_dark");
        assert_eq!(rows[1].style_group, "clean_light");
    }

    #[test]
    fn test_typed_accessors() {
        let mut row = sample_record(3);
        assert_eq!(row.slide_index(), Some(3));
        assert_eq!(
            row.parsed_layout_kind().unwrap(),
            LayoutKind::TitleContent
        );
        row.source_slide_index = "zero".to_string();
        row.layout_kind = "hologram".to_string();
        assert_eq!(row.slide_index(), None);
        assert!(row.parsed_layout_kind().is_err());
    }
}
