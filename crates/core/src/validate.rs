//! Batch validation of slide records.
//!
//! Checks run per row and never abort the batch; the report carries every
//! finding. Strict verification recomputes fingerprints against the live
//! sources through the document boundary, so drift shows up here before
//! any rebuild touches an output artifact.

use crate::doc::{DeckDocument, DeckLoader};
use crate::error::Error;
use crate::fingerprint::is_hex_fingerprint;
use crate::locator::{resolve_path, ImageLocator};
use crate::record::SlideRecord;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Source-file extensions that do not draw a warning.
const EXPECTED_EXTENSIONS: [&str; 3] = ["pptx", "odp", "json"];

/// Everything a validation pass found.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Per-row errors; the affected row is unusable downstream.
    pub errors: Vec<String>,

    /// Per-row warnings; the run continues unchanged.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// True when no errors were recorded (warnings allowed).
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Promote all warnings to errors (strict mode). Detection is
    /// unchanged; only the severity moves.
    pub fn promote_warnings(&mut self) {
        self.errors.append(&mut self.warnings);
    }

    /// Format messages with a severity label, one line each.
    pub fn formatted_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for message in &self.errors {
            lines.push(format!("ERROR: {}", message));
        }
        for message in &self.warnings {
            lines.push(format!("WARNING: {}", message));
        }
        lines
    }
}

/// Knobs for a validation pass.
#[derive(Debug, Clone, Default)]
pub struct ValidateOptions {
    /// Resolve each `source_document` on disk and error when missing.
    pub check_sources: bool,

    /// Recompute `content_hash` against the live source and compare.
    /// Requires a loader.
    pub verify_hashes: bool,

    /// Strict resolution (ambiguous paths are errors) and warning
    /// promotion at the end of the pass.
    pub strict: bool,

    /// Directory of the CSV file, used as the locator search anchor.
    pub anchor_dir: Option<PathBuf>,
}

/// Validate a batch of records in order.
///
/// Check order per row: identity fields, fingerprint shape, style group,
/// layout-kind membership, image locator/hash alignment, optional source
/// existence, optional strict hash recomputation, context-field drift.
pub fn validate_records(
    rows: &[SlideRecord],
    options: &ValidateOptions,
    loader: Option<&dyn DeckLoader>,
) -> ValidationReport {
    let mut report = ValidationReport::default();
    if rows.is_empty() {
        report.warnings.push("no rows found in CSV".to_string());
        return report;
    }

    let mut deck_cache: HashMap<PathBuf, Option<DeckDocument>> = HashMap::new();

    for (number, row) in rows.iter().enumerate() {
        let number = number + 1;
        validate_identity(number, row, &mut report);
        validate_editable(number, row, &mut report);
        validate_images(number, row, &mut report);

        let wants_source = options.check_sources || options.verify_hashes;
        if !wants_source || row.source_document.is_empty() {
            continue;
        }
        let resolved = resolve_source(number, row, options, &mut report);
        let Some(path) = resolved else {
            continue;
        };
        if !options.verify_hashes {
            continue;
        }
        let Some(loader) = loader else {
            report.warnings.push(format!(
                "row {}: hash verification requested but no document loader available",
                number
            ));
            continue;
        };
        let deck = deck_cache.entry(path.clone()).or_insert_with(|| {
            match loader.load(&path) {
                Ok(deck) => Some(deck),
                Err(e) => {
                    log::warn!("failed to load {}: {}", path.display(), e);
                    None
                }
            }
        });
        let Some(deck) = deck.as_ref() else {
            report
                .errors
                .push(format!("row {}: source could not be loaded", number));
            continue;
        };
        verify_against_source(number, row, deck, &mut report);
    }

    if options.strict {
        report.promote_warnings();
    }
    report
}

fn validate_identity(number: usize, row: &SlideRecord, report: &mut ValidationReport) {
    if row.source_document.is_empty() {
        report
            .errors
            .push(format!("row {}: missing source_document", number));
    } else {
        let extension = Path::new(&row.source_document)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        if !EXPECTED_EXTENSIONS.contains(&extension.as_str()) {
            report.warnings.push(format!(
                "row {}: unexpected source_document extension {:?}",
                number, extension
            ));
        }
    }
    if row.slide_index().is_none() {
        report.errors.push(format!(
            "row {}: invalid source_slide_index {:?}",
            number, row.source_slide_index
        ));
    }
    if row.content_hash.is_empty() {
        report
            .errors
            .push(format!("row {}: missing content_hash", number));
    } else if !is_hex_fingerprint(&row.content_hash) {
        report.errors.push(format!(
            "row {}: content_hash must be 16 hex characters",
            number
        ));
    }
}

fn validate_editable(number: usize, row: &SlideRecord, report: &mut ValidationReport) {
    if row.style_group.is_empty() {
        report
            .errors
            .push(format!("row {}: missing style_group", number));
    }
    if row.layout_kind.is_empty() {
        report
            .errors
            .push(format!("row {}: missing layout_kind", number));
    } else if let Err(e) = row.parsed_layout_kind() {
        // Unknown kinds silently disable rendering downstream, so this is
        // an error, not a warning.
        report.errors.push(format!("row {}: {}", number, e));
    }
}

fn validate_images(number: usize, row: &SlideRecord, report: &mut ValidationReport) {
    let locators = row.locator_list();
    let hashes = row.hash_list();
    if locators.len() != hashes.len() {
        report.errors.push(format!(
            "row {}: image locator/hash misalignment ({} locators, {} hashes)",
            number,
            locators.len(),
            hashes.len()
        ));
        return;
    }
    for token in &locators {
        if let Err(e) = token.parse::<ImageLocator>() {
            report.errors.push(format!("row {}: {}", number, e));
        }
    }
}

fn resolve_source(
    number: usize,
    row: &SlideRecord,
    options: &ValidateOptions,
    report: &mut ValidationReport,
) -> Option<PathBuf> {
    match resolve_path(
        Path::new(&row.source_document),
        options.anchor_dir.as_deref(),
        options.strict,
    ) {
        Ok((path, warnings)) => {
            for warning in warnings {
                report.warnings.push(format!("row {}: {}", number, warning));
            }
            Some(path)
        }
        Err(Error::Ambiguity(message)) => {
            report.errors.push(format!("row {}: {}", number, message));
            None
        }
        Err(_) => {
            report.errors.push(format!(
                "row {}: source_document not found: {}",
                number, row.source_document
            ));
            None
        }
    }
}

fn verify_against_source(
    number: usize,
    row: &SlideRecord,
    deck: &DeckDocument,
    report: &mut ValidationReport,
) {
    let Some(index) = row.slide_index() else {
        return;
    };
    let Some(slide) = deck.slide(index) else {
        report.errors.push(format!(
            "row {}: source_slide_index {} out of range for {}",
            number, index, row.source_document
        ));
        return;
    };
    let recomputed = slide.fingerprint();
    if recomputed != row.content_hash {
        report.errors.push(format!(
            "row {}: content_hash mismatch (recorded {}, recomputed {})",
            number, row.content_hash, recomputed
        ));
    }
    // Context fields are read-only; a changed value relative to a fresh
    // re-index is probably an accidental edit.
    if row.title_text != slide.title_text() {
        report.warnings.push(format!(
            "row {}: title_text differs from re-indexed source (accidental edit?)",
            number
        ));
    }
    if row.body_text != slide.body_text() {
        report.warnings.push(format!(
            "row {}: body_text differs from re-indexed source (accidental edit?)",
            number
        ));
    }
    if row.notes_text != slide.notes_text {
        report.warnings.push(format!(
            "row {}: notes_text differs from re-indexed source (accidental edit?)",
            number
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::{Paragraph, ShapeContent, SlideContent, TextShape};
    use crate::error::Result;
    use crate::layout::PlaceholderRole;

    fn record(index: u32) -> SlideRecord {
        SlideRecord {
            source_document: "deck.json".to_string(),
            source_slide_index: index.to_string(),
            content_hash: "2e17a21f8b1c2f4e".to_string(),
            style_group: "clean_light".to_string(),
            layout_kind: "title_content".to_string(),
            asset_kinds: "placeholder".to_string(),
            title_text: String::new(),
            body_text: String::new(),
            notes_text: String::new(),
            image_locators: String::new(),
            image_hashes: String::new(),
        }
    }

    struct StubLoader(DeckDocument);

    impl DeckLoader for StubLoader {
        fn load(&self, _path: &Path) -> Result<DeckDocument> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_clean_batch_passes() {
        let report = validate_records(&[record(1)], &ValidateOptions::default(), None);
        assert!(report.is_ok());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_empty_batch_warns() {
        let report = validate_records(&[], &ValidateOptions::default(), None);
        assert!(report.is_ok());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_locator_alignment_violation() {
        let mut row = record(1);
        row.image_locators = "pptx:deck.json#slide=1#shape_id=4".to_string();
        row.image_hashes = String::new();
        let report = validate_records(&[row], &ValidateOptions::default(), None);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("misalignment"));
    }

    #[test]
    fn test_unknown_layout_kind_is_error() {
        let mut row = record(1);
        row.layout_kind = "hologram".to_string();
        let report = validate_records(&[row], &ValidateOptions::default(), None);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("layout_kind"));
    }

    #[test]
    fn test_bad_index_and_hash_shape() {
        let mut row = record(1);
        row.source_slide_index = "0".to_string();
        row.content_hash = "nothex".to_string();
        let report = validate_records(&[row], &ValidateOptions::default(), None);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_strict_promotes_warnings() {
        let mut row = record(1);
        row.source_document = "deck.weird".to_string();
        let options = ValidateOptions {
            strict: true,
            ..Default::default()
        };
        let report = validate_records(&[row], &options, None);
        assert!(!report.is_ok());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_hash_verification_reports_drift_per_row() {
        let mut slide = SlideContent::new(1);
        slide.shapes.push(ShapeContent::Text(TextShape {
            shape_id: 2,
            name: "Title 1".to_string(),
            placeholder: Some(PlaceholderRole::Title),
            paragraphs: vec![Paragraph::new(0, "Current title")],
        }));
        let mut deck = DeckDocument::new("deck.json");
        deck.slides.push(slide.clone());
        let loader = StubLoader(deck);

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("deck.json"), b"{}").unwrap();

        // Row 1 carries the true fingerprint, row 2 a stale one.
        let mut good = record(1);
        good.content_hash = slide.fingerprint();
        good.title_text = "Current title".to_string();
        let mut stale = record(1);
        stale.content_hash = "00000000deadbeef".to_string();
        stale.title_text = "Current title".to_string();

        let options = ValidateOptions {
            check_sources: true,
            verify_hashes: true,
            strict: false,
            anchor_dir: Some(dir.path().to_path_buf()),
        };
        let report = validate_records(&[good, stale], &options, Some(&loader));
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("row 2"));
        assert!(report.errors[0].contains("content_hash mismatch"));
    }

    #[test]
    fn test_context_drift_is_a_warning() {
        let mut slide = SlideContent::new(1);
        slide.shapes.push(ShapeContent::Text(TextShape {
            shape_id: 2,
            name: "Title 1".to_string(),
            placeholder: Some(PlaceholderRole::Title),
            paragraphs: vec![Paragraph::new(0, "Real title")],
        }));
        let mut deck = DeckDocument::new("deck.json");
        deck.slides.push(slide.clone());
        let loader = StubLoader(deck);

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("deck.json"), b"{}").unwrap();

        let mut row = record(1);
        row.content_hash = slide.fingerprint();
        row.title_text = "Edited by hand".to_string();

        let options = ValidateOptions {
            check_sources: true,
            verify_hashes: true,
            strict: false,
            anchor_dir: Some(dir.path().to_path_buf()),
        };
        let report = validate_records(&[row], &options, Some(&loader));
        assert!(report.is_ok());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("accidental edit")));
    }
}
