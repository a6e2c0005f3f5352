//! The batch rebuild pipeline.
//!
//! Drives one record batch end to end: reload and validate the CSV, build
//! the layout table from the template, then per record resolve layout and
//! source content, run the overflow policy, and hand a render plan to the
//! output adapter. Records are isolated: one bad row is recorded and
//! skipped, the rest of the batch still renders.

use crate::doc::{DeckDocument, DeckLoader, SlideContent};
use crate::error::{Error, Result, Severity};
use crate::fingerprint::parse_tab_indented_lines;
use crate::layout::{
    LayoutKind, LayoutTable, OverflowOutcome, OverflowPolicy, ResolvePolicy, TemplateStructure,
};
use crate::locator::{resolve_path, ImageLocator};
use crate::record::{read_records, SlideRecord};
use crate::validate::{validate_records, ValidateOptions};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// An image reference that has been resolved and verified against its
/// live source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    /// The locator the record carried.
    pub locator: ImageLocator,

    /// Content hash, re-read from the live source.
    pub image_hash: String,
}

/// Everything an output adapter needs to render one slide.
///
/// The pipeline owns resolution and verification; adapters only place
/// content into the structure's placeholders.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    /// The record the plan was built from.
    pub record: SlideRecord,

    /// Resolved template structure for the record's
    /// `(style_group, layout_kind)` pair.
    pub structure: TemplateStructure,

    /// Title text, possibly empty.
    pub title_text: String,

    /// Body lines as `(indent_level, text)` pairs, after overflow policy.
    pub body_lines: Vec<(usize, String)>,

    /// Speaker notes text.
    pub notes_text: String,

    /// Verified images in record order.
    pub images: Vec<ResolvedImage>,
}

/// Renders planned slides into an output artifact.
pub trait SlideRenderer {
    /// Whether the output medium reflows overflowing text on its own. When
    /// true the overflow policy defers instead of warning or truncating.
    fn supports_reflow(&self) -> bool;

    /// Render one planned slide, in batch order.
    fn render(&mut self, plan: &RenderPlan) -> Result<()>;

    /// Finish the artifact after the last slide.
    fn finish(&mut self) -> Result<()>;
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Strict mode: ambiguous paths, missing layout pairs and overflow all
    /// become errors instead of warnings or fallbacks.
    pub strict: bool,

    /// Default `(style_group, layout_kind)` pair for non-strict layout
    /// fallback.
    pub fallback_layout: Option<(String, LayoutKind)>,

    /// Overflow heuristics.
    pub overflow: OverflowPolicy,

    /// Directory of the CSV file, used as the locator search anchor.
    pub anchor_dir: Option<PathBuf>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            strict: false,
            fallback_layout: None,
            overflow: OverflowPolicy::default(),
            anchor_dir: None,
        }
    }
}

/// Aggregate result of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Rows handed to the renderer.
    pub rendered: usize,

    /// Rows skipped with a recorded error.
    pub skipped: usize,

    /// Per-row error messages, in batch order.
    pub errors: Vec<String>,

    /// Per-row warning messages, in batch order.
    pub warnings: Vec<String>,
}

impl RunSummary {
    /// Total rows the run accounted for.
    pub fn total(&self) -> usize {
        self.rendered + self.skipped
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rendered {}/{} slides ({} skipped, {} warnings)",
            self.rendered,
            self.total(),
            self.skipped,
            self.warnings.len()
        )
    }
}

/// The batch rebuild pipeline.
pub struct Pipeline<'a> {
    loader: &'a dyn DeckLoader,
    options: PipelineOptions,
    deck_cache: HashMap<PathBuf, DeckDocument>,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline over a document loader.
    pub fn new(loader: &'a dyn DeckLoader, options: PipelineOptions) -> Self {
        Self {
            loader,
            options,
            deck_cache: HashMap::new(),
        }
    }

    /// Run a full rebuild: CSV in, rendered slides out.
    ///
    /// The CSV is re-read and re-validated at run time; editing tools may
    /// have touched it since any earlier pass. Validation errors abort
    /// before the first render call.
    pub fn run(
        &mut self,
        csv_path: &Path,
        template_path: &Path,
        renderer: &mut dyn SlideRenderer,
    ) -> Result<RunSummary> {
        let rows = read_records(csv_path)?;
        let anchor = self
            .options
            .anchor_dir
            .clone()
            .or_else(|| csv_path.parent().map(|p| p.to_path_buf()));

        let validate_options = ValidateOptions {
            check_sources: false,
            verify_hashes: false,
            strict: self.options.strict,
            anchor_dir: anchor.clone(),
        };
        let validation = validate_records(&rows, &validate_options, Some(self.loader));
        if !validation.is_ok() {
            return Err(Error::Schema(format!(
                "CSV failed validation:\n{}",
                validation.formatted_lines().join("\n")
            )));
        }

        let template = self.loader.load(template_path)?;
        let (table, table_warnings) = LayoutTable::from_template(&template, self.options.strict)?;
        if table.is_empty() {
            return Err(Error::Schema(format!(
                "template {} exposes no classifiable layouts",
                template_path.display()
            )));
        }

        let mut summary = RunSummary {
            warnings: table_warnings,
            ..Default::default()
        };
        for warning in &validation.warnings {
            summary.warnings.push(warning.clone());
        }

        let policy = if self.options.strict {
            ResolvePolicy::Strict
        } else {
            ResolvePolicy::Default {
                fallback: self.options.fallback_layout.clone(),
            }
        };

        for (number, row) in rows.iter().enumerate() {
            let number = number + 1;
            match self.plan_row(row, &table, &policy, anchor.as_deref(), renderer) {
                Ok((plan, warnings)) => {
                    for warning in warnings {
                        summary.warnings.push(format!("row {}: {}", number, warning));
                    }
                    match renderer.render(&plan) {
                        Ok(()) => summary.rendered += 1,
                        Err(e) => {
                            summary.skipped += 1;
                            summary.errors.push(format!("row {}: {}", number, e));
                        }
                    }
                }
                Err(e) => {
                    // Fatal classes poison the whole artifact; per-row
                    // classes only lose this row.
                    if e.severity() == Severity::Fatal {
                        return Err(e);
                    }
                    log::warn!("row {}: {}", number, e);
                    summary.skipped += 1;
                    summary.errors.push(format!("row {}: {}", number, e));
                }
            }
        }

        renderer.finish()?;
        Ok(summary)
    }

    /// Resolve and verify everything one row needs.
    fn plan_row(
        &mut self,
        row: &SlideRecord,
        table: &LayoutTable,
        policy: &ResolvePolicy,
        anchor: Option<&Path>,
        renderer: &dyn SlideRenderer,
    ) -> Result<(RenderPlan, Vec<String>)> {
        let kind = row.parsed_layout_kind()?;
        let (structure, mut warnings) = table.resolve(&row.style_group, kind, policy)?;

        let slide = self.load_slide(row, anchor)?.clone();
        let recomputed = slide.fingerprint();
        if recomputed != row.content_hash {
            return Err(Error::Drift(format!(
                "content_hash mismatch for {} slide {} (recorded {}, recomputed {})",
                row.source_document, slide.index, row.content_hash, recomputed
            )));
        }

        let images = self.resolve_images(row, anchor)?;

        let body_text = match self.options.overflow.check(
            &row.body_text,
            renderer.supports_reflow(),
            self.options.strict,
        ) {
            OverflowOutcome::Fits | OverflowOutcome::DeferToReflow => row.body_text.clone(),
            OverflowOutcome::Warned(overflow_warnings) => {
                warnings.extend(overflow_warnings);
                row.body_text.clone()
            }
            OverflowOutcome::Truncated(truncated) => {
                warnings.push("body text truncated to fit".to_string());
                truncated
            }
        };

        let plan = RenderPlan {
            record: row.clone(),
            structure: structure.clone(),
            title_text: row.title_text.clone(),
            body_lines: parse_tab_indented_lines(&body_text, false, false),
            notes_text: row.notes_text.clone(),
            images,
        };
        Ok((plan, warnings))
    }

    /// Load the row's source slide through the deck cache.
    fn load_slide(&mut self, row: &SlideRecord, anchor: Option<&Path>) -> Result<&SlideContent> {
        let index = row.slide_index().ok_or_else(|| {
            Error::Reference(format!(
                "invalid source_slide_index {:?}",
                row.source_slide_index
            ))
        })?;
        let deck = self.load_deck(Path::new(&row.source_document), anchor)?;
        deck.slide(index).ok_or_else(|| {
            Error::Reference(format!(
                "slide {} not found in {}",
                index, row.source_document
            ))
        })
    }

    fn load_deck(&mut self, reference: &Path, anchor: Option<&Path>) -> Result<&DeckDocument> {
        let (path, warnings) = resolve_path(reference, anchor, self.options.strict)?;
        for warning in warnings {
            log::warn!("{}", warning);
        }
        if !self.deck_cache.contains_key(&path) {
            let deck = self.loader.load(&path)?;
            self.deck_cache.insert(path.clone(), deck);
        }
        // Just inserted or already present.
        self.deck_cache
            .get(&path)
            .ok_or_else(|| Error::Reference(format!("deck cache miss for {}", path.display())))
    }

    /// Verify every image locator on the row against its live source.
    fn resolve_images(
        &mut self,
        row: &SlideRecord,
        anchor: Option<&Path>,
    ) -> Result<Vec<ResolvedImage>> {
        let locators = row.locator_list();
        let hashes = row.hash_list();
        if locators.len() != hashes.len() {
            return Err(Error::Schema(format!(
                "image locator/hash misalignment ({} locators, {} hashes)",
                locators.len(),
                hashes.len()
            )));
        }
        let mut resolved = Vec::with_capacity(locators.len());
        for (token, recorded_hash) in locators.iter().zip(hashes.iter()) {
            let locator: ImageLocator = token.parse()?;
            let deck = self.load_deck(Path::new(&locator.source_document), anchor)?;
            let slide = deck.slide(locator.slide_index).ok_or_else(|| {
                Error::Reference(format!("image locator points past the deck: {}", token))
            })?;
            let picture = slide
                .pictures()
                .into_iter()
                .find(|p| p.shape_id == locator.shape_id)
                .ok_or_else(|| {
                    Error::Reference(format!("image shape not found for locator {}", token))
                })?;
            if picture.image_hash != *recorded_hash {
                return Err(Error::Drift(format!(
                    "image content changed under locator {} (recorded {}, current {})",
                    token, recorded_hash, picture.image_hash
                )));
            }
            resolved.push(ResolvedImage {
                locator,
                image_hash: picture.image_hash.clone(),
            });
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::{LayoutDef, Paragraph, PictureShape, ShapeContent, TextShape};
    use crate::layout::PlaceholderRole;
    use crate::record::write_records;

    struct MapLoader(HashMap<String, DeckDocument>);

    impl DeckLoader for MapLoader {
        fn load(&self, path: &Path) -> Result<DeckDocument> {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| Error::Reference(format!("no deck {:?}", name)))
        }
    }

    #[derive(Default)]
    struct CollectingRenderer {
        plans: Vec<RenderPlan>,
        finished: bool,
        reflow: bool,
    }

    impl SlideRenderer for CollectingRenderer {
        fn supports_reflow(&self) -> bool {
            self.reflow
        }

        fn render(&mut self, plan: &RenderPlan) -> Result<()> {
            self.plans.push(plan.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn source_deck() -> DeckDocument {
        let mut deck = DeckDocument::new("deck.json");
        let mut slide = SlideContent::new(1);
        slide.shapes.push(ShapeContent::Text(TextShape {
            shape_id: 2,
            name: "Title 1".to_string(),
            placeholder: Some(PlaceholderRole::Title),
            paragraphs: vec![Paragraph::new(0, "Photosynthesis")],
        }));
        slide.shapes.push(ShapeContent::Text(TextShape {
            shape_id: 3,
            name: "Content 2".to_string(),
            placeholder: Some(PlaceholderRole::Body),
            paragraphs: vec![Paragraph::new(0, "Light reactions")],
        }));
        slide.shapes.push(ShapeContent::Picture(PictureShape {
            shape_id: 7,
            name: "Picture 3".to_string(),
            image_hash: "ab".repeat(32),
        }));
        deck.slides.push(slide);
        deck
    }

    fn template_deck() -> DeckDocument {
        let mut deck = DeckDocument::new("template.json");
        deck.layouts = vec![LayoutDef {
            name: "Title and Content".to_string(),
            master_name: "Clean Light".to_string(),
            placeholders: vec![PlaceholderRole::Title, PlaceholderRole::Body],
        }];
        deck
    }

    fn loader() -> MapLoader {
        let mut decks = HashMap::new();
        decks.insert("deck.json".to_string(), source_deck());
        decks.insert("template.json".to_string(), template_deck());
        MapLoader(decks)
    }

    fn row_for(deck: &DeckDocument) -> SlideRecord {
        let slide = &deck.slides[0];
        SlideRecord {
            source_document: "deck.json".to_string(),
            source_slide_index: "1".to_string(),
            content_hash: slide.fingerprint(),
            style_group: "clean_light".to_string(),
            layout_kind: "title_content".to_string(),
            asset_kinds: "placeholder|picture".to_string(),
            title_text: slide.title_text(),
            body_text: slide.body_text(),
            notes_text: String::new(),
            image_locators: "pptx:deck.json#slide=1#shape_id=7".to_string(),
            image_hashes: "ab".repeat(32),
        }
    }

    fn write_batch(dir: &Path, rows: &[SlideRecord]) -> PathBuf {
        let path = dir.join("index.csv");
        write_records(&path, rows).unwrap();
        std::fs::write(dir.join("deck.json"), b"{}").unwrap();
        std::fs::write(dir.join("template.json"), b"{}").unwrap();
        path
    }

    fn options_for(dir: &Path) -> PipelineOptions {
        PipelineOptions {
            anchor_dir: Some(dir.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn test_run_renders_valid_batch() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader();
        let csv = write_batch(dir.path(), &[row_for(&source_deck())]);

        let mut pipeline = Pipeline::new(&loader, options_for(dir.path()));
        let mut renderer = CollectingRenderer::default();
        let summary = pipeline
            .run(&csv, &dir.path().join("template.json"), &mut renderer)
            .unwrap();

        assert_eq!(summary.rendered, 1);
        assert_eq!(summary.skipped, 0);
        assert!(renderer.finished);
        let plan = &renderer.plans[0];
        assert_eq!(plan.title_text, "Photosynthesis");
        assert_eq!(plan.body_lines, vec![(0, "Light reactions".to_string())]);
        assert_eq!(plan.structure.name, "Title and Content");
        assert_eq!(plan.images.len(), 1);
        assert_eq!(plan.images[0].locator.shape_id, 7);
    }

    #[test]
    fn test_drifted_row_is_skipped_others_render() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader();
        let good = row_for(&source_deck());
        let mut stale = good.clone();
        stale.content_hash = "00000000deadbeef".to_string();
        let csv = write_batch(dir.path(), &[stale, good]);

        let mut pipeline = Pipeline::new(&loader, options_for(dir.path()));
        let mut renderer = CollectingRenderer::default();
        let summary = pipeline
            .run(&csv, &dir.path().join("template.json"), &mut renderer)
            .unwrap();

        assert_eq!(summary.rendered, 1);
        assert_eq!(summary.skipped, 1);
        assert!(summary.errors[0].contains("row 1"));
        assert!(summary.errors[0].contains("content_hash mismatch"));
    }

    #[test]
    fn test_image_drift_skips_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader();
        let mut row = row_for(&source_deck());
        row.image_hashes = "ff".repeat(32);
        let csv = write_batch(dir.path(), &[row]);

        let mut pipeline = Pipeline::new(&loader, options_for(dir.path()));
        let mut renderer = CollectingRenderer::default();
        let summary = pipeline
            .run(&csv, &dir.path().join("template.json"), &mut renderer)
            .unwrap();

        assert_eq!(summary.rendered, 0);
        assert_eq!(summary.skipped, 1);
        assert!(summary.errors[0].contains("image content changed"));
    }

    #[test]
    fn test_strict_ambiguous_source_aborts_before_finish() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader();
        let csv = dir.path().join("index.csv");
        write_records(&csv, &[row_for(&source_deck())]).unwrap();
        std::fs::write(dir.path().join("template.json"), b"{}").unwrap();
        // Two equally valid copies of the source, one per anchor subdir.
        for sub in ["a", "b"] {
            let root = dir.path().join(sub);
            std::fs::create_dir_all(&root).unwrap();
            std::fs::write(root.join("deck.json"), b"{}").unwrap();
        }

        let mut options = options_for(dir.path());
        options.strict = true;
        let mut pipeline = Pipeline::new(&loader, options);
        let mut renderer = CollectingRenderer::default();
        let err = pipeline.run(&csv, &dir.path().join("template.json"), &mut renderer);

        // The whole run aborts; no partially-populated artifact is exposed.
        assert!(matches!(err, Err(Error::Ambiguity(_))));
        assert!(!renderer.finished);
        assert!(renderer.plans.is_empty());
    }

    #[test]
    fn test_validation_errors_abort_before_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader();
        let mut row = row_for(&source_deck());
        row.layout_kind = "hologram".to_string();
        let csv = write_batch(dir.path(), &[row]);

        let mut pipeline = Pipeline::new(&loader, options_for(dir.path()));
        let mut renderer = CollectingRenderer::default();
        let err = pipeline.run(&csv, &dir.path().join("template.json"), &mut renderer);
        assert!(matches!(err, Err(Error::Schema(_))));
        assert!(renderer.plans.is_empty());
    }

    #[test]
    fn test_missing_layout_pair_skips_in_default_mode() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader();
        let mut row = row_for(&source_deck());
        row.style_group = "missing_master".to_string();
        let csv = write_batch(dir.path(), &[row]);

        let mut pipeline = Pipeline::new(&loader, options_for(dir.path()));
        let mut renderer = CollectingRenderer::default();
        let summary = pipeline
            .run(&csv, &dir.path().join("template.json"), &mut renderer)
            .unwrap();
        assert_eq!(summary.skipped, 1);

        // With a configured fallback pair the same row renders, warning
        // about the substitution.
        let mut options = options_for(dir.path());
        options.fallback_layout =
            Some(("clean_light".to_string(), LayoutKind::TitleContent));
        let mut pipeline = Pipeline::new(&loader, options);
        let mut renderer = CollectingRenderer::default();
        let summary = pipeline
            .run(&csv, &dir.path().join("template.json"), &mut renderer)
            .unwrap();
        assert_eq!(summary.rendered, 1);
        assert!(summary
            .warnings
            .iter()
            .any(|w| w.contains("falling back")));
    }

    #[test]
    fn test_overflow_truncates_in_strict_without_reflow() {
        let dir = tempfile::tempdir().unwrap();
        let mut decks = HashMap::new();
        let mut deck = source_deck();
        if let ShapeContent::Text(text) = &mut deck.slides[0].shapes[1] {
            text.paragraphs = (0..20)
                .map(|i| Paragraph::new(0, format!("Point {}", i)))
                .collect();
        }
        decks.insert("deck.json".to_string(), deck.clone());
        decks.insert("template.json".to_string(), template_deck());
        let loader = MapLoader(decks);

        let mut row = row_for(&deck);
        row.content_hash = deck.slides[0].fingerprint();
        row.body_text = deck.slides[0].body_text();
        row.image_locators = String::new();
        row.image_hashes = String::new();
        let csv = write_batch(dir.path(), &[row]);

        let mut options = options_for(dir.path());
        options.strict = true;
        options.overflow = OverflowPolicy {
            max_lines: 5,
            max_line_len: 90,
        };
        let mut pipeline = Pipeline::new(&loader, options);
        let mut renderer = CollectingRenderer::default();
        let summary = pipeline
            .run(&csv, &dir.path().join("template.json"), &mut renderer)
            .unwrap();

        assert_eq!(summary.rendered, 1);
        let last = renderer.plans[0].body_lines.last().cloned().unwrap();
        assert_eq!(last.1, crate::layout::TRUNCATION_MARKER);
        assert!(summary.warnings.iter().any(|w| w.contains("truncated")));
    }

    #[test]
    fn test_reflow_defers_overflow_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader();
        let mut row = row_for(&source_deck());
        row.body_text = (0..30)
            .map(|i| format!("Point {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        // Body context drift is fine here; hash verification happens
        // against the source slide, not against body_text.
        let csv = write_batch(dir.path(), &[row.clone()]);

        let mut pipeline = Pipeline::new(&loader, options_for(dir.path()));
        let mut renderer = CollectingRenderer {
            reflow: true,
            ..Default::default()
        };
        let summary = pipeline
            .run(&csv, &dir.path().join("template.json"), &mut renderer)
            .unwrap();
        assert_eq!(summary.rendered, 1);
        assert_eq!(renderer.plans[0].body_lines.len(), 30);
        assert!(!summary.warnings.iter().any(|w| w.contains("lines")));
    }
}
