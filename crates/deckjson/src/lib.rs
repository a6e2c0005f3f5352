//! JSON deck snapshots: the on-disk document format decksync reads and
//! writes directly.
//!
//! Native presentation formats stay behind external exporters; this
//! adapter handles their JSON snapshot form, which serializes
//! [`DeckDocument`] one to one. It provides both sides of the boundary:
//! a [`DeckLoader`] for reading sources and a [`SlideRenderer`] that
//! assembles a new snapshot from render plans.

use decksync_core::doc::{Paragraph, PictureShape, ShapeContent, TextShape};
use decksync_core::fsutil::write_atomic;
use decksync_core::sync::RenderPlan;
use decksync_core::{
    DeckDocument, DeckLoader, Error, PlaceholderRole, Result, SlideContent, SlideRenderer,
};
use std::path::{Path, PathBuf};

/// Loads `.json` deck snapshots.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDeckLoader;

impl DeckLoader for JsonDeckLoader {
    fn load(&self, path: &Path) -> Result<DeckDocument> {
        if !path.exists() {
            return Err(Error::Reference(format!(
                "deck snapshot not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let mut deck: DeckDocument = serde_json::from_str(&content)
            .map_err(|e| Error::Schema(format!("invalid deck snapshot {}: {}", path.display(), e)))?;
        if deck.name.is_empty() {
            // Snapshots written by hand often omit the name; the filename
            // is the identity key, so fill it in.
            deck.name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
        }
        Ok(deck)
    }
}

/// Write a deck snapshot with a staged atomic replace.
pub fn save_deck(path: &Path, deck: &DeckDocument) -> Result<()> {
    let content = serde_json::to_string_pretty(deck)
        .map_err(|e| Error::Schema(format!("deck snapshot serialization failed: {}", e)))?;
    write_atomic(path, content.as_bytes())
}

/// Assembles rendered slides into a new deck snapshot.
///
/// Fills the resolved structure's placeholders in order: title text into
/// the title placeholder, body lines into body placeholders, images as
/// picture shapes. The JSON medium has no text layout engine, so
/// overflow handling stays with the pipeline.
pub struct JsonRenderer {
    output_path: PathBuf,
    deck: DeckDocument,
    next_shape_id: u32,
}

impl JsonRenderer {
    /// Create a renderer that will write its snapshot to `output_path`.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        let path = output_path.into();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Self {
            output_path: path,
            deck: DeckDocument::new(name),
            next_shape_id: 1,
        }
    }

    fn next_id(&mut self) -> u32 {
        self.next_shape_id += 1;
        self.next_shape_id
    }

    fn text_shape(&mut self, role: PlaceholderRole, paragraphs: Vec<Paragraph>) -> ShapeContent {
        let id = self.next_id();
        ShapeContent::Text(TextShape {
            shape_id: id,
            name: format!("{} {}", role, id),
            placeholder: Some(role),
            paragraphs,
        })
    }
}

impl SlideRenderer for JsonRenderer {
    fn supports_reflow(&self) -> bool {
        false
    }

    fn render(&mut self, plan: &RenderPlan) -> Result<()> {
        let mut slide = SlideContent::new(self.deck.slides.len() as u32 + 1);
        slide.layout_name = plan.structure.name.clone();

        if !plan.title_text.is_empty() {
            let paragraphs = vec![Paragraph::new(0, plan.title_text.clone())];
            let shape = self.text_shape(PlaceholderRole::Title, paragraphs);
            slide.shapes.push(shape);
        }
        if !plan.body_lines.is_empty() {
            let paragraphs = plan
                .body_lines
                .iter()
                .map(|(level, text)| Paragraph::new(*level, text.clone()))
                .collect();
            let shape = self.text_shape(PlaceholderRole::Body, paragraphs);
            slide.shapes.push(shape);
        }
        for image in &plan.images {
            let id = self.next_id();
            slide.shapes.push(ShapeContent::Picture(PictureShape {
                shape_id: id,
                name: format!("Picture {}", id),
                image_hash: image.image_hash.clone(),
            }));
        }
        slide.notes_text = plan.notes_text.clone();

        log::debug!(
            "rendered slide {} from {} slide {}",
            slide.index,
            plan.record.source_document,
            plan.record.source_slide_index
        );
        self.deck.slides.push(slide);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        save_deck(&self.output_path, &self.deck)
    }
}
