//! Value snapshot types for deck content and the document I/O boundary.
//!
//! The core never reads a presentation's native binary representation.
//! Document adapters load decks into these value records, and the core
//! resolves back to live content by key (document + slide index + box id)
//! at consumption time, never through retained references.

use crate::error::Result;
use crate::fingerprint;
use crate::layout::PlaceholderRole;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A loaded deck: one source document's slides plus its layout inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckDocument {
    /// Source document basename (identity key for records and locators).
    pub name: String,

    /// Slides in document order.
    pub slides: Vec<SlideContent>,

    /// Layout structures the document's template exposes.
    #[serde(default)]
    pub layouts: Vec<LayoutDef>,
}

impl DeckDocument {
    /// Create an empty deck with the given basename.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slides: Vec::new(),
            layouts: Vec::new(),
        }
    }

    /// Find a slide by its 1-based index.
    pub fn slide(&self, index: u32) -> Option<&SlideContent> {
        self.slides.iter().find(|s| s.index == index)
    }

    /// Find a slide mutably by its 1-based index.
    pub fn slide_mut(&mut self, index: u32) -> Option<&mut SlideContent> {
        self.slides.iter_mut().find(|s| s.index == index)
    }
}

/// A layout exposed by a deck's template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutDef {
    /// Layout name as named in the template.
    pub name: String,

    /// Master (style group) the layout belongs to.
    pub master_name: String,

    /// Placeholder roles the layout provides, in template order.
    #[serde(default)]
    pub placeholders: Vec<PlaceholderRole>,
}

/// One slide's content snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideContent {
    /// 1-based slide index within the source document.
    pub index: u32,

    /// Name of the layout this slide was built from.
    #[serde(default)]
    pub layout_name: String,

    /// Shapes in reading order.
    #[serde(default)]
    pub shapes: Vec<ShapeContent>,

    /// Speaker notes text.
    #[serde(default)]
    pub notes_text: String,
}

impl SlideContent {
    /// Create an empty slide with the given 1-based index.
    pub fn new(index: u32) -> Self {
        Self {
            index,
            layout_name: String::new(),
            shapes: Vec::new(),
            notes_text: String::new(),
        }
    }

    /// Text shapes in reading order, descending into groups depth-first.
    pub fn text_shapes(&self) -> Vec<&TextShape> {
        let mut out = Vec::new();
        collect_text_shapes(&self.shapes, &mut out);
        out
    }

    /// Picture shapes in reading order, descending into groups depth-first.
    pub fn pictures(&self) -> Vec<&PictureShape> {
        let mut out = Vec::new();
        collect_pictures(&self.shapes, &mut out);
        out
    }

    /// Title text from the first title placeholder, if any.
    pub fn title_text(&self) -> String {
        self.text_shapes()
            .iter()
            .find(|s| s.placeholder == Some(PlaceholderRole::Title))
            .map(|s| s.text_block())
            .unwrap_or_default()
    }

    /// Body text: every non-title text block, tab-indented, joined by
    /// newlines.
    pub fn body_text(&self) -> String {
        let mut seen_title = false;
        let mut lines = Vec::new();
        for shape in self.text_shapes() {
            if !seen_title && shape.placeholder == Some(PlaceholderRole::Title) {
                seen_title = true;
                continue;
            }
            let block = shape.text_block();
            if !block.is_empty() {
                lines.push(block);
            }
        }
        lines.join("\n")
    }

    /// Ordered text-block payload for slide fingerprinting.
    ///
    /// Shape ids and the slide index are deliberately excluded so the
    /// fingerprint survives re-saving the document.
    pub fn content_text(&self) -> String {
        let mut blocks = Vec::new();
        for shape in self.text_shapes() {
            let block = shape.text_block();
            if !block.is_empty() {
                blocks.push(block);
            }
        }
        blocks.join("\n")
    }

    /// Recompute this slide's content fingerprint.
    pub fn fingerprint(&self) -> String {
        fingerprint::slide_fingerprint(&self.content_text(), &self.notes_text)
    }
}

fn collect_text_shapes<'a>(shapes: &'a [ShapeContent], out: &mut Vec<&'a TextShape>) {
    for shape in shapes {
        match shape {
            ShapeContent::Text(text) => out.push(text),
            ShapeContent::Group(group) => collect_text_shapes(&group.shapes, out),
            ShapeContent::Picture(_) | ShapeContent::Other(_) => {}
        }
    }
}

fn collect_pictures<'a>(shapes: &'a [ShapeContent], out: &mut Vec<&'a PictureShape>) {
    for shape in shapes {
        match shape {
            ShapeContent::Picture(picture) => out.push(picture),
            ShapeContent::Group(group) => collect_pictures(&group.shapes, out),
            ShapeContent::Text(_) | ShapeContent::Other(_) => {}
        }
    }
}

/// A shape on a slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeContent {
    /// A text-bearing shape (placeholder or plain text box).
    Text(TextShape),
    /// A picture shape; the boundary hands the core its content hash,
    /// never the blob.
    Picture(PictureShape),
    /// A group of nested shapes.
    Group(GroupShape),
    /// Anything else (tables, charts, decorations).
    Other(OtherShape),
}

impl ShapeContent {
    /// Coarse kind label used for the `asset_kinds` context column.
    pub fn kind_label(&self) -> &'static str {
        match self {
            ShapeContent::Text(text) => {
                if text.placeholder.is_some() {
                    "placeholder"
                } else {
                    "textbox"
                }
            }
            ShapeContent::Picture(_) => "picture",
            ShapeContent::Group(_) => "group",
            ShapeContent::Other(_) => "shape",
        }
    }
}

/// A text-bearing shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextShape {
    /// Internal shape id. Volatile: excluded from fingerprints, used only
    /// for positional box-id guards.
    pub shape_id: u32,

    /// Shape name as authored in the document.
    #[serde(default)]
    pub name: String,

    /// Placeholder role, if the shape is a placeholder.
    #[serde(default)]
    pub placeholder: Option<PlaceholderRole>,

    /// Paragraphs in order.
    #[serde(default)]
    pub paragraphs: Vec<Paragraph>,
}

impl TextShape {
    /// Render the shape's paragraphs as a tab-indented text block,
    /// skipping empty paragraphs.
    pub fn text_block(&self) -> String {
        let mut lines = Vec::new();
        for paragraph in &self.paragraphs {
            let text = paragraph.text.trim();
            if text.is_empty() {
                continue;
            }
            lines.push(format!("{}{}", "\t".repeat(paragraph.level), text));
        }
        lines.join("\n")
    }
}

/// One paragraph of a text shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Bullet nesting level, 0-based.
    #[serde(default)]
    pub level: usize,

    /// Paragraph text. Empty means a blank line.
    pub text: String,
}

impl Paragraph {
    /// Create a paragraph at the given nesting level.
    pub fn new(level: usize, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// A picture shape, reduced to its identity and content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PictureShape {
    /// Internal shape id, used in image locators.
    pub shape_id: u32,

    /// Shape name as authored in the document.
    #[serde(default)]
    pub name: String,

    /// Content hash of the image blob, computed by the document layer.
    pub image_hash: String,
}

/// A group of nested shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupShape {
    /// Internal shape id.
    pub shape_id: u32,

    /// Nested shapes in order.
    #[serde(default)]
    pub shapes: Vec<ShapeContent>,
}

/// Any other shape kind the core does not interpret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtherShape {
    /// Internal shape id.
    pub shape_id: u32,

    /// Shape name as authored in the document.
    #[serde(default)]
    pub name: String,
}

/// Loads deck snapshots from disk. Implemented by document adapters.
pub trait DeckLoader {
    /// Load a deck snapshot from a path.
    fn load(&self, path: &Path) -> Result<DeckDocument>;
}
