//! The text-edit patch file and its hash-guarded application engine.
//!
//! A patch file addresses text blocks by a composite key (source document,
//! slide index, box id) and records the fingerprints content had at export
//! time. Application re-verifies every fingerprint against the live deck
//! before touching anything: stale patches skip with a report instead of
//! silently overwriting newer edits.

use crate::doc::{DeckDocument, Paragraph, ShapeContent, SlideContent};
use crate::error::{Error, Result};
use crate::fingerprint::{
    guard_hash, normalize_simple_name, parse_tab_indented_lines, text_fingerprint,
};
use crate::fsutil::write_atomic;
use crate::layout::PlaceholderRole;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// The only patch file version this engine understands.
pub const PATCH_VERSION: u32 = 1;

/// Default cap on bullet nesting depth.
pub const DEFAULT_MAX_BULLET_DEPTH: usize = 4;

/// Identity of an addressable text block within a slide.
///
/// Derived deterministically at export time: a known placeholder role if
/// the shape is classifiable, else its normalized shape name, else a
/// positional fallback guarded by its own short hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BoxId {
    /// Placeholder role id: `title`, `subtitle`, `body_2`, `footer`,
    /// `notes`, with an optional `_N` uniqueness suffix.
    Placeholder(String),

    /// Normalized shape name of a non-placeholder text box.
    ShapeName(String),

    /// Positional fallback for unnamed shapes; the guard hash pins the
    /// id to the shape it was derived from.
    Positional { index: u32, guard: String },
}

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoxId::Placeholder(role) => f.write_str(role),
            BoxId::ShapeName(name) => f.write_str(name),
            BoxId::Positional { index, guard } => write!(f, "box_{}_{}", index, guard),
        }
    }
}

fn is_role_id(value: &str) -> bool {
    let base = match value.rfind('_') {
        // A trailing _N uniqueness suffix is part of the role id.
        Some(pos) if value[pos + 1..].chars().all(|c| c.is_ascii_digit()) => &value[..pos],
        _ => value,
    };
    matches!(base, "title" | "subtitle" | "footer" | "notes" | "body")
}

impl FromStr for BoxId {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        if value.is_empty() {
            return Err(Error::Schema("empty box_id".to_string()));
        }
        if let Some(rest) = value.strip_prefix("box_") {
            if let Some((index, guard)) = rest.split_once('_') {
                let guard_ok = guard.len() == 8
                    && guard.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
                if let (Ok(index), true) = (index.parse::<u32>(), guard_ok) {
                    return Ok(BoxId::Positional {
                        index,
                        guard: guard.to_string(),
                    });
                }
            }
        }
        if is_role_id(value) {
            return Ok(BoxId::Placeholder(value.to_string()));
        }
        Ok(BoxId::ShapeName(value.to_string()))
    }
}

impl TryFrom<String> for BoxId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<BoxId> for String {
    fn from(id: BoxId) -> String {
        id.to_string()
    }
}

/// One bullet-tree node: a plain string is one bullet at the current
/// nesting level, a nested list pushes its children one level deeper, and
/// an empty string is a blank line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BulletNode {
    Text(String),
    List(Vec<BulletNode>),
}

/// One addressed text-block edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxPatch {
    /// Which box inside the slide this patch targets.
    pub box_id: BoxId,

    /// Fingerprint the box content had at export time.
    pub text_hash_before: String,

    /// Flat replacement text (tab-indented lines). Exactly one of `text`
    /// and `bullets` must be present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Nested bullet replacement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bullets: Option<Vec<BulletNode>>,

    /// Locked boxes are never rewritten, hash state notwithstanding.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub locked: bool,

    /// Free-form editing status; `locked` here is honored like the flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_status: Option<String>,

    /// Context: original shape name at export time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_name: Option<String>,

    /// Context: placeholder type label at export time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder_type: Option<String>,
}

impl BoxPatch {
    /// Whether this box must not be rewritten.
    pub fn is_locked(&self) -> bool {
        self.locked || self.edit_status.as_deref() == Some("locked")
    }
}

/// All box edits for one slide, guarded by the slide's fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidePatch {
    /// 1-based slide index in the source document.
    pub source_slide_index: u32,

    /// Slide fingerprint at export time.
    pub slide_hash: String,

    /// Box edits in export order.
    pub boxes: Vec<BoxPatch>,
}

/// A whole patch file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchFile {
    /// Format version; only [`PATCH_VERSION`] is accepted.
    pub version: u32,

    /// Source document basename the patches address.
    pub source_document: String,

    /// Slide patches in export order.
    pub patches: Vec<SlidePatch>,
}

impl PatchFile {
    /// Total number of box patches across all slides.
    pub fn box_count(&self) -> usize {
        self.patches.iter().map(|p| p.boxes.len()).sum()
    }

    /// Structural validation, run before any mutation.
    ///
    /// Schema violations here are fatal: the file is rejected outright
    /// instead of applying half of it.
    pub fn validate(&self) -> Result<()> {
        if self.version != PATCH_VERSION {
            return Err(Error::Schema(format!(
                "unsupported patch file version {} (expected {})",
                self.version, PATCH_VERSION
            )));
        }
        if self.source_document.is_empty() {
            return Err(Error::Schema("patch file missing source_document".to_string()));
        }
        for patch in &self.patches {
            if patch.source_slide_index < 1 {
                return Err(Error::Schema(format!(
                    "slide patch has invalid source_slide_index {}",
                    patch.source_slide_index
                )));
            }
            for entry in &patch.boxes {
                if entry.text.is_none() && entry.bullets.is_none() {
                    return Err(Error::Schema(format!(
                        "slide {} box {} has neither text nor bullets",
                        patch.source_slide_index, entry.box_id
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Read and structurally validate a patch file.
pub fn read_patch_file(path: &Path) -> Result<PatchFile> {
    if !path.exists() {
        return Err(Error::Reference(format!(
            "patch file not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    let patch: PatchFile = serde_yaml::from_str(&content)?;
    patch.validate()?;
    Ok(patch)
}

/// Write a patch file with a staged atomic replace.
pub fn write_patch_file(path: &Path, patch: &PatchFile) -> Result<()> {
    let content = serde_yaml::to_string(patch)?;
    write_atomic(path, content.as_bytes())
}

/// Which placeholder kinds box discovery should include.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxOptions {
    /// Include subtitle placeholders.
    pub include_subtitle: bool,

    /// Include footer placeholders.
    pub include_footer: bool,
}

/// A discovered text box: its id and the top-level shape position it
/// resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBoxEntry {
    /// Stable box id.
    pub box_id: BoxId,

    /// Index into the slide's top-level shape list.
    pub shape_pos: usize,
}

fn ensure_unique(candidate: String, used: &mut Vec<String>) -> String {
    if !used.contains(&candidate) {
        used.push(candidate.clone());
        return candidate;
    }
    let mut counter = 2;
    loop {
        let suffixed = format!("{}_{}", candidate, counter);
        if !used.contains(&suffixed) {
            used.push(suffixed.clone());
            return suffixed;
        }
        counter += 1;
    }
}

/// Discover the addressable text boxes of a slide.
///
/// Placeholder shapes are preferred; only when a slide has no usable
/// placeholders does discovery fall back to plain text shapes (by
/// normalized name, then positionally). Returns the entries and whether
/// the fallback path was used. Discovery looks at top-level shapes only;
/// grouped text is not addressable.
pub fn collect_text_boxes(slide: &SlideContent, options: BoxOptions) -> (Vec<TextBoxEntry>, bool) {
    let mut entries = Vec::new();
    let mut used: Vec<String> = Vec::new();
    let mut body_count = 0u32;

    for (pos, shape) in slide.shapes.iter().enumerate() {
        let ShapeContent::Text(text) = shape else {
            continue;
        };
        let Some(role) = text.placeholder else {
            continue;
        };
        let candidate = match role {
            PlaceholderRole::Title => Some("title".to_string()),
            PlaceholderRole::Subtitle if options.include_subtitle => {
                Some("subtitle".to_string())
            }
            PlaceholderRole::Body => {
                body_count += 1;
                Some(format!("body_{}", body_count))
            }
            PlaceholderRole::Footer if options.include_footer => Some("footer".to_string()),
            _ => None,
        };
        let Some(candidate) = candidate else {
            continue;
        };
        let unique = ensure_unique(candidate, &mut used);
        entries.push(TextBoxEntry {
            box_id: BoxId::Placeholder(unique),
            shape_pos: pos,
        });
    }
    if !entries.is_empty() {
        return (entries, false);
    }

    let mut fallback_index = 0u32;
    for (pos, shape) in slide.shapes.iter().enumerate() {
        let ShapeContent::Text(text) = shape else {
            continue;
        };
        if text.placeholder.is_some() {
            continue;
        }
        let normalized = normalize_shape_name(&text.name);
        let box_id = if normalized.is_empty() {
            fallback_index += 1;
            let guard_source = if text.shape_id > 0 {
                text.shape_id.to_string()
            } else {
                fallback_index.to_string()
            };
            BoxId::Positional {
                index: fallback_index,
                guard: guard_hash(&guard_source),
            }
        } else {
            BoxId::ShapeName(ensure_unique(normalized, &mut used))
        };
        entries.push(TextBoxEntry { box_id, shape_pos: pos });
    }
    (entries, true)
}

/// Normalize a shape name into a stable id fragment.
fn normalize_shape_name(name: &str) -> String {
    let simple = normalize_simple_name(name);
    let mut out = String::with_capacity(simple.len());
    let mut last_was_sep = true;
    for c in simple.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    out.trim_matches('_').to_string()
}

/// Export options.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportOptions {
    /// Add a `notes` box per slide carrying the speaker notes.
    pub include_notes: bool,

    /// Placeholder inclusion flags, shared with application.
    pub boxes: BoxOptions,
}

/// Export a deck snapshot to a patch file.
///
/// Slides with no addressable text boxes are omitted. The second return
/// value lists the slides that needed fallback shape matching.
pub fn export_patches(deck: &DeckDocument, options: ExportOptions) -> (PatchFile, Vec<u32>) {
    let mut patches = Vec::new();
    let mut fallback_slides = Vec::new();
    for slide in &deck.slides {
        let (entries, used_fallback) = collect_text_boxes(slide, options.boxes);
        if used_fallback && !entries.is_empty() {
            fallback_slides.push(slide.index);
        }
        let mut boxes = Vec::new();
        for entry in entries {
            let ShapeContent::Text(text) = &slide.shapes[entry.shape_pos] else {
                continue;
            };
            let block = text.text_block();
            boxes.push(BoxPatch {
                box_id: entry.box_id,
                text_hash_before: text_fingerprint(&block),
                text: Some(block),
                bullets: None,
                locked: false,
                edit_status: None,
                shape_name: Some(text.name.clone()).filter(|n| !n.is_empty()),
                placeholder_type: text.placeholder.map(|r| r.to_string()),
            });
        }
        if options.include_notes {
            boxes.push(BoxPatch {
                box_id: BoxId::Placeholder("notes".to_string()),
                text_hash_before: text_fingerprint(&slide.notes_text),
                text: Some(slide.notes_text.clone()),
                bullets: None,
                locked: false,
                edit_status: None,
                shape_name: None,
                placeholder_type: Some("notes".to_string()),
            });
        }
        if boxes.is_empty() {
            continue;
        }
        patches.push(SlidePatch {
            source_slide_index: slide.index,
            slide_hash: slide.fingerprint(),
            boxes,
        });
    }
    (
        PatchFile {
            version: PATCH_VERSION,
            source_document: deck.name.clone(),
            patches,
        },
        fallback_slides,
    )
}

/// Why a box patch was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The box is marked locked.
    Locked,
    /// The slide's recomputed fingerprint disagrees with the patch.
    SlideMismatch,
    /// The box's recomputed fingerprint disagrees with the patch.
    BoxMismatch,
    /// Slide or box could not be located.
    Missing,
    /// The replacement bullet tree exceeds the nesting cap.
    DepthExceeded,
}

/// Terminal state of one box patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoxOutcome {
    /// Replacement applied. `changed` is false when the new content
    /// fingerprints equal to the old (an idempotent no-op, not an error).
    Updated { changed: bool },
    /// Skipped; the reason selects the summary bucket.
    Skipped(SkipReason),
}

/// One line of the apply report.
#[derive(Debug, Clone)]
pub struct PatchEntryReport {
    /// 1-based slide index the entry addressed.
    pub slide_index: u32,

    /// Box id the entry addressed.
    pub box_id: BoxId,

    /// Terminal state.
    pub outcome: BoxOutcome,

    /// Human-readable detail (diagnostic excerpt, reason text).
    pub detail: Option<String>,
}

/// Aggregate counts for an apply run. Always sums to the input box count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub updated: usize,
    /// Subset of `updated` whose content was already identical.
    pub unchanged: usize,
    pub skipped_locked: usize,
    pub skipped_mismatch: usize,
    pub skipped_missing: usize,
    pub skipped_invalid: usize,
}

impl ApplySummary {
    /// Total number of accounted box patches.
    pub fn total(&self) -> usize {
        self.updated
            + self.skipped_locked
            + self.skipped_mismatch
            + self.skipped_missing
            + self.skipped_invalid
    }

    fn record(&mut self, outcome: &BoxOutcome) {
        match outcome {
            BoxOutcome::Updated { changed } => {
                self.updated += 1;
                if !changed {
                    self.unchanged += 1;
                }
            }
            BoxOutcome::Skipped(SkipReason::Locked) => self.skipped_locked += 1,
            BoxOutcome::Skipped(SkipReason::SlideMismatch)
            | BoxOutcome::Skipped(SkipReason::BoxMismatch) => self.skipped_mismatch += 1,
            BoxOutcome::Skipped(SkipReason::Missing) => self.skipped_missing += 1,
            BoxOutcome::Skipped(SkipReason::DepthExceeded) => self.skipped_invalid += 1,
        }
    }
}

impl fmt::Display for ApplySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "updated={} (unchanged={}) skipped-locked={} skipped-mismatch={} \
             skipped-missing={} skipped-invalid={}",
            self.updated,
            self.unchanged,
            self.skipped_locked,
            self.skipped_mismatch,
            self.skipped_missing,
            self.skipped_invalid
        )
    }
}

/// Full apply report: per-entry states plus the aggregate summary.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    pub entries: Vec<PatchEntryReport>,
    pub summary: ApplySummary,
}

impl ApplyReport {
    fn push(&mut self, entry: PatchEntryReport) {
        self.summary.record(&entry.outcome);
        self.entries.push(entry);
    }
}

/// Apply options.
#[derive(Debug, Clone, Copy)]
pub struct ApplyOptions {
    /// Apply edits even when slide or box fingerprints mismatch.
    pub force: bool,

    /// Placeholder inclusion flags, mirroring export.
    pub boxes: BoxOptions,

    /// Maximum bullet nesting depth.
    pub max_bullet_depth: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            force: false,
            boxes: BoxOptions::default(),
            max_bullet_depth: DEFAULT_MAX_BULLET_DEPTH,
        }
    }
}

/// What a verified box patch will mutate.
#[derive(Debug)]
enum TargetRef {
    /// Top-level shape position within the slide.
    Shape(usize),
    /// The slide's speaker notes.
    Notes,
}

/// Proof that a box patch passed verification.
///
/// Only [`verify_box`] constructs this, and [`apply_verified`] is the only
/// way to mutate deck content, so applying an unverified patch is not
/// expressible.
#[derive(Debug)]
pub struct VerifiedTarget {
    slide_pos: usize,
    target: TargetRef,
    paragraphs: Vec<Paragraph>,
    changed: bool,
}

/// Render replacement paragraphs from a box patch.
///
/// Depth violations are rejected here, before any mutation.
fn build_paragraphs(
    entry: &BoxPatch,
    max_depth: usize,
) -> std::result::Result<Vec<Paragraph>, String> {
    if let Some(bullets) = &entry.bullets {
        let mut out = Vec::new();
        flatten_bullets(bullets, 0, max_depth, &mut out)?;
        return Ok(out);
    }
    let text = entry.text.as_deref().unwrap_or_default();
    let mut out = Vec::new();
    for (level, line) in parse_tab_indented_lines(text, true, true) {
        if level >= max_depth {
            return Err(format!(
                "indent level {} exceeds maximum depth {}",
                level + 1,
                max_depth
            ));
        }
        out.push(Paragraph::new(level, line));
    }
    Ok(out)
}

fn flatten_bullets(
    nodes: &[BulletNode],
    level: usize,
    max_depth: usize,
    out: &mut Vec<Paragraph>,
) -> std::result::Result<(), String> {
    if level >= max_depth {
        return Err(format!(
            "bullet nesting {} exceeds maximum depth {}",
            level + 1,
            max_depth
        ));
    }
    for node in nodes {
        match node {
            BulletNode::Text(text) => out.push(Paragraph::new(level, text.clone())),
            BulletNode::List(children) => {
                flatten_bullets(children, level + 1, max_depth, out)?;
            }
        }
    }
    Ok(())
}

/// Short diagnostic excerpt of current content for mismatch reports.
fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " / ");
    let mut out: String = flat.chars().take(48).collect();
    if flat.chars().count() > 48 {
        out.push('…');
    }
    out
}

/// Tab-indented rendering of replacement paragraphs, for fingerprints.
fn paragraphs_block(paragraphs: &[Paragraph]) -> String {
    paragraphs
        .iter()
        .map(|p| format!("{}{}", "\t".repeat(p.level), p.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Verify one box patch against the live deck.
///
/// Runs the per-box half of the state machine: locate, locked check,
/// fingerprint guard, depth validation. On success the returned token is
/// the only capability that lets [`apply_verified`] mutate the box.
fn verify_box(
    deck: &DeckDocument,
    slide_pos: usize,
    boxes: &HashMap<String, usize>,
    entry: &BoxPatch,
    options: &ApplyOptions,
) -> std::result::Result<VerifiedTarget, (SkipReason, Option<String>)> {
    if entry.is_locked() {
        return Err((SkipReason::Locked, None));
    }
    let slide = &deck.slides[slide_pos];

    let (target, current_block) = if entry.box_id == BoxId::Placeholder("notes".to_string()) {
        (TargetRef::Notes, slide.notes_text.clone())
    } else {
        let Some(&shape_pos) = boxes.get(&entry.box_id.to_string()) else {
            return Err((SkipReason::Missing, Some("box not found in slide".to_string())));
        };
        let ShapeContent::Text(text) = &slide.shapes[shape_pos] else {
            return Err((SkipReason::Missing, Some("box is not a text shape".to_string())));
        };
        (TargetRef::Shape(shape_pos), text.text_block())
    };

    let current_hash = text_fingerprint(&current_block);
    if current_hash != entry.text_hash_before && !options.force {
        return Err((
            SkipReason::BoxMismatch,
            Some(format!(
                "recorded {}, current {} ({})",
                entry.text_hash_before,
                current_hash,
                excerpt(&current_block)
            )),
        ));
    }

    let paragraphs = match build_paragraphs(entry, options.max_bullet_depth) {
        Ok(paragraphs) => paragraphs,
        Err(reason) => return Err((SkipReason::DepthExceeded, Some(reason))),
    };
    let changed = text_fingerprint(&paragraphs_block(&paragraphs)) != current_hash;

    Ok(VerifiedTarget {
        slide_pos,
        target,
        paragraphs,
        changed,
    })
}

/// Apply a verified replacement. Terminal `Applied` state.
fn apply_verified(deck: &mut DeckDocument, verified: VerifiedTarget) -> BoxOutcome {
    let changed = verified.changed;
    let slide = &mut deck.slides[verified.slide_pos];
    match verified.target {
        TargetRef::Notes => {
            slide.notes_text = paragraphs_block(&verified.paragraphs);
        }
        TargetRef::Shape(pos) => {
            if let ShapeContent::Text(text) = &mut slide.shapes[pos] {
                text.paragraphs = verified.paragraphs;
            }
        }
    }
    BoxOutcome::Updated { changed }
}

/// Apply a patch file to a deck snapshot.
///
/// Each box patch resolves to exactly one terminal state, and the summary
/// counts sum to the patch file's box count. Slide fingerprints are
/// verified once per slide patch before its boxes are considered.
pub fn apply_patches(
    deck: &mut DeckDocument,
    patch: &PatchFile,
    options: &ApplyOptions,
) -> Result<ApplyReport> {
    patch.validate()?;
    if patch.source_document != deck.name {
        return Err(Error::Reference(format!(
            "patch addresses {:?} but deck is {:?}",
            patch.source_document, deck.name
        )));
    }

    let mut report = ApplyReport::default();
    for slide_patch in &patch.patches {
        let slide_pos = deck
            .slides
            .iter()
            .position(|s| s.index == slide_patch.source_slide_index);
        let Some(slide_pos) = slide_pos else {
            for entry in &slide_patch.boxes {
                report.push(PatchEntryReport {
                    slide_index: slide_patch.source_slide_index,
                    box_id: entry.box_id.clone(),
                    outcome: BoxOutcome::Skipped(SkipReason::Missing),
                    detail: Some("slide not found".to_string()),
                });
            }
            continue;
        };

        let current_slide_hash = deck.slides[slide_pos].fingerprint();
        if current_slide_hash != slide_patch.slide_hash && !options.force {
            for entry in &slide_patch.boxes {
                report.push(PatchEntryReport {
                    slide_index: slide_patch.source_slide_index,
                    box_id: entry.box_id.clone(),
                    outcome: BoxOutcome::Skipped(SkipReason::SlideMismatch),
                    detail: Some(format!(
                        "slide hash recorded {}, current {}",
                        slide_patch.slide_hash, current_slide_hash
                    )),
                });
            }
            continue;
        }

        let (entries, _) = collect_text_boxes(&deck.slides[slide_pos], options.boxes);
        let boxes: HashMap<String, usize> = entries
            .into_iter()
            .map(|e| (e.box_id.to_string(), e.shape_pos))
            .collect();

        for entry in &slide_patch.boxes {
            let result = verify_box(deck, slide_pos, &boxes, entry, options);
            let (outcome, detail) = match result {
                Ok(verified) => (apply_verified(deck, verified), None),
                Err((reason, detail)) => (BoxOutcome::Skipped(reason), detail),
            };
            if let BoxOutcome::Skipped(reason) = &outcome {
                log::debug!(
                    "slide {} box {}: skipped ({:?})",
                    slide_patch.source_slide_index,
                    entry.box_id,
                    reason
                );
            }
            report.push(PatchEntryReport {
                slide_index: slide_patch.source_slide_index,
                box_id: entry.box_id.clone(),
                outcome,
                detail,
            });
        }
    }
    Ok(report)
}
