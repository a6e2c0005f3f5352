//! Semantic layout kinds and template layout resolution.
//!
//! Records ask for a `(style_group, layout_kind)` pair; the template
//! exposes concrete layout structures. Resolution maps one to the other
//! with an explicit strict/default fallback policy, then verifies the
//! resolved structure actually exposes every placeholder role the layout
//! kind requires. Rendering into the wrong placeholder corrupts output
//! unrecoverably, so the role check is an error in every mode.

use crate::doc::DeckDocument;
use crate::error::{Error, Result};
use crate::fingerprint::{normalize_simple_name, parse_tab_indented_lines};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Placeholder roles a layout structure can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderRole {
    Title,
    Subtitle,
    Body,
    Footer,
    Picture,
}

impl fmt::Display for PlaceholderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaceholderRole::Title => "title",
            PlaceholderRole::Subtitle => "subtitle",
            PlaceholderRole::Body => "body",
            PlaceholderRole::Footer => "footer",
            PlaceholderRole::Picture => "picture",
        };
        f.write_str(label)
    }
}

/// Semantic slide layout categories, independent of visual styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    Blank,
    TitleSlide,
    TitleOnly,
    TitleContent,
    TwoContent,
    CenteredText,
    Custom,
}

impl LayoutKind {
    /// All supported kinds, for error messages.
    pub const ALL: [LayoutKind; 7] = [
        LayoutKind::Blank,
        LayoutKind::TitleSlide,
        LayoutKind::TitleOnly,
        LayoutKind::TitleContent,
        LayoutKind::TwoContent,
        LayoutKind::CenteredText,
        LayoutKind::Custom,
    ];

    /// Canonical column value for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            LayoutKind::Blank => "blank",
            LayoutKind::TitleSlide => "title_slide",
            LayoutKind::TitleOnly => "title_only",
            LayoutKind::TitleContent => "title_content",
            LayoutKind::TwoContent => "two_content",
            LayoutKind::CenteredText => "centered_text",
            LayoutKind::Custom => "custom",
        }
    }

    /// Placeholder roles a structure must expose to render this kind.
    ///
    /// `TwoContent` appears twice for `Body` because it needs two body
    /// placeholders; the role check counts occurrences.
    pub fn required_roles(&self) -> &'static [PlaceholderRole] {
        match self {
            LayoutKind::Blank | LayoutKind::Custom => &[],
            LayoutKind::TitleSlide => &[PlaceholderRole::Title, PlaceholderRole::Subtitle],
            LayoutKind::TitleOnly => &[PlaceholderRole::Title],
            LayoutKind::TitleContent => &[PlaceholderRole::Title, PlaceholderRole::Body],
            LayoutKind::TwoContent => &[
                PlaceholderRole::Title,
                PlaceholderRole::Body,
                PlaceholderRole::Body,
            ],
            LayoutKind::CenteredText => &[PlaceholderRole::Body],
        }
    }

    /// Parse a layout name or alias into a kind, or `None` if unknown.
    ///
    /// Template layout names vary by authoring tool; the alias table maps
    /// the common spellings onto the canonical set.
    pub fn from_name(name: &str) -> Option<LayoutKind> {
        let key = normalize_layout_name(name);
        match key.as_str() {
            "blank" | "blank_slide" => Some(LayoutKind::Blank),
            "title" | "title_slide" => Some(LayoutKind::TitleSlide),
            "title_only" | "section_header" => Some(LayoutKind::TitleOnly),
            "title_content" | "title_and_content" | "content" | "title_and_object" => {
                Some(LayoutKind::TitleContent)
            }
            "two_content" | "title_2_content" | "title_and_2_content" | "two_column" => {
                Some(LayoutKind::TwoContent)
            }
            "centered_text" => Some(LayoutKind::CenteredText),
            "custom" => Some(LayoutKind::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for LayoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LayoutKind {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        LayoutKind::from_name(value).ok_or_else(|| {
            let supported = LayoutKind::ALL
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Error::Schema(format!(
                "unsupported layout_kind {:?} (supported: {})",
                value, supported
            ))
        })
    }
}

/// Normalize a layout name for alias matching.
fn normalize_layout_name(name: &str) -> String {
    let cleaned = name
        .trim()
        .to_lowercase()
        .replace(',', " ")
        .replace('/', " ")
        .replace('-', " ");
    cleaned.split_whitespace().collect::<Vec<_>>().join("_")
}

/// A concrete template layout a record can resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateStructure {
    /// Normalized style group (master) name.
    pub style_group: String,

    /// Semantic layout kind classified from the layout name.
    pub layout_kind: LayoutKind,

    /// Layout name as authored in the template.
    pub name: String,

    /// Placeholder roles the layout exposes, in template order.
    pub placeholders: Vec<PlaceholderRole>,
}

impl TemplateStructure {
    /// Verify the structure exposes every role `kind` requires.
    ///
    /// Missing roles are a [`Error::Structural`] regardless of mode.
    pub fn verify_roles(&self, kind: LayoutKind) -> Result<()> {
        let mut missing = Vec::new();
        let mut available: BTreeMap<String, usize> = BTreeMap::new();
        for role in &self.placeholders {
            *available.entry(role.to_string()).or_insert(0) += 1;
        }
        let mut needed: BTreeMap<String, usize> = BTreeMap::new();
        for role in kind.required_roles() {
            *needed.entry(role.to_string()).or_insert(0) += 1;
        }
        for (role, count) in &needed {
            let have = available.get(role).copied().unwrap_or(0);
            if have < *count {
                missing.push(role.clone());
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        Err(Error::Structural(format!(
            "layout {:?} ({}) is missing required placeholder(s) {} for layout_kind {}",
            self.name,
            self.style_group,
            missing.join(", "),
            kind
        )))
    }
}

/// Resolution policy for layout lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvePolicy {
    /// A missing pair is an error naming the pair.
    Strict,
    /// A missing pair falls back to the configured default pair; if that
    /// pair does not resolve either, it is an error.
    Default {
        fallback: Option<(String, LayoutKind)>,
    },
}

/// The `(style_group, layout_kind) -> structure` mapping table.
#[derive(Debug, Clone, Default)]
pub struct LayoutTable {
    map: BTreeMap<(String, LayoutKind), TemplateStructure>,
}

impl LayoutTable {
    /// Build the table from a template document's layout inventory.
    ///
    /// Layouts whose names do not classify to a known kind are skipped.
    /// Duplicate `(style_group, layout_kind)` pairs keep the first entry
    /// and warn (strict mode: error).
    pub fn from_template(template: &DeckDocument, strict: bool) -> Result<(Self, Vec<String>)> {
        let mut table = LayoutTable::default();
        let mut warnings = Vec::new();
        for layout in &template.layouts {
            let Some(kind) = LayoutKind::from_name(&layout.name) else {
                log::debug!("skipping unclassifiable layout {:?}", layout.name);
                continue;
            };
            let style_group = normalize_simple_name(&layout.master_name);
            let key = (style_group.clone(), kind);
            if table.map.contains_key(&key) {
                let message = format!(
                    "duplicate layout mapping for ({}, {})",
                    key.0, key.1
                );
                if strict {
                    return Err(Error::Schema(message));
                }
                warnings.push(message);
                continue;
            }
            table.map.insert(
                key,
                TemplateStructure {
                    style_group,
                    layout_kind: kind,
                    name: layout.name.clone(),
                    placeholders: layout.placeholders.clone(),
                },
            );
        }
        Ok((table, warnings))
    }

    /// Number of mapped pairs.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True when the table holds no mappings.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Resolve a `(style_group, layout_kind)` request to a structure.
    ///
    /// The resolved structure is always role-verified against `kind`
    /// before being returned.
    pub fn resolve(
        &self,
        style_group: &str,
        kind: LayoutKind,
        policy: &ResolvePolicy,
    ) -> Result<(&TemplateStructure, Vec<String>)> {
        let mut warnings = Vec::new();
        let key = (normalize_simple_name(style_group), kind);
        let structure = match self.map.get(&key) {
            Some(structure) => structure,
            None => {
                let missing = format!("layout ({}, {}) not found in template", key.0, key.1);
                match policy {
                    ResolvePolicy::Strict => return Err(Error::Reference(missing)),
                    ResolvePolicy::Default { fallback } => {
                        let Some((default_group, default_kind)) = fallback else {
                            return Err(Error::Reference(missing));
                        };
                        let default_key =
                            (normalize_simple_name(default_group), *default_kind);
                        let Some(structure) = self.map.get(&default_key) else {
                            return Err(Error::Reference(format!(
                                "{}; default layout ({}, {}) not found either",
                                missing, default_key.0, default_key.1
                            )));
                        };
                        warnings.push(format!(
                            "{}; falling back to ({}, {})",
                            missing, default_key.0, default_key.1
                        ));
                        structure
                    }
                }
            }
        };
        structure.verify_roles(kind)?;
        Ok((structure, warnings))
    }
}

/// Deterministic staged policy for text that may not fit its box.
#[derive(Debug, Clone)]
pub struct OverflowPolicy {
    /// Warn when a body block exceeds this many lines.
    pub max_lines: usize,

    /// Warn when any line exceeds this many characters.
    pub max_line_len: usize,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        Self {
            max_lines: 12,
            max_line_len: 90,
        }
    }
}

/// What the overflow check decided for one body block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverflowOutcome {
    /// The text fits the heuristics; nothing to do.
    Fits,
    /// The document layer will reflow; no local intervention.
    DeferToReflow,
    /// Heuristic warnings, text passed through unchanged.
    Warned(Vec<String>),
    /// Strict mode: text truncated with a visible marker.
    Truncated(String),
}

/// Marker appended when strict mode truncates overflowing text.
pub const TRUNCATION_MARKER: &str = "[truncated]";

impl OverflowPolicy {
    /// Run the staged overflow policy over one tab-indented body block.
    ///
    /// Stage 1: if the renderer can reflow, defer to it. Stage 2: heuristic
    /// warnings from line count and line length. Strict mode converts the
    /// warnings into truncation with a visible marker rather than silent
    /// loss.
    pub fn check(&self, body_text: &str, reflow_available: bool, strict: bool) -> OverflowOutcome {
        let lines = parse_tab_indented_lines(body_text, false, false);
        let mut warnings = Vec::new();
        if lines.len() > self.max_lines {
            warnings.push(format!(
                "body has {} lines (limit {})",
                lines.len(),
                self.max_lines
            ));
        }
        for (index, (_, text)) in lines.iter().enumerate() {
            if text.chars().count() > self.max_line_len {
                warnings.push(format!(
                    "line {} has {} characters (limit {})",
                    index + 1,
                    text.chars().count(),
                    self.max_line_len
                ));
            }
        }
        if warnings.is_empty() {
            return OverflowOutcome::Fits;
        }
        if reflow_available {
            return OverflowOutcome::DeferToReflow;
        }
        if !strict {
            return OverflowOutcome::Warned(warnings);
        }
        let mut kept: Vec<String> = Vec::new();
        for (level, text) in lines.iter().take(self.max_lines) {
            let mut line = text.clone();
            if line.chars().count() > self.max_line_len {
                line = line.chars().take(self.max_line_len).collect();
            }
            kept.push(format!("{}{}", "\t".repeat(*level), line));
        }
        kept.push(TRUNCATION_MARKER.to_string());
        OverflowOutcome::Truncated(kept.join("\n"))
    }
}
