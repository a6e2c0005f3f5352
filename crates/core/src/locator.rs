//! Resource locator resolution.
//!
//! Two concerns live here: the deterministic search order for relative file
//! references (source decks, templates, images on disk), and the compact
//! image locator token that addresses one picture inside one slide of one
//! source document.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Scheme prefix for image locator tokens.
const LOCATOR_SCHEME: &str = "pptx";

/// Outcome of trying one resolution level.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LevelResult {
    NotFound,
    Found(PathBuf),
    Ambiguous(Vec<PathBuf>),
}

/// Immediate subdirectories of a root, sorted for determinism.
fn list_subdirs(root: &Path) -> Vec<PathBuf> {
    let mut entries = Vec::new();
    let Ok(read_dir) = std::fs::read_dir(root) else {
        return entries;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.is_dir() {
            entries.push(path);
        }
    }
    entries.sort();
    entries
}

/// Probe one group of roots for the reference.
fn probe_level(roots: &[PathBuf], reference: &Path) -> LevelResult {
    let mut matches = Vec::new();
    for root in roots {
        let candidate = root.join(reference);
        if candidate.exists() {
            matches.push(candidate);
        }
    }
    matches.sort();
    match matches.len() {
        0 => LevelResult::NotFound,
        1 => LevelResult::Found(matches.remove(0)),
        _ => LevelResult::Ambiguous(matches),
    }
}

/// Resolve a relative file reference using the fixed search order.
///
/// Levels, tried in sequence, stopping at the first with any match:
/// 1. the working directory,
/// 2. its parent,
/// 3. its immediate subdirectories,
/// 4. the anchor directory (for example the CSV or patch file's directory),
/// 5. the anchor's parent,
/// 6. the anchor's immediate subdirectories.
///
/// No recursion beyond one level. Multiple matches at the stopping level
/// are an [`Error::Ambiguity`] in strict mode; in default mode the
/// lexicographically first path wins and a warning is returned.
///
/// Absolute references bypass the search entirely.
pub fn resolve_path_from(
    reference: &Path,
    cwd: &Path,
    anchor_dir: Option<&Path>,
    strict: bool,
) -> Result<(PathBuf, Vec<String>)> {
    if reference.as_os_str().is_empty() {
        return Err(Error::Reference("empty path reference".to_string()));
    }
    let mut warnings = Vec::new();
    if reference.is_absolute() {
        if reference.exists() {
            return Ok((reference.to_path_buf(), warnings));
        }
        return Err(Error::Reference(format!(
            "path not found: {}",
            reference.display()
        )));
    }

    // An explicit ordered strategy list, not nested conditionals.
    let mut levels: Vec<Vec<PathBuf>> = vec![
        vec![cwd.to_path_buf()],
        cwd.parent().map(|p| vec![p.to_path_buf()]).unwrap_or_default(),
        list_subdirs(cwd),
    ];
    if let Some(anchor) = anchor_dir {
        levels.push(vec![anchor.to_path_buf()]);
        levels.push(
            anchor
                .parent()
                .map(|p| vec![p.to_path_buf()])
                .unwrap_or_default(),
        );
        levels.push(list_subdirs(anchor));
    }

    for roots in &levels {
        match probe_level(roots, reference) {
            LevelResult::NotFound => continue,
            LevelResult::Found(path) => return Ok((path, warnings)),
            LevelResult::Ambiguous(matches) => {
                let listing = matches
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                if strict {
                    return Err(Error::Ambiguity(format!(
                        "multiple matches for {}: {}",
                        reference.display(),
                        listing
                    )));
                }
                warnings.push(format!(
                    "ambiguous matches for {}; using {}",
                    reference.display(),
                    matches[0].display()
                ));
                return Ok((matches[0].clone(), warnings));
            }
        }
    }
    Err(Error::Reference(format!(
        "path not found: {}",
        reference.display()
    )))
}

/// [`resolve_path_from`] anchored at the process working directory.
pub fn resolve_path(
    reference: &Path,
    anchor_dir: Option<&Path>,
    strict: bool,
) -> Result<(PathBuf, Vec<String>)> {
    let cwd = std::env::current_dir()?;
    resolve_path_from(reference, &cwd, anchor_dir, strict)
}

/// Address of one image inside one slide of one source document.
///
/// Rendered as `pptx:<document>#slide=<index>#shape_id=<id>`. Locators are
/// always paired positionally with an image content hash; the pairing is
/// validated, never assumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageLocator {
    /// Source document basename.
    pub source_document: String,

    /// 1-based slide index.
    pub slide_index: u32,

    /// Shape id of the picture within the slide.
    pub shape_id: u32,
}

impl ImageLocator {
    /// Create a locator for a picture shape.
    pub fn new(source_document: impl Into<String>, slide_index: u32, shape_id: u32) -> Self {
        Self {
            source_document: source_document.into(),
            slide_index,
            shape_id,
        }
    }
}

impl fmt::Display for ImageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}#slide={}#shape_id={}",
            LOCATOR_SCHEME, self.source_document, self.slide_index, self.shape_id
        )
    }
}

impl FromStr for ImageLocator {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let malformed = || Error::Schema(format!("malformed image locator: {}", value));
        let rest = value
            .strip_prefix(LOCATOR_SCHEME)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(malformed)?;
        let mut parts = rest.split('#');
        let document = parts.next().filter(|d| !d.is_empty()).ok_or_else(malformed)?;
        let slide_part = parts.next().ok_or_else(malformed)?;
        let shape_part = parts.next().ok_or_else(malformed)?;
        if parts.next().is_some() {
            return Err(malformed());
        }
        let slide_index = slide_part
            .strip_prefix("slide=")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v >= 1)
            .ok_or_else(malformed)?;
        let shape_id = shape_part
            .strip_prefix("shape_id=")
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(malformed)?;
        Ok(ImageLocator::new(document, slide_index, shape_id))
    }
}

impl TryFrom<String> for ImageLocator {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ImageLocator> for String {
    fn from(locator: ImageLocator) -> String {
        locator.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_locator_round_trip() {
        let locator = ImageLocator::new("deck.pptx", 12, 5);
        let token = locator.to_string();
        assert_eq!(token, "pptx:deck.pptx#slide=12#shape_id=5");
        assert_eq!(token.parse::<ImageLocator>().unwrap(), locator);
    }

    #[test]
    fn test_locator_rejects_malformed_tokens() {
        assert!("deck.pptx#slide=1#shape_id=2".parse::<ImageLocator>().is_err());
        assert!("pptx:deck.pptx#slide=0#shape_id=2"
            .parse::<ImageLocator>()
            .is_err());
        assert!("pptx:deck.pptx#slide=1".parse::<ImageLocator>().is_err());
        assert!("pptx:#slide=1#shape_id=2".parse::<ImageLocator>().is_err());
    }

    #[test]
    fn test_resolve_prefers_cwd_over_anchor() {
        let root = tempfile::tempdir().unwrap();
        let cwd = root.path().join("work");
        let anchor = root.path().join("anchor");
        std::fs::create_dir_all(&cwd).unwrap();
        std::fs::create_dir_all(&anchor).unwrap();
        touch(&cwd.join("deck.json"));
        touch(&anchor.join("deck.json"));

        let (resolved, warnings) =
            resolve_path_from(Path::new("deck.json"), &cwd, Some(&anchor), false).unwrap();
        assert_eq!(resolved, cwd.join("deck.json"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_resolve_searches_subdirs_one_level_only() {
        let root = tempfile::tempdir().unwrap();
        let cwd = root.path().join("work");
        let deep = cwd.join("sub").join("deeper");
        std::fs::create_dir_all(&deep).unwrap();
        touch(&cwd.join("sub").join("deck.json"));
        touch(&deep.join("other.json"));

        let (resolved, _) =
            resolve_path_from(Path::new("deck.json"), &cwd, None, false).unwrap();
        assert_eq!(resolved, cwd.join("sub").join("deck.json"));

        // Two levels down is out of reach.
        let err = resolve_path_from(Path::new("other.json"), &cwd, None, false);
        assert!(err.is_err());
    }

    #[test]
    fn test_ambiguous_matches_warn_or_fail() {
        let root = tempfile::tempdir().unwrap();
        let cwd = root.path().join("work");
        std::fs::create_dir_all(cwd.join("a")).unwrap();
        std::fs::create_dir_all(cwd.join("b")).unwrap();
        touch(&cwd.join("a").join("deck.json"));
        touch(&cwd.join("b").join("deck.json"));

        let (resolved, warnings) =
            resolve_path_from(Path::new("deck.json"), &cwd, None, false).unwrap();
        assert_eq!(resolved, cwd.join("a").join("deck.json"));
        assert_eq!(warnings.len(), 1);

        let strict = resolve_path_from(Path::new("deck.json"), &cwd, None, true);
        assert!(matches!(strict, Err(Error::Ambiguity(_))));
    }

    #[test]
    fn test_cwd_parent_is_searched_before_subdirs() {
        let root = tempfile::tempdir().unwrap();
        let cwd = root.path().join("nest").join("work");
        std::fs::create_dir_all(cwd.join("sub")).unwrap();
        touch(&root.path().join("nest").join("deck.json"));
        touch(&cwd.join("sub").join("deck.json"));

        let (resolved, warnings) =
            resolve_path_from(Path::new("deck.json"), &cwd, None, false).unwrap();
        assert_eq!(resolved, root.path().join("nest").join("deck.json"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_anchor_parent_is_searched() {
        let root = tempfile::tempdir().unwrap();
        let cwd = root.path().join("work");
        let anchor = root.path().join("anchor").join("sub");
        std::fs::create_dir_all(&cwd).unwrap();
        std::fs::create_dir_all(&anchor).unwrap();
        touch(&root.path().join("anchor").join("img.png"));

        let (resolved, _) =
            resolve_path_from(Path::new("img.png"), &cwd, Some(&anchor), false).unwrap();
        assert_eq!(resolved, root.path().join("anchor").join("img.png"));
    }

    #[test]
    fn test_anchor_levels_follow_cwd_levels() {
        let root = tempfile::tempdir().unwrap();
        let cwd = root.path().join("work");
        let anchor = root.path().join("anchor");
        std::fs::create_dir_all(&cwd).unwrap();
        std::fs::create_dir_all(anchor.join("assets")).unwrap();
        touch(&anchor.join("assets").join("img.png"));

        let (resolved, _) =
            resolve_path_from(Path::new("img.png"), &cwd, Some(&anchor), false).unwrap();
        assert_eq!(resolved, anchor.join("assets").join("img.png"));
    }

    #[test]
    fn test_missing_everywhere_is_reference_error() {
        let root = tempfile::tempdir().unwrap();
        let err = resolve_path_from(Path::new("nope.json"), root.path(), None, false);
        assert!(matches!(err, Err(Error::Reference(_))));
    }
}
