//! Content fingerprinting for drift detection.
//!
//! Every artifact in the pipeline (index rows, patch guards, apply-time
//! verification) compares content through the one normalization and hashing
//! recipe defined here. The fingerprint is a truncated cryptographic digest:
//! a hash match means "probably unchanged", never proof.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::LazyLock;

/// Number of hex characters kept from the full SHA-256 digest (64 bits).
pub const FINGERPRINT_LEN: usize = 16;

/// Hex length of the positional box-id guard hash.
pub const GUARD_LEN: usize = 8;

/// Regex to collapse inner whitespace runs to single spaces.
static WHITESPACE_COLLAPSE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

/// Normalize text for hashing and comparison.
///
/// - Normalizes `\r\n` and `\r` line endings to `\n`
/// - Drops blank lines
/// - Preserves leading-tab indentation levels
/// - Collapses inner whitespace runs to single spaces and trims each line
///
/// Indexing, export, validation, and patch verification all hash through
/// this function; any divergence would break hash comparability.
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let cleaned = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines = Vec::new();
    for raw_line in cleaned.split('\n') {
        if raw_line.trim().is_empty() {
            continue;
        }
        let leading_tabs = raw_line.len() - raw_line.trim_start_matches('\t').len();
        let content = raw_line.trim_start_matches('\t').trim();
        let collapsed = WHITESPACE_COLLAPSE_REGEX.replace_all(content, " ");
        lines.push(format!("{}{}", "\t".repeat(leading_tabs), collapsed));
    }
    lines.join("\n")
}

/// Normalize a name for simple matching: trimmed, lowercased, spaces to
/// underscores. Used for style-group (master) names and shape names.
pub fn normalize_simple_name(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    value.trim().to_lowercase().replace(' ', "_")
}

/// Parse text into `(indent_level, text)` lines using leading tabs.
///
/// Shared by indexing (body text), patch application (flat `text` form),
/// and overflow heuristics.
pub fn parse_tab_indented_lines(
    text_value: &str,
    keep_blank_lines: bool,
    strip_text: bool,
) -> Vec<(usize, String)> {
    if text_value.is_empty() {
        return Vec::new();
    }
    let cleaned = text_value.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines = Vec::new();
    for raw_line in cleaned.split('\n') {
        if raw_line.is_empty() {
            if keep_blank_lines {
                lines.push((0, String::new()));
            }
            continue;
        }
        if !keep_blank_lines && raw_line.trim().is_empty() {
            continue;
        }
        let level = raw_line.len() - raw_line.trim_start_matches('\t').len();
        let mut text = raw_line.trim_start_matches('\t').to_string();
        if strip_text {
            text = text.trim().to_string();
        }
        lines.push((level, text));
    }
    lines
}

/// Hash a string to a 16-hex-character fingerprint.
///
/// Full SHA-256, truncated to the first 64 bits. Collisions are possible at
/// negligible probability; callers must treat a match as drift evidence,
/// not identity proof.
pub fn hash_hex(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut out = String::with_capacity(FINGERPRINT_LEN);
    for byte in digest.iter().take(FINGERPRINT_LEN / 2) {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Fingerprint of a single normalized text block.
pub fn text_fingerprint(text: &str) -> String {
    hash_hex(&normalize_text(text))
}

/// Fingerprint of a whole slide from its ordered text content and notes.
///
/// `slide_text` is the ordered concatenation of the slide's text blocks.
/// Volatile identifiers (shape ids, slide numbers) are never part of the
/// payload, so re-saving a document without editing it keeps the hash
/// stable.
pub fn slide_fingerprint(slide_text: &str, notes_text: &str) -> String {
    let normalized_text = normalize_text(slide_text);
    let normalized_notes = normalize_text(notes_text);
    let payload = if !normalized_text.is_empty() && !normalized_notes.is_empty() {
        format!("{}\n{}", normalized_text, normalized_notes)
    } else if !normalized_text.is_empty() {
        normalized_text
    } else {
        normalized_notes
    };
    hash_hex(&payload)
}

/// Short guard hash for positional box ids.
pub fn guard_hash(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut out = String::with_capacity(GUARD_LEN);
    for byte in digest.iter().take(GUARD_LEN / 2) {
        out.push_str(&format!("{:02x}", byte));
    }
    out
}

/// Check whether a value looks like a fingerprint: 16 lowercase hex chars.
pub fn is_hex_fingerprint(value: &str) -> bool {
    value.len() == FINGERPRINT_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize_text("Hello    world"), "Hello world");
        assert_eq!(normalize_text("  Hello  "), "Hello");
        assert_eq!(normalize_text("Hello\r\nWorld"), "Hello\nWorld");
    }

    #[test]
    fn test_normalize_drops_blank_lines() {
        assert_eq!(normalize_text("One\n\n\nTwo"), "One\nTwo");
        assert_eq!(normalize_text("\n \n"), "");
    }

    #[test]
    fn test_normalize_preserves_tab_indentation() {
        assert_eq!(normalize_text("\tindented  line"), "\tindented line");
        assert_eq!(normalize_text("\t\tdeep\nflat"), "\t\tdeep\nflat");
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = text_fingerprint("Hello   world\n");
        let b = text_fingerprint("Hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), FINGERPRINT_LEN);
        assert!(is_hex_fingerprint(&a));
    }

    #[test]
    fn test_fingerprint_detects_change() {
        assert_ne!(text_fingerprint("alpha"), text_fingerprint("beta"));
    }

    #[test]
    fn test_slide_fingerprint_combines_notes() {
        let with_notes = slide_fingerprint("Title\nBody", "a note");
        let without_notes = slide_fingerprint("Title\nBody", "");
        assert_ne!(with_notes, without_notes);
        // Whitespace variations normalize identically.
        assert_eq!(
            slide_fingerprint("Title \n Body", "a  note"),
            with_notes
        );
    }

    #[test]
    fn test_parse_tab_indented_lines() {
        let lines = parse_tab_indented_lines("Top\n\tChild\n\t\tGrand\n", false, true);
        assert_eq!(
            lines,
            vec![
                (0, "Top".to_string()),
                (1, "Child".to_string()),
                (2, "Grand".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_keeps_blank_lines_when_asked() {
        let lines = parse_tab_indented_lines("One\n\nTwo", true, true);
        assert_eq!(
            lines,
            vec![
                (0, "One".to_string()),
                (0, String::new()),
                (0, "Two".to_string()),
            ]
        );
    }

    #[test]
    fn test_guard_hash_length() {
        assert_eq!(guard_hash("7").len(), GUARD_LEN);
    }

    #[test]
    fn test_is_hex_fingerprint() {
        assert!(is_hex_fingerprint("2e17a21f8b1c2f4e"));
        assert!(!is_hex_fingerprint("2E17A21F8B1C2F4E"));
        assert!(!is_hex_fingerprint("2e17a21f"));
        assert!(!is_hex_fingerprint("zz17a21f8b1c2f4e"));
    }

    #[test]
    fn test_normalize_simple_name() {
        assert_eq!(normalize_simple_name(" Clean Light "), "clean_light");
        assert_eq!(normalize_simple_name(""), "");
    }
}
