//! Bucket label normalization.
//!
//! Every label comparison in the crate goes through [`normalize_label`]. The
//! allow-list is normalized with the same function when it is built, so a
//! record label and an allow-list entry can only match or differ for the same
//! reason everywhere.

use serde::Serialize;

/// Map a lowercase character carrying a diacritic to its base letter.
fn strip_diacritic(c: char) -> Option<char> {
    let base = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ě' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ī' => 'i',
        'ñ' | 'ń' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' => 'o',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' => 'u',
        'ý' | 'ÿ' => 'y',
        'š' | 'ś' => 's',
        'ž' | 'ź' | 'ż' => 'z',
        _ => return None,
    };
    Some(base)
}

/// Combining diacritical marks left behind by decomposed (NFD) input.
fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036F}').contains(&c)
}

/// Canonicalize a free-text label for comparison.
///
/// Trims surrounding whitespace, lowercases and replaces accented letters with
/// their base letter. Returns `None` for missing or blank input. The function
/// is idempotent.
///
/// ```rust
/// use planner_processing::normalize_label;
///
/// assert_eq!(normalize_label(Some(" EXECUÇÃO ")).as_deref(), Some("execucao"));
/// assert_eq!(normalize_label(Some("   ")), None);
/// ```
pub fn normalize_label(label: Option<&str>) -> Option<String> {
    let trimmed = label?.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized: String = trimmed
        .to_lowercase()
        .chars()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| strip_diacritic(c).unwrap_or(c))
        .collect();

    // Stripping marks can expose whitespace at the edges again.
    let normalized = normalized.trim();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized.to_string())
    }
}

/// An ordered set of normalized bucket labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllowList {
    entries: Vec<String>,
}

impl AllowList {
    /// Build the list, normalizing every label once. Blank labels and
    /// duplicates after normalization are dropped; order is preserved.
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<String> = Vec::new();
        for label in labels {
            if let Some(normalized) = normalize_label(Some(label.as_ref()))
                && !entries.contains(&normalized)
            {
                entries.push(normalized);
            }
        }
        Self { entries }
    }

    /// Membership test for an already-normalized label.
    pub fn contains_normalized(&self, normalized: &str) -> bool {
        self.entries.iter().any(|e| e == normalized)
    }

    /// Membership test for a raw label. Missing labels are never members.
    pub fn contains(&self, raw: Option<&str>) -> bool {
        normalize_label(raw).is_some_and(|n| self.contains_normalized(&n))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
