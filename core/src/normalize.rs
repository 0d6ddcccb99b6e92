//! Name normalization and label folding.
//!
//! RULE: Physician names are only ever compared through a NameNormalizer.
//! The normalizer is injected into the engine, never hard-coded at call sites,
//! so locale and diacritic rules can be swapped or tested on their own.
//!
//! Action labels and branch names are matched against keyword vocabularies
//! through `fold_label`, which is fixed and locale-agnostic.

use crate::types::PhysicianKey;
use serde::{Deserialize, Serialize};

/// Maps a physician display name to the key used for joining roster
/// entries with outcome records.
pub trait NameNormalizer: Send + Sync {
    fn normalize(&self, display_name: &str) -> PhysicianKey;
}

impl<F> NameNormalizer for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn normalize(&self, display_name: &str) -> PhysicianKey {
        self(display_name)
    }
}

/// Trims, strips punctuation, collapses whitespace and uppercases using
/// Turkish dotted/dotless i rules ("i" → "İ", "ı" → "I").
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNormalizer;

impl NameNormalizer for DefaultNormalizer {
    fn normalize(&self, display_name: &str) -> PhysicianKey {
        let mut out = String::with_capacity(display_name.len());
        let mut pending_gap = false;
        for ch in display_name.chars() {
            if ch.is_alphanumeric() {
                if pending_gap && !out.is_empty() {
                    out.push(' ');
                }
                pending_gap = false;
                push_upper_tr(&mut out, ch);
            } else {
                // Whitespace and punctuation both separate name tokens.
                pending_gap = true;
            }
        }
        out
    }
}

fn push_upper_tr(out: &mut String, ch: char) {
    match ch {
        'i' => out.push('İ'),
        'ı' => out.push('I'),
        other => out.extend(other.to_uppercase()),
    }
}

/// Uppercase, strip diacritics to ASCII, and collapse whitespace.
/// Used for vocabulary matching and month names.
pub fn fold_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut pending_space = false;
    for ch in label.chars() {
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.extend(ch.to_uppercase().filter_map(strip_diacritic));
    }
    out
}

fn strip_diacritic(ch: char) -> Option<char> {
    let ascii = match ch {
        'İ' | 'Î' | 'Ì' | 'Í' => 'I',
        'Ş' => 'S',
        'Ğ' => 'G',
        'Ü' | 'Û' | 'Ù' | 'Ú' => 'U',
        'Ö' | 'Ô' | 'Ò' | 'Ó' => 'O',
        'Ç' => 'C',
        'Â' | 'À' | 'Á' | 'Ä' => 'A',
        'É' | 'È' | 'Ê' | 'Ë' => 'E',
        // Combining dot left behind by uppercasing a dotted 'i' in some locales.
        '\u{0307}' => return None,
        other => other,
    };
    Some(ascii)
}

/// A keyword list matched by containment against folded labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionVocabulary {
    keywords: Vec<String>,
}

impl ActionVocabulary {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords.into_iter().map(|k| k.as_ref().to_string()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// True when the folded label contains any folded keyword.
    pub fn matches(&self, label: &str) -> bool {
        let folded = fold_label(label);
        self.keywords.iter().any(|k| {
            let key = fold_label(k);
            !key.is_empty() && folded.contains(&key)
        })
    }
}
