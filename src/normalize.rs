//! Text canonicalization shared by retrieval, scoring, and the
//! instructor resolver.
//!
//! Handles the mismatch between hand-typed schedule text ("F2F_PER Salsa
//! – Nivel 3") and registered meeting topics, plus data quality issues
//! from both sides (accents, dash runs, scheduling noise words).

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::config::Ruleset;

/// Hyphen, underscore, en-dash, and em-dash runs. Replaced first so that
/// glued forms like `F2F_PER` split into removable words before the
/// irrelevant-word pass.
static DASH_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_\u{2013}\u{2014}]+").unwrap());

/// Quote-mark variants unified to a single apostrophe.
const QUOTE_VARIANTS: &[char] = &['\u{2018}', '\u{2019}', '\u{201A}', '\u{00B4}', '`'];

/// Canonicalizes input strings against a compiled ruleset's
/// irrelevant-word lexicon.
#[derive(Debug, Clone)]
pub struct Normalizer {
    strippers: Vec<Regex>,
}

impl Normalizer {
    pub fn new(ruleset: &Ruleset) -> Self {
        Self {
            strippers: ruleset.strippers.clone(),
        }
    }

    /// Canonical lowercase, diacritic-free, noise-stripped form.
    ///
    /// Pure and total: empty input yields an empty string. Idempotent:
    /// `normalize(normalize(s)) == normalize(s)`.
    pub fn normalize(&self, s: &str) -> String {
        // 1. Dash/underscore runs become spaces.
        let s = DASH_RUNS.replace_all(s, " ");

        // 2. Remove irrelevant words and patterns, then collapse.
        let mut s = s.into_owned();
        for re in &self.strippers {
            s = re.replace_all(&s, " ").into_owned();
        }
        let s = collapse_whitespace(&s);

        // 3. NFD-decompose and drop combining diacritical marks.
        let s: String = s
            .nfd()
            .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
            .collect();

        // 4. Lowercase, unify apostrophes, space out anything that is not
        //    a word character, whitespace, or apostrophe.
        let s: String = s
            .to_lowercase()
            .chars()
            .map(|c| {
                if QUOTE_VARIANTS.contains(&c) {
                    '\''
                } else if c.is_alphanumeric() || c.is_whitespace() || c == '\'' {
                    c
                } else {
                    ' '
                }
            })
            .collect();

        collapse_whitespace(&s)
    }

    /// Strict-identity form: `normalize` with every remaining
    /// non-alphanumeric character removed.
    pub fn canonical(&self, s: &str) -> String {
        self.normalize(s)
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect()
    }
}

/// Collapse whitespace runs into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
