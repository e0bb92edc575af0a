//! Rule configuration: penalty weights, thresholds, token lexicons, and
//! person-format patterns.
//!
//! The configuration is plain data loaded once (built-in defaults, merged
//! with an optional TOML file and `ROSTER_`-prefixed environment
//! variables) and compiled into a [`Ruleset`] that is passed explicitly
//! into the scoring engine. It is never a hidden singleton, and it is
//! immutable for the duration of a matching batch.

use std::collections::HashSet;
use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A rule-configuration bundle failed to load or validate.
///
/// Fatal: a batch must not start scoring against a malformed ruleset.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load rule configuration")]
    Load(#[from] Box<figment::Error>),
    #[error("base score must be positive, got {0}")]
    NonPositiveBaseScore(i32),
    #[error("penalty `{name}` must be zero or negative, got {points}")]
    PositivePenalty { name: &'static str, points: i32 },
    #[error(
        "ignored level-conflict penalty ({ignored}) must be nonzero and milder than the full penalty ({full})"
    )]
    IgnoredLevelPenalty { ignored: i32, full: i32 },
    #[error("invalid threshold: {0}")]
    Threshold(String),
    #[error("synonym group {index} contains no tokens")]
    EmptySynonymGroup { index: usize },
    #[error("invalid pattern `{pattern}`")]
    Pattern {
        pattern: String,
        #[source]
        source: Box<regex::Error>,
    },
}

/// Penalty points per rule. All values are zero or negative; the
/// weak-match amounts are charged per offending token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyPoints {
    /// Query and topic carry classifiers from different exclusive
    /// categories ("solo" vs "trio"). Forces `not_found` on its own.
    pub exclusive_classifier_conflict: i32,
    /// Both sides declare levels and the sets are disjoint.
    pub level_conflict: i32,
    /// Advisory variant of `level_conflict` applied when the caller asked
    /// to ignore level mismatches. Nonzero so the conflict stays visible
    /// in the detailed reason.
    pub level_conflict_ignored: i32,
    /// Query describes a program but the topic is shaped like a person.
    pub program_vs_person: i32,
    /// Per classifier family present in the query but absent from the
    /// topic.
    pub structural_token_missing: i32,
    /// No distinctive query token matches the topic at all. Forces
    /// `not_found` on its own.
    pub weak_match_no_overlap: i32,
    /// Per distinctive query token missing from the topic.
    pub weak_match_missing_token: i32,
    /// Cheaper price for missing tokens that are numeric-shaped.
    pub weak_match_missing_numeric: i32,
    /// Per benign extra token when the topic is fully covered by the
    /// query ("extra info" leniency).
    pub weak_match_extra_info: i32,
    /// Non-level numbers present on both sides but disjoint.
    pub group_number_conflict: i32,
    /// All digit runs on both sides disjoint.
    pub numeric_conflict: i32,
    /// Topic carries a number the query lacks while a sibling meeting
    /// shares the digit-stripped base topic.
    pub orphan_number: i32,
    /// Topic carries a level the query lacks while a sibling meeting
    /// shares the level-stripped base topic at a different level.
    pub orphan_level: i32,
}

impl Default for PenaltyPoints {
    fn default() -> Self {
        Self {
            exclusive_classifier_conflict: -100,
            level_conflict: -30,
            level_conflict_ignored: -5,
            program_vs_person: -40,
            structural_token_missing: -15,
            weak_match_no_overlap: -100,
            weak_match_missing_token: -15,
            weak_match_missing_numeric: -8,
            weak_match_extra_info: -3,
            group_number_conflict: -25,
            numeric_conflict: -20,
            orphan_number: -20,
            orphan_level: -20,
        }
    }
}

/// Decision and retrieval thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Scores below this never auto-assign.
    pub minimum_score: i32,
    /// Best and runner-up closer than this are ambiguous.
    pub ambiguity_score_diff: i32,
    pub high_confidence_score: i32,
    pub medium_confidence_score: i32,
    /// Maximum normalized edit distance accepted by the fuzzy retrieval
    /// stage and the instructor resolver, in `[0, 1]` where 0 is exact.
    pub fuzzy_max_distance: f64,
    /// Minimum `|intersection| / |query tokens|` for the token-overlap
    /// fallback.
    pub token_overlap_min_ratio: f64,
    /// Minimum shared-token count for the token-overlap fallback.
    pub token_overlap_min_count: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            minimum_score: 50,
            ambiguity_score_diff: 15,
            high_confidence_score: 80,
            medium_confidence_score: 60,
            fuzzy_max_distance: 0.3,
            token_overlap_min_ratio: 0.5,
            token_overlap_min_count: 1,
        }
    }
}

/// The hot-loadable rule-configuration bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Starting score before penalties.
    pub base_score: i32,
    pub penalties: PenaltyPoints,
    pub thresholds: Thresholds,
    /// Classifier families. Tokens within a group are interchangeable;
    /// tokens across groups are mutually exclusive.
    pub synonym_groups: Vec<Vec<String>>,
    /// Extra structural tokens beyond the synonym-group union. Structural
    /// tokens are excluded from distinctive-token coverage.
    pub structural_tokens: Vec<String>,
    /// Tokens marking a string as "about a program" rather than a person.
    pub program_type_tokens: Vec<String>,
    /// Ordered regexes recognizing person-name-shaped strings, e.g.
    /// "Lastname (CC)(Channel), Firstname Secondname".
    pub person_format_patterns: Vec<String>,
    /// Formal-title markers (Dr/Mr/Mrs/Ms/Prof) in raw query text.
    pub formal_title_pattern: String,
    /// Words removed outright during normalization, by category. The
    /// category names are documentation; removal is a flat union.
    pub irrelevant_words: Vec<WordCategory>,
    /// Regexes removed outright during normalization (times, weekday
    /// abbreviations and similar scheduling noise).
    pub irrelevant_patterns: Vec<String>,
    /// Entry bound for the edit-distance cache.
    pub distance_cache_capacity: usize,
}

/// One named category of the irrelevant-word lexicon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordCategory {
    pub name: String,
    pub words: Vec<String>,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            base_score: 100,
            penalties: PenaltyPoints::default(),
            thresholds: Thresholds::default(),
            synonym_groups: vec![
                svec(&["solo", "single", "individual"]),
                svec(&["duo", "duet", "pareja"]),
                svec(&["trio"]),
                svec(&["private", "particular", "privada", "privado"]),
                svec(&["group", "grupo", "grupal"]),
            ],
            structural_tokens: Vec::new(),
            program_type_tokens: svec(&[
                "class", "clase", "course", "curso", "program", "programa", "group", "grupo",
                "taller", "workshop", "level", "nivel", "mod", "module",
            ]),
            person_format_patterns: vec![
                // "Lastname (CC)(Channel), Firstname Secondname"
                r"^\s*[\p{L}'\-]+\s*(?:\([A-Za-z]{2,3}\)\s*){1,2},\s*[\p{L}'\-]+(?:\s+[\p{L}'\-]+)*\s*$".to_string(),
                // Formal-title prefix marks the whole string as a person
                r"(?i)^\s*(?:dr|mr|mrs|ms|prof)\.?\s+\p{L}".to_string(),
                // Two or three capitalized words and nothing else. Each word
                // must contain a lowercase letter so code words ("CH",
                // "ACME") don't read as names.
                r"^\s*\p{Lu}[\p{L}'\-]*\p{Ll}[\p{L}'\-]*(?:\s+\p{Lu}[\p{L}'\-]*\p{Ll}[\p{L}'\-]*){1,2}\s*$".to_string(),
            ],
            formal_title_pattern: r"(?i)\b(?:dr|mr|mrs|ms|prof)\.?\s".to_string(),
            irrelevant_words: vec![
                WordCategory {
                    name: "modality".into(),
                    words: svec(&["f2f", "online", "presencial", "virtual", "remote", "zoom"]),
                },
                WordCategory {
                    name: "scheduling".into(),
                    words: svec(&["per", "schedule", "sched", "calendar", "slot"]),
                },
                WordCategory {
                    name: "filler".into(),
                    words: svec(&[
                        "the", "a", "an", "and", "with", "at", "of", "de", "la", "el", "los",
                        "las", "y", "con", "en", "para",
                    ]),
                },
            ],
            irrelevant_patterns: vec![
                // Clock times: "18:30", "6.30pm", "9:00 am"
                r"(?i)\b\d{1,2}[:.]\d{2}\s*(?:am|pm|h)?\b".to_string(),
                r"(?i)\b\d{1,2}\s*(?:am|pm)\b".to_string(),
                // Weekday abbreviations, English and Spanish
                r"(?i)\b(?:mon|tue|wed|thu|fri|sat|sun|lun|vie|sab|dom)\b".to_string(),
            ],
            distance_cache_capacity: 5000,
        }
    }
}

fn svec(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl RuleConfig {
    /// Load configuration: built-in defaults, merged with an optional TOML
    /// file (which must exist when named), merged with `ROSTER_`-prefixed
    /// environment variables (`ROSTER_THRESHOLDS__MINIMUM_SCORE=40` style
    /// nesting).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            // An explicitly named file must exist; a typo'd path silently
            // running on defaults would make the weights unauditable.
            figment = figment.merge(Toml::file_exact(path));
        }
        let config: Self = figment
            .merge(Env::prefixed("ROSTER_").split("__"))
            .extract()
            .map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value-level invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_score <= 0 {
            return Err(ConfigError::NonPositiveBaseScore(self.base_score));
        }

        let p = &self.penalties;
        for (name, points) in [
            ("exclusive_classifier_conflict", p.exclusive_classifier_conflict),
            ("level_conflict", p.level_conflict),
            ("level_conflict_ignored", p.level_conflict_ignored),
            ("program_vs_person", p.program_vs_person),
            ("structural_token_missing", p.structural_token_missing),
            ("weak_match_no_overlap", p.weak_match_no_overlap),
            ("weak_match_missing_token", p.weak_match_missing_token),
            ("weak_match_missing_numeric", p.weak_match_missing_numeric),
            ("weak_match_extra_info", p.weak_match_extra_info),
            ("group_number_conflict", p.group_number_conflict),
            ("numeric_conflict", p.numeric_conflict),
            ("orphan_number", p.orphan_number),
            ("orphan_level", p.orphan_level),
        ] {
            if points > 0 {
                return Err(ConfigError::PositivePenalty { name, points });
            }
        }
        // The ignored variant must stay visible (nonzero) yet strictly
        // milder than the full conflict.
        if p.level_conflict_ignored == 0 || p.level_conflict_ignored <= p.level_conflict {
            return Err(ConfigError::IgnoredLevelPenalty {
                ignored: p.level_conflict_ignored,
                full: p.level_conflict,
            });
        }

        let t = &self.thresholds;
        if t.medium_confidence_score > t.high_confidence_score {
            return Err(ConfigError::Threshold(format!(
                "medium confidence ({}) exceeds high confidence ({})",
                t.medium_confidence_score, t.high_confidence_score
            )));
        }
        if !(0.0..=1.0).contains(&t.fuzzy_max_distance) {
            return Err(ConfigError::Threshold(format!(
                "fuzzy max distance must be in [0, 1], got {}",
                t.fuzzy_max_distance
            )));
        }
        if !(0.0..=1.0).contains(&t.token_overlap_min_ratio) {
            return Err(ConfigError::Threshold(format!(
                "token overlap ratio must be in [0, 1], got {}",
                t.token_overlap_min_ratio
            )));
        }
        if t.token_overlap_min_count == 0 {
            return Err(ConfigError::Threshold(
                "token overlap minimum count must be at least 1".into(),
            ));
        }
        if self.distance_cache_capacity == 0 {
            return Err(ConfigError::Threshold(
                "distance cache capacity must be at least 1".into(),
            ));
        }

        for (index, group) in self.synonym_groups.iter().enumerate() {
            if group.iter().all(|t| t.trim().is_empty()) {
                return Err(ConfigError::EmptySynonymGroup { index });
            }
        }

        Ok(())
    }

    /// Compile into the form the engine consumes. Regex syntax errors
    /// surface here, before any scoring.
    pub fn compile(self) -> Result<Ruleset, ConfigError> {
        self.validate()?;

        let compile_one = |pattern: &str| -> Result<Regex, ConfigError> {
            Regex::new(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.to_string(),
                source: Box::new(source),
            })
        };

        let person_formats = self
            .person_format_patterns
            .iter()
            .map(|p| compile_one(p))
            .collect::<Result<Vec<_>, _>>()?;
        let formal_title = compile_one(&self.formal_title_pattern)?;

        let mut strippers = Vec::new();
        let words: Vec<String> = self
            .irrelevant_words
            .iter()
            .flat_map(|c| c.words.iter())
            .filter(|w| !w.trim().is_empty())
            .map(|w| regex::escape(w))
            .collect();
        if !words.is_empty() {
            strippers.push(compile_one(&format!(r"(?i)\b(?:{})\b", words.join("|")))?);
        }
        for pattern in &self.irrelevant_patterns {
            strippers.push(compile_one(pattern)?);
        }

        let synonym_groups: Vec<HashSet<String>> = self
            .synonym_groups
            .iter()
            .map(|g| g.iter().map(|t| t.to_lowercase()).collect())
            .collect();
        let mut structural_tokens: HashSet<String> = synonym_groups
            .iter()
            .flat_map(|g| g.iter().cloned())
            .collect();
        structural_tokens.extend(self.structural_tokens.iter().map(|t| t.to_lowercase()));
        let program_type_tokens: HashSet<String> = self
            .program_type_tokens
            .iter()
            .map(|t| t.to_lowercase())
            .collect();

        Ok(Ruleset {
            config: self,
            person_formats,
            formal_title,
            strippers,
            synonym_groups,
            structural_tokens,
            program_type_tokens,
        })
    }
}

/// A validated, compiled rule-configuration bundle.
///
/// Owns the source [`RuleConfig`] plus the derived regexes and token
/// sets. Construction is the only fallible step; everything downstream
/// treats the ruleset as immutable data.
#[derive(Debug, Clone)]
pub struct Ruleset {
    pub config: RuleConfig,
    /// Ordered person-name-shape recognizers, applied to raw text.
    pub person_formats: Vec<Regex>,
    pub formal_title: Regex,
    /// Irrelevant-word and irrelevant-pattern removers for the normalizer.
    pub strippers: Vec<Regex>,
    /// Lowercased classifier families.
    pub synonym_groups: Vec<HashSet<String>>,
    /// Union of the synonym groups plus any configured extras.
    pub structural_tokens: HashSet<String>,
    pub program_type_tokens: HashSet<String>,
}

impl Ruleset {
    /// Index of the classifier family containing `token`, if any.
    pub fn classifier_family(&self, token: &str) -> Option<usize> {
        self.synonym_groups.iter().position(|g| g.contains(token))
    }

    /// Whether raw text is shaped like a person name.
    pub fn looks_like_person(&self, raw: &str) -> bool {
        self.person_formats.iter().any(|re| re.is_match(raw))
    }
}
