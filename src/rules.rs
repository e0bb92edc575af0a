//! The nine penalty heuristics encoding domain conflict rules.
//!
//! Each rule is a pure function of the query, one candidate, its sibling
//! candidates, and the matching options. Rules return `Ok(None)` when
//! they do not apply, `Ok(Some(penalty))` when they do, and `Err` when
//! evaluation itself fails. Failures are isolated by the scoring engine
//! and never abort a batch.
//!
//! Evaluation order is fixed by [`RULES`]. Totals do not depend on the
//! order (no short-circuiting), but the `detailed_reason` ordering does,
//! so it must stay stable.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::MatchOptions;
use crate::config::Ruleset;
use crate::distance::DistanceCache;
use crate::normalize::Normalizer;

/// Level indicators: "L2", "n3", "level 4", "Nivel 12".
static LEVEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:l|n|level|nivel)\s*(\d+)").unwrap());

/// Digit runs.
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Short alphanumeric codes ("l7", "fr3") excluded from distinctive
/// tokens.
static SHORT_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{1,3}\d+$").unwrap());

/// A single rule failed to evaluate. Recovered by the scoring engine:
/// logged, contribution zeroed, scoring continues.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("level indicator `{value}` is not a representable number")]
    LevelParse { value: String },
}

/// The penalty vocabulary. One variant per conflict the rules can
/// report, including the advisory "ignored" level variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKind {
    ExclusiveClassifierConflict,
    LevelConflict,
    LevelConflictIgnored,
    ProgramVsPerson,
    StructuralTokenMissing,
    WeakMatch,
    GroupNumberConflict,
    NumericConflict,
    OrphanNumber,
    OrphanLevel,
}

impl PenaltyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExclusiveClassifierConflict => "exclusive_classifier_conflict",
            Self::LevelConflict => "level_conflict",
            Self::LevelConflictIgnored => "level_conflict_ignored",
            Self::ProgramVsPerson => "program_vs_person",
            Self::StructuralTokenMissing => "structural_token_missing",
            Self::WeakMatch => "weak_match",
            Self::GroupNumberConflict => "group_number_conflict",
            Self::NumericConflict => "numeric_conflict",
            Self::OrphanNumber => "orphan_number",
            Self::OrphanLevel => "orphan_level",
        }
    }
}

impl fmt::Display for PenaltyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fired penalty: kind, points (zero or negative), a human-readable
/// reason, and the topic coverage ratio when the weak-match rule
/// computed one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedPenalty {
    pub kind: PenaltyKind,
    pub points: i32,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f32>,
}

impl AppliedPenalty {
    /// Penalties that force `not_found` even when no other candidate
    /// exists: a cross-category classifier conflict, or a weak match
    /// with zero topic coverage.
    pub fn is_hard_reject(&self) -> bool {
        match self.kind {
            PenaltyKind::ExclusiveClassifierConflict => true,
            PenaltyKind::WeakMatch => self.coverage == Some(0.0),
            _ => false,
        }
    }
}

/// A sibling candidate's topic, for the orphan rules.
#[derive(Debug, Clone)]
pub struct Sibling {
    pub id: String,
    pub topic: String,
}

/// Everything a rule may look at for one (query, candidate) pair.
pub struct RuleContext<'a> {
    pub query_raw: &'a str,
    pub topic_raw: &'a str,
    pub query_norm: &'a str,
    pub topic_norm: &'a str,
    pub candidate_id: &'a str,
    /// The full retrieved candidate set, including this candidate.
    pub siblings: &'a [Sibling],
    pub options: MatchOptions,
    pub ruleset: &'a Ruleset,
    pub normalizer: &'a Normalizer,
}

pub type RuleFn = fn(&RuleContext<'_>, &mut DistanceCache) -> Result<Option<AppliedPenalty>, RuleError>;

/// The rule set in its fixed evaluation order.
pub const RULES: &[(&str, RuleFn)] = &[
    ("exclusive_classifier_conflict", exclusive_classifier_conflict),
    ("level_conflict", level_conflict),
    ("program_vs_person", program_vs_person),
    ("structural_token_missing", structural_token_missing),
    ("weak_match", weak_match),
    ("group_number_conflict", group_number_conflict),
    ("numeric_conflict", numeric_conflict),
    ("orphan_number", orphan_number),
    ("orphan_level", orphan_level),
];

/// Lowercased tokens split on non-word boundaries, for raw text.
pub(crate) fn word_tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Classifier families present in `tokens`.
fn classifier_families(tokens: &[String], ruleset: &Ruleset) -> BTreeSet<usize> {
    tokens
        .iter()
        .filter_map(|t| ruleset.classifier_family(t))
        .collect()
}

/// Level numbers extracted via the level-indicator pattern.
fn extract_levels(s: &str) -> Result<BTreeSet<u32>, RuleError> {
    LEVEL_RE
        .captures_iter(s)
        .map(|c| {
            let digits = &c[1];
            digits.parse::<u32>().map_err(|_| RuleError::LevelParse {
                value: digits.to_string(),
            })
        })
        .collect()
}

/// `s` with level indicators removed.
fn strip_levels(s: &str) -> String {
    LEVEL_RE.replace_all(s, " ").into_owned()
}

/// Digit runs in `s`, as strings so arbitrary lengths compare safely.
fn digit_runs(s: &str) -> BTreeSet<String> {
    DIGITS_RE
        .find_iter(s)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn is_numeric_token(t: &str) -> bool {
    !t.is_empty() && t.chars().all(|c| c.is_ascii_digit())
}

/// Tokens that carry identity: long enough, not numeric, not a short
/// alphanumeric code, not a structural classifier.
fn distinctive_tokens(norm: &str, ruleset: &Ruleset) -> Vec<String> {
    norm.split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .filter(|t| !is_numeric_token(t))
        .filter(|t| !SHORT_CODE_RE.is_match(t))
        .filter(|t| !ruleset.structural_tokens.contains(*t))
        .map(|t| t.to_string())
        .collect()
}

/// Edit-distance budget for fuzzy token equality: 1 for short tokens,
/// 2 otherwise.
fn token_distance_budget(t: &str) -> usize {
    if t.chars().count() < 5 { 1 } else { 2 }
}

fn join(tokens: &[String]) -> String {
    tokens.join(", ")
}

/// Rule 1: query and topic carry classifiers from different mutually
/// exclusive families ("solo" vs "trio"). Sharing any family, even via
/// different synonyms, clears the conflict.
fn exclusive_classifier_conflict(
    ctx: &RuleContext<'_>,
    _cache: &mut DistanceCache,
) -> Result<Option<AppliedPenalty>, RuleError> {
    let query_families = classifier_families(&word_tokens(ctx.query_raw), ctx.ruleset);
    let topic_families = classifier_families(&word_tokens(ctx.topic_raw), ctx.ruleset);
    if query_families.is_empty() || topic_families.is_empty() {
        return Ok(None);
    }
    if query_families.is_disjoint(&topic_families) {
        return Ok(Some(AppliedPenalty {
            kind: PenaltyKind::ExclusiveClassifierConflict,
            points: ctx.ruleset.config.penalties.exclusive_classifier_conflict,
            reason: "schedule and topic use classifiers from conflicting families".to_string(),
            coverage: None,
        }));
    }
    Ok(None)
}

/// Rule 2: both sides declare levels and the sets are disjoint. With
/// `ignore_level_mismatch` the penalty downgrades to a nonzero advisory
/// so the conflict stays visible in the detailed reason.
fn level_conflict(
    ctx: &RuleContext<'_>,
    _cache: &mut DistanceCache,
) -> Result<Option<AppliedPenalty>, RuleError> {
    let query_levels = extract_levels(ctx.query_raw)?;
    let topic_levels = extract_levels(ctx.topic_raw)?;
    if query_levels.is_empty() || topic_levels.is_empty() {
        return Ok(None);
    }
    if !query_levels.is_disjoint(&topic_levels) {
        return Ok(None);
    }
    let penalties = &ctx.ruleset.config.penalties;
    let (kind, points, suffix) = if ctx.options.ignore_level_mismatch {
        (
            PenaltyKind::LevelConflictIgnored,
            penalties.level_conflict_ignored,
            " (ignored by request)",
        )
    } else {
        (PenaltyKind::LevelConflict, penalties.level_conflict, "")
    };
    Ok(Some(AppliedPenalty {
        kind,
        points,
        reason: format!(
            "schedule level {query_levels:?} conflicts with topic level {topic_levels:?}{suffix}"
        ),
        coverage: None,
    }))
}

/// Rule 3: the query describes a program but the topic is shaped like a
/// person name. A program-type token in the topic suppresses the
/// conflict.
fn program_vs_person(
    ctx: &RuleContext<'_>,
    _cache: &mut DistanceCache,
) -> Result<Option<AppliedPenalty>, RuleError> {
    let query_has_program = ctx
        .query_norm
        .split_whitespace()
        .any(|t| ctx.ruleset.program_type_tokens.contains(t));
    if !query_has_program || !ctx.ruleset.looks_like_person(ctx.topic_raw) {
        return Ok(None);
    }
    let topic_has_program = ctx
        .topic_norm
        .split_whitespace()
        .any(|t| ctx.ruleset.program_type_tokens.contains(t));
    if topic_has_program {
        return Ok(None);
    }
    Ok(Some(AppliedPenalty {
        kind: PenaltyKind::ProgramVsPerson,
        points: ctx.ruleset.config.penalties.program_vs_person,
        reason: "schedule describes a program but the topic looks like a person name".to_string(),
        coverage: None,
    }))
}

/// Rule 4: the query names a classifier family the topic lacks
/// entirely. Skipped when level mismatches are being ignored.
fn structural_token_missing(
    ctx: &RuleContext<'_>,
    _cache: &mut DistanceCache,
) -> Result<Option<AppliedPenalty>, RuleError> {
    if ctx.options.ignore_level_mismatch {
        return Ok(None);
    }
    let query_tokens = word_tokens(ctx.query_raw);
    let topic_families = classifier_families(&word_tokens(ctx.topic_raw), ctx.ruleset);

    let mut missing: Vec<String> = Vec::new();
    let mut seen_families: HashSet<usize> = HashSet::new();
    for token in &query_tokens {
        if let Some(family) = ctx.ruleset.classifier_family(token)
            && !topic_families.contains(&family)
            && seen_families.insert(family)
        {
            missing.push(token.clone());
        }
    }
    if missing.is_empty() {
        return Ok(None);
    }
    Ok(Some(AppliedPenalty {
        kind: PenaltyKind::StructuralTokenMissing,
        points: ctx.ruleset.config.penalties.structural_token_missing * missing.len() as i32,
        reason: format!("topic lacks structural marker(s): {}", join(&missing)),
        coverage: None,
    }))
}

/// Rule 5: distinctive-token coverage between the normalized strings.
///
/// Candidate tokens count as covered when present verbatim in the query
/// or within a small edit distance of some query token. Query tokens
/// with no counterpart in the topic are "missing": none missing is a
/// clean pass, all missing is a hard reject, and in between the price
/// depends on whether the extra query tokens are benign "extra info"
/// (topic fully covered and specific, no formal title in play, or both
/// sides are person-shaped).
fn weak_match(
    ctx: &RuleContext<'_>,
    cache: &mut DistanceCache,
) -> Result<Option<AppliedPenalty>, RuleError> {
    let query_tokens = distinctive_tokens(ctx.query_norm, ctx.ruleset);
    let topic_tokens = distinctive_tokens(ctx.topic_norm, ctx.ruleset);
    let query_set: HashSet<&str> = query_tokens.iter().map(String::as_str).collect();
    let topic_set: HashSet<&str> = topic_tokens.iter().map(String::as_str).collect();

    let fuzzy_covered = |token: &str, pool: &[String], cache: &mut DistanceCache| {
        let budget = token_distance_budget(token);
        pool.iter().any(|other| cache.distance(token, other) <= budget)
    };

    let matched_count = topic_tokens
        .iter()
        .filter(|t| query_set.contains(t.as_str()) || fuzzy_covered(t, &query_tokens, cache))
        .count();
    let topic_fully_covered = matched_count >= topic_tokens.len();
    let topic_specific = !topic_tokens.is_empty();
    let coverage = if topic_tokens.is_empty() {
        None
    } else {
        Some(matched_count as f32 / topic_tokens.len() as f32)
    };

    let missing: Vec<String> = query_tokens
        .iter()
        .filter(|t| !topic_set.contains(t.as_str()) && !fuzzy_covered(t, &topic_tokens, cache))
        .cloned()
        .collect();

    if missing.is_empty() {
        return Ok(None);
    }

    let penalties = &ctx.ruleset.config.penalties;
    if missing.len() == query_tokens.len() {
        return Ok(Some(AppliedPenalty {
            kind: PenaltyKind::WeakMatch,
            points: penalties.weak_match_no_overlap,
            reason: "no distinctive schedule token matches the topic".to_string(),
            coverage: Some(0.0),
        }));
    }

    let has_formal_title = ctx.ruleset.formal_title.is_match(ctx.query_raw);
    let both_are_people = ctx.ruleset.looks_like_person(ctx.query_raw)
        && ctx.ruleset.looks_like_person(ctx.topic_raw);
    let benign = (topic_fully_covered && topic_specific && !has_formal_title)
        || (both_are_people && topic_fully_covered);

    if benign {
        return Ok(Some(AppliedPenalty {
            kind: PenaltyKind::WeakMatch,
            points: penalties.weak_match_extra_info * missing.len() as i32,
            reason: format!("extra schedule info not in topic: {}", join(&missing)),
            coverage,
        }));
    }

    let points: i32 = missing
        .iter()
        .map(|t| {
            if is_numeric_token(t) {
                penalties.weak_match_missing_numeric
            } else {
                penalties.weak_match_missing_token
            }
        })
        .sum();
    Ok(Some(AppliedPenalty {
        kind: PenaltyKind::WeakMatch,
        points,
        reason: format!(
            "schedule token(s) not covered by topic: {} (topic coverage {}/{})",
            join(&missing),
            matched_count,
            topic_tokens.len()
        ),
        coverage,
    }))
}

/// Rule 6: numbers outside level indicators exist on both sides but
/// share nothing.
fn group_number_conflict(
    ctx: &RuleContext<'_>,
    _cache: &mut DistanceCache,
) -> Result<Option<AppliedPenalty>, RuleError> {
    let query_numbers = digit_runs(&strip_levels(ctx.query_raw));
    let topic_numbers = digit_runs(&strip_levels(ctx.topic_raw));
    if query_numbers.is_empty() || topic_numbers.is_empty() {
        return Ok(None);
    }
    if query_numbers.is_disjoint(&topic_numbers) {
        return Ok(Some(AppliedPenalty {
            kind: PenaltyKind::GroupNumberConflict,
            points: ctx.ruleset.config.penalties.group_number_conflict,
            reason: format!(
                "group number(s) {query_numbers:?} do not match topic number(s) {topic_numbers:?}"
            ),
            coverage: None,
        }));
    }
    Ok(None)
}

/// Rule 7: every digit run on the query side is absent from the topic
/// and vice versa, level indicators included.
fn numeric_conflict(
    ctx: &RuleContext<'_>,
    _cache: &mut DistanceCache,
) -> Result<Option<AppliedPenalty>, RuleError> {
    let query_numbers = digit_runs(ctx.query_raw);
    let topic_numbers = digit_runs(ctx.topic_raw);
    if query_numbers.is_empty() || topic_numbers.is_empty() {
        return Ok(None);
    }
    if query_numbers.is_disjoint(&topic_numbers) {
        return Ok(Some(AppliedPenalty {
            kind: PenaltyKind::NumericConflict,
            points: ctx.ruleset.config.penalties.numeric_conflict,
            reason: format!(
                "no number shared between schedule {query_numbers:?} and topic {topic_numbers:?}"
            ),
            coverage: None,
        }));
    }
    Ok(None)
}

/// Rule 8: the topic carries a non-level number the query lacks, and at
/// least one sibling meeting shares the digit-stripped base topic: the
/// query under-specifies which numbered variant it wants.
fn orphan_number(
    ctx: &RuleContext<'_>,
    _cache: &mut DistanceCache,
) -> Result<Option<AppliedPenalty>, RuleError> {
    let topic_numbers = digit_runs(&strip_levels(ctx.topic_raw));
    let query_numbers = digit_runs(ctx.query_raw);
    let orphans: BTreeSet<&String> = topic_numbers.difference(&query_numbers).collect();
    if orphans.is_empty() {
        return Ok(None);
    }

    let base = ctx
        .normalizer
        .normalize(&DIGITS_RE.replace_all(ctx.topic_raw, " "));
    let sibling_count = ctx
        .siblings
        .iter()
        .filter(|s| s.id != ctx.candidate_id)
        .filter(|s| {
            ctx.normalizer
                .normalize(&DIGITS_RE.replace_all(&s.topic, " "))
                == base
        })
        .count();
    if sibling_count == 0 {
        return Ok(None);
    }
    Ok(Some(AppliedPenalty {
        kind: PenaltyKind::OrphanNumber,
        points: ctx.ruleset.config.penalties.orphan_number,
        reason: format!(
            "topic number(s) {orphans:?} absent from schedule while {sibling_count} sibling meeting(s) share the base topic"
        ),
        coverage: None,
    }))
}

/// Rule 9: the query names no level at all, the topic has one, and a
/// sibling meeting shares the level-stripped base topic at a different
/// level.
fn orphan_level(
    ctx: &RuleContext<'_>,
    _cache: &mut DistanceCache,
) -> Result<Option<AppliedPenalty>, RuleError> {
    if !extract_levels(ctx.query_raw)?.is_empty() {
        return Ok(None);
    }
    let topic_levels = extract_levels(ctx.topic_raw)?;
    if topic_levels.is_empty() {
        return Ok(None);
    }

    let base = ctx.normalizer.normalize(&strip_levels(ctx.topic_raw));
    let mut sibling_count = 0usize;
    for sibling in ctx.siblings.iter().filter(|s| s.id != ctx.candidate_id) {
        let sibling_levels = extract_levels(&sibling.topic)?;
        if sibling_levels.is_empty() || sibling_levels == topic_levels {
            continue;
        }
        if ctx.normalizer.normalize(&strip_levels(&sibling.topic)) == base {
            sibling_count += 1;
        }
    }
    if sibling_count == 0 {
        return Ok(None);
    }
    Ok(Some(AppliedPenalty {
        kind: PenaltyKind::OrphanLevel,
        points: ctx.ruleset.config.penalties.orphan_level,
        reason: format!(
            "schedule names no level while topic level {topic_levels:?} has {sibling_count} sibling(s) at other levels"
        ),
        coverage: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;

    struct Harness {
        ruleset: Ruleset,
        normalizer: Normalizer,
    }

    impl Harness {
        fn new() -> Self {
            let ruleset = RuleConfig::default().compile().unwrap();
            let normalizer = Normalizer::new(&ruleset);
            Self { ruleset, normalizer }
        }

        fn eval(
            &self,
            rule: RuleFn,
            query: &str,
            topic: &str,
            siblings: &[(&str, &str)],
            options: MatchOptions,
        ) -> Option<AppliedPenalty> {
            let siblings: Vec<Sibling> = std::iter::once(("self", topic))
                .chain(siblings.iter().copied())
                .map(|(id, t)| Sibling {
                    id: id.to_string(),
                    topic: t.to_string(),
                })
                .collect();
            let query_norm = self.normalizer.normalize(query);
            let topic_norm = self.normalizer.normalize(topic);
            let ctx = RuleContext {
                query_raw: query,
                topic_raw: topic,
                query_norm: &query_norm,
                topic_norm: &topic_norm,
                candidate_id: "self",
                siblings: &siblings,
                options,
                ruleset: &self.ruleset,
                normalizer: &self.normalizer,
            };
            let mut cache = DistanceCache::new(256);
            rule(&ctx, &mut cache).unwrap()
        }
    }

    #[test]
    fn classifier_conflict_across_families() {
        let h = Harness::new();
        let p = h
            .eval(
                exclusive_classifier_conflict,
                "Salsa Solo L2",
                "Salsa Trio L2",
                &[],
                MatchOptions::default(),
            )
            .unwrap();
        assert_eq!(p.kind, PenaltyKind::ExclusiveClassifierConflict);
        assert!(p.is_hard_reject());
    }

    #[test]
    fn classifier_synonyms_within_family_are_fine() {
        let h = Harness::new();
        // "individual" and "solo" belong to the same family.
        assert!(
            h.eval(
                exclusive_classifier_conflict,
                "Salsa Individual L2",
                "Salsa Solo L2",
                &[],
                MatchOptions::default(),
            )
            .is_none()
        );
    }

    #[test]
    fn shared_family_suppresses_cross_family_conflict() {
        let h = Harness::new();
        // Topic has both "solo" and "group"; query's "solo" family is shared.
        assert!(
            h.eval(
                exclusive_classifier_conflict,
                "Salsa Solo",
                "Salsa Solo Group Practice",
                &[],
                MatchOptions::default(),
            )
            .is_none()
        );
    }

    #[test]
    fn level_conflict_on_disjoint_levels() {
        let h = Harness::new();
        let p = h
            .eval(
                level_conflict,
                "Bachata L2",
                "Bachata Nivel 3",
                &[],
                MatchOptions::default(),
            )
            .unwrap();
        assert_eq!(p.kind, PenaltyKind::LevelConflict);
    }

    #[test]
    fn level_conflict_ignored_is_milder_but_visible() {
        let h = Harness::new();
        let strict = h
            .eval(
                level_conflict,
                "Bachata L2",
                "Bachata L3",
                &[],
                MatchOptions::default(),
            )
            .unwrap();
        let relaxed = h
            .eval(
                level_conflict,
                "Bachata L2",
                "Bachata L3",
                &[],
                MatchOptions {
                    ignore_level_mismatch: true,
                },
            )
            .unwrap();
        assert_eq!(relaxed.kind, PenaltyKind::LevelConflictIgnored);
        assert!(relaxed.points > strict.points);
        assert!(relaxed.points < 0);
    }

    #[test]
    fn shared_level_is_no_conflict() {
        let h = Harness::new();
        assert!(
            h.eval(
                level_conflict,
                "Bachata L2 and L3",
                "Bachata Level 3",
                &[],
                MatchOptions::default(),
            )
            .is_none()
        );
    }

    #[test]
    fn program_query_vs_person_topic() {
        let h = Harness::new();
        let p = h
            .eval(
                program_vs_person,
                "Salsa clase nivel 2",
                "Petrova (BG)(Web), Elena",
                &[],
                MatchOptions::default(),
            )
            .unwrap();
        assert_eq!(p.kind, PenaltyKind::ProgramVsPerson);
    }

    #[test]
    fn program_token_in_topic_suppresses_person_conflict() {
        let h = Harness::new();
        assert!(
            h.eval(
                program_vs_person,
                "Salsa clase nivel 2",
                "Clase Particular Elena",
                &[],
                MatchOptions::default(),
            )
            .is_none()
        );
    }

    #[test]
    fn structural_token_missing_fires_per_family() {
        let h = Harness::new();
        let p = h
            .eval(
                structural_token_missing,
                "Salsa Solo L2",
                "Salsa L2",
                &[],
                MatchOptions::default(),
            )
            .unwrap();
        assert_eq!(p.kind, PenaltyKind::StructuralTokenMissing);
        assert!(p.reason.contains("solo"));
    }

    #[test]
    fn structural_token_missing_suppressed_by_option() {
        let h = Harness::new();
        assert!(
            h.eval(
                structural_token_missing,
                "Salsa Solo L2",
                "Salsa L2",
                &[],
                MatchOptions {
                    ignore_level_mismatch: true,
                },
            )
            .is_none()
        );
    }

    #[test]
    fn weak_match_clean_pass_when_all_query_tokens_covered() {
        let h = Harness::new();
        assert!(
            h.eval(
                weak_match,
                "Salsa Shines",
                "Salsa Shines Advanced",
                &[],
                MatchOptions::default(),
            )
            .is_none()
        );
    }

    #[test]
    fn weak_match_zero_overlap_is_hard_reject() {
        let h = Harness::new();
        let p = h
            .eval(
                weak_match,
                "Quantum Seminar",
                "Salsa Shines",
                &[],
                MatchOptions::default(),
            )
            .unwrap();
        assert_eq!(p.kind, PenaltyKind::WeakMatch);
        assert_eq!(p.coverage, Some(0.0));
        assert!(p.is_hard_reject());
    }

    #[test]
    fn weak_match_extra_info_is_lenient() {
        let h = Harness::new();
        // Topic fully covered by the query; the query's extra token is
        // benign.
        let p = h
            .eval(
                weak_match,
                "Bachata Sensual Evening",
                "Bachata Sensual",
                &[],
                MatchOptions::default(),
            )
            .unwrap();
        let penalties = &h.ruleset.config.penalties;
        assert_eq!(p.points, penalties.weak_match_extra_info);
        assert!(!p.is_hard_reject());
    }

    #[test]
    fn weak_match_formal_title_blocks_leniency() {
        let h = Harness::new();
        let p = h
            .eval(
                weak_match,
                "Dr. Bachata Sensual Evening",
                "Bachata Sensual L2",
                &[],
                MatchOptions::default(),
            )
            .unwrap();
        let penalties = &h.ruleset.config.penalties;
        assert_eq!(p.points, penalties.weak_match_missing_token);
        assert!(p.points < penalties.weak_match_extra_info);
    }

    #[test]
    fn weak_match_tolerates_typos_within_budget() {
        let h = Harness::new();
        // "sensuol" is edit distance 1 from "sensual".
        assert!(
            h.eval(
                weak_match,
                "Bachata Sensuol",
                "Bachata Sensual",
                &[],
                MatchOptions::default(),
            )
            .is_none()
        );
    }

    #[test]
    fn weak_match_both_people_fully_covered_is_lenient() {
        let h = Harness::new();
        let p = h
            .eval(
                weak_match,
                "Elena Petrova Substitute",
                "Elena Petrova",
                &[],
                MatchOptions::default(),
            )
            .unwrap();
        let penalties = &h.ruleset.config.penalties;
        assert_eq!(p.points, penalties.weak_match_extra_info);
    }

    #[test]
    fn group_number_conflict_ignores_level_digits() {
        let h = Harness::new();
        // The only query digit is a level, so there is no group number
        // on the query side and the rule stays quiet.
        assert!(
            h.eval(
                group_number_conflict,
                "Salsa L2",
                "Salsa Group 5",
                &[],
                MatchOptions::default(),
            )
            .is_none()
        );
        let p = h
            .eval(
                group_number_conflict,
                "Salsa Group 4",
                "Salsa Group 5",
                &[],
                MatchOptions::default(),
            )
            .unwrap();
        assert_eq!(p.kind, PenaltyKind::GroupNumberConflict);
    }

    #[test]
    fn numeric_conflict_counts_level_digits() {
        let h = Harness::new();
        let p = h
            .eval(
                numeric_conflict,
                "Salsa L2",
                "Salsa Group 5",
                &[],
                MatchOptions::default(),
            )
            .unwrap();
        assert_eq!(p.kind, PenaltyKind::NumericConflict);
        // A shared digit anywhere clears it.
        assert!(
            h.eval(
                numeric_conflict,
                "Salsa L2 Group 5",
                "Salsa Group 5",
                &[],
                MatchOptions::default(),
            )
            .is_none()
        );
    }

    #[test]
    fn orphan_number_needs_a_sibling() {
        let h = Harness::new();
        // No sibling shares the digit-stripped base: no penalty.
        assert!(
            h.eval(
                orphan_number,
                "CH ACME",
                "CH 1 ACME",
                &[("other", "Bachata Social")],
                MatchOptions::default(),
            )
            .is_none()
        );
        let p = h
            .eval(
                orphan_number,
                "CH ACME",
                "CH 1 ACME",
                &[("variant", "CH 2 ACME")],
                MatchOptions::default(),
            )
            .unwrap();
        assert_eq!(p.kind, PenaltyKind::OrphanNumber);
    }

    #[test]
    fn orphan_number_quiet_when_query_has_the_number() {
        let h = Harness::new();
        assert!(
            h.eval(
                orphan_number,
                "CH 1 ACME",
                "CH 1 ACME",
                &[("variant", "CH 2 ACME")],
                MatchOptions::default(),
            )
            .is_none()
        );
    }

    #[test]
    fn orphan_level_needs_unleveled_query_and_leveled_sibling() {
        let h = Harness::new();
        let p = h
            .eval(
                orphan_level,
                "Salsa Shines",
                "Salsa Shines L2",
                &[("variant", "Salsa Shines L3")],
                MatchOptions::default(),
            )
            .unwrap();
        assert_eq!(p.kind, PenaltyKind::OrphanLevel);

        // Query already has a level: quiet.
        assert!(
            h.eval(
                orphan_level,
                "Salsa Shines L2",
                "Salsa Shines L2",
                &[("variant", "Salsa Shines L3")],
                MatchOptions::default(),
            )
            .is_none()
        );

        // Sibling at the same level only: quiet.
        assert!(
            h.eval(
                orphan_level,
                "Salsa Shines",
                "Salsa Shines L2",
                &[("variant", "Salsa Shines L2")],
                MatchOptions::default(),
            )
            .is_none()
        );
    }

    #[test]
    fn level_extraction_variants() {
        let levels = extract_levels("Salsa L2, nivel 3 and Level  4").unwrap();
        assert_eq!(levels, BTreeSet::from([2, 3, 4]));
        assert!(extract_levels("Solar panels").unwrap().is_empty());
    }

    #[test]
    fn oversized_level_number_is_a_rule_error() {
        assert!(matches!(
            extract_levels("L99999999999999999999"),
            Err(RuleError::LevelParse { .. })
        ));
    }

    #[test]
    fn distinctive_tokens_exclude_noise() {
        let h = Harness::new();
        let tokens = distinctive_tokens("salsa solo l7 12 fr3 shines", &h.ruleset);
        assert_eq!(tokens, vec!["salsa", "shines"]);
    }
}
