//! Applies the penalty rule set to one candidate.
//!
//! Rules run in their fixed declaration order against a base score. A
//! rule that fails to evaluate is logged and skipped; its contribution
//! is zero and scoring continues with the remaining rules.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::{MeetingCandidate, ScheduleQuery};
use crate::config::Ruleset;
use crate::distance::DistanceCache;
use crate::normalize::Normalizer;
use crate::rules::{AppliedPenalty, PenaltyKind, RULES, RuleContext, Sibling};

/// Scored outcome for one (query, candidate) pair.
///
/// `final_score` floors the raw score at zero for display and ranking,
/// while `is_disqualified` is decided on the *unfloored* raw score.
/// Both derive from the same raw value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringResult {
    pub candidate: MeetingCandidate,
    pub base_score: i32,
    pub final_score: i32,
    /// Penalties in rule-declaration order.
    pub penalties: Vec<AppliedPenalty>,
    pub is_disqualified: bool,
}

impl ScoringResult {
    pub fn has_penalty(&self, kind: PenaltyKind) -> bool {
        self.penalties.iter().any(|p| p.kind == kind)
    }

    pub fn has_hard_reject(&self) -> bool {
        self.penalties.iter().any(|p| p.is_hard_reject())
    }

    /// Penalty reasons joined for operator-facing detail.
    pub fn detail(&self) -> Option<String> {
        if self.penalties.is_empty() {
            return None;
        }
        Some(
            self.penalties
                .iter()
                .map(|p| format!("{} ({}): {}", p.kind, p.points, p.reason))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Score one candidate against a query.
///
/// `siblings` is the full retrieved candidate set (this candidate
/// included); the orphan rules use it to detect numbered and leveled
/// variants of the same base topic.
#[allow(clippy::too_many_arguments)]
pub fn score_candidate(
    query: &ScheduleQuery,
    query_norm: &str,
    candidate: &MeetingCandidate,
    topic_norm: &str,
    siblings: &[Sibling],
    ruleset: &Ruleset,
    normalizer: &Normalizer,
    cache: &mut DistanceCache,
) -> ScoringResult {
    let ctx = RuleContext {
        query_raw: &query.program_text,
        topic_raw: &candidate.topic,
        query_norm,
        topic_norm,
        candidate_id: &candidate.id,
        siblings,
        options: query.options,
        ruleset,
        normalizer,
    };

    let base_score = ruleset.config.base_score;
    let mut raw_score = base_score;
    let mut penalties = Vec::new();

    for (name, rule) in RULES {
        match rule(&ctx, cache) {
            Ok(Some(penalty)) => {
                raw_score += penalty.points;
                penalties.push(penalty);
            }
            Ok(None) => {}
            Err(error) => {
                warn!(
                    rule = name,
                    candidate_id = %candidate.id,
                    %error,
                    "rule evaluation failed, skipping"
                );
            }
        }
    }

    ScoringResult {
        candidate: candidate.clone(),
        base_score,
        final_score: raw_score.max(0),
        penalties,
        is_disqualified: raw_score <= 0,
    }
}
