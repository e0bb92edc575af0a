//! Ranks scored candidates and classifies the batch outcome.
//!
//! One pass over the scored results, no external events. The three
//! ambiguity triggers are evaluated in a fixed order: score gap, orphan
//! penalty with unconvincing score, then the low-confidence tier.

use serde::{Deserialize, Serialize};

use crate::config::Ruleset;
use crate::rules::PenaltyKind;
use crate::scoring::ScoringResult;

/// How many candidates to surface for operator review.
const AMBIGUOUS_PREVIEW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Assigned,
    Ambiguous,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
    None,
}

/// The classified outcome for one query's candidate set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDecision {
    pub decision: Decision,
    pub confidence: Confidence,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_match: Option<ScoringResult>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ambiguous_candidates: Vec<ScoringResult>,
}

/// Classify one query's scored candidates.
///
/// `results` may arrive in retrieval order; they are stably sorted by
/// descending final score here, so ties keep retrieval order.
pub fn decide(mut results: Vec<ScoringResult>, ruleset: &Ruleset) -> MatchDecision {
    results.sort_by(|a, b| b.final_score.cmp(&a.final_score));

    let thresholds = &ruleset.config.thresholds;

    if results.is_empty() {
        return MatchDecision {
            decision: Decision::NotFound,
            confidence: Confidence::None,
            reason: "no candidate meetings retrieved".to_string(),
            detailed_reason: None,
            best_match: None,
            ambiguous_candidates: Vec::new(),
        };
    }

    let valid: Vec<&ScoringResult> = results
        .iter()
        .filter(|r| !r.is_disqualified && r.final_score >= thresholds.minimum_score)
        .collect();

    if valid.is_empty() {
        // Fall back to the single best result overall, even disqualified,
        // for operator visibility.
        let best = &results[0];
        if best.has_hard_reject() {
            return MatchDecision {
                decision: Decision::NotFound,
                confidence: Confidence::None,
                reason: "best candidate carries a hard-reject conflict".to_string(),
                detailed_reason: best.detail(),
                best_match: None,
                ambiguous_candidates: Vec::new(),
            };
        }
        return MatchDecision {
            decision: Decision::Ambiguous,
            confidence: Confidence::Low,
            reason: format!(
                "no candidate reached the minimum score of {}",
                thresholds.minimum_score
            ),
            detailed_reason: best.detail(),
            best_match: Some(best.clone()),
            ambiguous_candidates: results.iter().take(AMBIGUOUS_PREVIEW).cloned().collect(),
        };
    }

    let best = valid[0];

    // Trigger 1: runner-up too close.
    if let Some(second) = valid.get(1)
        && best.final_score - second.final_score < thresholds.ambiguity_score_diff
    {
        return MatchDecision {
            decision: Decision::Ambiguous,
            confidence: Confidence::Low,
            reason: format!(
                "top candidates within {} points ({} vs {})",
                thresholds.ambiguity_score_diff, best.final_score, second.final_score
            ),
            detailed_reason: best.detail(),
            best_match: Some(best.clone()),
            ambiguous_candidates: valid.iter().map(|r| (*r).clone()).collect(),
        };
    }

    // Trigger 2: orphan number/level with an unconvincing leader score.
    // The query under-specifies which variant it wants.
    let has_orphan = best.has_penalty(PenaltyKind::OrphanNumber)
        || best.has_penalty(PenaltyKind::OrphanLevel);
    if has_orphan && best.final_score < thresholds.high_confidence_score {
        return MatchDecision {
            decision: Decision::Ambiguous,
            confidence: Confidence::Low,
            reason: "query does not specify which numbered or leveled variant is wanted"
                .to_string(),
            detailed_reason: best.detail(),
            best_match: Some(best.clone()),
            ambiguous_candidates: valid
                .iter()
                .take(AMBIGUOUS_PREVIEW)
                .map(|r| (*r).clone())
                .collect(),
        };
    }

    // Trigger 3: a lone valid candidate with an unconvincing score still
    // goes to review.
    let confidence = if best.final_score >= thresholds.high_confidence_score {
        Confidence::High
    } else if best.final_score >= thresholds.medium_confidence_score {
        Confidence::Medium
    } else {
        Confidence::Low
    };

    if confidence == Confidence::Low {
        return MatchDecision {
            decision: Decision::Ambiguous,
            confidence,
            reason: format!("best score {} is below review confidence", best.final_score),
            detailed_reason: best.detail(),
            best_match: Some(best.clone()),
            ambiguous_candidates: valid
                .iter()
                .take(AMBIGUOUS_PREVIEW)
                .map(|r| (*r).clone())
                .collect(),
        };
    }

    MatchDecision {
        decision: Decision::Assigned,
        confidence,
        reason: format!("matched with score {}", best.final_score),
        detailed_reason: best.detail(),
        best_match: Some(best.clone()),
        ambiguous_candidates: Vec::new(),
    }
}
