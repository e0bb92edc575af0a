//! The caller-facing matching engine.
//!
//! Wires retrieval, scoring, decision and instructor resolution together
//! and refines `assigned` into `to_update` or `manual` based on whether
//! the resolved instructor already hosts the matched meeting.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{MeetingCandidate, ScheduleQuery, UserCandidate};
use crate::config::Ruleset;
use crate::decision::{self, Confidence, Decision, MatchDecision};
use crate::distance::DistanceCache;
use crate::instructor::{InstructorMatch, resolve_instructor};
use crate::normalize::Normalizer;
use crate::retrieval::CandidateIndex;
use crate::rules::Sibling;
use crate::scoring::{ScoringResult, score_candidate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Matched and the resolved instructor already hosts the meeting.
    Assigned,
    /// Matched, but the meeting's host differs from the resolved
    /// instructor.
    ToUpdate,
    Ambiguous,
    NotFound,
    /// Matched a meeting, but the instructor could not be resolved.
    Manual,
}

/// The per-query outcome handed to the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub status: MatchStatus,
    pub confidence: Confidence,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detailed_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found_instructor: Option<InstructorMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_match: Option<ScoringResult>,
    pub candidates: Vec<ScoringResult>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub ambiguous_candidates: Vec<ScoringResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i32>,
}

/// Batch outcome counts, logged after `match_all`.
#[derive(Debug, Default, Clone, Copy)]
struct BatchStats {
    assigned: usize,
    to_update: usize,
    ambiguous: usize,
    not_found: usize,
    manual: usize,
}

impl BatchStats {
    fn record(&mut self, status: MatchStatus) {
        match status {
            MatchStatus::Assigned => self.assigned += 1,
            MatchStatus::ToUpdate => self.to_update += 1,
            MatchStatus::Ambiguous => self.ambiguous += 1,
            MatchStatus::NotFound => self.not_found += 1,
            MatchStatus::Manual => self.manual += 1,
        }
    }
}

/// One engine per catalog snapshot. Matching calls are deterministic; the
/// only mutable state is the edit-distance cache, cleared per batch.
pub struct MatchEngine {
    ruleset: Ruleset,
    normalizer: Normalizer,
    index: CandidateIndex,
    users: Vec<UserCandidate>,
    cache: DistanceCache,
}

impl MatchEngine {
    pub fn new(ruleset: Ruleset, meetings: Vec<MeetingCandidate>, users: Vec<UserCandidate>) -> Self {
        let normalizer = Normalizer::new(&ruleset);
        let index = CandidateIndex::build(&normalizer, meetings);
        let cache = DistanceCache::new(ruleset.config.distance_cache_capacity);
        Self {
            ruleset,
            normalizer,
            index,
            users,
            cache,
        }
    }

    /// Match one schedule row against the meeting and user catalogs.
    pub fn match_one(&mut self, query: &ScheduleQuery) -> MatchResult {
        let query_norm = self.normalizer.normalize(&query.program_text);
        let indices = self
            .index
            .find_candidates(&query_norm, &self.ruleset.config.thresholds);
        debug!(
            program = %query.program_text,
            candidates = indices.len(),
            "retrieved candidate set"
        );

        let siblings: Vec<Sibling> = indices
            .iter()
            .map(|&idx| {
                let meeting = self.index.meeting(idx);
                Sibling {
                    id: meeting.id.clone(),
                    topic: meeting.topic.clone(),
                }
            })
            .collect();

        let results: Vec<ScoringResult> = indices
            .iter()
            .map(|&idx| {
                score_candidate(
                    query,
                    &query_norm,
                    self.index.meeting(idx),
                    self.index.normalized_topic(idx),
                    &siblings,
                    &self.ruleset,
                    &self.normalizer,
                    &mut self.cache,
                )
            })
            .collect();

        let decision = decision::decide(results.clone(), &self.ruleset);
        let instructor = resolve_instructor(
            &query.instructor_text,
            &self.users,
            &self.normalizer,
            &self.ruleset,
        );

        self.refine(decision, instructor, results)
    }

    /// Match a whole schedule. The distance cache is cleared first so
    /// batch memory stays bounded by one batch's working set.
    pub fn match_all(&mut self, queries: &[ScheduleQuery]) -> Vec<MatchResult> {
        self.cache.clear();
        let mut stats = BatchStats::default();
        let results: Vec<MatchResult> = queries
            .iter()
            .map(|query| {
                let result = self.match_one(query);
                stats.record(result.status);
                result
            })
            .collect();
        let (hits, misses) = self.cache.stats();
        info!(
            queries = queries.len(),
            assigned = stats.assigned,
            to_update = stats.to_update,
            ambiguous = stats.ambiguous,
            not_found = stats.not_found,
            manual = stats.manual,
            cache_hits = hits,
            cache_misses = misses,
            "matched schedule batch"
        );
        results
    }

    /// Fold the instructor resolution into the meeting decision.
    fn refine(
        &self,
        decision: MatchDecision,
        instructor: Option<InstructorMatch>,
        candidates: Vec<ScoringResult>,
    ) -> MatchResult {
        let score = decision.best_match.as_ref().map(|b| b.final_score);
        let meeting_id = decision.best_match.as_ref().map(|b| b.candidate.id.clone());

        let (status, reason) = match decision.decision {
            Decision::Ambiguous => (MatchStatus::Ambiguous, decision.reason),
            Decision::NotFound => (MatchStatus::NotFound, decision.reason),
            Decision::Assigned => match &instructor {
                None => (
                    MatchStatus::Manual,
                    format!("{}; instructor unresolved", decision.reason),
                ),
                Some(found) => {
                    let host_matches = decision
                        .best_match
                        .as_ref()
                        .is_some_and(|b| b.candidate.host_id == found.user.id);
                    if host_matches {
                        (MatchStatus::Assigned, decision.reason)
                    } else {
                        (
                            MatchStatus::ToUpdate,
                            format!("{}; meeting host differs from instructor", decision.reason),
                        )
                    }
                }
            },
        };

        MatchResult {
            status,
            confidence: decision.confidence,
            reason,
            detailed_reason: decision.detailed_reason,
            meeting_id,
            found_instructor: instructor,
            best_match: decision.best_match,
            candidates,
            ambiguous_candidates: decision.ambiguous_candidates,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;

    fn meeting(id: &str, topic: &str, host_id: &str) -> MeetingCandidate {
        MeetingCandidate {
            id: id.to_string(),
            topic: topic.to_string(),
            host_id: host_id.to_string(),
            start_time: None,
        }
    }

    fn user(id: &str, first: &str, last: &str) -> UserCandidate {
        UserCandidate {
            id: id.to_string(),
            email: format!("{id}@example.com"),
            first_name: first.to_string(),
            last_name: last.to_string(),
            display_name: first.to_string(),
        }
    }

    fn query(program: &str, instructor: &str) -> ScheduleQuery {
        ScheduleQuery {
            program_text: program.to_string(),
            instructor_text: instructor.to_string(),
            options: Default::default(),
        }
    }

    fn engine(meetings: Vec<MeetingCandidate>, users: Vec<UserCandidate>) -> MatchEngine {
        let ruleset = RuleConfig::default().compile().unwrap();
        MatchEngine::new(ruleset, meetings, users)
    }

    #[test]
    fn exact_match_with_hosting_instructor_is_assigned() {
        let mut engine = engine(
            vec![meeting("m1", "Salsa Level 2", "u1")],
            vec![user("u1", "Ana", "García")],
        );
        let result = engine.match_one(&query("Salsa Level 2", "Ana García"));
        assert_eq!(result.status, MatchStatus::Assigned);
        assert_eq!(result.meeting_id.as_deref(), Some("m1"));
        assert_eq!(result.score, Some(100));
        assert_eq!(result.found_instructor.unwrap().user.id, "u1");
    }

    #[test]
    fn different_host_becomes_to_update() {
        let mut engine = engine(
            vec![meeting("m1", "Salsa Level 2", "u9")],
            vec![user("u1", "Ana", "García")],
        );
        let result = engine.match_one(&query("Salsa Level 2", "Ana García"));
        assert_eq!(result.status, MatchStatus::ToUpdate);
        assert_eq!(result.meeting_id.as_deref(), Some("m1"));
    }

    #[test]
    fn unresolved_instructor_becomes_manual() {
        let mut engine = engine(
            vec![meeting("m1", "Salsa Level 2", "u1")],
            vec![user("u1", "Ana", "García")],
        );
        let result = engine.match_one(&query("Salsa Level 2", "Zoltan Kovacs"));
        assert_eq!(result.status, MatchStatus::Manual);
        assert!(result.found_instructor.is_none());
        assert_eq!(result.meeting_id.as_deref(), Some("m1"));
    }

    #[test]
    fn no_catalog_match_is_not_found_even_with_instructor() {
        let mut engine = engine(
            vec![meeting("m1", "Advanced Pottery Workshop", "u1")],
            vec![user("u1", "Ana", "García")],
        );
        let result = engine.match_one(&query("Quantum Knitting", "Ana García"));
        assert_eq!(result.status, MatchStatus::NotFound);
        assert!(result.meeting_id.is_none());
    }

    #[test]
    fn numbered_siblings_without_a_number_are_ambiguous() {
        let mut engine = engine(
            vec![
                meeting("m1", "CH 1 ACME L2", "u1"),
                meeting("m2", "CH 2 ACME L2", "u1"),
            ],
            vec![user("u1", "Ana", "García")],
        );
        let result = engine.match_one(&query("CH ACME", "Ana García"));
        assert_eq!(result.status, MatchStatus::Ambiguous);
        assert!(result.ambiguous_candidates.len() >= 2);
    }

    #[test]
    fn batch_clears_the_distance_cache_and_yields_one_result_per_query() {
        let mut engine = engine(
            vec![meeting("m1", "Salsa Level 2", "u1")],
            vec![user("u1", "Ana", "García")],
        );
        let queries = vec![
            query("Salsa Level 2", "Ana García"),
            query("Totally Unrelated", "Ana García"),
        ];
        let results = engine.match_all(&queries);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, MatchStatus::Assigned);
        assert_eq!(results[1].status, MatchStatus::NotFound);
    }
}
