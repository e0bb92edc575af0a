//! Staged candidate retrieval over a meeting catalog.
//!
//! Built once per batch. Stage order: exact normalized-topic lookup
//! (short-circuits), fuzzy search bounded by a normalized edit distance,
//! then a token-overlap fallback for queries that share enough
//! vocabulary with a topic without resembling it as a whole string.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::catalog::MeetingCandidate;
use crate::config::Thresholds;
use crate::normalize::Normalizer;

/// Index over one catalog snapshot. Holds the catalog for the duration
/// of a batch; candidates are returned by reference.
#[derive(Debug)]
pub struct CandidateIndex {
    meetings: Vec<MeetingCandidate>,
    /// Normalized topic per meeting, parallel to `meetings`.
    normalized: Vec<String>,
    /// Exact lookup. A list, not a single value: distinct meetings may
    /// normalize to the same topic.
    exact: HashMap<String, Vec<usize>>,
}

impl CandidateIndex {
    pub fn build(normalizer: &Normalizer, meetings: Vec<MeetingCandidate>) -> Self {
        let normalized: Vec<String> = meetings
            .iter()
            .map(|m| normalizer.normalize(&m.topic))
            .collect();
        let mut exact: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, topic) in normalized.iter().enumerate() {
            if !topic.is_empty() {
                exact.entry(topic.clone()).or_default().push(idx);
            }
        }
        Self {
            meetings,
            normalized,
            exact,
        }
    }

    pub fn len(&self) -> usize {
        self.meetings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meetings.is_empty()
    }

    pub fn meeting(&self, idx: usize) -> &MeetingCandidate {
        &self.meetings[idx]
    }

    pub fn normalized_topic(&self, idx: usize) -> &str {
        &self.normalized[idx]
    }

    /// Retrieve candidate meetings for an already-normalized query.
    ///
    /// Deterministic for a fixed catalog and query; no I/O. Returns
    /// indices into this index, in retrieval order (fuzzy results ranked
    /// by ascending distance, ties keeping catalog order).
    pub fn find_candidates(&self, query_norm: &str, thresholds: &Thresholds) -> Vec<usize> {
        if query_norm.is_empty() {
            return Vec::new();
        }

        // Stage 1: exact normalized match.
        if let Some(hits) = self.exact.get(query_norm) {
            debug!(query = query_norm, count = hits.len(), "exact topic match");
            return hits.clone();
        }

        // Stage 2: fuzzy search, distance in [0, 1] with 0 a perfect match.
        let mut fuzzy: Vec<(usize, f64)> = self
            .normalized
            .iter()
            .enumerate()
            .filter(|(_, topic)| !topic.is_empty())
            .map(|(idx, topic)| (idx, 1.0 - strsim::normalized_levenshtein(query_norm, topic)))
            .filter(|(_, distance)| *distance <= thresholds.fuzzy_max_distance)
            .collect();
        if !fuzzy.is_empty() {
            fuzzy.sort_by(|a, b| a.1.total_cmp(&b.1));
            debug!(query = query_norm, count = fuzzy.len(), "fuzzy topic matches");
            return fuzzy.into_iter().map(|(idx, _)| idx).collect();
        }

        // Stage 3: token-overlap fallback.
        let query_tokens: HashSet<&str> = overlap_tokens(query_norm).collect();
        if query_tokens.is_empty() {
            return Vec::new();
        }
        let accepted: Vec<usize> = self
            .normalized
            .iter()
            .enumerate()
            .filter(|(_, topic)| {
                let topic_tokens: HashSet<&str> = overlap_tokens(topic).collect();
                let shared: Vec<&str> = topic_tokens.intersection(&query_tokens).copied().collect();
                let has_anchor = shared
                    .iter()
                    .any(|t| t.chars().count() > 2 && !t.chars().all(|c| c.is_ascii_digit()));
                has_anchor
                    && shared.len() >= thresholds.token_overlap_min_count
                    && shared.len() as f64 / query_tokens.len() as f64
                        >= thresholds.token_overlap_min_ratio
            })
            .map(|(idx, _)| idx)
            .collect();
        if !accepted.is_empty() {
            debug!(
                query = query_norm,
                count = accepted.len(),
                "token-overlap fallback matches"
            );
        }
        accepted
    }
}

/// Tokens considered by the overlap fallback: length two and up.
fn overlap_tokens(s: &str) -> impl Iterator<Item = &str> {
    s.split_whitespace().filter(|t| t.chars().count() >= 2)
}
