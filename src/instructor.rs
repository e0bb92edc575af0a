//! Staged instructor resolution against the user catalog.
//!
//! Runs independently of meeting scoring: exact full name, exact display
//! name, token-subset, then fuzzy with a token-overlap guard. No stage
//! matching means the instructor stays unresolved.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::UserCandidate;
use crate::config::Ruleset;
use crate::normalize::Normalizer;
use crate::rules::word_tokens;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStage {
    ExactFullName,
    ExactDisplayName,
    TokenSubset,
    Fuzzy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructorMatch {
    pub user: UserCandidate,
    pub stage: ResolutionStage,
}

/// Resolve a free-text instructor name against the user catalog.
pub fn resolve_instructor(
    raw: &str,
    users: &[UserCandidate],
    normalizer: &Normalizer,
    ruleset: &Ruleset,
) -> Option<InstructorMatch> {
    let query = normalizer.normalize(raw);
    if query.is_empty() {
        return None;
    }

    // Stage 1: exact normalized full name.
    for user in users {
        if normalizer.normalize(&user.full_name()) == query {
            return Some(InstructorMatch {
                user: user.clone(),
                stage: ResolutionStage::ExactFullName,
            });
        }
    }

    // Stage 2: exact normalized display name.
    for user in users {
        if normalizer.normalize(&user.display_name) == query {
            return Some(InstructorMatch {
                user: user.clone(),
                stage: ResolutionStage::ExactDisplayName,
            });
        }
    }

    let query_tokens: HashSet<String> = word_tokens(&query).into_iter().collect();

    // Stage 3: every token of the user's full or display name appears in
    // the query. Among qualifiers, the one with the most name tokens wins,
    // so "maria fernanda lopez" beats a lone "maria".
    let mut subset_best: Option<(usize, &UserCandidate)> = None;
    for user in users {
        let full_tokens = word_tokens(&normalizer.normalize(&user.full_name()));
        let display_tokens = word_tokens(&normalizer.normalize(&user.display_name));
        for tokens in [full_tokens, display_tokens] {
            if tokens.is_empty() || !tokens.iter().all(|t| query_tokens.contains(t)) {
                continue;
            }
            if subset_best.is_none_or(|(count, _)| tokens.len() > count) {
                subset_best = Some((tokens.len(), user));
            }
        }
    }
    if let Some((_, user)) = subset_best {
        return Some(InstructorMatch {
            user: user.clone(),
            stage: ResolutionStage::TokenSubset,
        });
    }

    // Stage 4: fuzzy over both name forms, guarded by a token-overlap
    // floor so a shared surname alone cannot resolve.
    let max_distance = ruleset.config.thresholds.fuzzy_max_distance;
    let required_overlap = query_tokens.len().min(2);
    let mut fuzzy_best: Option<(f64, &UserCandidate)> = None;
    for user in users {
        let full = normalizer.normalize(&user.full_name());
        let display = normalizer.normalize(&user.display_name);
        let distance = name_distance(&query, &full).min(name_distance(&query, &display));
        if distance > max_distance {
            continue;
        }
        let overlap = [&full, &display]
            .iter()
            .map(|name| {
                word_tokens(name)
                    .iter()
                    .filter(|t| query_tokens.contains(*t))
                    .count()
            })
            .max()
            .unwrap_or(0);
        if overlap < required_overlap {
            continue;
        }
        if fuzzy_best.is_none_or(|(best, _)| distance < best) {
            fuzzy_best = Some((distance, user));
        }
    }
    if let Some((distance, user)) = fuzzy_best {
        debug!(instructor = raw, user_id = %user.id, distance, "resolved instructor via fuzzy search");
        return Some(InstructorMatch {
            user: user.clone(),
            stage: ResolutionStage::Fuzzy,
        });
    }

    None
}

fn name_distance(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 1.0;
    }
    1.0 - strsim::normalized_levenshtein(a, b)
}
