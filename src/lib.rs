//! Fuzzy matching of freeform schedule rows to a meeting catalog.
//!
//! Pipeline: normalize the program text, retrieve candidate meetings
//! (exact, fuzzy, then token-overlap), score each candidate through a
//! fixed penalty rule set, classify the outcome, and independently
//! resolve the instructor name against the user catalog.

pub mod catalog;
pub mod config;
pub mod decision;
pub mod distance;
pub mod engine;
pub mod instructor;
pub mod logging;
pub mod normalize;
pub mod retrieval;
pub mod rules;
pub mod scoring;

pub use catalog::{MatchOptions, MeetingCandidate, ScheduleQuery, UserCandidate};
pub use config::{ConfigError, RuleConfig, Ruleset};
pub use decision::{Confidence, Decision, MatchDecision};
pub use engine::{MatchEngine, MatchResult, MatchStatus};
pub use instructor::{InstructorMatch, ResolutionStage};
pub use scoring::ScoringResult;
