//! Catalog snapshot types consumed by the matching engine.
//!
//! Catalogs are supplied once per batch by the sync/import layer and are
//! read-only for the batch's duration. Identity is `id`; several meetings
//! may normalize to the same topic, which is a collision, not an error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A previously-registered meeting that queries are matched against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingCandidate {
    pub id: String,
    /// Free-text topic as typed by whoever registered the meeting.
    pub topic: String,
    pub host_id: String,
    pub start_time: Option<DateTime<Utc>>,
}

/// A registered user eligible to be resolved as an instructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCandidate {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
}

impl UserCandidate {
    /// "First Last", the name form users most often type in schedules.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// One freeform schedule row to be matched: a program description plus
/// the instructor name as typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    pub program_text: String,
    pub instructor_text: String,
    #[serde(default)]
    pub options: MatchOptions,
}

/// Per-query matching relaxations.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOptions {
    /// Downgrade level conflicts to an advisory penalty and skip the
    /// structural-token-missing rule entirely.
    #[serde(default)]
    pub ignore_level_mismatch: bool,
}
