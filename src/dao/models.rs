use std::{fmt, time::SystemTime};

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle shared by events, rounds and questions.
///
/// Transitions are driven by the organiser surface; the client only observes
/// them. The only legal path is `pending -> ongoing -> completed`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    /// Not released yet.
    Pending,
    /// Currently open.
    Ongoing,
    /// Closed for good.
    Completed,
}

impl LifecycleStatus {
    /// Whether the lifecycle may move from `self` to `next` in a single step.
    pub fn can_advance_to(self, next: LifecycleStatus) -> bool {
        matches!(
            (self, next),
            (LifecycleStatus::Pending, LifecycleStatus::Ongoing)
                | (LifecycleStatus::Ongoing, LifecycleStatus::Completed)
        )
    }

    /// Parse a status column value, accepting the upper-case spellings used by
    /// older schema generations.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "pending" => Some(LifecycleStatus::Pending),
            "ongoing" => Some(LifecycleStatus::Ongoing),
            "completed" | "complete" => Some(LifecycleStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LifecycleStatus::Pending => "pending",
            LifecycleStatus::Ongoing => "ongoing",
            LifecycleStatus::Completed => "completed",
        };
        f.write_str(label)
    }
}

impl<'de> Deserialize<'de> for LifecycleStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        LifecycleStatus::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown lifecycle status `{raw}`")))
    }
}

/// Grading outcome of a response; absent until the organiser grades it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Correctness {
    True,
    Partial,
    False,
}

/// A trivia session players join with a numeric code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEntity {
    pub id: Uuid,
    pub name: String,
    pub join_code: String,
    /// Raw timestamp column, displayed as-is.
    pub scheduled_at: String,
    pub status: LifecycleStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
}

/// Ordered grouping of questions inside an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub sequence_number: i32,
    pub status: LifecycleStatus,
    #[serde(default)]
    pub description: Option<String>,
}

/// A single prompt scoped to a round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    pub id: Uuid,
    pub round_id: Uuid,
    pub sequence_number: i32,
    pub question_text: String,
    pub points: i32,
    pub status: LifecycleStatus,
    /// Only exposed by the backend once the question is completed.
    #[serde(default)]
    pub correct_answer: Option<String>,
}

/// Participant group scoped to one event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
}

/// Payload used to create a team row.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewTeamEntity {
    pub event_id: Uuid,
    pub name: String,
    /// Anonymous user the team is attributed to.
    pub created_by: Uuid,
}

/// A team's answer to a question. At most one exists per `(team_id, question_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResponseEntity {
    pub id: Uuid,
    pub team_id: Uuid,
    pub question_id: Uuid,
    #[serde(default)]
    pub text_response: Option<String>,
    #[serde(default)]
    pub is_correct: Option<Correctness>,
    #[serde(default)]
    pub points_awarded: Option<i32>,
}

/// Insert-or-update payload keyed by `(team_id, question_id)`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResponseUpsertEntity {
    pub team_id: Uuid,
    pub question_id: Uuid,
    pub text_response: String,
}

/// Leaderboard row computed by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamScoreEntity {
    #[serde(alias = "id")]
    pub team_id: Uuid,
    pub name: String,
    #[serde(alias = "team_total_points")]
    pub total_points: i64,
}

/// Anonymous identity used to attribute rows created by this client.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityEntity {
    pub user_id: Uuid,
    pub access_token: String,
    pub refresh_token: String,
    /// Absent when the backend does not report an expiry.
    #[serde(default)]
    pub expires_at: Option<SystemTime>,
}

impl IdentityEntity {
    /// Whether the access token is past its expiry at `now`.
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

impl fmt::Debug for IdentityEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityEntity")
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
