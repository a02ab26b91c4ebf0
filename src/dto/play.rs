//! Projections of the client state served by the play routes and SSE stream.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::{
        Correctness, EventEntity, LifecycleStatus, QuestionEntity, ResponseEntity, RoundEntity,
        TeamEntity, TeamScoreEntity,
    },
    dto::session::SessionResponse,
    state::client::ClientState,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventSummary {
    pub id: Uuid,
    pub name: String,
    pub join_code: String,
    pub scheduled_at: String,
    pub status: LifecycleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
}

impl From<EventEntity> for EventSummary {
    fn from(event: EventEntity) -> Self {
        Self {
            id: event.id,
            name: event.name,
            join_code: event.join_code,
            scheduled_at: event.scheduled_at,
            status: event.status,
            description: event.description,
            location: event.location,
            venue: event.venue,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundSummary {
    pub id: Uuid,
    pub name: String,
    pub sequence_number: i32,
    pub status: LifecycleStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<RoundEntity> for RoundSummary {
    fn from(round: RoundEntity) -> Self {
        Self {
            id: round.id,
            name: round.name,
            sequence_number: round.sequence_number,
            status: round.status,
            description: round.description,
        }
    }
}

/// Stored answer of this team to a question.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResponseSummary {
    pub id: Uuid,
    pub question_id: Uuid,
    pub text_response: Option<String>,
    /// Absent until the organiser grades the answer.
    pub is_correct: Option<Correctness>,
    pub points_awarded: Option<i32>,
}

impl From<ResponseEntity> for ResponseSummary {
    fn from(response: ResponseEntity) -> Self {
        Self {
            id: response.id,
            question_id: response.question_id,
            text_response: response.text_response,
            is_correct: response.is_correct,
            points_awarded: response.points_awarded,
        }
    }
}

/// Released question with this team's draft and stored answer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionSummary {
    pub id: Uuid,
    pub round_id: Uuid,
    pub sequence_number: i32,
    pub question_text: String,
    pub points: i32,
    pub status: LifecycleStatus,
    /// Only present once the question is completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    /// Input is enabled only while the question is ongoing.
    pub accepts_answers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseSummary>,
}

impl QuestionSummary {
    fn build(question: QuestionEntity, client: &ClientState) -> Self {
        let draft = client.draft(question.id).map(str::to_string);
        let response = client
            .responses()
            .iter()
            .find(|response| response.question_id == question.id)
            .cloned()
            .map(ResponseSummary::from);

        Self {
            id: question.id,
            round_id: question.round_id,
            sequence_number: question.sequence_number,
            question_text: question.question_text,
            points: question.points,
            accepts_answers: question.status == LifecycleStatus::Ongoing,
            status: question.status,
            correct_answer: question.correct_answer,
            draft,
            response,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamSummary {
    pub id: Uuid,
    pub name: String,
}

impl From<TeamEntity> for TeamSummary {
    fn from(team: TeamEntity) -> Self {
        Self {
            id: team.id,
            name: team.name,
        }
    }
}

/// Leaderboard row, in the order computed by the backend.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardRow {
    pub team_id: Uuid,
    pub name: String,
    pub total_points: i64,
}

impl From<TeamScoreEntity> for LeaderboardRow {
    fn from(row: TeamScoreEntity) -> Self {
        Self {
            team_id: row.team_id,
            name: row.name,
            total_points: row.total_points,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DraftSummary {
    pub question_id: Uuid,
    pub text: String,
}

/// Rounds slice with the current selection.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoundsView {
    pub rounds: Vec<RoundSummary>,
    pub active_round_id: Option<Uuid>,
    /// True when the player picked the active round explicitly.
    pub active_round_pinned: bool,
    pub round_ready: bool,
}

impl RoundsView {
    pub fn from_state(client: &ClientState) -> Self {
        Self {
            rounds: client
                .rounds()
                .iter()
                .cloned()
                .map(RoundSummary::from)
                .collect(),
            active_round_id: client.active_round_id(),
            active_round_pinned: client.active_round_pinned(),
            round_ready: client.round_ready(),
        }
    }
}

/// Questions slice of the active round.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionsView {
    pub round_id: Option<Uuid>,
    pub questions: Vec<QuestionSummary>,
    pub focused_question_id: Option<Uuid>,
    pub round_ready: bool,
}

impl QuestionsView {
    pub fn from_state(client: &ClientState) -> Self {
        Self {
            round_id: client.active_round_id(),
            questions: client
                .questions()
                .into_iter()
                .map(|question| QuestionSummary::build(question, client))
                .collect(),
            focused_question_id: client.focused_question_id(),
            round_ready: client.round_ready(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DraftsView {
    pub drafts: Vec<DraftSummary>,
}

impl DraftsView {
    pub fn from_state(client: &ClientState) -> Self {
        Self {
            drafts: client
                .drafts()
                .iter()
                .map(|(question_id, text)| DraftSummary {
                    question_id: *question_id,
                    text: text.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ResponsesView {
    pub responses: Vec<ResponseSummary>,
}

impl ResponsesView {
    pub fn from_state(client: &ClientState) -> Self {
        Self {
            responses: client
                .responses()
                .iter()
                .cloned()
                .map(ResponseSummary::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeamsResponse {
    pub teams: Vec<TeamSummary>,
}

impl TeamsResponse {
    pub fn from_state(client: &ClientState) -> Self {
        Self {
            teams: client.teams().iter().cloned().map(TeamSummary::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub rows: Vec<LeaderboardRow>,
    /// Team of this client, to highlight its row.
    pub own_team_id: Option<Uuid>,
}

impl LeaderboardResponse {
    pub fn from_state(client: &ClientState) -> Self {
        Self {
            rows: client
                .leaderboard()
                .iter()
                .cloned()
                .map(LeaderboardRow::from)
                .collect(),
            own_team_id: client.team().map(|team| team.id),
        }
    }
}

/// Everything a play screen needs in one payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlaySnapshot {
    pub session: Option<SessionResponse>,
    pub event: Option<EventSummary>,
    #[serde(flatten)]
    pub rounds: RoundsView,
    pub questions: QuestionsView,
    pub teams: Vec<TeamSummary>,
    pub leaderboard: Vec<LeaderboardRow>,
}

impl PlaySnapshot {
    pub fn from_state(client: &ClientState) -> Self {
        Self {
            session: SessionResponse::from_state(client),
            event: client.event().cloned().map(EventSummary::from),
            rounds: RoundsView::from_state(client),
            questions: QuestionsView::from_state(client),
            teams: TeamsResponse::from_state(client).teams,
            leaderboard: LeaderboardResponse::from_state(client).rows,
        }
    }
}

/// Explicit round pick.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SelectRoundRequest {
    pub round_id: Uuid,
}

/// In-progress answer text for a question.
#[derive(Debug, Deserialize, ToSchema)]
pub struct DraftRequest {
    pub text: String,
}
