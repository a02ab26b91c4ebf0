pub mod memory;
#[cfg(feature = "supabase-store")]
pub mod supabase;

use futures::future::BoxFuture;
use serde::Deserialize;
use uuid::Uuid;

use crate::dao::models::{
    EventEntity, IdentityEntity, NewTeamEntity, QuestionEntity, ResponseEntity,
    ResponseUpsertEntity, RoundEntity, TeamEntity, TeamScoreEntity,
};
use crate::dao::storage::StorageResult;

/// Table names of the remote schema. Several schema generations coexist on the
/// hosted project, so every name can be overridden.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TableNames {
    pub events: String,
    pub rounds: String,
    pub questions: String,
    pub teams: String,
    pub responses: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            events: "event".into(),
            rounds: "round".into(),
            questions: "question".into(),
            teams: "team".into(),
            responses: "response".into(),
        }
    }
}

/// Abstraction over the remote trivia schema consumed by the player client.
///
/// Every method maps to a single remote request. Implementations never retry.
pub trait TriviaStore: Send + Sync {
    /// Find the event matching a join code, if any.
    fn find_event_by_code(&self, join_code: &str)
    -> BoxFuture<'static, StorageResult<Option<EventEntity>>>;
    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>>;
    /// Rounds of an event ordered by sequence number.
    fn list_rounds(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>>;
    /// Questions of a round ordered by sequence number.
    fn list_questions(
        &self,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    fn list_teams(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>>;
    /// Create a team, failing with [`StorageError::Conflict`](crate::dao::storage::StorageError::Conflict)
    /// when the name is already used in the event.
    fn insert_team(&self, team: NewTeamEntity) -> BoxFuture<'static, StorageResult<TeamEntity>>;
    /// Insert or overwrite the response stored for `(team_id, question_id)`.
    fn upsert_response(
        &self,
        response: ResponseUpsertEntity,
    ) -> BoxFuture<'static, StorageResult<ResponseEntity>>;
    fn list_team_responses(
        &self,
        team_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ResponseEntity>>>;
    /// Server-computed leaderboard, already sorted by descending total.
    fn team_scores(&self, event_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<TeamScoreEntity>>>;
    /// Create a fresh anonymous identity.
    fn sign_in_anonymously(&self) -> BoxFuture<'static, StorageResult<IdentityEntity>>;
    /// Exchange the refresh token of an expired identity for a new one.
    fn refresh_identity(
        &self,
        identity: IdentityEntity,
    ) -> BoxFuture<'static, StorageResult<IdentityEntity>>;
    /// Attach an identity to subsequent requests, or fall back to the anonymous key.
    fn use_identity(&self, identity: Option<IdentityEntity>) -> BoxFuture<'static, ()>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
