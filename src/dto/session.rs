use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        format_system_time,
        play::TeamSummary,
        validation::{validate_join_code, validate_team_name},
    },
    state::client::ClientState,
};

/// Payload used to join an event with a new team.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    /// Numeric code announced by the host.
    #[validate(custom(function = "validate_join_code"))]
    pub join_code: String,
    #[validate(custom(function = "validate_team_name"))]
    pub team_name: String,
}

/// Session currently held by the client.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResponse {
    pub event_id: Uuid,
    pub team: TeamSummary,
    /// Anonymous user the team was created by.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    /// RFC 3339 timestamp of the join.
    pub joined_at: String,
}

impl SessionResponse {
    /// Project the session slice, if the client joined an event.
    pub fn from_state(client: &ClientState) -> Option<Self> {
        let session = client.session()?;
        Some(Self {
            event_id: session.event_id,
            team: session.team.clone().into(),
            user_id: client.identity().map(|identity| identity.user_id),
            joined_at: format_system_time(session.joined_at),
        })
    }
}
