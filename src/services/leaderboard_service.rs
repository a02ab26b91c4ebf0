use crate::{
    dto::play::LeaderboardResponse,
    error::ServiceError,
    services::play_service::require_event_id,
    state::{SharedState, client::ClientAction, transitions::commit_with_broadcast},
};

/// Fetch the server-computed leaderboard and store it as returned.
pub async fn refresh_leaderboard(state: &SharedState) -> Result<(), ServiceError> {
    let event_id = require_event_id(state).await?;
    let rows = state.store().team_scores(event_id).await?;
    commit_with_broadcast(state, ClientAction::SetLeaderboard(rows)).await;
    Ok(())
}

/// Refresh and return the leaderboard of the joined event.
pub async fn leaderboard(state: &SharedState) -> Result<LeaderboardResponse, ServiceError> {
    refresh_leaderboard(state).await?;
    Ok(state.read_client(LeaderboardResponse::from_state).await)
}
