//! Refreshes of the play screen slices plus the local-only round and draft edits.
//!
//! Every refresh fetches without holding the state lock and replaces its slice
//! wholesale once the response arrives. In-flight fetches are neither cancelled
//! nor de-duplicated, so the last response to land wins.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::models::LifecycleStatus,
    dto::play::{DraftSummary, PlaySnapshot, TeamsResponse},
    error::ServiceError,
    services::{leaderboard_service, sse_events},
    state::{SharedState, client::ClientAction, transitions::commit_with_broadcast},
};

pub(crate) async fn require_event_id(state: &SharedState) -> Result<Uuid, ServiceError> {
    state
        .read_client(|client| client.event_id())
        .await
        .ok_or_else(|| ServiceError::MissingPrecondition("no active session".into()))
}

async fn require_team_id(state: &SharedState) -> Result<Uuid, ServiceError> {
    state
        .read_client(|client| client.team().map(|team| team.id))
        .await
        .ok_or_else(|| ServiceError::MissingPrecondition("no active session".into()))
}

/// Re-read the joined event row.
pub async fn refresh_event(state: &SharedState) -> Result<(), ServiceError> {
    let event_id = require_event_id(state).await?;
    let event = state
        .store()
        .find_event(event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event `{event_id}` no longer exists")))?;
    commit_with_broadcast(state, ClientAction::SetEvent(event)).await;
    Ok(())
}

/// Re-read the rounds, re-apply the selection policy and follow the active
/// round with a questions refresh when it moved.
pub async fn refresh_rounds(state: &SharedState) -> Result<(), ServiceError> {
    let event_id = require_event_id(state).await?;
    let before = state.read_client(|client| client.active_round_id()).await;

    let rounds = state.store().list_rounds(event_id).await?;
    commit_with_broadcast(state, ClientAction::SetRounds(rounds)).await;

    let after = state.read_client(|client| client.active_round_id()).await;
    if after != before {
        debug!(?before, ?after, "active round changed");
        refresh_questions(state).await?;
    }
    Ok(())
}

/// Re-read the questions of the active round. Without an active round there is
/// nothing to fetch.
pub async fn refresh_questions(state: &SharedState) -> Result<(), ServiceError> {
    let Some(round_id) = state.read_client(|client| client.active_round_id()).await else {
        return Ok(());
    };
    let questions = state.store().list_questions(round_id).await?;
    commit_with_broadcast(
        state,
        ClientAction::SetQuestions {
            round_id,
            questions,
        },
    )
    .await;
    Ok(())
}

pub async fn refresh_teams(state: &SharedState) -> Result<(), ServiceError> {
    let event_id = require_event_id(state).await?;
    let teams = state.store().list_teams(event_id).await?;
    commit_with_broadcast(state, ClientAction::SetTeams(teams)).await;
    Ok(())
}

/// Re-read the responses stored for this client's team.
pub async fn refresh_responses(state: &SharedState) -> Result<(), ServiceError> {
    let team_id = require_team_id(state).await?;
    let responses = state.store().list_team_responses(team_id).await?;
    commit_with_broadcast(state, ClientAction::SetResponses(responses)).await;
    Ok(())
}

/// Load every slice of the play screen.
pub async fn load_play(state: &SharedState) -> Result<(), ServiceError> {
    refresh_event(state).await?;
    refresh_rounds(state).await?;
    refresh_questions(state).await?;
    refresh_teams(state).await?;
    refresh_responses(state).await?;
    leaderboard_service::refresh_leaderboard(state).await?;
    Ok(())
}

/// Like [`load_play`], but reports a failure as a toast instead of an error.
pub async fn load_play_or_toast(state: &SharedState) {
    if let Err(err) = load_play(state).await {
        warn!(error = %err, "failed to load play screen");
        sse_events::broadcast_error_toast(state, "Could not load the game. Pull to refresh.");
    }
}

/// Pin a round picked by the player until the next rounds refresh.
pub async fn select_round(state: &SharedState, round_id: Uuid) -> Result<PlaySnapshot, ServiceError> {
    require_event_id(state).await?;
    let change = commit_with_broadcast(state, ClientAction::SelectRound(round_id)).await;
    if !change.changed {
        return Err(ServiceError::NotFound(format!(
            "round `{round_id}` is not part of this event"
        )));
    }
    refresh_questions(state).await?;
    Ok(snapshot(state).await)
}

/// Store the in-progress answer for a question. Drafts never leave the device
/// until they are submitted.
///
/// Only visible questions that still accept answers can hold a draft.
pub async fn save_draft(
    state: &SharedState,
    question_id: Uuid,
    text: String,
) -> Result<DraftSummary, ServiceError> {
    require_team_id(state).await?;
    let question = state
        .read_client(|client| client.question(question_id))
        .await
        .ok_or_else(|| {
            ServiceError::NotFound(format!("question `{question_id}` is not in the active round"))
        })?;
    if question.status != LifecycleStatus::Ongoing {
        return Err(ServiceError::InvalidState(format!(
            "question `{question_id}` is {} and no longer accepts answers",
            question.status
        )));
    }
    commit_with_broadcast(
        state,
        ClientAction::SetDraft {
            question_id,
            text: text.clone(),
        },
    )
    .await;
    Ok(DraftSummary { question_id, text })
}

pub async fn snapshot(state: &SharedState) -> PlaySnapshot {
    state.read_client(PlaySnapshot::from_state).await
}

/// Refresh and return the teams of the event.
pub async fn teams(state: &SharedState) -> Result<TeamsResponse, ServiceError> {
    refresh_teams(state).await?;
    Ok(state.read_client(TeamsResponse::from_state).await)
}
