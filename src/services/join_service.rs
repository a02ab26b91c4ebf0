//! Joining an event, resuming a persisted session and leaving.

use std::time::SystemTime;

use tracing::{info, warn};

use crate::{
    dao::{
        models::{IdentityEntity, NewTeamEntity},
        storage::StorageError,
    },
    dto::{
        session::SessionResponse,
        validation::{validate_join_code, validate_team_name},
    },
    error::ServiceError,
    services::{play_service, sse_events},
    state::{
        SharedState,
        client::{ClientAction, Session},
        transitions::commit_with_broadcast,
    },
};

fn invalid_input(err: validator::ValidationError) -> ServiceError {
    let message = err
        .message
        .map(|message| message.to_string())
        .unwrap_or_else(|| err.code.to_string());
    ServiceError::InvalidInput(message)
}

/// Join the event behind `join_code` with a brand-new team.
///
/// Nothing is created when the code matches no event, and nothing is persisted
/// when the team name is already taken in that event.
pub async fn join(
    state: &SharedState,
    join_code: &str,
    team_name: &str,
) -> Result<SessionResponse, ServiceError> {
    validate_join_code(join_code).map_err(invalid_input)?;
    validate_team_name(team_name).map_err(invalid_input)?;
    let team_name = team_name.trim().to_string();

    let store = state.store();
    let event = store
        .find_event_by_code(join_code)
        .await?
        .ok_or_else(|| ServiceError::NotFound("invalid join code".into()))?;

    let identity = ensure_identity(state).await?;

    let team = store
        .insert_team(NewTeamEntity {
            event_id: event.id,
            name: team_name,
            created_by: identity.user_id,
        })
        .await
        .map_err(|err| match err {
            StorageError::Conflict { .. } => ServiceError::Conflict("team name already taken".into()),
            other => other.into(),
        })?;
    info!(event_id = %event.id, team_id = %team.id, team = %team.name, "joined event");

    commit_with_broadcast(
        state,
        ClientAction::Joined(Session {
            event_id: event.id,
            team,
            joined_at: SystemTime::now(),
        }),
    )
    .await;
    commit_with_broadcast(state, ClientAction::SetEvent(event)).await;

    play_service::load_play_or_toast(state).await;

    current_session(state)
        .await
        .ok_or_else(|| ServiceError::InvalidState("session vanished while joining".into()))
}

/// Re-enter the persisted session if it is younger than the rejoin window.
///
/// Returns whether a session was resumed.
pub async fn resume(state: &SharedState) -> Result<bool, ServiceError> {
    let persisted = match state.state_file().load().await {
        Ok(Some(persisted)) => persisted,
        Ok(None) => return Ok(false),
        Err(err) => {
            warn!(error = %err, "failed to read persisted client state");
            return Ok(false);
        }
    };

    commit_with_broadcast(state, ClientAction::Restore(persisted)).await;

    let Some(session) = state.read_client(|client| client.session().cloned()).await else {
        return Ok(false);
    };

    if !session.within_window(state.rejoin_window(), SystemTime::now()) {
        info!(event_id = %session.event_id, "persisted session is too old; discarding");
        commit_with_broadcast(state, ClientAction::Reset).await;
        return Ok(false);
    }

    ensure_identity(state).await?;
    info!(event_id = %session.event_id, team = %session.team.name, "resuming persisted session");
    play_service::load_play(state).await?;
    sse_events::broadcast_info_toast(state, format!("Welcome back, {}!", session.team.name));
    Ok(true)
}

/// Forget the session and everything cached for it.
pub async fn leave(state: &SharedState) {
    commit_with_broadcast(state, ClientAction::Reset).await;
    state.store().use_identity(None).await;
    info!("left event");
}

pub async fn current_session(state: &SharedState) -> Option<SessionResponse> {
    state.read_client(SessionResponse::from_state).await
}

/// Reuse the stored anonymous identity, refreshing it when expired, or sign in
/// anonymously once when there is none.
async fn ensure_identity(state: &SharedState) -> Result<IdentityEntity, ServiceError> {
    let store = state.store();
    let current = state
        .read_client(|client| client.identity().cloned())
        .await;

    let identity = match current {
        Some(identity) if !identity.is_expired(SystemTime::now()) => identity,
        Some(expired) => match store.refresh_identity(expired).await {
            Ok(identity) => {
                commit_with_broadcast(state, ClientAction::SetIdentity(identity.clone())).await;
                identity
            }
            Err(err) => {
                warn!(error = %err, "failed to refresh identity; signing in again");
                sign_in(state).await?
            }
        },
        None => sign_in(state).await?,
    };

    store.use_identity(Some(identity.clone())).await;
    Ok(identity)
}

async fn sign_in(state: &SharedState) -> Result<IdentityEntity, ServiceError> {
    let identity = state.store().sign_in_anonymously().await?;
    info!(user_id = %identity.user_id, "signed in anonymously");
    commit_with_broadcast(state, ClientAction::SetIdentity(identity.clone())).await;
    Ok(identity)
}
