use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        play::{
            DraftsView, EventSummary, LeaderboardResponse, QuestionsView, ResponsesView,
            RoundsView, TeamsResponse,
        },
        session::SessionResponse,
        sse::{ServerEvent, ToastEvent, ToastLevel},
    },
    state::{
        SharedState,
        client::{ClientState, Slice},
    },
};

pub const EVENT_SESSION_UPDATED: &str = "session.updated";
pub const EVENT_EVENT_UPDATED: &str = "event.updated";
pub const EVENT_ROUNDS_UPDATED: &str = "rounds.updated";
pub const EVENT_QUESTIONS_UPDATED: &str = "questions.updated";
pub const EVENT_DRAFTS_UPDATED: &str = "drafts.updated";
pub const EVENT_RESPONSES_UPDATED: &str = "responses.updated";
pub const EVENT_TEAMS_UPDATED: &str = "teams.updated";
pub const EVENT_LEADERBOARD_UPDATED: &str = "leaderboard.updated";
pub const EVENT_TOAST: &str = "toast";

const ALL_SLICES: [Slice; 8] = [
    Slice::Session,
    Slice::Event,
    Slice::Rounds,
    Slice::Questions,
    Slice::Drafts,
    Slice::Responses,
    Slice::Teams,
    Slice::Leaderboard,
];

/// Broadcast the current content of a slice after it changed.
pub async fn broadcast_change(state: &SharedState, slice: Slice) {
    if slice == Slice::All {
        for slice in ALL_SLICES {
            broadcast_slice(state, slice).await;
        }
    } else {
        broadcast_slice(state, slice).await;
    }
}

async fn broadcast_slice(state: &SharedState, slice: Slice) {
    let Some(event) = state.read_client(|client| slice_event(client, slice)).await else {
        return;
    };

    match event {
        Ok(event) => state.client_sse().broadcast(event),
        Err(err) => warn!(?slice, error = %err, "failed to serialize client SSE payload"),
    }
}

fn slice_event(client: &ClientState, slice: Slice) -> Option<serde_json::Result<ServerEvent>> {
    let event = match slice {
        Slice::All => return None,
        Slice::Session => json_event(EVENT_SESSION_UPDATED, &SessionResponse::from_state(client)),
        Slice::Event => json_event(
            EVENT_EVENT_UPDATED,
            &client.event().cloned().map(EventSummary::from),
        ),
        Slice::Rounds => json_event(EVENT_ROUNDS_UPDATED, &RoundsView::from_state(client)),
        Slice::Questions => json_event(EVENT_QUESTIONS_UPDATED, &QuestionsView::from_state(client)),
        Slice::Drafts => json_event(EVENT_DRAFTS_UPDATED, &DraftsView::from_state(client)),
        Slice::Responses => json_event(EVENT_RESPONSES_UPDATED, &ResponsesView::from_state(client)),
        Slice::Teams => json_event(EVENT_TEAMS_UPDATED, &TeamsResponse::from_state(client)),
        Slice::Leaderboard => json_event(
            EVENT_LEADERBOARD_UPDATED,
            &LeaderboardResponse::from_state(client),
        ),
    };
    Some(event)
}

fn json_event(event: &str, payload: &impl Serialize) -> serde_json::Result<ServerEvent> {
    ServerEvent::json(Some(event.to_string()), payload)
}

/// Broadcast an error toast to the client stream.
pub fn broadcast_error_toast(state: &SharedState, message: impl Into<String>) {
    let payload = ToastEvent {
        level: ToastLevel::Error,
        message: message.into(),
    };
    send_client_event(state, EVENT_TOAST, &payload);
}

/// Broadcast an informational toast to the client stream.
pub fn broadcast_info_toast(state: &SharedState, message: impl Into<String>) {
    let payload = ToastEvent {
        level: ToastLevel::Info,
        message: message.into(),
    };
    send_client_event(state, EVENT_TOAST, &payload);
}

fn send_client_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match json_event(event, payload) {
        Ok(event) => state.client_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize client SSE payload"),
    }
}
