use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use uuid::Uuid;

use crate::{
    dto::play::{
        DraftRequest, DraftSummary, LeaderboardResponse, PlaySnapshot, ResponseSummary,
        SelectRoundRequest, TeamsResponse,
    },
    error::AppError,
    services::{leaderboard_service, play_service, response_service},
    state::SharedState,
};

/// Play screen endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/play", get(get_play))
        .route("/play/refresh", post(refresh_play))
        .route("/play/rounds/active", put(select_round))
        .route("/play/questions/{id}/draft", put(save_draft))
        .route("/play/questions/{id}/submit", post(submit_response))
        .route("/play/teams", get(get_teams))
        .route("/play/leaderboard", get(get_leaderboard))
}

/// Return the cached play screen without touching the network.
#[utoipa::path(
    get,
    path = "/play",
    tag = "play",
    responses((status = 200, description = "Current play snapshot", body = PlaySnapshot))
)]
pub async fn get_play(State(state): State<SharedState>) -> Json<PlaySnapshot> {
    Json(play_service::snapshot(&state).await)
}

/// Re-fetch every slice of the play screen.
#[utoipa::path(
    post,
    path = "/play/refresh",
    tag = "play",
    responses(
        (status = 200, description = "Refreshed play snapshot", body = PlaySnapshot),
        (status = 422, description = "No session"),
        (status = 503, description = "Remote store unavailable")
    )
)]
pub async fn refresh_play(
    State(state): State<SharedState>,
) -> Result<Json<PlaySnapshot>, AppError> {
    play_service::load_play(&state).await?;
    Ok(Json(play_service::snapshot(&state).await))
}

/// Pick a round explicitly until the next rounds refresh.
#[utoipa::path(
    put,
    path = "/play/rounds/active",
    tag = "play",
    request_body = SelectRoundRequest,
    responses(
        (status = 200, description = "Round selected", body = PlaySnapshot),
        (status = 404, description = "Round not part of the event")
    )
)]
pub async fn select_round(
    State(state): State<SharedState>,
    Json(request): Json<SelectRoundRequest>,
) -> Result<Json<PlaySnapshot>, AppError> {
    Ok(Json(
        play_service::select_round(&state, request.round_id).await?,
    ))
}

/// Store the in-progress answer of a question locally.
#[utoipa::path(
    put,
    path = "/play/questions/{id}/draft",
    tag = "play",
    params(("id" = Uuid, Path, description = "Question identifier")),
    request_body = DraftRequest,
    responses(
        (status = 200, description = "Draft stored", body = DraftSummary),
        (status = 404, description = "Question not visible in the active round"),
        (status = 409, description = "Question no longer accepts answers"),
        (status = 422, description = "No session")
    )
)]
pub async fn save_draft(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(request): Json<DraftRequest>,
) -> Result<Json<DraftSummary>, AppError> {
    Ok(Json(play_service::save_draft(&state, id, request.text).await?))
}

/// Submit the stored draft as this team's answer.
#[utoipa::path(
    post,
    path = "/play/questions/{id}/submit",
    tag = "play",
    params(("id" = Uuid, Path, description = "Question identifier")),
    responses(
        (status = 200, description = "Answer stored", body = ResponseSummary),
        (status = 404, description = "Question not in the active round"),
        (status = 409, description = "Question does not accept answers"),
        (status = 422, description = "Missing team or response"),
        (status = 503, description = "Remote store unavailable")
    )
)]
pub async fn submit_response(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResponseSummary>, AppError> {
    Ok(Json(response_service::submit(&state, id).await?))
}

/// Refresh and return the teams of the event.
#[utoipa::path(
    get,
    path = "/play/teams",
    tag = "play",
    responses(
        (status = 200, description = "Teams of the event", body = TeamsResponse),
        (status = 422, description = "No session")
    )
)]
pub async fn get_teams(State(state): State<SharedState>) -> Result<Json<TeamsResponse>, AppError> {
    Ok(Json(play_service::teams(&state).await?))
}

/// Refresh and return the leaderboard computed by the backend.
#[utoipa::path(
    get,
    path = "/play/leaderboard",
    tag = "play",
    responses(
        (status = 200, description = "Leaderboard, best team first", body = LeaderboardResponse),
        (status = 422, description = "No session")
    )
)]
pub async fn get_leaderboard(
    State(state): State<SharedState>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    Ok(Json(leaderboard_service::leaderboard(&state).await?))
}
