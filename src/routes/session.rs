use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::session::{JoinRequest, SessionResponse},
    error::AppError,
    services::join_service,
    state::SharedState,
};

/// Session lifecycle endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/session/join", post(join))
        .route("/session", get(get_session).delete(leave))
}

/// Join an event with a new team.
#[utoipa::path(
    post,
    path = "/session/join",
    tag = "session",
    request_body = JoinRequest,
    responses(
        (status = 201, description = "Team created and session stored", body = SessionResponse),
        (status = 400, description = "Malformed join code or team name"),
        (status = 404, description = "No event matches the join code"),
        (status = 409, description = "Team name already taken in this event"),
        (status = 503, description = "Remote store unavailable")
    )
)]
pub async fn join(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<JoinRequest>>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let session = join_service::join(&state, &request.join_code, &request.team_name).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Return the session currently held by the client.
#[utoipa::path(
    get,
    path = "/session",
    tag = "session",
    responses(
        (status = 200, description = "Current session", body = SessionResponse),
        (status = 404, description = "No session")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
) -> Result<Json<SessionResponse>, AppError> {
    join_service::current_session(&state)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("no active session".into()))
}

/// Leave the event and forget the persisted session.
#[utoipa::path(
    delete,
    path = "/session",
    tag = "session",
    responses((status = 204, description = "Session cleared"))
)]
pub async fn leave(State(state): State<SharedState>) -> StatusCode {
    join_service::leave(&state).await;
    StatusCode::NO_CONTENT
}
