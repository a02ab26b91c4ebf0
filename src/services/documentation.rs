use utoipa::OpenApi;

#[derive(OpenApi)]
/// OpenAPI document of the local companion API.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::session::join,
        crate::routes::session::get_session,
        crate::routes::session::leave,
        crate::routes::play::get_play,
        crate::routes::play::refresh_play,
        crate::routes::play::select_round,
        crate::routes::play::save_draft,
        crate::routes::play::submit_response,
        crate::routes::play::get_teams,
        crate::routes::play::get_leaderboard,
        crate::routes::sse::client_stream,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::session::JoinRequest,
            crate::dto::session::SessionResponse,
            crate::dto::play::PlaySnapshot,
            crate::dto::play::SelectRoundRequest,
            crate::dto::play::DraftRequest,
            crate::dto::play::DraftSummary,
            crate::dto::play::ResponseSummary,
            crate::dto::play::TeamsResponse,
            crate::dto::play::LeaderboardResponse,
            crate::dto::play::RoundsView,
            crate::dto::play::QuestionsView,
            crate::dto::play::DraftsView,
            crate::dto::play::ResponsesView,
            crate::dto::sse::Handshake,
            crate::dto::sse::ToastEvent,
            crate::dao::models::LifecycleStatus,
            crate::dao::models::Correctness,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "session", description = "Joining and leaving an event"),
        (name = "play", description = "Rounds, questions, answers and scores"),
        (name = "sse", description = "Server-sent events stream"),
    )
)]
pub struct ApiDoc;
