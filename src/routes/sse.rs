use std::convert::Infallible;

use axum::{Router, extract::State, response::sse::Sse, routing::get};
use futures::Stream;
use tracing::info;

use crate::{services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/sse/client",
    tag = "sse",
    responses((status = 200, description = "Client state and toast stream", content_type = "text/event-stream", body = String))
)]
/// Stream slice updates and toasts to the view layer.
pub async fn client_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe_client(&state);
    info!("New client SSE connection");
    let greeting = sse_service::handshake_event(&state).await;
    sse_service::to_sse_stream(receiver, greeting)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/sse/client", get(client_stream))
}
