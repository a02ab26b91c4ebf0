use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Ping the remote store and report whether the client holds a session.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let reachable = match state.store().health_check().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            false
        }
    };
    let joined = state
        .read_client(|client| client.session().is_some())
        .await;

    HealthResponse::new(reachable, joined)
}
