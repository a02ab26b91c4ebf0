use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when the remote store answered, "degraded" otherwise.
    pub status: String,
    /// Whether the client currently holds a session.
    pub joined: bool,
}

impl HealthResponse {
    pub fn new(store_reachable: bool, joined: bool) -> Self {
        let status = if store_reachable { "ok" } else { "degraded" };
        Self {
            status: status.to_string(),
            joined,
        }
    }
}
