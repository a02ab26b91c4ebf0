use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod play;
pub mod session;
pub mod sse;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(session::router())
        .merge(play::router())
        .merge(sse::router())
        .merge(docs::router())
        .with_state(state)
}
