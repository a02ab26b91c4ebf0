use crate::{
    services::sse_events::broadcast_change,
    state::{
        SharedState,
        client::{ClientAction, StateChange},
    },
};

/// Commit an action to the client state, then broadcast the slice it changed.
pub async fn commit_with_broadcast(state: &SharedState, action: ClientAction) -> StateChange {
    let change = state.commit(action).await;
    if change.changed {
        broadcast_change(state, change.slice).await;
    }
    change
}
