//! Turns change notifications into slice refreshes.
//!
//! Notifications are only hints: apart from event rows, which are applied as
//! pushed, each one triggers a re-fetch of the slice it concerns.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    dao::{
        change_feed::{ChangeKind, ChangeNotification, ChangeTable},
        models::EventEntity,
    },
    error::ServiceError,
    services::{leaderboard_service, play_service, sse_events},
    state::{SharedState, client::ClientAction, transitions::commit_with_broadcast},
};

/// Follow-up work triggered by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshAction {
    Rounds,
    Questions,
    Teams,
    Leaderboard,
    /// Store the pushed event row without a re-fetch.
    ApplyEvent,
}

impl RefreshAction {
    fn label(self) -> &'static str {
        match self {
            RefreshAction::Rounds => "rounds",
            RefreshAction::Questions => "questions",
            RefreshAction::Teams => "teams",
            RefreshAction::Leaderboard => "leaderboard",
            RefreshAction::ApplyEvent => "event",
        }
    }
}

/// Routing table from `(table, kind)` to the refreshes it triggers.
#[derive(Debug, Clone, Default)]
pub struct SubscriberTable {
    routes: HashMap<(ChangeTable, ChangeKind), Vec<RefreshAction>>,
}

impl SubscriberTable {
    /// Table with no routes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Routes used by the play screens.
    pub fn standard() -> Self {
        use crate::dao::change_feed::ChangeKind::*;

        Self::empty()
            .route(ChangeTable::Event, &[Update], RefreshAction::ApplyEvent)
            .route(ChangeTable::Round, &[Update], RefreshAction::Rounds)
            .route(ChangeTable::Question, &[Insert, Update, Delete], RefreshAction::Questions)
            .route(ChangeTable::Team, &[Insert, Update], RefreshAction::Teams)
            .route(ChangeTable::Team, &[Insert, Update], RefreshAction::Leaderboard)
    }

    /// Register `action` for every listed kind of change on `table`.
    pub fn route(mut self, table: ChangeTable, kinds: &[ChangeKind], action: RefreshAction) -> Self {
        for kind in kinds {
            let actions = self.routes.entry((table, *kind)).or_default();
            if !actions.contains(&action) {
                actions.push(action);
            }
        }
        self
    }

    /// Actions registered for a notification, in registration order.
    pub fn actions(&self, notification: &ChangeNotification) -> &[RefreshAction] {
        self.routes
            .get(&(notification.table, notification.kind))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Consume notifications until the channel closes.
pub async fn run_dispatcher(
    state: SharedState,
    mut receiver: mpsc::Receiver<ChangeNotification>,
    table: SubscriberTable,
) {
    while let Some(notification) = receiver.recv().await {
        handle_notification(&state, &table, notification).await;
    }
    info!("realtime dispatcher stopped");
}

/// Run the actions routed for one notification. Notifications outside the
/// current scope are dropped; failures become toasts.
pub async fn handle_notification(
    state: &SharedState,
    table: &SubscriberTable,
    notification: ChangeNotification,
) {
    if !state.scope().matches(&notification) {
        debug!(table = ?notification.table, kind = ?notification.kind, "dropping out-of-scope change");
        return;
    }

    for action in table.actions(&notification) {
        let result = match action {
            RefreshAction::Rounds => play_service::refresh_rounds(state).await,
            RefreshAction::Questions => play_service::refresh_questions(state).await,
            RefreshAction::Teams => play_service::refresh_teams(state).await,
            RefreshAction::Leaderboard => leaderboard_service::refresh_leaderboard(state).await,
            RefreshAction::ApplyEvent => apply_event(state, &notification).await,
        };

        if let Err(err) = result {
            warn!(action = action.label(), error = %err, "realtime refresh failed");
            sse_events::broadcast_error_toast(
                state,
                format!("Could not refresh {}.", action.label()),
            );
        }
    }
}

async fn apply_event(state: &SharedState, notification: &ChangeNotification) -> Result<(), ServiceError> {
    match serde_json::from_value::<EventEntity>(notification.record.clone()) {
        Ok(event) => {
            commit_with_broadcast(state, ClientAction::SetEvent(event)).await;
            Ok(())
        }
        Err(err) => {
            debug!(error = %err, "partial event row pushed; re-fetching");
            play_service::refresh_event(state).await
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn notification(table: ChangeTable, kind: ChangeKind) -> ChangeNotification {
        ChangeNotification::new(table, kind, json!({}))
    }

    #[test]
    fn standard_routes() {
        let table = SubscriberTable::standard();
        assert_eq!(
            table.actions(&notification(ChangeTable::Round, ChangeKind::Update)),
            &[RefreshAction::Rounds]
        );
        assert_eq!(
            table.actions(&notification(ChangeTable::Question, ChangeKind::Delete)),
            &[RefreshAction::Questions]
        );
        assert_eq!(
            table.actions(&notification(ChangeTable::Team, ChangeKind::Insert)),
            &[RefreshAction::Teams, RefreshAction::Leaderboard]
        );
        assert_eq!(
            table.actions(&notification(ChangeTable::Event, ChangeKind::Update)),
            &[RefreshAction::ApplyEvent]
        );
    }

    #[test]
    fn unrouted_changes_do_nothing() {
        let table = SubscriberTable::standard();
        assert!(
            table
                .actions(&notification(ChangeTable::Round, ChangeKind::Insert))
                .is_empty()
        );
        assert!(
            table
                .actions(&notification(ChangeTable::Team, ChangeKind::Delete))
                .is_empty()
        );
    }

    #[test]
    fn routes_are_not_duplicated() {
        let table = SubscriberTable::empty()
            .route(ChangeTable::Round, &[ChangeKind::Update], RefreshAction::Rounds)
            .route(ChangeTable::Round, &[ChangeKind::Update], RefreshAction::Rounds);
        assert_eq!(
            table.actions(&notification(ChangeTable::Round, ChangeKind::Update)),
            &[RefreshAction::Rounds]
        );
    }
}
