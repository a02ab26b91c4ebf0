pub mod client;
pub mod persistence;
pub mod progression;
mod sse;
pub mod transitions;

use std::{sync::Arc, time::Duration};

use tokio::sync::{Mutex, RwLock, watch};
use tracing::warn;

use crate::dao::{change_feed::SubscriptionSet, trivia_store::TriviaStore};

pub use self::sse::SseHub;
use self::{
    client::{ClientAction, ClientState, StateChange},
    persistence::StateFile,
};

pub type SharedState = Arc<AppState>;

/// How long a persisted session may be resumed silently.
pub const DEFAULT_REJOIN_WINDOW: Duration = Duration::from_secs(6 * 60 * 60);

/// Central application state: remote store handle, client state and fan-out channels.
pub struct AppState {
    store: Arc<dyn TriviaStore>,
    client: RwLock<ClientState>,
    state_file: StateFile,
    /// Serialises file writes so they land in commit order.
    persist_gate: Mutex<()>,
    sse: SseHub,
    scope: watch::Sender<SubscriptionSet>,
    rejoin_window: Duration,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        store: Arc<dyn TriviaStore>,
        state_file: StateFile,
        rejoin_window: Duration,
    ) -> SharedState {
        let (scope, _rx) = watch::channel(SubscriptionSet::default());
        Arc::new(Self {
            store,
            client: RwLock::new(ClientState::new()),
            state_file,
            persist_gate: Mutex::new(()),
            sse: SseHub::new(64),
            scope,
            rejoin_window,
        })
    }

    /// Handle to the remote trivia store.
    pub fn store(&self) -> Arc<dyn TriviaStore> {
        self.store.clone()
    }

    /// Broadcast hub used for the client SSE stream.
    pub fn client_sse(&self) -> &SseHub {
        &self.sse
    }

    pub fn state_file(&self) -> &StateFile {
        &self.state_file
    }

    pub fn rejoin_window(&self) -> Duration {
        self.rejoin_window
    }

    /// Run `f` against a read-only view of the client state.
    pub async fn read_client<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&ClientState) -> R,
    {
        let guard = self.client.read().await;
        f(&guard)
    }

    /// Current realtime scope.
    pub fn scope(&self) -> SubscriptionSet {
        *self.scope.borrow()
    }

    /// Subscribe to realtime scope updates.
    pub fn scope_watcher(&self) -> watch::Receiver<SubscriptionSet> {
        self.scope.subscribe()
    }

    /// Apply an action, refresh the realtime scope and flush the persisted subset
    /// when the action asks for it. Persistence failures are logged only.
    pub async fn commit(&self, action: ClientAction) -> StateChange {
        let mut client = self.client.write().await;
        let change = client.apply(action);
        if !change.changed {
            return change;
        }

        let scope = client.subscription_set();
        self.scope.send_if_modified(|current| {
            if *current == scope {
                false
            } else {
                *current = scope;
                true
            }
        });

        if !change.persist {
            return change;
        }

        let persisted = client.persisted();
        let gate = self.persist_gate.lock().await;
        drop(client);

        let result = if persisted.session.is_none() && persisted.identity.is_none() {
            self.state_file.clear().await
        } else {
            self.state_file.save(&persisted).await
        };
        if let Err(err) = result {
            warn!(
                path = %self.state_file.path().display(),
                error = %err,
                "failed to persist client state"
            );
        }
        drop(gate);

        change
    }
}
