use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use rand::Rng;
use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    dao::change_feed::{ChangeFeed, ChangeNotification},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
/// A connection that lived this long resets the backoff.
const STABLE_CONNECTION: Duration = Duration::from_secs(30);

/// Keep a change feed connection open for the current realtime scope.
///
/// The connection is re-established whenever the scope changes (new event, new
/// active round) and after failures with capped exponential backoff plus jitter.
/// Returns once the notification sink or the scope channel is closed.
pub async fn run(
    state: SharedState,
    feed: Arc<dyn ChangeFeed>,
    sink: mpsc::Sender<ChangeNotification>,
) {
    let mut scope_rx = state.scope_watcher();
    let mut delay = INITIAL_DELAY;

    loop {
        let scope = *scope_rx.borrow_and_update();
        if scope.is_empty() {
            if scope_rx.changed().await.is_err() {
                return;
            }
            continue;
        }

        let access_token = state
            .read_client(|client| client.identity().map(|identity| identity.access_token.clone()))
            .await;
        info!(event_id = ?scope.event_id, round_id = ?scope.round_id, "opening change feed");

        let started = Instant::now();
        let connection = feed.run(scope, access_token, sink.clone());

        tokio::select! {
            result = connection => {
                if sink.is_closed() {
                    return;
                }
                match result {
                    Ok(()) => debug!("change feed ended"),
                    Err(err) => warn!(error = %err, "change feed connection failed"),
                }

                if started.elapsed() >= STABLE_CONNECTION {
                    delay = INITIAL_DELAY;
                }
                let wait = with_jitter(delay);
                debug!(?wait, "reconnecting change feed after backoff");
                let waited = tokio::select! {
                    _ = sleep(wait) => Backoff::Elapsed,
                    changed = scope_rx.changed() => {
                        if changed.is_err() {
                            return;
                        }
                        debug!("realtime scope changed during backoff; rejoining");
                        Backoff::ScopeChanged
                    }
                };
                delay = next_delay(delay, waited);
            }
            changed = scope_rx.changed() => {
                if changed.is_err() {
                    return;
                }
                debug!("realtime scope changed; rejoining");
                delay = INITIAL_DELAY;
            }
        }
    }
}

/// How a backoff wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backoff {
    Elapsed,
    ScopeChanged,
}

/// A new scope starts over from the initial delay; a full wait doubles it.
fn next_delay(delay: Duration, waited: Backoff) -> Duration {
    match waited {
        Backoff::Elapsed => (delay * 2).min(MAX_DELAY),
        Backoff::ScopeChanged => INITIAL_DELAY,
    }
}

/// Add up to 50% random jitter to a backoff delay.
fn with_jitter(delay: Duration) -> Duration {
    let max_jitter = u64::try_from(delay.as_millis() / 2).unwrap_or(u64::MAX);
    let jitter = rand::rng().random_range(0..=max_jitter);
    delay + Duration::from_millis(jitter)
}
