//! Brainy Brawls companion entrypoint wiring the trivia store, the realtime
//! feed, the persisted client state and the local REST + SSE API.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::{net::TcpListener, sync::mpsc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brainy_brawls::{
    config::{AppConfig, StoreConfig},
    dao::{change_feed::ChangeFeed, trivia_store::TriviaStore},
    routes,
    services::{feed_supervisor, join_service, realtime_service},
    state::{AppState, SharedState, persistence::StateFile},
};

/// Capacity of the channel between the change feed and the dispatcher.
const NOTIFICATION_BUFFER: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let (store, feed) = build_backend(&config.store)?;

    let app_state = AppState::new(
        store,
        StateFile::new(config.state_path.clone()),
        config.rejoin_window,
    );

    let (sink, notifications) = mpsc::channel(NOTIFICATION_BUFFER);
    tokio::spawn(realtime_service::run_dispatcher(
        app_state.clone(),
        notifications,
        realtime_service::SubscriberTable::standard(),
    ));
    tokio::spawn(feed_supervisor::run(app_state.clone(), feed, sink));

    match join_service::resume(&app_state).await {
        Ok(true) => info!("persisted session resumed"),
        Ok(false) => info!("no session to resume; waiting for a join"),
        Err(err) => warn!(error = %err, "failed to resume persisted session"),
    }

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

type Backend = (Arc<dyn TriviaStore>, Arc<dyn ChangeFeed>);

/// Instantiate the configured trivia store and its change feed.
fn build_backend(config: &StoreConfig) -> anyhow::Result<Backend> {
    match config {
        StoreConfig::Memory { seed_path } => {
            use brainy_brawls::dao::trivia_store::memory::{MemorySeed, MemoryTriviaStore};

            let store = if seed_path.exists() {
                MemoryTriviaStore::from_seed_file(seed_path)
                    .with_context(|| format!("loading seed `{}`", seed_path.display()))?
            } else {
                warn!(path = %seed_path.display(), "seed file not found; starting with an empty store");
                MemoryTriviaStore::new(MemorySeed::default())
            };
            info!("using in-memory trivia store");
            Ok((Arc::new(store.clone()), Arc::new(store)))
        }
        #[cfg(feature = "supabase-store")]
        StoreConfig::Supabase {
            url,
            anon_key,
            tables,
            scores_function,
        } => {
            use brainy_brawls::dao::trivia_store::supabase::{
                SupabaseChangeFeed, SupabaseConfig, SupabaseTriviaStore,
            };

            let supabase = if url.is_empty() || anon_key.is_empty() {
                SupabaseConfig::from_env().context("reading backend credentials")?
            } else {
                SupabaseConfig::new(url.clone(), anon_key.clone())
            }
            .with_tables(tables.clone())
            .with_scores_function(scores_function.clone());

            info!(url = %supabase.base_url, "using hosted trivia store");
            let feed = SupabaseChangeFeed::new(&supabase);
            let store = SupabaseTriviaStore::new(supabase).context("building backend client")?;
            Ok((Arc::new(store), Arc::new(feed)))
        }
        #[cfg(not(feature = "supabase-store"))]
        StoreConfig::Supabase { .. } => {
            anyhow::bail!("hosted store configured but the `supabase-store` feature is disabled")
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
