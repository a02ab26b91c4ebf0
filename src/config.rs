//! Application-level configuration loading: where the client state lives and
//! which trivia backend to talk to.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{dao::trivia_store::TableNames, state::DEFAULT_REJOIN_WINDOW};

/// Default location on disk where the companion looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "BRAINY_BRAWLS_CONFIG_PATH";
const DEFAULT_STATE_PATH: &str = "data/client-state.json";
const DEFAULT_SEED_PATH: &str = "config/seed.json";
const DEFAULT_SCORES_FUNCTION: &str = "get_teams_scores_sorted";
const URL_ENV: &str = "SUPABASE_URL";
const ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";

/// Backend the companion reads the game from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    /// Hosted project reached over REST and the realtime socket.
    Supabase {
        url: String,
        anon_key: String,
        tables: TableNames,
        scores_function: String,
    },
    /// In-process store seeded from a JSON fixture.
    Memory { seed_path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub state_path: PathBuf,
    pub rejoin_window: Duration,
    pub store: StoreConfig,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults,
    /// then apply the backend environment overrides.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        store = config.store.kind(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.with_env_overrides(env::var(URL_ENV).ok(), env::var(ANON_KEY_ENV).ok())
    }

    /// Parse the JSON configuration file format.
    pub fn parse(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Backend credentials from the environment win over the file. Setting
    /// both switches a memory configuration to the hosted backend.
    fn with_env_overrides(mut self, url: Option<String>, anon_key: Option<String>) -> Self {
        let url = url.filter(|value| !value.is_empty());
        let anon_key = anon_key.filter(|value| !value.is_empty());

        match &mut self.store {
            StoreConfig::Supabase {
                url: current_url,
                anon_key: current_key,
                ..
            } => {
                if let Some(url) = url {
                    *current_url = url;
                }
                if let Some(anon_key) = anon_key {
                    *current_key = anon_key;
                }
            }
            StoreConfig::Memory { .. } => {
                if let (Some(url), Some(anon_key)) = (url, anon_key) {
                    info!("backend credentials found in environment; using hosted store");
                    self.store = StoreConfig::Supabase {
                        url,
                        anon_key,
                        tables: TableNames::default(),
                        scores_function: DEFAULT_SCORES_FUNCTION.into(),
                    };
                }
            }
        }
        self
    }
}

impl StoreConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreConfig::Supabase { .. } => "supabase",
            StoreConfig::Memory { .. } => "memory",
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            rejoin_window: DEFAULT_REJOIN_WINDOW,
            store: StoreConfig::Memory {
                seed_path: PathBuf::from(DEFAULT_SEED_PATH),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    state_path: Option<PathBuf>,
    #[serde(default)]
    rejoin_window_hours: Option<u64>,
    #[serde(default)]
    store: Option<RawStore>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum RawStore {
    Supabase {
        #[serde(default)]
        url: String,
        #[serde(default)]
        anon_key: String,
        #[serde(default)]
        tables: TableNames,
        #[serde(default)]
        scores_function: Option<String>,
    },
    Memory {
        #[serde(default)]
        seed_path: Option<PathBuf>,
    },
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();
        let store = match value.store {
            Some(RawStore::Supabase {
                url,
                anon_key,
                tables,
                scores_function,
            }) => StoreConfig::Supabase {
                url,
                anon_key,
                tables,
                scores_function: scores_function.unwrap_or_else(|| DEFAULT_SCORES_FUNCTION.into()),
            },
            Some(RawStore::Memory { seed_path }) => StoreConfig::Memory {
                seed_path: seed_path.unwrap_or_else(|| PathBuf::from(DEFAULT_SEED_PATH)),
            },
            None => defaults.store,
        };

        Self {
            state_path: value.state_path.unwrap_or(defaults.state_path),
            rejoin_window: value
                .rejoin_window_hours
                .map(|hours| Duration::from_secs(hours * 60 * 60))
                .unwrap_or(defaults.rejoin_window),
            store,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = AppConfig::parse("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.rejoin_window, Duration::from_secs(6 * 60 * 60));
    }

    #[test]
    fn parses_supabase_store() {
        let config = AppConfig::parse(
            r#"{
                "state_path": "/tmp/brawls.json",
                "rejoin_window_hours": 2,
                "store": {
                    "kind": "supabase",
                    "url": "https://xyz.supabase.co",
                    "anon_key": "anon",
                    "tables": { "rounds": "v002_rounds_stag" }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.state_path, PathBuf::from("/tmp/brawls.json"));
        assert_eq!(config.rejoin_window, Duration::from_secs(2 * 60 * 60));
        let StoreConfig::Supabase {
            url,
            tables,
            scores_function,
            ..
        } = config.store
        else {
            panic!("expected supabase store");
        };
        assert_eq!(url, "https://xyz.supabase.co");
        assert_eq!(tables.rounds, "v002_rounds_stag");
        assert_eq!(tables.teams, "team");
        assert_eq!(scores_function, DEFAULT_SCORES_FUNCTION);
    }

    #[test]
    fn unknown_store_kind_is_rejected() {
        assert!(AppConfig::parse(r#"{"store":{"kind":"mongodb"}}"#).is_err());
    }

    #[test]
    fn environment_overrides_file_credentials() {
        let config = AppConfig::parse(
            r#"{"store":{"kind":"supabase","url":"https://file","anon_key":"file"}}"#,
        )
        .unwrap()
        .with_env_overrides(Some("https://env".into()), None);

        let StoreConfig::Supabase { url, anon_key, .. } = config.store else {
            panic!("expected supabase store");
        };
        assert_eq!(url, "https://env");
        assert_eq!(anon_key, "file");
    }

    #[test]
    fn environment_credentials_switch_memory_to_supabase() {
        let partial = AppConfig::default().with_env_overrides(Some("https://env".into()), None);
        assert_eq!(partial.store.kind(), "memory");

        let full = AppConfig::default()
            .with_env_overrides(Some("https://env".into()), Some("key".into()));
        assert_eq!(full.store.kind(), "supabase");
    }
}
