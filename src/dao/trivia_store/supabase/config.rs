use crate::dao::trivia_store::TableNames;

use super::error::{SupabaseDaoError, SupabaseResult};

const DEFAULT_SCORES_FUNCTION: &str = "get_teams_scores_sorted";

/// Runtime configuration describing how to reach the hosted project.
#[derive(Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub base_url: String,
    pub anon_key: String,
    pub tables: TableNames,
    /// Edge function returning the sorted leaderboard of an event.
    pub scores_function: String,
}

impl SupabaseConfig {
    /// Construct a configuration from the project URL and its anonymous key.
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            anon_key: anon_key.into(),
            tables: TableNames::default(),
            scores_function: DEFAULT_SCORES_FUNCTION.into(),
        }
    }

    /// Replace the table names.
    pub fn with_tables(mut self, tables: TableNames) -> Self {
        self.tables = tables;
        self
    }

    /// Replace the leaderboard function name.
    pub fn with_scores_function(mut self, name: impl Into<String>) -> Self {
        self.scores_function = name.into();
        self
    }

    /// Build a configuration by reading the expected environment variables.
    pub fn from_env() -> SupabaseResult<Self> {
        let base_url = std::env::var("SUPABASE_URL").map_err(|_| {
            SupabaseDaoError::MissingEnvVar {
                var: "SUPABASE_URL",
            }
        })?;
        let anon_key = std::env::var("SUPABASE_ANON_KEY").map_err(|_| {
            SupabaseDaoError::MissingEnvVar {
                var: "SUPABASE_ANON_KEY",
            }
        })?;

        Ok(Self::new(base_url, anon_key))
    }

    /// WebSocket endpoint of the realtime service.
    pub fn realtime_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let socket_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        format!(
            "{socket_base}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            self.anon_key
        )
    }
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("base_url", &self.base_url)
            .field("tables", &self.tables)
            .field("scores_function", &self.scores_function)
            .finish_non_exhaustive()
    }
}
