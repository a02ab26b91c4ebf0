mod config;
mod error;
mod models;
mod realtime;
mod store;

pub use config::SupabaseConfig;
pub use error::{SupabaseDaoError, SupabaseResult};
pub use realtime::SupabaseChangeFeed;
pub use store::SupabaseTriviaStore;
