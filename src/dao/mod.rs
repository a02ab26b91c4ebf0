/// Transport-independent realtime change notifications.
pub mod change_feed;
/// Rows of the remote trivia schema.
pub mod models;
/// Storage error types shared by every backend.
pub mod storage;
/// Trivia store abstraction and its backends.
pub mod trivia_store;
