/// OpenAPI documentation generation.
pub mod documentation;
/// Realtime connection supervisor with backoff.
pub mod feed_supervisor;
/// Health check service.
pub mod health_service;
/// Joining, resuming and leaving an event.
pub mod join_service;
/// Server-computed leaderboard.
pub mod leaderboard_service;
/// Play screen refreshes, round selection and drafts.
pub mod play_service;
/// Routing of change notifications to refreshes.
pub mod realtime_service;
/// Answer submission.
pub mod response_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
