use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone, Debug)]
/// Named SSE message with a JSON-encoded body.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Serialise `payload` into the data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream.
    pub stream: String,
    /// Human-readable message confirming the subscription.
    pub message: String,
    /// Whether the client currently holds a session.
    pub joined: bool,
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Short user-facing notice, typically a failed background refresh or submission.
pub struct ToastEvent {
    pub level: ToastLevel,
    pub message: String,
}
