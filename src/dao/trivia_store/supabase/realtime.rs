//! Realtime change feed spoken over the hosted project's Phoenix channel socket.

use std::{sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt, future::BoxFuture};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::{sync::mpsc, time::interval};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::dao::{
    change_feed::{
        ChangeFeed, ChangeKind, ChangeNotification, ChangeTable, FeedError, FeedResult,
        SubscriptionSet,
    },
    trivia_store::TableNames,
};

use super::config::SupabaseConfig;

const CHANNEL_TOPIC: &str = "realtime:brainy-brawls";
const HEARTBEAT_TOPIC: &str = "phoenix";
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const JOIN_REF: &str = "1";

/// Frame exchanged on the Phoenix socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PhoenixMessage {
    topic: String,
    event: String,
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    join_ref: Option<String>,
}

impl PhoenixMessage {
    fn join(tables: &TableNames, subscriptions: &SubscriptionSet, access_token: Option<&str>) -> Self {
        let changes: Vec<Value> = subscriptions
            .subscriptions()
            .into_iter()
            .map(|subscription| {
                json!({
                    "event": subscription.kind.as_str(),
                    "schema": "public",
                    "table": table_name(tables, subscription.table),
                    "filter": subscription.filter(),
                })
            })
            .collect();

        let mut payload = json!({
            "config": {
                "broadcast": { "self": false, "ack": false },
                "presence": { "key": "" },
                "postgres_changes": changes,
            }
        });
        if let Some(token) = access_token {
            payload["access_token"] = Value::String(token.to_string());
        }

        Self {
            topic: CHANNEL_TOPIC.into(),
            event: "phx_join".into(),
            payload,
            reference: Some(JOIN_REF.into()),
            join_ref: Some(JOIN_REF.into()),
        }
    }

    fn heartbeat(reference: u64) -> Self {
        Self {
            topic: HEARTBEAT_TOPIC.into(),
            event: "heartbeat".into(),
            payload: json!({}),
            reference: Some(reference.to_string()),
            join_ref: None,
        }
    }
}

fn table_name(tables: &TableNames, table: ChangeTable) -> &str {
    match table {
        ChangeTable::Event => &tables.events,
        ChangeTable::Round => &tables.rounds,
        ChangeTable::Question => &tables.questions,
        ChangeTable::Team => &tables.teams,
    }
}

fn table_from_name(tables: &TableNames, name: &str) -> Option<ChangeTable> {
    [
        ChangeTable::Event,
        ChangeTable::Round,
        ChangeTable::Question,
        ChangeTable::Team,
    ]
    .into_iter()
    .find(|table| table_name(tables, *table) == name)
}

/// Translate a `postgres_changes` frame into a notification.
fn decode_change(tables: &TableNames, message: &PhoenixMessage) -> Option<ChangeNotification> {
    if message.event != "postgres_changes" {
        return None;
    }

    let data = message.payload.get("data")?;
    let table = table_from_name(tables, data.get("table")?.as_str()?)?;
    let kind = ChangeKind::parse(data.get("type")?.as_str()?)?;
    let record_key = if kind == ChangeKind::Delete {
        "old_record"
    } else {
        "record"
    };
    let record = data.get(record_key).cloned().unwrap_or(Value::Null);

    Some(ChangeNotification::new(table, kind, record))
}

/// Outcome of a reply to our channel join.
fn join_failure(message: &PhoenixMessage) -> Option<String> {
    if message.event != "phx_reply" || message.reference.as_deref() != Some(JOIN_REF) {
        return None;
    }
    match message.payload.get("status").and_then(Value::as_str) {
        Some("ok") => None,
        _ => Some(message.payload.get("response").map_or_else(
            || "join rejected".to_string(),
            |response| response.to_string(),
        )),
    }
}

#[derive(Clone)]
pub struct SupabaseChangeFeed {
    url: Arc<str>,
    tables: Arc<TableNames>,
}

impl SupabaseChangeFeed {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            url: Arc::from(config.realtime_url()),
            tables: Arc::new(config.tables.clone()),
        }
    }

    async fn run_connection(
        self,
        subscriptions: SubscriptionSet,
        access_token: Option<String>,
        sink: mpsc::Sender<ChangeNotification>,
    ) -> FeedResult<()> {
        let (socket, _) = connect_async(self.url.as_ref())
            .await
            .map_err(|err| FeedError::connect("realtime socket", err))?;
        let (mut write, mut read) = socket.split();

        let join = PhoenixMessage::join(&self.tables, &subscriptions, access_token.as_deref());
        send_frame(&mut write, &join).await?;
        info!(
            event_id = ?subscriptions.event_id,
            round_id = ?subscriptions.round_id,
            "joined realtime channel"
        );

        let mut heartbeat = interval(HEARTBEAT_INTERVAL);
        let mut reference: u64 = 1;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    reference += 1;
                    send_frame(&mut write, &PhoenixMessage::heartbeat(reference)).await?;
                }
                frame = read.next() => {
                    let Some(frame) = frame else {
                        return Err(FeedError::Closed);
                    };
                    let frame = frame.map_err(|err| FeedError::connect("realtime read", err))?;
                    match frame {
                        Message::Text(text) => {
                            let message = match serde_json::from_str::<PhoenixMessage>(&text) {
                                Ok(message) => message,
                                Err(err) => {
                                    warn!(error = %err, "failed to parse realtime frame");
                                    continue;
                                }
                            };

                            if let Some(reason) = join_failure(&message) {
                                return Err(FeedError::Protocol(reason));
                            }
                            if matches!(message.event.as_str(), "phx_error" | "phx_close") {
                                return Err(FeedError::Closed);
                            }
                            if let Some(notification) = decode_change(&self.tables, &message) {
                                debug!(table = ?notification.table, kind = ?notification.kind, "realtime change");
                                if sink.send(notification).await.is_err() {
                                    return Ok(());
                                }
                            }
                        }
                        Message::Ping(data) => {
                            write
                                .send(Message::Pong(data))
                                .await
                                .map_err(|err| FeedError::connect("realtime write", err))?;
                        }
                        Message::Close(_) => return Err(FeedError::Closed),
                        _ => {}
                    }
                }
            }
        }
    }
}

async fn send_frame<S>(write: &mut S, message: &PhoenixMessage) -> FeedResult<()>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(message)
        .map_err(|err| FeedError::Protocol(format!("failed to encode frame: {err}")))?;
    write
        .send(Message::Text(text.into()))
        .await
        .map_err(|err| FeedError::connect("realtime write", err))
}

impl ChangeFeed for SupabaseChangeFeed {
    fn run(
        &self,
        subscriptions: SubscriptionSet,
        access_token: Option<String>,
        sink: mpsc::Sender<ChangeNotification>,
    ) -> BoxFuture<'static, FeedResult<()>> {
        Box::pin(self.clone().run_connection(subscriptions, access_token, sink))
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn frame(raw: &str) -> PhoenixMessage {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn join_lists_every_subscription() {
        let tables = TableNames::default();
        let event_id = Uuid::new_v4();
        let round_id = Uuid::new_v4();
        let join = PhoenixMessage::join(
            &tables,
            &SubscriptionSet {
                event_id: Some(event_id),
                round_id: Some(round_id),
            },
            Some("token"),
        );

        let changes = join.payload["config"]["postgres_changes"]
            .as_array()
            .unwrap();
        assert_eq!(changes.len(), 7);
        assert_eq!(changes[0]["table"], "event");
        assert_eq!(changes[0]["filter"], format!("id=eq.{event_id}"));
        assert_eq!(join.payload["access_token"], "token");
    }

    #[test]
    fn decodes_update_with_configured_table_names() {
        let tables = TableNames {
            rounds: "v002_rounds_stag".into(),
            ..TableNames::default()
        };
        let message = frame(
            r#"{
                "topic": "realtime:brainy-brawls",
                "event": "postgres_changes",
                "payload": {
                    "data": {
                        "schema": "public",
                        "table": "v002_rounds_stag",
                        "type": "UPDATE",
                        "record": { "id": "a0e7f3c4-1b52-4d8e-9f00-6c1d2e3f4a5b", "status": "ongoing" },
                        "old_record": { "id": "a0e7f3c4-1b52-4d8e-9f00-6c1d2e3f4a5b" }
                    },
                    "ids": [1]
                },
                "ref": null
            }"#,
        );

        let notification = decode_change(&tables, &message).unwrap();
        assert_eq!(notification.table, ChangeTable::Round);
        assert_eq!(notification.kind, ChangeKind::Update);
        assert_eq!(notification.record["status"], "ongoing");
    }

    #[test]
    fn deletes_carry_old_record() {
        let message = frame(
            r#"{
                "topic": "realtime:brainy-brawls",
                "event": "postgres_changes",
                "payload": { "data": { "table": "question", "type": "DELETE",
                    "record": {}, "old_record": { "id": "a0e7f3c4-1b52-4d8e-9f00-6c1d2e3f4a5b" } } },
                "ref": null
            }"#,
        );
        let notification = decode_change(&TableNames::default(), &message).unwrap();
        assert_eq!(notification.kind, ChangeKind::Delete);
        assert!(notification.record_uuid("id").is_some());
    }

    #[test]
    fn ignores_unknown_tables_and_events() {
        let tables = TableNames::default();
        let other_table = frame(
            r#"{"topic":"t","event":"postgres_changes","payload":{"data":{"table":"response","type":"INSERT","record":{}}},"ref":null}"#,
        );
        let reply = frame(r#"{"topic":"t","event":"presence_state","payload":{},"ref":null}"#);
        assert!(decode_change(&tables, &other_table).is_none());
        assert!(decode_change(&tables, &reply).is_none());
    }

    #[test]
    fn join_reply_errors_are_reported() {
        let ok = frame(
            r#"{"topic":"t","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#,
        );
        let rejected = frame(
            r#"{"topic":"t","event":"phx_reply","payload":{"status":"error","response":{"reason":"unauthorized"}},"ref":"1"}"#,
        );
        let heartbeat_reply = frame(
            r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok"},"ref":"7"}"#,
        );
        assert!(join_failure(&ok).is_none());
        assert!(join_failure(&rejected).unwrap().contains("unauthorized"));
        assert!(join_failure(&heartbeat_reply).is_none());
    }
}
