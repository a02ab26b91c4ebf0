//! Transport-independent description of the realtime change feed.
//!
//! Backends translate their wire protocol into [`ChangeNotification`] values
//! pushed onto an `mpsc` channel; everything downstream of that channel can be
//! driven in tests without a live connection.

use std::{error::Error, fmt};

use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Table a change notification originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeTable {
    Event,
    Round,
    Question,
    Team,
}

/// Kind of row change carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Parse the upper-case change type used by the realtime service.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }

    /// Wire spelling of this change type.
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }
}

/// A single row change pushed by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification {
    pub table: ChangeTable,
    pub kind: ChangeKind,
    /// New row for inserts and updates, old row (possibly partial) for deletes.
    pub record: Value,
}

impl ChangeNotification {
    /// Build a notification from any serializable row.
    pub fn new(table: ChangeTable, kind: ChangeKind, record: Value) -> Self {
        Self {
            table,
            kind,
            record,
        }
    }

    /// Read a UUID column from the carried record.
    pub fn record_uuid(&self, column: &str) -> Option<Uuid> {
        self.record
            .get(column)
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

/// One postgres-changes registration: table, change kind and equality filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub table: ChangeTable,
    pub kind: ChangeKind,
    /// Column the filter applies to.
    pub column: &'static str,
    pub value: Uuid,
}

impl Subscription {
    /// Filter expression understood by the realtime service (`column=eq.value`).
    pub fn filter(&self) -> String {
        format!("{}=eq.{}", self.column, self.value)
    }
}

/// Scope the client currently listens to: the joined event and its active round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    pub event_id: Option<Uuid>,
    pub round_id: Option<Uuid>,
}

impl SubscriptionSet {
    /// Whether there is nothing to listen to.
    pub fn is_empty(&self) -> bool {
        self.event_id.is_none()
    }

    /// Expand the scope into the individual registrations to send to the backend.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        let Some(event_id) = self.event_id else {
            return Vec::new();
        };

        let mut subscriptions = vec![
            Subscription {
                table: ChangeTable::Event,
                kind: ChangeKind::Update,
                column: "id",
                value: event_id,
            },
            Subscription {
                table: ChangeTable::Round,
                kind: ChangeKind::Update,
                column: "event_id",
                value: event_id,
            },
            Subscription {
                table: ChangeTable::Team,
                kind: ChangeKind::Insert,
                column: "event_id",
                value: event_id,
            },
            Subscription {
                table: ChangeTable::Team,
                kind: ChangeKind::Update,
                column: "event_id",
                value: event_id,
            },
        ];

        if let Some(round_id) = self.round_id {
            for kind in [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete] {
                subscriptions.push(Subscription {
                    table: ChangeTable::Question,
                    kind,
                    column: "round_id",
                    value: round_id,
                });
            }
        }

        subscriptions
    }

    /// Whether a notification matches one of the registrations of this scope.
    ///
    /// Delete payloads may only carry the primary key, so they are accepted
    /// whenever the table and kind match.
    pub fn matches(&self, notification: &ChangeNotification) -> bool {
        self.subscriptions().iter().any(|subscription| {
            subscription.table == notification.table
                && subscription.kind == notification.kind
                && (notification.kind == ChangeKind::Delete
                    || notification.record_uuid(subscription.column) == Some(subscription.value))
        })
    }
}

/// Result alias for change feed connections.
pub type FeedResult<T> = Result<T, FeedError>;

/// Failure of a change feed connection.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("change feed connection failed: {message}")]
    Connect {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    #[error("change feed protocol error: {0}")]
    Protocol(String),
    #[error("change feed closed by the remote side")]
    Closed,
}

impl FeedError {
    /// Construct a connection error from any transport failure.
    pub fn connect(message: impl fmt::Display, source: impl Error + Send + Sync + 'static) -> Self {
        FeedError::Connect {
            message: message.to_string(),
            source: Box::new(source),
        }
    }
}

/// Source of change notifications for a [`SubscriptionSet`].
pub trait ChangeFeed: Send + Sync {
    /// Hold one connection open, forwarding notifications into `sink` until the
    /// connection ends. Dropping the returned future closes the connection.
    fn run(
        &self,
        subscriptions: SubscriptionSet,
        access_token: Option<String>,
        sink: mpsc::Sender<ChangeNotification>,
    ) -> BoxFuture<'static, FeedResult<()>>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_scope_has_no_subscriptions() {
        assert!(SubscriptionSet::default().subscriptions().is_empty());
        assert!(SubscriptionSet::default().is_empty());
    }

    #[test]
    fn question_subscriptions_follow_active_round() {
        let event_id = Uuid::new_v4();
        let without_round = SubscriptionSet {
            event_id: Some(event_id),
            round_id: None,
        };
        assert!(
            without_round
                .subscriptions()
                .iter()
                .all(|s| s.table != ChangeTable::Question)
        );

        let round_id = Uuid::new_v4();
        let with_round = SubscriptionSet {
            event_id: Some(event_id),
            round_id: Some(round_id),
        };
        let questions: Vec<_> = with_round
            .subscriptions()
            .into_iter()
            .filter(|s| s.table == ChangeTable::Question)
            .collect();
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].filter(), format!("round_id=eq.{round_id}"));
    }

    #[test]
    fn matches_checks_scope_column() {
        let event_id = Uuid::new_v4();
        let scope = SubscriptionSet {
            event_id: Some(event_id),
            round_id: None,
        };

        let ours = ChangeNotification::new(
            ChangeTable::Round,
            ChangeKind::Update,
            json!({ "id": Uuid::new_v4(), "event_id": event_id }),
        );
        let theirs = ChangeNotification::new(
            ChangeTable::Round,
            ChangeKind::Update,
            json!({ "id": Uuid::new_v4(), "event_id": Uuid::new_v4() }),
        );
        let round_insert = ChangeNotification::new(
            ChangeTable::Round,
            ChangeKind::Insert,
            json!({ "id": Uuid::new_v4(), "event_id": event_id }),
        );

        assert!(scope.matches(&ours));
        assert!(!scope.matches(&theirs));
        assert!(!scope.matches(&round_insert));
    }

    #[test]
    fn change_kind_round_trips_wire_spelling() {
        for kind in [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete] {
            assert_eq!(ChangeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ChangeKind::parse("TRUNCATE"), None);
    }
}
