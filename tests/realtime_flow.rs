mod common;

use std::{sync::Arc, time::Duration};

use brainy_brawls::{
    dao::{
        change_feed::{
            ChangeFeed, ChangeKind, ChangeNotification, ChangeTable, FeedResult, SubscriptionSet,
        },
        models::LifecycleStatus,
    },
    services::{
        feed_supervisor, join_service, play_service, realtime_service::{self, SubscriberTable},
        sse_events, sse_service,
    },
};
use common::{Fixture, JOIN_CODE, drain, has_event, question};
use futures::future::BoxFuture;
use serde_json::json;
use tokio::{sync::mpsc, time::timeout};
use uuid::Uuid;

async fn joined() -> Fixture {
    let fixture = Fixture::new();
    join_service::join(&fixture.state, JOIN_CODE, "Trivia Newtons")
        .await
        .unwrap();
    fixture
}

/// Forward the next notification emitted by the memory store through the dispatcher.
async fn pump(fixture: &Fixture, change: impl FnOnce()) {
    let (sink, mut receiver) = mpsc::channel(8);
    let connection = tokio::spawn(fixture.store.run(fixture.state.scope(), None, sink));
    change();
    let notification = timeout(Duration::from_secs(1), receiver.recv())
        .await
        .expect("notification in time")
        .expect("feed open");
    realtime_service::handle_notification(&fixture.state, &SubscriberTable::standard(), notification)
        .await;
    connection.abort();
}

#[tokio::test]
async fn round_change_moves_to_the_next_round() {
    let fixture = joined().await;
    fixture
        .store
        .set_round_status(fixture.first_round.id, LifecycleStatus::Completed);
    fixture
        .store
        .set_round_status(fixture.second_round.id, LifecycleStatus::Ongoing);

    pump(&fixture, || {
        fixture
            .store
            .set_question_status(fixture.later_question.id, LifecycleStatus::Ongoing)
    })
    .await;
    // The question lives in a round outside the current scope.
    let active = fixture.state.read_client(|client| client.active_round_id()).await;
    assert_eq!(active, Some(fixture.first_round.id));

    pump(&fixture, || {
        fixture
            .store
            .set_round_status(fixture.second_round.id, LifecycleStatus::Ongoing)
    })
    .await;

    let snapshot = play_service::snapshot(&fixture.state).await;
    assert_eq!(snapshot.rounds.active_round_id, Some(fixture.second_round.id));
    let ids: Vec<Uuid> = snapshot.questions.questions.iter().map(|q| q.id).collect();
    assert_eq!(ids, vec![fixture.later_question.id]);
    assert_eq!(fixture.state.scope().round_id, Some(fixture.second_round.id));
}

#[tokio::test]
async fn question_release_shows_up() {
    let fixture = joined().await;

    pump(&fixture, || {
        fixture
            .store
            .set_question_status(fixture.pending_question.id, LifecycleStatus::Ongoing)
    })
    .await;

    let snapshot = play_service::snapshot(&fixture.state).await;
    assert_eq!(snapshot.questions.questions.len(), 2);
    // The earlier ongoing question keeps the focus.
    assert_eq!(snapshot.questions.focused_question_id, Some(fixture.open_question.id));
}

#[tokio::test]
async fn event_push_is_applied_without_refetch() {
    let fixture = joined().await;
    let mut events = sse_service::subscribe_client(&fixture.state);
    let before = fixture.store.request_count();

    pump(&fixture, || {
        fixture
            .store
            .set_event_status(fixture.event.id, LifecycleStatus::Completed)
    })
    .await;

    let status = fixture
        .state
        .read_client(|client| client.event().map(|event| event.status))
        .await;
    assert_eq!(status, Some(LifecycleStatus::Completed));
    assert_eq!(fixture.store.request_count(), before);
    assert!(has_event(&drain(&mut events), sse_events::EVENT_EVENT_UPDATED));
}

#[tokio::test]
async fn partial_event_push_falls_back_to_refetch() {
    let fixture = joined().await;
    let before = fixture.store.request_count();

    let notification = ChangeNotification::new(
        ChangeTable::Event,
        ChangeKind::Update,
        json!({ "id": fixture.event.id }),
    );
    realtime_service::handle_notification(&fixture.state, &SubscriberTable::standard(), notification)
        .await;

    assert_eq!(fixture.store.request_count(), before + 1);
}

#[tokio::test]
async fn new_team_refreshes_teams_and_leaderboard() {
    let fixture = joined().await;

    let notification = ChangeNotification::new(
        ChangeTable::Team,
        ChangeKind::Insert,
        json!({ "id": Uuid::new_v4(), "event_id": fixture.event.id, "name": "Late Arrivals" }),
    );
    let before = fixture.store.request_count();
    realtime_service::handle_notification(&fixture.state, &SubscriberTable::standard(), notification)
        .await;

    // One teams fetch plus one leaderboard fetch.
    assert_eq!(fixture.store.request_count(), before + 2);
}

#[tokio::test]
async fn out_of_scope_changes_are_dropped() {
    let fixture = joined().await;
    let before = fixture.store.request_count();
    let elsewhere = question(Uuid::new_v4(), 1, "Elsewhere", LifecycleStatus::Ongoing);

    for notification in [
        ChangeNotification::new(
            ChangeTable::Round,
            ChangeKind::Update,
            json!({ "id": Uuid::new_v4(), "event_id": Uuid::new_v4() }),
        ),
        ChangeNotification::new(
            ChangeTable::Question,
            ChangeKind::Update,
            serde_json::to_value(&elsewhere).unwrap(),
        ),
    ] {
        realtime_service::handle_notification(&fixture.state, &SubscriberTable::standard(), notification)
            .await;
    }

    assert_eq!(fixture.store.request_count(), before);
}

#[tokio::test]
async fn failed_refresh_becomes_a_toast() {
    let fixture = joined().await;
    let mut events = sse_service::subscribe_client(&fixture.state);
    fixture.store.set_offline(true);

    let notification = ChangeNotification::new(
        ChangeTable::Round,
        ChangeKind::Update,
        json!({ "id": fixture.first_round.id, "event_id": fixture.event.id }),
    );
    realtime_service::handle_notification(&fixture.state, &SubscriberTable::standard(), notification)
        .await;

    assert!(has_event(&drain(&mut events), sse_events::EVENT_TOAST));
}

/// Feed that records every scope it is opened with and stays connected.
#[derive(Clone)]
struct RecordingFeed {
    opened: mpsc::UnboundedSender<SubscriptionSet>,
}

impl ChangeFeed for RecordingFeed {
    fn run(
        &self,
        subscriptions: SubscriptionSet,
        _access_token: Option<String>,
        _sink: mpsc::Sender<ChangeNotification>,
    ) -> BoxFuture<'static, FeedResult<()>> {
        let _ = self.opened.send(subscriptions);
        Box::pin(futures::future::pending())
    }
}

#[tokio::test]
async fn supervisor_reopens_the_feed_when_the_scope_moves() {
    let fixture = Fixture::new();
    let (opened_tx, mut opened) = mpsc::unbounded_channel();
    let feed = Arc::new(RecordingFeed { opened: opened_tx });
    let (sink, _notifications) = mpsc::channel(8);
    let supervisor = tokio::spawn(feed_supervisor::run(fixture.state.clone(), feed, sink));

    join_service::join(&fixture.state, JOIN_CODE, "Trivia Newtons")
        .await
        .unwrap();

    let mut latest = SubscriptionSet::default();
    while latest.round_id != Some(fixture.first_round.id) {
        latest = timeout(Duration::from_secs(1), opened.recv())
            .await
            .expect("feed opened in time")
            .expect("supervisor alive");
        assert_eq!(latest.event_id, Some(fixture.event.id));
    }

    play_service::select_round(&fixture.state, fixture.second_round.id)
        .await
        .unwrap();
    let reopened = timeout(Duration::from_secs(1), opened.recv())
        .await
        .expect("feed reopened in time")
        .expect("supervisor alive");
    assert_eq!(reopened.round_id, Some(fixture.second_round.id));

    supervisor.abort();
}
