//! In-process trivia store seeded from a JSON fixture.
//!
//! Mirrors the constraints of the hosted schema (unique team name per event,
//! one response per team and question) so the companion can run offline for
//! front-end work, and so the services can be exercised in tests.

use std::{
    fs,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dao::{
    change_feed::{ChangeFeed, ChangeKind, ChangeNotification, ChangeTable, FeedResult, SubscriptionSet},
    models::{
        Correctness, EventEntity, IdentityEntity, LifecycleStatus, NewTeamEntity, QuestionEntity,
        ResponseEntity, ResponseUpsertEntity, RoundEntity, TeamEntity, TeamScoreEntity,
    },
    storage::{StorageError, StorageResult},
    trivia_store::TriviaStore,
};

/// Failures specific to the in-memory store.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("memory store is offline")]
    Offline,
    #[error("failed to read seed file `{path}`")]
    ReadSeed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse seed file `{path}`")]
    ParseSeed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Fixture describing the initial content of the store.
#[derive(Debug, Default, Deserialize)]
pub struct MemorySeed {
    #[serde(default)]
    pub events: Vec<EventEntity>,
    #[serde(default)]
    pub rounds: Vec<RoundEntity>,
    #[serde(default)]
    pub questions: Vec<QuestionEntity>,
    #[serde(default)]
    pub teams: Vec<TeamEntity>,
    #[serde(default)]
    pub responses: Vec<ResponseEntity>,
}

struct Tables {
    events: DashMap<Uuid, EventEntity>,
    rounds: DashMap<Uuid, RoundEntity>,
    questions: DashMap<Uuid, QuestionEntity>,
    teams: DashMap<Uuid, TeamEntity>,
    /// Keyed by `(team_id, question_id)`, the upsert conflict target.
    responses: DashMap<(Uuid, Uuid), ResponseEntity>,
}

#[derive(Clone)]
pub struct MemoryTriviaStore {
    tables: Arc<Tables>,
    changes: broadcast::Sender<ChangeNotification>,
    identity: Arc<RwLock<Option<IdentityEntity>>>,
    offline: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
}

impl MemoryTriviaStore {
    /// Build a store holding the given fixture.
    pub fn new(seed: MemorySeed) -> Self {
        let (changes, _receiver) = broadcast::channel(64);
        let tables = Tables {
            events: seed.events.into_iter().map(|e| (e.id, e)).collect(),
            rounds: seed.rounds.into_iter().map(|r| (r.id, r)).collect(),
            questions: seed.questions.into_iter().map(|q| (q.id, q)).collect(),
            teams: seed.teams.into_iter().map(|t| (t.id, t)).collect(),
            responses: seed
                .responses
                .into_iter()
                .map(|r| ((r.team_id, r.question_id), r))
                .collect(),
        };

        Self {
            tables: Arc::new(tables),
            changes,
            identity: Arc::new(RwLock::new(None)),
            offline: Arc::new(AtomicBool::new(false)),
            requests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Load a fixture from a JSON file.
    pub fn from_seed_file(path: &Path) -> Result<Self, MemoryStoreError> {
        let display = path.display().to_string();
        let contents = fs::read_to_string(path).map_err(|source| MemoryStoreError::ReadSeed {
            path: display.clone(),
            source,
        })?;
        let seed = serde_json::from_str::<MemorySeed>(&contents).map_err(|source| {
            MemoryStoreError::ParseSeed {
                path: display,
                source,
            }
        })?;
        Ok(Self::new(seed))
    }

    /// Number of requests served so far, failed ones included.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Make every subsequent request fail as if the network was down.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Identity currently attached to requests.
    pub async fn current_identity(&self) -> Option<IdentityEntity> {
        self.identity.read().await.clone()
    }

    /// All responses stored for a `(team, question)` pair.
    pub fn responses_for(&self, team_id: Uuid, question_id: Uuid) -> Vec<ResponseEntity> {
        self.tables
            .responses
            .iter()
            .filter(|entry| entry.team_id == team_id && entry.question_id == question_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Teams stored for an event, in no particular order.
    pub fn teams_for(&self, event_id: Uuid) -> Vec<TeamEntity> {
        self.tables
            .teams
            .iter()
            .filter(|entry| entry.event_id == event_id)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Organiser-side status change of an event, broadcast on the feed.
    pub fn set_event_status(&self, id: Uuid, status: LifecycleStatus) {
        if let Some(mut event) = self.tables.events.get_mut(&id) {
            if !lifecycle_step_allowed(event.status, status) {
                warn!(%id, from = %event.status, to = %status, "rejected event status change");
                return;
            }
            event.status = status;
            let record = to_record(event.value());
            self.notify(ChangeTable::Event, ChangeKind::Update, record);
        }
    }

    /// Organiser-side status change of a round, broadcast on the feed.
    pub fn set_round_status(&self, id: Uuid, status: LifecycleStatus) {
        if let Some(mut round) = self.tables.rounds.get_mut(&id) {
            if !lifecycle_step_allowed(round.status, status) {
                warn!(%id, from = %round.status, to = %status, "rejected round status change");
                return;
            }
            round.status = status;
            let record = to_record(round.value());
            self.notify(ChangeTable::Round, ChangeKind::Update, record);
        }
    }

    /// Organiser-side status change of a question, broadcast on the feed.
    pub fn set_question_status(&self, id: Uuid, status: LifecycleStatus) {
        if let Some(mut question) = self.tables.questions.get_mut(&id) {
            if !lifecycle_step_allowed(question.status, status) {
                warn!(%id, from = %question.status, to = %status, "rejected question status change");
                return;
            }
            question.status = status;
            let record = to_record(question.value());
            self.notify(ChangeTable::Question, ChangeKind::Update, record);
        }
    }

    /// Organiser-side grading of a response.
    pub fn grade_response(&self, team_id: Uuid, question_id: Uuid, verdict: Correctness) {
        let points = self
            .tables
            .questions
            .get(&question_id)
            .map(|question| question.points)
            .unwrap_or_default();
        if let Some(mut response) = self.tables.responses.get_mut(&(team_id, question_id)) {
            response.is_correct = Some(verdict);
            response.points_awarded = Some(match verdict {
                Correctness::True => points,
                Correctness::Partial => points / 2,
                Correctness::False => 0,
            });
        }
    }

    fn notify(&self, table: ChangeTable, kind: ChangeKind, record: Value) {
        let _ = self
            .changes
            .send(ChangeNotification::new(table, kind, record));
    }

    fn begin_request(&self) -> StorageResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "memory store offline".into(),
                MemoryStoreError::Offline,
            ));
        }
        Ok(())
    }

    fn scores(&self, event_id: Uuid) -> Vec<TeamScoreEntity> {
        let mut scores: Vec<TeamScoreEntity> = self
            .teams_for(event_id)
            .into_iter()
            .map(|team| {
                let total_points = self
                    .tables
                    .responses
                    .iter()
                    .filter(|entry| {
                        entry.team_id == team.id && entry.is_correct == Some(Correctness::True)
                    })
                    .filter_map(|entry| {
                        self.tables
                            .questions
                            .get(&entry.question_id)
                            .map(|question| i64::from(question.points))
                    })
                    .sum();
                TeamScoreEntity {
                    team_id: team.id,
                    name: team.name,
                    total_points,
                }
            })
            .collect();
        scores.sort_by(|a, b| {
            b.total_points
                .cmp(&a.total_points)
                .then_with(|| a.name.cmp(&b.name))
        });
        scores
    }
}

/// Re-emitting the current status is allowed; moving backwards or skipping is not.
fn lifecycle_step_allowed(from: LifecycleStatus, to: LifecycleStatus) -> bool {
    from == to || from.can_advance_to(to)
}

fn to_record<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl TriviaStore for MemoryTriviaStore {
    fn find_event_by_code(
        &self,
        join_code: &str,
    ) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        let join_code = join_code.to_string();
        Box::pin(async move {
            store.begin_request()?;
            Ok(store
                .tables
                .events
                .iter()
                .find(|entry| entry.join_code == join_code)
                .map(|entry| entry.value().clone()))
        })
    }

    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.begin_request()?;
            Ok(store.tables.events.get(&id).map(|entry| entry.value().clone()))
        })
    }

    fn list_rounds(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.begin_request()?;
            let mut rounds: Vec<RoundEntity> = store
                .tables
                .rounds
                .iter()
                .filter(|entry| entry.event_id == event_id)
                .map(|entry| entry.value().clone())
                .collect();
            rounds.sort_by_key(|round| round.sequence_number);
            Ok(rounds)
        })
    }

    fn list_questions(
        &self,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.begin_request()?;
            let mut questions: Vec<QuestionEntity> = store
                .tables
                .questions
                .iter()
                .filter(|entry| entry.round_id == round_id)
                .map(|entry| {
                    let mut question = entry.value().clone();
                    if question.status != LifecycleStatus::Completed {
                        question.correct_answer = None;
                    }
                    question
                })
                .collect();
            questions.sort_by_key(|question| question.sequence_number);
            Ok(questions)
        })
    }

    fn list_teams(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.begin_request()?;
            let mut teams = store.teams_for(event_id);
            teams.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(teams)
        })
    }

    fn insert_team(&self, team: NewTeamEntity) -> BoxFuture<'static, StorageResult<TeamEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.begin_request()?;
            let taken = store
                .tables
                .teams
                .iter()
                .any(|entry| entry.event_id == team.event_id && entry.name == team.name);
            if taken {
                return Err(StorageError::conflict(format!(
                    "team `{}` already exists in event `{}`",
                    team.name, team.event_id
                )));
            }

            let entity = TeamEntity {
                id: Uuid::new_v4(),
                event_id: team.event_id,
                name: team.name,
            };
            store.tables.teams.insert(entity.id, entity.clone());
            debug!(team_id = %entity.id, created_by = %team.created_by, "memory store created team");
            store.notify(ChangeTable::Team, ChangeKind::Insert, to_record(&entity));
            Ok(entity)
        })
    }

    fn upsert_response(
        &self,
        response: ResponseUpsertEntity,
    ) -> BoxFuture<'static, StorageResult<ResponseEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.begin_request()?;
            let key = (response.team_id, response.question_id);
            let mut entry = store
                .tables
                .responses
                .entry(key)
                .or_insert_with(|| ResponseEntity {
                    id: Uuid::new_v4(),
                    team_id: response.team_id,
                    question_id: response.question_id,
                    text_response: None,
                    is_correct: None,
                    points_awarded: None,
                });
            entry.text_response = Some(response.text_response);
            Ok(entry.value().clone())
        })
    }

    fn list_team_responses(
        &self,
        team_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ResponseEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.begin_request()?;
            Ok(store
                .tables
                .responses
                .iter()
                .filter(|entry| entry.team_id == team_id)
                .map(|entry| entry.value().clone())
                .collect())
        })
    }

    fn team_scores(
        &self,
        event_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<TeamScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.begin_request()?;
            Ok(store.scores(event_id))
        })
    }

    fn sign_in_anonymously(&self) -> BoxFuture<'static, StorageResult<IdentityEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.begin_request()?;
            Ok(IdentityEntity {
                user_id: Uuid::new_v4(),
                access_token: format!("memory-access-{}", Uuid::new_v4().simple()),
                refresh_token: format!("memory-refresh-{}", Uuid::new_v4().simple()),
                expires_at: None,
            })
        })
    }

    fn refresh_identity(
        &self,
        identity: IdentityEntity,
    ) -> BoxFuture<'static, StorageResult<IdentityEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.begin_request()?;
            Ok(IdentityEntity {
                access_token: format!("memory-access-{}", Uuid::new_v4().simple()),
                expires_at: None,
                ..identity
            })
        })
    }

    fn use_identity(&self, identity: Option<IdentityEntity>) -> BoxFuture<'static, ()> {
        let store = self.clone();
        Box::pin(async move {
            *store.identity.write().await = identity;
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.begin_request() })
    }
}

impl ChangeFeed for MemoryTriviaStore {
    fn run(
        &self,
        _subscriptions: SubscriptionSet,
        _access_token: Option<String>,
        sink: mpsc::Sender<ChangeNotification>,
    ) -> BoxFuture<'static, FeedResult<()>> {
        let mut receiver = self.changes.subscribe();
        Box::pin(async move {
            loop {
                match receiver.recv().await {
                    Ok(notification) => {
                        if sink.send(notification).await.is_err() {
                            return Ok(());
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "memory change feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(crate::dao::change_feed::FeedError::Closed);
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(code: &str) -> EventEntity {
        EventEntity {
            id: Uuid::new_v4(),
            name: "Pub Quiz".into(),
            join_code: code.into(),
            scheduled_at: "2026-10-18T19:00:00Z".into(),
            status: LifecycleStatus::Ongoing,
            description: None,
            location: None,
            venue: None,
        }
    }

    #[tokio::test]
    async fn team_names_are_unique_per_event() {
        let first = event("1234");
        let second = event("5678");
        let store = MemoryTriviaStore::new(MemorySeed {
            events: vec![first.clone(), second.clone()],
            ..MemorySeed::default()
        });
        let creator = Uuid::new_v4();

        store
            .insert_team(NewTeamEntity {
                event_id: first.id,
                name: "Quizzly Bears".into(),
                created_by: creator,
            })
            .await
            .unwrap();

        let duplicate = store
            .insert_team(NewTeamEntity {
                event_id: first.id,
                name: "Quizzly Bears".into(),
                created_by: creator,
            })
            .await;
        assert!(matches!(duplicate, Err(StorageError::Conflict { .. })));

        store
            .insert_team(NewTeamEntity {
                event_id: second.id,
                name: "Quizzly Bears".into(),
                created_by: creator,
            })
            .await
            .unwrap();
        assert_eq!(store.teams_for(first.id).len(), 1);
        assert_eq!(store.teams_for(second.id).len(), 1);
    }

    #[tokio::test]
    async fn upsert_keeps_one_row_per_team_and_question() {
        let store = MemoryTriviaStore::new(MemorySeed::default());
        let team_id = Uuid::new_v4();
        let question_id = Uuid::new_v4();

        let first = store
            .upsert_response(ResponseUpsertEntity {
                team_id,
                question_id,
                text_response: "Paris".into(),
            })
            .await
            .unwrap();
        let second = store
            .upsert_response(ResponseUpsertEntity {
                team_id,
                question_id,
                text_response: "France".into(),
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        let stored = store.responses_for(team_id, question_id);
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text_response.as_deref(), Some("France"));
    }

    #[tokio::test]
    async fn offline_store_fails_and_counts_requests() {
        let store = MemoryTriviaStore::new(MemorySeed::default());
        store.set_offline(true);
        let result = store.find_event_by_code("1234").await;
        assert!(matches!(result, Err(StorageError::Unavailable { .. })));
        assert_eq!(store.request_count(), 1);
    }

    #[tokio::test]
    async fn status_changes_only_move_forward() {
        let event = event("1234");
        let store = MemoryTriviaStore::new(MemorySeed {
            events: vec![event.clone()],
            ..MemorySeed::default()
        });
        let mut feed = store.changes.subscribe();

        store.set_event_status(event.id, LifecycleStatus::Pending);
        assert!(feed.try_recv().is_err());

        store.set_event_status(event.id, LifecycleStatus::Completed);
        let notification = feed.try_recv().unwrap();
        assert_eq!(notification.table, ChangeTable::Event);
        assert_eq!(notification.record["status"], "completed");

        let stored = store.find_event(event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, LifecycleStatus::Completed);
    }
}
