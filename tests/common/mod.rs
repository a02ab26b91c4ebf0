#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use brainy_brawls::{
    dao::{
        models::{EventEntity, LifecycleStatus, QuestionEntity, RoundEntity, TeamEntity},
        trivia_store::memory::{MemorySeed, MemoryTriviaStore},
    },
    dto::sse::ServerEvent,
    state::{AppState, DEFAULT_REJOIN_WINDOW, SharedState, persistence::StateFile},
};
use tempfile::TempDir;
use tokio::sync::broadcast;
use uuid::Uuid;

pub const JOIN_CODE: &str = "4821";

/// One event with an ongoing round of two questions (one ongoing, one pending),
/// a pending second round and an existing rival team.
pub struct Fixture {
    pub store: MemoryTriviaStore,
    pub state: SharedState,
    pub dir: TempDir,
    pub event: EventEntity,
    pub first_round: RoundEntity,
    pub second_round: RoundEntity,
    pub open_question: QuestionEntity,
    pub pending_question: QuestionEntity,
    pub later_question: QuestionEntity,
    pub rival: TeamEntity,
}

impl Fixture {
    pub fn new() -> Self {
        let event = EventEntity {
            id: Uuid::new_v4(),
            name: "Thursday Pub Quiz".into(),
            join_code: JOIN_CODE.into(),
            scheduled_at: "2026-10-22T19:30:00Z".into(),
            status: LifecycleStatus::Ongoing,
            description: None,
            location: Some("Lisbon".into()),
            venue: None,
        };
        let first_round = round(event.id, 1, LifecycleStatus::Ongoing);
        let second_round = round(event.id, 2, LifecycleStatus::Pending);
        let open_question = question(first_round.id, 1, "What is the capital of France?", LifecycleStatus::Ongoing);
        let pending_question = question(first_round.id, 2, "Which river runs through Lisbon?", LifecycleStatus::Pending);
        let later_question = question(second_round.id, 1, "Who directed Jaws?", LifecycleStatus::Pending);
        let rival = TeamEntity {
            id: Uuid::new_v4(),
            event_id: event.id,
            name: "Quizzly Bears".into(),
        };

        let store = MemoryTriviaStore::new(MemorySeed {
            events: vec![event.clone()],
            rounds: vec![first_round.clone(), second_round.clone()],
            questions: vec![
                open_question.clone(),
                pending_question.clone(),
                later_question.clone(),
            ],
            teams: vec![rival.clone()],
            responses: Vec::new(),
        });

        let dir = tempfile::tempdir().expect("temp dir");
        let state = new_state(&store, &dir, DEFAULT_REJOIN_WINDOW);

        Self {
            store,
            state,
            dir,
            event,
            first_round,
            second_round,
            open_question,
            pending_question,
            later_question,
            rival,
        }
    }

    /// A second client process sharing the same store and state file.
    pub fn restart(&self, rejoin_window: Duration) -> SharedState {
        new_state(&self.store, &self.dir, rejoin_window)
    }

    pub fn state_file(&self) -> StateFile {
        StateFile::new(self.dir.path().join("client-state.json"))
    }
}

fn new_state(store: &MemoryTriviaStore, dir: &TempDir, rejoin_window: Duration) -> SharedState {
    AppState::new(
        Arc::new(store.clone()),
        StateFile::new(dir.path().join("client-state.json")),
        rejoin_window,
    )
}

pub fn round(event_id: Uuid, sequence_number: i32, status: LifecycleStatus) -> RoundEntity {
    RoundEntity {
        id: Uuid::new_v4(),
        event_id,
        name: format!("Round {sequence_number}"),
        sequence_number,
        status,
        description: None,
    }
}

pub fn question(
    round_id: Uuid,
    sequence_number: i32,
    text: &str,
    status: LifecycleStatus,
) -> QuestionEntity {
    QuestionEntity {
        id: Uuid::new_v4(),
        round_id,
        sequence_number,
        question_text: text.into(),
        points: 1,
        status,
        correct_answer: Some("answer".into()),
    }
}

/// Drain every event already queued on an SSE subscription.
pub fn drain(receiver: &mut broadcast::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

pub fn has_event(events: &[ServerEvent], name: &str) -> bool {
    events.iter().any(|event| event.event.as_deref() == Some(name))
}
