//! Client state container and its reducer.
//!
//! Every mutation goes through [`ClientState::apply`], which reports the slice it
//! touched so callers can fan the change out and flush the persisted subset.

use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    dao::{
        change_feed::SubscriptionSet,
        models::{
            EventEntity, IdentityEntity, QuestionEntity, ResponseEntity, RoundEntity,
            TeamEntity, TeamScoreEntity,
        },
    },
    state::progression::{round_ready, select_active, visible_questions},
};

/// Event and team this client joined.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub event_id: Uuid,
    pub team: TeamEntity,
    pub joined_at: SystemTime,
}

impl Session {
    /// Whether the session is still young enough to be resumed at `now`.
    pub fn within_window(&self, window: Duration, now: SystemTime) -> bool {
        now.duration_since(self.joined_at)
            .map(|age| age <= window)
            .unwrap_or(true)
    }
}

/// Subset of the state written to disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedState {
    #[serde(default)]
    pub identity: Option<IdentityEntity>,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub drafts: IndexMap<Uuid, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActiveRound {
    id: Uuid,
    /// Set when the player picked the round explicitly.
    pinned: bool,
}

/// Slice of the state touched by an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slice {
    Session,
    Event,
    Rounds,
    Questions,
    Drafts,
    Responses,
    Teams,
    Leaderboard,
    /// Everything was replaced at once (reset or restore).
    All,
}

/// Outcome of [`ClientState::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub slice: Slice,
    /// False when the action was ignored.
    pub changed: bool,
    /// True when the persisted subset must be flushed.
    pub persist: bool,
}

impl StateChange {
    fn changed(slice: Slice, persist: bool) -> Self {
        Self {
            slice,
            changed: true,
            persist,
        }
    }

    fn ignored(slice: Slice) -> Self {
        Self {
            slice,
            changed: false,
            persist: false,
        }
    }
}

/// Mutations accepted by the state container.
#[derive(Debug, Clone)]
pub enum ClientAction {
    /// Load the persisted subset read from disk.
    Restore(PersistedState),
    SetIdentity(IdentityEntity),
    Joined(Session),
    SetEvent(EventEntity),
    /// Replace the rounds and re-apply the selection policy.
    SetRounds(Vec<RoundEntity>),
    /// Explicit pick of a round by the player.
    SelectRound(Uuid),
    /// Replace the questions of `round_id`; stale fetches for another round are dropped.
    SetQuestions {
        round_id: Uuid,
        questions: Vec<QuestionEntity>,
    },
    SetDraft {
        question_id: Uuid,
        text: String,
    },
    SetResponses(Vec<ResponseEntity>),
    SetTeams(Vec<TeamEntity>),
    SetLeaderboard(Vec<TeamScoreEntity>),
    /// Forget everything (leave event).
    Reset,
}

/// In-memory state of the player client.
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    identity: Option<IdentityEntity>,
    session: Option<Session>,
    event: Option<EventEntity>,
    rounds: Vec<RoundEntity>,
    active_round: Option<ActiveRound>,
    /// Every question fetched for the active round, pending ones included.
    round_questions: Vec<QuestionEntity>,
    drafts: IndexMap<Uuid, String>,
    responses: Vec<ResponseEntity>,
    teams: Vec<TeamEntity>,
    leaderboard: Vec<TeamScoreEntity>,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an action and report what changed.
    pub fn apply(&mut self, action: ClientAction) -> StateChange {
        match action {
            ClientAction::Restore(persisted) => {
                *self = Self {
                    identity: persisted.identity,
                    session: persisted.session,
                    drafts: persisted.drafts,
                    ..Self::default()
                };
                StateChange::changed(Slice::All, false)
            }
            ClientAction::SetIdentity(identity) => {
                self.identity = Some(identity);
                StateChange::changed(Slice::Session, true)
            }
            ClientAction::Joined(session) => {
                // Drafts and play data belong to one team in one event.
                let switched = self.session.as_ref().is_some_and(|current| {
                    current.event_id != session.event_id || current.team.id != session.team.id
                });
                self.session = Some(session);
                if switched {
                    self.clear_play();
                    self.drafts.clear();
                    return StateChange::changed(Slice::All, true);
                }
                StateChange::changed(Slice::Session, true)
            }
            ClientAction::SetEvent(event) => {
                if self.event_id() != Some(event.id) {
                    return StateChange::ignored(Slice::Event);
                }
                self.event = Some(event);
                StateChange::changed(Slice::Event, false)
            }
            ClientAction::SetRounds(rounds) => {
                self.rounds = rounds;
                self.rounds.sort_by_key(|round| round.sequence_number);
                let selected = select_active(&self.rounds).map(|round| ActiveRound {
                    id: round.id,
                    pinned: false,
                });
                if selected.map(|active| active.id) != self.active_round_id() {
                    self.round_questions.clear();
                }
                self.active_round = selected;
                StateChange::changed(Slice::Rounds, false)
            }
            ClientAction::SelectRound(round_id) => {
                if !self.rounds.iter().any(|round| round.id == round_id) {
                    return StateChange::ignored(Slice::Rounds);
                }
                if self.active_round_id() != Some(round_id) {
                    self.round_questions.clear();
                }
                self.active_round = Some(ActiveRound {
                    id: round_id,
                    pinned: true,
                });
                StateChange::changed(Slice::Rounds, false)
            }
            ClientAction::SetQuestions {
                round_id,
                questions,
            } => {
                if self.active_round_id() != Some(round_id) {
                    return StateChange::ignored(Slice::Questions);
                }
                self.round_questions = questions;
                StateChange::changed(Slice::Questions, false)
            }
            ClientAction::SetDraft { question_id, text } => {
                self.drafts.insert(question_id, text);
                StateChange::changed(Slice::Drafts, true)
            }
            ClientAction::SetResponses(responses) => {
                self.responses = responses;
                StateChange::changed(Slice::Responses, false)
            }
            ClientAction::SetTeams(teams) => {
                self.teams = teams;
                StateChange::changed(Slice::Teams, false)
            }
            ClientAction::SetLeaderboard(rows) => {
                self.leaderboard = rows;
                StateChange::changed(Slice::Leaderboard, false)
            }
            ClientAction::Reset => {
                *self = Self::default();
                StateChange::changed(Slice::All, true)
            }
        }
    }

    fn clear_play(&mut self) {
        self.event = None;
        self.rounds.clear();
        self.active_round = None;
        self.round_questions.clear();
        self.responses.clear();
        self.teams.clear();
        self.leaderboard.clear();
    }

    /// Copy of the subset written to disk.
    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            identity: self.identity.clone(),
            session: self.session.clone(),
            drafts: self.drafts.clone(),
        }
    }

    /// Realtime scope derived from the session and the active round.
    pub fn subscription_set(&self) -> SubscriptionSet {
        SubscriptionSet {
            event_id: self.event_id(),
            round_id: self.event_id().and(self.active_round_id()),
        }
    }

    pub fn identity(&self) -> Option<&IdentityEntity> {
        self.identity.as_ref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn event_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|session| session.event_id)
    }

    pub fn team(&self) -> Option<&TeamEntity> {
        self.session.as_ref().map(|session| &session.team)
    }

    pub fn event(&self) -> Option<&EventEntity> {
        self.event.as_ref()
    }

    pub fn rounds(&self) -> &[RoundEntity] {
        &self.rounds
    }

    pub fn active_round_id(&self) -> Option<Uuid> {
        self.active_round.map(|active| active.id)
    }

    /// Whether the active round was picked by the player rather than the policy.
    pub fn active_round_pinned(&self) -> bool {
        self.active_round.is_some_and(|active| active.pinned)
    }

    pub fn active_round(&self) -> Option<&RoundEntity> {
        let id = self.active_round_id()?;
        self.rounds.iter().find(|round| round.id == id)
    }

    /// Released questions of the active round, in sequence order.
    pub fn questions(&self) -> Vec<QuestionEntity> {
        visible_questions(&self.round_questions)
    }

    pub fn question(&self, question_id: Uuid) -> Option<QuestionEntity> {
        self.questions()
            .into_iter()
            .find(|question| question.id == question_id)
    }

    /// Question the player should be looking at.
    pub fn focused_question_id(&self) -> Option<Uuid> {
        select_active(&self.questions()).map(|question| question.id)
    }

    /// Whether the active round is open with all of its questions released.
    pub fn round_ready(&self) -> bool {
        self.active_round()
            .is_some_and(|round| round_ready(round, &self.round_questions))
    }

    pub fn drafts(&self) -> &IndexMap<Uuid, String> {
        &self.drafts
    }

    pub fn draft(&self, question_id: Uuid) -> Option<&str> {
        self.drafts.get(&question_id).map(String::as_str)
    }

    pub fn responses(&self) -> &[ResponseEntity] {
        &self.responses
    }

    pub fn teams(&self) -> &[TeamEntity] {
        &self.teams
    }

    pub fn leaderboard(&self) -> &[TeamScoreEntity] {
        &self.leaderboard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::LifecycleStatus;

    fn joined_state() -> (ClientState, Uuid) {
        let event_id = Uuid::new_v4();
        let mut state = ClientState::new();
        state.apply(ClientAction::Joined(Session {
            event_id,
            team: TeamEntity {
                id: Uuid::new_v4(),
                event_id,
                name: "Quizzly Bears".into(),
            },
            joined_at: SystemTime::now(),
        }));
        (state, event_id)
    }

    fn round(event_id: Uuid, sequence_number: i32, status: LifecycleStatus) -> RoundEntity {
        RoundEntity {
            id: Uuid::new_v4(),
            event_id,
            name: format!("Round {sequence_number}"),
            sequence_number,
            status,
            description: None,
        }
    }

    fn question(round_id: Uuid, sequence_number: i32, status: LifecycleStatus) -> QuestionEntity {
        QuestionEntity {
            id: Uuid::new_v4(),
            round_id,
            sequence_number,
            question_text: "Capital of France?".into(),
            points: 2,
            status,
            correct_answer: None,
        }
    }

    #[test]
    fn rounds_refresh_applies_selection_policy() {
        let (mut state, event_id) = joined_state();
        let rounds = vec![
            round(event_id, 1, LifecycleStatus::Completed),
            round(event_id, 2, LifecycleStatus::Ongoing),
        ];
        let change = state.apply(ClientAction::SetRounds(rounds.clone()));
        assert_eq!(change.slice, Slice::Rounds);
        assert!(!change.persist);
        assert_eq!(state.active_round_id(), Some(rounds[1].id));
        assert_eq!(state.subscription_set().round_id, Some(rounds[1].id));
    }

    #[test]
    fn explicit_pick_lasts_until_next_rounds_refresh() {
        let (mut state, event_id) = joined_state();
        let rounds = vec![
            round(event_id, 1, LifecycleStatus::Completed),
            round(event_id, 2, LifecycleStatus::Ongoing),
        ];
        state.apply(ClientAction::SetRounds(rounds.clone()));

        state.apply(ClientAction::SelectRound(rounds[0].id));
        assert_eq!(state.active_round_id(), Some(rounds[0].id));
        assert!(state.active_round_pinned());

        state.apply(ClientAction::SetRounds(rounds.clone()));
        assert_eq!(state.active_round_id(), Some(rounds[1].id));
        assert!(!state.active_round_pinned());
    }

    #[test]
    fn selecting_unknown_round_is_ignored() {
        let (mut state, _) = joined_state();
        let change = state.apply(ClientAction::SelectRound(Uuid::new_v4()));
        assert!(!change.changed);
        assert!(state.active_round_id().is_none());
    }

    #[test]
    fn stale_questions_are_dropped() {
        let (mut state, event_id) = joined_state();
        let active = round(event_id, 1, LifecycleStatus::Ongoing);
        state.apply(ClientAction::SetRounds(vec![active.clone()]));

        let other_round = Uuid::new_v4();
        let change = state.apply(ClientAction::SetQuestions {
            round_id: other_round,
            questions: vec![question(other_round, 1, LifecycleStatus::Ongoing)],
        });
        assert!(!change.changed);
        assert!(state.questions().is_empty());

        let change = state.apply(ClientAction::SetQuestions {
            round_id: active.id,
            questions: vec![
                question(active.id, 1, LifecycleStatus::Ongoing),
                question(active.id, 2, LifecycleStatus::Pending),
            ],
        });
        assert!(change.changed);
        assert_eq!(state.questions().len(), 1);
        assert!(!state.round_ready());
        assert_eq!(state.focused_question_id(), Some(state.questions()[0].id));
    }

    #[test]
    fn drafts_are_persisted_and_survive_restore() {
        let (mut state, _) = joined_state();
        let question_id = Uuid::new_v4();
        let change = state.apply(ClientAction::SetDraft {
            question_id,
            text: "Paris".into(),
        });
        assert!(change.persist);

        let persisted = state.persisted();
        let mut restored = ClientState::new();
        restored.apply(ClientAction::Restore(persisted));
        assert_eq!(restored.draft(question_id), Some("Paris"));
        assert_eq!(restored.team().map(|t| t.name.as_str()), Some("Quizzly Bears"));
    }

    #[test]
    fn joining_as_another_team_drops_drafts() {
        let (mut state, event_id) = joined_state();
        let question_id = Uuid::new_v4();
        state.apply(ClientAction::SetDraft {
            question_id,
            text: "Paris".into(),
        });

        let change = state.apply(ClientAction::Joined(Session {
            event_id,
            team: TeamEntity {
                id: Uuid::new_v4(),
                event_id,
                name: "Les Quizerables".into(),
            },
            joined_at: SystemTime::now(),
        }));

        assert_eq!(change.slice, Slice::All);
        assert!(change.persist);
        assert!(state.draft(question_id).is_none());
        assert!(state.persisted().drafts.is_empty());
        assert_eq!(state.team().map(|t| t.name.as_str()), Some("Les Quizerables"));
    }

    #[test]
    fn reset_clears_everything() {
        let (mut state, event_id) = joined_state();
        state.apply(ClientAction::SetRounds(vec![round(
            event_id,
            1,
            LifecycleStatus::Ongoing,
        )]));
        let change = state.apply(ClientAction::Reset);
        assert_eq!(change.slice, Slice::All);
        assert!(change.persist);
        assert!(state.session().is_none());
        assert!(state.rounds().is_empty());
        assert!(state.subscription_set().is_empty());
    }

    #[test]
    fn event_rows_for_other_events_are_ignored() {
        let (mut state, event_id) = joined_state();
        let mut event = EventEntity {
            id: Uuid::new_v4(),
            name: "Elsewhere".into(),
            join_code: "9999".into(),
            scheduled_at: "2026-10-18T19:00:00Z".into(),
            status: LifecycleStatus::Ongoing,
            description: None,
            location: None,
            venue: None,
        };
        assert!(!state.apply(ClientAction::SetEvent(event.clone())).changed);

        event.id = event_id;
        assert!(state.apply(ClientAction::SetEvent(event)).changed);
        assert_eq!(state.event().map(|e| e.id), Some(event_id));
    }

    #[test]
    fn session_window() {
        let now = SystemTime::now();
        let (state, _) = joined_state();
        let mut session = state.session().cloned().unwrap();
        session.joined_at = now - Duration::from_secs(7 * 3600);
        assert!(!session.within_window(Duration::from_secs(6 * 3600), now));
        session.joined_at = now - Duration::from_secs(3600);
        assert!(session.within_window(Duration::from_secs(6 * 3600), now));
    }
}
