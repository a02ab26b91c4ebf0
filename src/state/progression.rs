//! Selection policy shared by rounds and questions.
//!
//! The organiser drives every lifecycle; the client only decides which item to
//! focus. The canonical rule: first `ongoing` item, otherwise first `pending`
//! item, otherwise the last item, all in sequence order.

use crate::dao::models::{LifecycleStatus, QuestionEntity, RoundEntity};

/// Item with a lifecycle status and a position inside its parent.
pub trait Progressive {
    fn status(&self) -> LifecycleStatus;
    fn sequence_number(&self) -> i32;
}

impl Progressive for RoundEntity {
    fn status(&self) -> LifecycleStatus {
        self.status
    }

    fn sequence_number(&self) -> i32 {
        self.sequence_number
    }
}

impl Progressive for QuestionEntity {
    fn status(&self) -> LifecycleStatus {
        self.status
    }

    fn sequence_number(&self) -> i32 {
        self.sequence_number
    }
}

/// Pick the item the client should focus, or `None` for an empty slice.
pub fn select_active<T: Progressive>(items: &[T]) -> Option<&T> {
    let mut ordered: Vec<&T> = items.iter().collect();
    ordered.sort_by_key(|item| item.sequence_number());

    let first_with = |status: LifecycleStatus| {
        ordered
            .iter()
            .find(|item| item.status() == status)
            .copied()
    };

    first_with(LifecycleStatus::Ongoing)
        .or_else(|| first_with(LifecycleStatus::Pending))
        .or_else(|| ordered.last().copied())
}

/// Questions players may see: everything already released, in sequence order.
pub fn visible_questions(questions: &[QuestionEntity]) -> Vec<QuestionEntity> {
    let mut visible: Vec<QuestionEntity> = questions
        .iter()
        .filter(|question| question.status != LifecycleStatus::Pending)
        .cloned()
        .collect();
    visible.sort_by_key(|question| question.sequence_number);
    visible
}

/// A round accepts final submission once it is open and every question is released.
pub fn round_ready(round: &RoundEntity, questions: &[QuestionEntity]) -> bool {
    round.status == LifecycleStatus::Ongoing
        && questions
            .iter()
            .filter(|question| question.round_id == round.id)
            .all(|question| question.status != LifecycleStatus::Pending)
}
