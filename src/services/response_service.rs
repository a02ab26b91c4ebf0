use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{LifecycleStatus, ResponseUpsertEntity},
    dto::play::ResponseSummary,
    error::ServiceError,
    services::{play_service, sse_events},
    state::SharedState,
};

/// Submit the saved draft of a question as this team's answer.
///
/// The backend keeps one response per team and question, so re-submitting
/// overwrites the previous answer. Failed writes are reported, never retried.
pub async fn submit(state: &SharedState, question_id: Uuid) -> Result<ResponseSummary, ServiceError> {
    let (team_id, text, question) = state
        .read_client(|client| {
            (
                client.team().map(|team| team.id),
                client
                    .draft(question_id)
                    .map(str::trim)
                    .filter(|text| !text.is_empty())
                    .map(str::to_string),
                client.question(question_id),
            )
        })
        .await;

    let (Some(team_id), Some(text_response)) = (team_id, text) else {
        return Err(ServiceError::MissingPrecondition(
            "missing team or response".into(),
        ));
    };

    let question = question.ok_or_else(|| {
        ServiceError::NotFound(format!("question `{question_id}` is not in the active round"))
    })?;
    if question.status != LifecycleStatus::Ongoing {
        return Err(ServiceError::InvalidState(format!(
            "question `{question_id}` is {} and no longer accepts answers",
            question.status
        )));
    }

    let response = match state
        .store()
        .upsert_response(ResponseUpsertEntity {
            team_id,
            question_id,
            text_response,
        })
        .await
    {
        Ok(response) => response,
        Err(err) => {
            warn!(%question_id, error = %err, "failed to submit response");
            sse_events::broadcast_error_toast(state, "Could not submit your answer. Try again.");
            return Err(err.into());
        }
    };
    info!(%question_id, %team_id, "response submitted");

    if let Err(err) = play_service::refresh_responses(state).await {
        warn!(error = %err, "failed to refresh responses after submission");
        sse_events::broadcast_error_toast(state, "Answer saved, but the list could not be refreshed.");
    }

    Ok(response.into())
}
