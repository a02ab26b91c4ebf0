use std::{sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    models::{
        EventEntity, IdentityEntity, NewTeamEntity, QuestionEntity, ResponseEntity,
        ResponseUpsertEntity, RoundEntity, TeamEntity, TeamScoreEntity,
    },
    storage::StorageResult,
    trivia_store::{TableNames, TriviaStore},
};

use super::{
    config::SupabaseConfig,
    error::{SupabaseDaoError, SupabaseResult},
    models::{AuthSessionResponse, RefreshTokenRequest, RestErrorBody, ScoresRequest},
};

const RETURN_REPRESENTATION: &str = "return=representation";
const UPSERT_PREFERENCE: &str = "resolution=merge-duplicates,return=representation";
const RESPONSE_CONFLICT_TARGET: &str = "team_id,question_id";

#[derive(Clone)]
pub struct SupabaseTriviaStore {
    client: Client,
    base_url: Arc<str>,
    anon_key: Arc<str>,
    tables: Arc<TableNames>,
    scores_function: Arc<str>,
    access_token: Arc<RwLock<Option<String>>>,
}

impl SupabaseTriviaStore {
    /// Build the HTTP client for the hosted project. No request is sent.
    pub fn new(config: SupabaseConfig) -> SupabaseResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| SupabaseDaoError::ClientBuilder { source })?;

        Ok(Self {
            client,
            base_url: Arc::from(config.base_url.trim_end_matches('/')),
            anon_key: Arc::from(config.anon_key),
            tables: Arc::new(config.tables),
            scores_function: Arc::from(config.scores_function),
            access_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Build a request carrying the project key and the current bearer token.
    async fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        let bearer = self
            .access_token
            .read()
            .await
            .clone()
            .unwrap_or_else(|| self.anon_key.to_string());

        self.client
            .request(method, url)
            .header("apikey", self.anon_key.as_ref())
            .bearer_auth(bearer)
    }

    fn rest_path(table: &str) -> String {
        format!("rest/v1/{table}")
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> SupabaseResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|source| SupabaseDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<RestErrorBody>(&body).ok();

        if is_unique_conflict(status, parsed.as_ref()) {
            return Err(SupabaseDaoError::UniqueViolation {
                path: path.to_string(),
                message: parsed.and_then(|error| error.message).unwrap_or(body),
            });
        }

        Err(SupabaseDaoError::RequestStatus {
            path: path.to_string(),
            status,
            body,
        })
    }

    async fn decode<T>(response: Response, path: &str) -> SupabaseResult<T>
    where
        T: DeserializeOwned,
    {
        response
            .json::<T>()
            .await
            .map_err(|source| SupabaseDaoError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    async fn select_rows<T>(&self, table: &str, query: &[(&str, String)]) -> SupabaseResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let path = Self::rest_path(table);
        let builder = self
            .request(Method::GET, &path)
            .await
            .query(&[("select", "*")])
            .query(query);
        let response = self.send(builder, &path).await?;
        Self::decode(response, &path).await
    }

    async fn write_row<B, T>(
        &self,
        table: &str,
        query: &[(&str, &str)],
        prefer: &str,
        body: &B,
    ) -> SupabaseResult<T>
    where
        B: ?Sized + Serialize,
        T: DeserializeOwned,
    {
        let path = Self::rest_path(table);
        let builder = self
            .request(Method::POST, &path)
            .await
            .query(query)
            .header("Prefer", prefer)
            .json(body);
        let response = self.send(builder, &path).await?;
        let mut rows = Self::decode::<Vec<T>>(response, &path).await?;
        if rows.is_empty() {
            return Err(SupabaseDaoError::EmptyRepresentation { path });
        }
        Ok(rows.swap_remove(0))
    }

    async fn auth_session<B>(&self, path: &str, body: &B) -> SupabaseResult<IdentityEntity>
    where
        B: ?Sized + Serialize,
    {
        let builder = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .header("apikey", self.anon_key.as_ref())
            .json(body);
        let response = self.send(builder, path).await?;
        let session = Self::decode::<AuthSessionResponse>(response, path).await?;
        Ok(session.into_identity(SystemTime::now()))
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

impl TriviaStore for SupabaseTriviaStore {
    fn find_event_by_code(
        &self,
        join_code: &str,
    ) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        let join_code = join_code.to_string();
        Box::pin(async move {
            let rows = store
                .select_rows::<EventEntity>(
                    &store.tables.events,
                    &[("join_code", eq(&join_code)), ("limit", "1".into())],
                )
                .await?;
            Ok(rows.into_iter().next())
        })
    }

    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = store
                .select_rows::<EventEntity>(&store.tables.events, &[("id", eq(id))])
                .await?;
            Ok(rows.into_iter().next())
        })
    }

    fn list_rounds(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<RoundEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = store
                .select_rows(
                    &store.tables.rounds,
                    &[
                        ("event_id", eq(event_id)),
                        ("order", "sequence_number.asc".into()),
                    ],
                )
                .await?;
            Ok(rows)
        })
    }

    fn list_questions(
        &self,
        round_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = store
                .select_rows(
                    &store.tables.questions,
                    &[
                        ("round_id", eq(round_id)),
                        ("order", "sequence_number.asc".into()),
                    ],
                )
                .await?;
            Ok(rows)
        })
    }

    fn list_teams(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = store
                .select_rows(
                    &store.tables.teams,
                    &[("event_id", eq(event_id)), ("order", "name.asc".into())],
                )
                .await?;
            Ok(rows)
        })
    }

    fn insert_team(&self, team: NewTeamEntity) -> BoxFuture<'static, StorageResult<TeamEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let created: TeamEntity = store
                .write_row(&store.tables.teams, &[], RETURN_REPRESENTATION, &[team])
                .await?;
            debug!(team_id = %created.id, event_id = %created.event_id, "team created");
            Ok(created)
        })
    }

    fn upsert_response(
        &self,
        response: ResponseUpsertEntity,
    ) -> BoxFuture<'static, StorageResult<ResponseEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let stored: ResponseEntity = store
                .write_row(
                    &store.tables.responses,
                    &[("on_conflict", RESPONSE_CONFLICT_TARGET)],
                    UPSERT_PREFERENCE,
                    &[response],
                )
                .await?;
            Ok(stored)
        })
    }

    fn list_team_responses(
        &self,
        team_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ResponseEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let rows = store
                .select_rows(&store.tables.responses, &[("team_id", eq(team_id))])
                .await?;
            Ok(rows)
        })
    }

    fn team_scores(
        &self,
        event_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<TeamScoreEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let path = format!("functions/v1/{}", store.scores_function);
            let builder = store
                .request(Method::POST, &path)
                .await
                .json(&ScoresRequest { event_id });
            let response = store.send(builder, &path).await?;
            let scores = SupabaseTriviaStore::decode(response, &path).await?;
            Ok(scores)
        })
    }

    fn sign_in_anonymously(&self) -> BoxFuture<'static, StorageResult<IdentityEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let identity = store
                .auth_session("auth/v1/signup", &serde_json::json!({}))
                .await?;
            debug!(user_id = %identity.user_id, "anonymous identity created");
            Ok(identity)
        })
    }

    fn refresh_identity(
        &self,
        identity: IdentityEntity,
    ) -> BoxFuture<'static, StorageResult<IdentityEntity>> {
        let store = self.clone();
        Box::pin(async move {
            let refreshed = store
                .auth_session(
                    "auth/v1/token?grant_type=refresh_token",
                    &RefreshTokenRequest {
                        refresh_token: &identity.refresh_token,
                    },
                )
                .await?;
            Ok(refreshed)
        })
    }

    fn use_identity(&self, identity: Option<IdentityEntity>) -> BoxFuture<'static, ()> {
        let store = self.clone();
        Box::pin(async move {
            *store.access_token.write().await = identity.map(|identity| identity.access_token);
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let path = "auth/v1/health";
            let builder = store.request(Method::GET, path).await;
            store.send(builder, path).await?;
            Ok(())
        })
    }
}

impl std::fmt::Debug for SupabaseTriviaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseTriviaStore")
            .field("base_url", &self.base_url)
            .field("tables", &self.tables)
            .finish_non_exhaustive()
    }
}

/// A coded error body decides on its own; a bare 409 without one is taken as
/// a uniqueness conflict.
fn is_unique_conflict(status: StatusCode, body: Option<&RestErrorBody>) -> bool {
    match body {
        Some(body) if body.code.is_some() => body.is_unique_violation(),
        _ => status == StatusCode::CONFLICT,
    }
}
