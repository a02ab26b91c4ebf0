use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::IdentityEntity;

/// Postgres error code for unique constraint violations.
pub const UNIQUE_VIOLATION: &str = "23505";

/// Error body returned by the REST layer.
#[derive(Debug, Deserialize)]
pub struct RestErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl RestErrorBody {
    pub fn is_unique_violation(&self) -> bool {
        self.code.as_deref() == Some(UNIQUE_VIOLATION)
    }
}

/// Session returned by the auth endpoints (sign-up and token refresh).
#[derive(Debug, Deserialize)]
pub struct AuthSessionResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub expires_at: Option<u64>,
    pub user: AuthUser,
}

#[derive(Debug, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
}

impl AuthSessionResponse {
    /// Convert into an identity, resolving the expiry against `now`.
    pub fn into_identity(self, now: SystemTime) -> IdentityEntity {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => Some(UNIX_EPOCH + Duration::from_secs(at)),
            (None, Some(ttl)) => Some(now + Duration::from_secs(ttl)),
            (None, None) => None,
        };

        IdentityEntity {
            user_id: self.user.id,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshTokenRequest<'a> {
    pub refresh_token: &'a str,
}

/// Body of the leaderboard function invocation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoresRequest {
    pub event_id: Uuid,
}
