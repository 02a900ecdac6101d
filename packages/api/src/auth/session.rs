//! Session keys and the [`Identity`] extractor.

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use store::UserId;
use tower_sessions::Session;

use crate::error::ApiError;

/// Key for storing the signed-in user's id in the session.
pub const SESSION_USER_ID_KEY: &str = "user_id";

/// Key for the in-flight OAuth login.
pub const OAUTH_PENDING_KEY: &str = "oauth_pending";

/// CSRF state and PKCE verifier kept between the login redirect and the callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingLogin {
    pub state: String,
    pub verifier: String,
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
}

impl Identity {
    async fn from_session<S: Send + Sync>(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, ApiError> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| ApiError::Internal(msg.to_string()))?;
        let user_id: Option<UserId> = session.get(SESSION_USER_ID_KEY).await?;
        Ok(user_id.map(|user_id| Self { user_id }))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Self::from_session(parts, state)
            .await?
            .ok_or(ApiError::Unauthorized)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Self::from_session(parts, state).await
    }
}
