use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use store::{ShowcaseStore, StoreError, User};
use tower_sessions::Session;

use crate::auth::{Identity, PendingLogin, OAUTH_PENDING_KEY, SESSION_USER_ID_KEY};
use crate::error::ApiError;
use crate::state::AppState;

pub(crate) fn routes<S: ShowcaseStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/auth/github/login", get(login::<S>))
        .route("/auth/github/callback", get(callback::<S>))
        .route("/auth/logout", post(logout))
        .route("/api/auth/me", get(me::<S>))
}

async fn login<S: ShowcaseStore>(
    State(state): State<AppState<S>>,
    session: Session,
) -> Result<Redirect, ApiError> {
    let (url, pending) = state.oauth.authorize();
    session.insert(OAUTH_PENDING_KEY, pending).await?;
    Ok(Redirect::to(&url))
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

async fn callback<S: ShowcaseStore>(
    State(state): State<AppState<S>>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    match complete_login(&state, &session, params).await {
        Ok(username) => Redirect::to(&format!("/users/{username}")),
        Err(reason) => Redirect::to(&format!("/?error={reason}")),
    }
}

/// Finish the OAuth flow and sign the user in. Errors are redirect reasons.
async fn complete_login<S: ShowcaseStore>(
    state: &AppState<S>,
    session: &Session,
    params: CallbackParams,
) -> Result<String, &'static str> {
    let pending: Option<PendingLogin> = session.remove(OAUTH_PENDING_KEY).await.map_err(|e| {
        tracing::error!("Failed to read session: {}", e);
        "session_error"
    })?;

    if let Some(error) = params.error {
        tracing::warn!(%error, "GitHub sign-in was not granted");
        return Err("access_denied");
    }
    let (Some(code), Some(csrf)) = (params.code, params.state) else {
        tracing::error!("GitHub callback missing code or state");
        return Err("missing_code");
    };
    let Some(pending) = pending else {
        tracing::error!("GitHub callback without a pending login");
        return Err("invalid_state");
    };

    let profile = state
        .oauth
        .exchange_code(&code, &csrf, pending)
        .await
        .map_err(|e| {
            tracing::error!("GitHub OAuth error: {}", e);
            e.reason()
        })?;

    let user = state
        .store()
        .upsert_github_user(profile)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert GitHub user: {}", e);
            match e {
                StoreError::Conflict { .. } => "account_conflict",
                _ => "server_error",
            }
        })?;

    session.cycle_id().await.map_err(|e| {
        tracing::error!("Failed to rotate session: {}", e);
        "session_error"
    })?;
    session
        .insert(SESSION_USER_ID_KEY, user.id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to set session: {}", e);
            "session_error"
        })?;

    tracing::info!(user_id = %user.id, username = %user.username, "signed in with GitHub");
    Ok(user.username)
}

async fn logout(session: Session) -> Result<StatusCode, ApiError> {
    session.flush().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The signed-in user, or `null`.
async fn me<S: ShowcaseStore>(
    identity: Option<Identity>,
    State(state): State<AppState<S>>,
) -> Result<Json<Option<User>>, ApiError> {
    let Some(identity) = identity else {
        return Ok(Json(None));
    };
    Ok(Json(state.store().user_by_id(identity.user_id).await?))
}
