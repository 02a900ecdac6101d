use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use store::{NewUser, PublicProfile, PublicUser, ShowcaseStore, User, UserPatch, UserProfile};
use tower_sessions::Session;

use super::{data, parse_id, Data};
use crate::auth::{ensure_owner, Identity};
use crate::error::{ApiError, Body, Params};
use crate::github_import::RepoDraft;
use crate::state::AppState;

pub(crate) fn routes<S: ShowcaseStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/api/users", get(list::<S>).post(create::<S>))
        .route("/api/users/search", get(search::<S>))
        .route("/api/users/github/projects/{username}", get(github_projects::<S>))
        .route(
            "/api/users/{key}",
            get(profile::<S>).put(update::<S>).delete(remove::<S>),
        )
}

async fn list<S: ShowcaseStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<Data<Vec<PublicUser>>>, ApiError> {
    let users = state.store().list_users().await?;
    Ok(data(users.iter().map(User::to_public).collect()))
}

async fn create<S: ShowcaseStore>(
    State(state): State<AppState<S>>,
    Body(user): Body<NewUser>,
) -> Result<(StatusCode, Json<Data<User>>), ApiError> {
    let user = state.store().create_user(user).await?;
    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, data(user)))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    query: String,
}

async fn search<S: ShowcaseStore>(
    State(state): State<AppState<S>>,
    Params(params): Params<SearchParams>,
) -> Result<Json<Data<Vec<PublicUser>>>, ApiError> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(ApiError::Validation("query is required".into()));
    }
    let users = state.store().search_users(query).await?;
    Ok(data(users.iter().map(User::to_public).collect()))
}

/// A profile as seen by its owner, or by anyone else.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ProfileBody {
    Own(UserProfile),
    Public(PublicProfile),
}

async fn profile<S: ShowcaseStore>(
    identity: Option<Identity>,
    State(state): State<AppState<S>>,
    Path(username): Path<String>,
) -> Result<Json<Data<ProfileBody>>, ApiError> {
    let profile = state
        .showcase
        .profile(&username)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let body = match identity {
        Some(identity) if identity.user_id == profile.user.id => ProfileBody::Own(profile),
        _ => ProfileBody::Public(profile.into()),
    };
    Ok(data(body))
}

async fn update<S: ShowcaseStore>(
    identity: Identity,
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    Body(patch): Body<UserPatch>,
) -> Result<Json<Data<User>>, ApiError> {
    let id = parse_id(&id, "user")?;
    let user = state.store().user_by_id(id).await?;
    ensure_owner(&identity, user.as_ref(), "user")?;

    let updated = state
        .store()
        .update_user(id, patch)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(data(updated))
}

async fn remove<S: ShowcaseStore>(
    identity: Identity,
    State(state): State<AppState<S>>,
    session: Session,
    Path(id): Path<String>,
) -> Result<Json<Data<User>>, ApiError> {
    let id = parse_id(&id, "user")?;
    let user = state.store().user_by_id(id).await?;
    ensure_owner(&identity, user.as_ref(), "user")?;
    let Some(user) = user else {
        return Err(ApiError::NotFound("user"));
    };

    if !state.store().delete_user(id).await? {
        return Err(ApiError::NotFound("user"));
    }
    session.flush().await?;
    tracing::info!(user_id = %id, "user deleted");
    Ok(data(user))
}

async fn github_projects<S: ShowcaseStore>(
    _identity: Identity,
    State(state): State<AppState<S>>,
    Path(username): Path<String>,
) -> Result<Json<Data<Vec<RepoDraft>>>, ApiError> {
    Ok(data(state.github.repositories(&username).await?))
}
