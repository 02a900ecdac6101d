//! HTTP routes.
//!
//! | Path | Methods | Module |
//! |------|---------|--------|
//! | `/auth/github/login`, `/auth/github/callback`, `/auth/logout`, `/api/auth/me` | GET, POST | [`auth`] |
//! | `/api/users`, `/api/users/search`, `/api/users/{key}` | GET, POST, PUT, DELETE | [`users`] |
//! | `/api/users/github/projects/{username}` | GET | [`users`] |
//! | `/api/projects`, `/api/projects/{id}`, `/api/leaderboard` | GET, POST, PUT, PATCH, DELETE | [`projects`] |
//! | `/api/projects/{id}/images` | POST, DELETE | [`images`] |
//! | `/subdomains/{username}`, `/subdomains/{username}/projects/{title}` | GET | [`showcase`] |
//!
//! API responses wrap their payload as `{"data": ...}`; project listings add
//! a `pagination` object alongside. Methods a path does not list get 405.

use axum::{Json, Router};
use serde::Serialize;
use store::{Project, ProjectView, ShowcaseStore};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

mod auth;
mod images;
mod projects;
mod showcase;
mod users;

#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

pub fn data<T>(data: T) -> Json<Data<T>> {
    Json(Data { data })
}

/// Every route, with state applied.
pub fn router<S: ShowcaseStore>(state: AppState<S>) -> Router {
    Router::new()
        .merge(auth::routes())
        .merge(users::routes())
        .merge(projects::routes())
        .merge(images::routes())
        .merge(showcase::routes())
        .with_state(state)
}

/// Ids that do not parse cannot name an existing resource.
fn parse_id(raw: &str, what: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(what))
}

/// Attach the creator summary to a single project.
async fn view_of<S: ShowcaseStore>(
    state: &AppState<S>,
    project: Project,
) -> Result<ProjectView, ApiError> {
    state
        .showcase
        .hydrate(vec![project])
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("hydrate dropped a project".into()))
}
