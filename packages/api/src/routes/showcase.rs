//! Read-only showcase pages that subdomain requests are rewritten to.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use store::{ProjectView, PublicProfile, PublicUser, ShowcaseStore};

use crate::error::ApiError;
use crate::state::AppState;

pub(crate) fn routes<S: ShowcaseStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/subdomains/{username}", get(profile::<S>))
        .route("/subdomains/{username}/projects/{title}", get(project::<S>))
}

async fn profile<S: ShowcaseStore>(
    State(state): State<AppState<S>>,
    Path(username): Path<String>,
) -> Result<Json<PublicProfile>, ApiError> {
    let profile = state
        .showcase
        .profile(&username)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(profile.into()))
}

#[derive(Debug, Serialize)]
struct ShowcaseProject {
    project: ProjectView,
    user: PublicUser,
}

async fn project<S: ShowcaseStore>(
    State(state): State<AppState<S>>,
    Path((username, title)): Path<(String, String)>,
) -> Result<Json<ShowcaseProject>, ApiError> {
    let (user, project) = state.showcase.showcase_project(&username, &title).await?;
    Ok(Json(ShowcaseProject { project, user }))
}
