use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use store::query::{SortField, SortOrder};
use store::{
    LikeAction, NewProject, Page, Pagination, ProjectFilter, ProjectPatch, ProjectSort,
    ProjectView, ShowcaseStore,
};

use super::{data, parse_id, view_of, Data};
use crate::auth::{ensure_owner, Identity};
use crate::error::{ApiError, Body, Params};
use crate::state::AppState;

pub(crate) fn routes<S: ShowcaseStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/api/projects", get(list::<S>).post(create::<S>))
        .route(
            "/api/projects/{id}",
            get(show::<S>)
                .put(update::<S>)
                .patch(like::<S>)
                .delete(remove::<S>),
        )
        .route("/api/leaderboard", get(leaderboard::<S>))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    query: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
    sort_by: Option<String>,
    sort_order: Option<SortOrder>,
    category: Option<String>,
    /// Comma separated.
    tags: Option<String>,
}

impl ListParams {
    fn into_query(self) -> Result<(ProjectFilter, Pagination, ProjectSort), ApiError> {
        let non_empty = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let field = self
            .sort_by
            .as_deref()
            .map(str::parse::<SortField>)
            .transpose()?
            .unwrap_or_default();
        let sort = ProjectSort::new(field, self.sort_order.unwrap_or_default());

        let pagination = Pagination::new(
            self.page.map(|p| p.max(1) as u64),
            self.page_size.map(|s| s.max(1) as u64),
        );

        let tags = self
            .tags
            .map(|tags| {
                tags.split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let filter = ProjectFilter {
            text: non_empty(self.query),
            category: non_empty(self.category),
            tags,
        };

        Ok((filter, pagination, sort))
    }
}

async fn list<S: ShowcaseStore>(
    State(state): State<AppState<S>>,
    Params(params): Params<ListParams>,
) -> Result<Json<Page<ProjectView>>, ApiError> {
    let (filter, pagination, sort) = params.into_query()?;
    let page = state
        .showcase
        .list_projects(&filter, pagination, sort)
        .await?;
    Ok(Json(page))
}

async fn show<S: ShowcaseStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<Data<ProjectView>>, ApiError> {
    let id = parse_id(&id, "project")?;
    let view = state
        .showcase
        .project_view(id)
        .await?
        .ok_or(ApiError::NotFound("project"))?;
    Ok(data(view))
}

/// One project, or a batch under `projects`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CreateBody {
    Many { projects: Vec<NewProject> },
    One(NewProject),
}

async fn create<S: ShowcaseStore>(
    identity: Identity,
    State(state): State<AppState<S>>,
    Body(body): Body<CreateBody>,
) -> Result<Response, ApiError> {
    match body {
        CreateBody::One(draft) => {
            let project = state.store().create_project(identity.user_id, draft).await?;
            tracing::info!(project_id = %project.id, user_id = %identity.user_id, "project created");
            let view = view_of(&state, project).await?;
            Ok((StatusCode::CREATED, data(view)).into_response())
        }
        CreateBody::Many { projects } => {
            if projects.is_empty() {
                return Err(ApiError::Validation("projects must not be empty".into()));
            }
            let created = state
                .showcase
                .create_projects(identity.user_id, projects)
                .await?;
            tracing::info!(count = created.len(), user_id = %identity.user_id, "projects created");
            let views = state.showcase.hydrate(created).await?;
            Ok((StatusCode::CREATED, data(views)).into_response())
        }
    }
}

async fn update<S: ShowcaseStore>(
    identity: Identity,
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    Body(patch): Body<ProjectPatch>,
) -> Result<Json<Data<ProjectView>>, ApiError> {
    let id = parse_id(&id, "project")?;
    let project = state.store().project_by_id(id).await?;
    ensure_owner(&identity, project.as_ref(), "project")?;

    let updated = state
        .store()
        .update_project(id, patch)
        .await?
        .ok_or(ApiError::NotFound("project"))?;
    Ok(data(view_of(&state, updated).await?))
}

async fn remove<S: ShowcaseStore>(
    identity: Identity,
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<Data<ProjectView>>, ApiError> {
    let id = parse_id(&id, "project")?;
    let project = state.store().project_by_id(id).await?;
    ensure_owner(&identity, project.as_ref(), "project")?;
    let Some(project) = project else {
        return Err(ApiError::NotFound("project"));
    };
    let view = view_of(&state, project).await?;

    if !state.store().delete_project(id).await? {
        return Err(ApiError::NotFound("project"));
    }
    tracing::info!(project_id = %id, "project deleted");
    Ok(data(view))
}

#[derive(Debug, Deserialize)]
struct LikeBody {
    action: LikeAction,
}

/// Any signed-in user may like or unlike; no ownership check.
async fn like<S: ShowcaseStore>(
    identity: Identity,
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    Body(body): Body<LikeBody>,
) -> Result<Json<Data<ProjectView>>, ApiError> {
    let id = parse_id(&id, "project")?;
    let project = state
        .store()
        .set_like(id, identity.user_id, body.action)
        .await?
        .ok_or(ApiError::NotFound("project"))?;
    Ok(data(view_of(&state, project).await?))
}

async fn leaderboard<S: ShowcaseStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<Data<Vec<ProjectView>>>, ApiError> {
    Ok(data(state.showcase.leaderboard().await?))
}
