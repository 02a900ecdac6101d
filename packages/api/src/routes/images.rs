use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use store::models::MAX_PROJECT_IMAGES;
use store::{ProjectView, ShowcaseStore};

use super::{data, parse_id, view_of, Data};
use crate::auth::{ensure_owner, Identity};
use crate::error::{ApiError, Body};
use crate::images;
use crate::state::AppState;

/// Largest accepted upload.
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

pub(crate) fn routes<S: ShowcaseStore>() -> Router<AppState<S>> {
    Router::new().route(
        "/api/projects/{id}/images",
        post(upload::<S>)
            .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES))
            .delete(remove::<S>),
    )
}

/// The `image` file field of a multipart body.
async fn read_image(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        if let Some(content_type) = field.content_type() {
            if !content_type.starts_with("image/") {
                return Err(ApiError::Validation("only image files can be uploaded".into()));
            }
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await?;
        if bytes.is_empty() {
            return Err(ApiError::Validation("image file is empty".into()));
        }
        return Ok((file_name, bytes.to_vec()));
    }
    Err(ApiError::Validation("image file is required".into()))
}

async fn upload<S: ShowcaseStore>(
    identity: Identity,
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<Data<ProjectView>>, ApiError> {
    let id = parse_id(&id, "project")?;
    let project = state.store().project_by_id(id).await?;
    ensure_owner(&identity, project.as_ref(), "project")?;
    if project.is_some_and(|p| p.images.len() >= MAX_PROJECT_IMAGES) {
        return Err(ApiError::Validation(format!(
            "a project can have at most {MAX_PROJECT_IMAGES} images"
        )));
    }

    let (file_name, bytes) = read_image(&mut multipart).await?;
    let updated =
        images::upload_image(state.store(), state.cdn.as_ref(), id, &file_name, bytes).await?;
    Ok(data(view_of(&state, updated).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveImage {
    image_url: String,
}

async fn remove<S: ShowcaseStore>(
    identity: Identity,
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    Body(body): Body<RemoveImage>,
) -> Result<Json<Data<ProjectView>>, ApiError> {
    let id = parse_id(&id, "project")?;
    let project = state.store().project_by_id(id).await?;
    ensure_owner(&identity, project.as_ref(), "project")?;
    if project.is_some_and(|p| !p.images.contains(&body.image_url)) {
        return Err(ApiError::NotFound("image"));
    }

    let updated =
        images::delete_image(state.store(), state.cdn.as_ref(), id, &body.image_url).await?;
    Ok(data(view_of(&state, updated).await?))
}
