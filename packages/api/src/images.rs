//! Project image upload and removal as compensating sagas.
//!
//! Upload runs three forward steps, each registering how to undo itself:
//!
//! | Step | Forward | Compensation |
//! |------|---------|--------------|
//! | 1 | upload bytes to the CDN | delete the asset |
//! | 2 | record image metadata | forget the metadata |
//! | 3 | attach the URL to the project | none (last step) |
//!
//! When a step fails, the registered compensations run newest first. A failed
//! compensation is logged and never replaces the error that triggered it.
//!
//! Removal runs detach, forget, CDN delete. The database steps decide the
//! outcome; a CDN failure afterwards only leaves an orphaned asset.

use store::{Project, ProjectId, ShowcaseStore};

use crate::cdn::ImageCdn;
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq)]
enum Compensation {
    DeleteFromCdn { url: String },
    ForgetMetadata { project: ProjectId, url: String },
}

struct Saga<'a, S> {
    store: &'a S,
    cdn: &'a dyn ImageCdn,
    completed: Vec<Compensation>,
}

impl<'a, S: ShowcaseStore> Saga<'a, S> {
    fn new(store: &'a S, cdn: &'a dyn ImageCdn) -> Self {
        Self {
            store,
            cdn,
            completed: Vec::new(),
        }
    }

    fn completed(&mut self, compensation: Compensation) {
        self.completed.push(compensation);
    }

    /// Undo completed steps in reverse order and hand back `cause`.
    async fn abort(self, cause: ApiError) -> ApiError {
        tracing::warn!(error = %cause, steps = self.completed.len(), "image upload failed, compensating");
        for step in self.completed.into_iter().rev() {
            let result = match &step {
                Compensation::DeleteFromCdn { url } => {
                    self.cdn.delete(url).await.map_err(|e| e.to_string())
                }
                Compensation::ForgetMetadata { project, url } => self
                    .store
                    .forget_image(*project, url)
                    .await
                    .map_err(|e| e.to_string()),
            };
            if let Err(error) = result {
                tracing::error!(?step, %error, "compensation failed");
            }
        }
        cause
    }
}

/// Upload an image and attach it to `project`.
pub async fn upload_image<S: ShowcaseStore>(
    store: &S,
    cdn: &dyn ImageCdn,
    project: ProjectId,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<Project, ApiError> {
    let mut saga = Saga::new(store, cdn);

    let url = cdn
        .upload(file_name, bytes)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;
    saga.completed(Compensation::DeleteFromCdn { url: url.clone() });

    if let Err(err) = store.record_image(project, &url).await {
        return Err(saga.abort(err.into()).await);
    }
    saga.completed(Compensation::ForgetMetadata {
        project,
        url: url.clone(),
    });

    match store.attach_image(project, &url).await {
        Ok(Some(updated)) => {
            tracing::info!(%project, %url, "image attached");
            Ok(updated)
        }
        Ok(None) => Err(saga.abort(ApiError::NotFound("project")).await),
        Err(err) => Err(saga.abort(err.into()).await),
    }
}

/// Detach `url` from `project`, then drop its metadata and the CDN asset.
pub async fn delete_image<S: ShowcaseStore>(
    store: &S,
    cdn: &dyn ImageCdn,
    project: ProjectId,
    url: &str,
) -> Result<Project, ApiError> {
    let updated = store
        .detach_image(project, url)
        .await?
        .ok_or(ApiError::NotFound("project"))?;
    store.forget_image(project, url).await?;

    if let Err(error) = cdn.delete(url).await {
        tracing::warn!(%project, %url, %error, "image detached but CDN delete failed");
    }
    Ok(updated)
}
