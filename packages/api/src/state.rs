//! Shared handler state.

use std::sync::Arc;

use store::{Showcase, ShowcaseStore};

use crate::auth::GitHubOAuth;
use crate::cdn::ImageCdn;
use crate::github_import::GitHubClient;

/// Everything a handler may need, cloned per request.
#[derive(Clone)]
pub struct AppState<S: ShowcaseStore> {
    pub showcase: Showcase<S>,
    pub cdn: Arc<dyn ImageCdn>,
    pub github: Arc<GitHubClient>,
    pub oauth: Arc<GitHubOAuth>,
}

impl<S: ShowcaseStore> AppState<S> {
    pub fn new(
        store: S,
        cdn: Arc<dyn ImageCdn>,
        github: GitHubClient,
        oauth: GitHubOAuth,
    ) -> Self {
        Self {
            showcase: Showcase::new(store),
            cdn,
            github: Arc::new(github),
            oauth: Arc::new(oauth),
        }
    }

    pub fn store(&self) -> &S {
        self.showcase.store()
    }
}
