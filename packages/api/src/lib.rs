//! # API crate — HTTP layer for the project showcase
//!
//! Everything the server binary mounts: configuration, the error taxonomy,
//! the Postgres store, GitHub sign-in, subdomain rewriting, image hosting and
//! every route handler. Handlers are generic over [`store::ShowcaseStore`], so
//! tests drive the same router with an in-memory store.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`auth`] | GitHub OAuth with PKCE, session identity extractor, ownership gate |
//! | [`cdn`] | `ImageCdn` trait and the Cloudinary client |
//! | [`db`] | Explicit PostgreSQL pool with retrying connect, migrations, [`PgStore`] |
//! | [`error`] | `ApiError` and the JSON extractors that reject with it |
//! | [`github_import`] | Public repositories as project drafts, with a rate-limit check |
//! | [`images`] | Image upload and removal as compensating sagas |
//! | [`routes`] | Route table and handlers |
//! | [`settings`] | Layered configuration |
//! | [`state`] | `AppState` shared by handlers |
//! | [`subdomain`] | Showcase subdomain rewriting middleware |

use std::sync::Arc;

use axum::{middleware, Router};
use store::ShowcaseStore;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod cdn;
pub mod db;
pub mod error;
pub mod github_import;
pub mod images;
pub mod routes;
pub mod settings;
pub mod state;
pub mod subdomain;

pub use db::PgStore;
pub use error::ApiError;
pub use settings::Settings;
pub use state::AppState;
pub use subdomain::SubdomainRouter;

/// The full application, minus the session layer the caller supplies.
pub fn app<S: ShowcaseStore>(state: AppState<S>, subdomains: SubdomainRouter) -> Router {
    with_subdomains(routes::router(state), subdomains).layer(TraceLayer::new_for_http())
}

/// Run subdomain rewriting ahead of `routes`, so rewritten paths are routed normally.
pub fn with_subdomains(routes: Router, subdomains: SubdomainRouter) -> Router {
    Router::new()
        .fallback_service(routes)
        .layer(middleware::from_fn_with_state(
            Arc::new(subdomains),
            subdomain::rewrite_subdomains,
        ))
}
