//! Authentication and authorization.
//!
//! - [`GitHubOAuth`] runs the authorization-code flow with PKCE and turns a
//!   GitHub account into a [`store::GitHubProfile`].
//! - [`Identity`] is the axum extractor that resolves the signed-in user from
//!   the session; `Option<Identity>` makes authentication optional.
//! - [`ensure_owner`] is the ownership gate for mutating routes.

mod config;
mod github;
mod ownership;
mod session;

pub use config::OAuthConfig;
pub use github::{AuthError, GitHubOAuth};
pub use ownership::{ensure_owner, Owned};
pub use session::{Identity, PendingLogin, OAUTH_PENDING_KEY, SESSION_USER_ID_KEY};
