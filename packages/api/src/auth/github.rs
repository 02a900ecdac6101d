//! # GitHub OAuth 2.0 implementation
//!
//! Implements the GitHub Authorization Code flow with PKCE.
//!
//! ## Flow
//!
//! 1. **[`authorize`](GitHubOAuth::authorize)** builds an authorization URL
//!    requesting the `read:user` and `user:email` scopes with a random PKCE
//!    challenge. The CSRF state and verifier come back as a [`PendingLogin`],
//!    which the caller keeps in the session until the callback.
//!
//! 2. **[`exchange_code`](GitHubOAuth::exchange_code)** checks the returned
//!    state against the pending login, exchanges the code plus verifier for an
//!    access token, and fetches the account from `api.github.com/user`. If the
//!    profile has no public email it falls back to `/user/emails` and picks the
//!    primary verified address. The result is a [`GitHubProfile`] ready to be
//!    upserted by email.

use oauth2::basic::BasicClient;
use oauth2::{
    AuthorizationCode, CsrfToken, EndpointNotSet, EndpointSet, PkceCodeChallenge,
    PkceCodeVerifier, Scope, TokenResponse,
};
use reqwest::Client;
use serde::Deserialize;
use store::GitHubProfile;
use thiserror::Error;

use super::config::OAuthConfig;
use super::session::PendingLogin;

const GITHUB_API: &str = "https://api.github.com";
const USER_AGENT: &str = "showcase";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("OAuth state mismatch")]
    StateMismatch,
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    #[error("GitHub API request failed: {0}")]
    Api(#[from] reqwest::Error),
    #[error("no verified primary email on the GitHub account")]
    NoVerifiedEmail,
}

impl AuthError {
    /// Short reason placed in the `?error=` redirect.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::StateMismatch => "invalid_state",
            Self::TokenExchange(_) => "oauth_error",
            Self::Api(_) => "github_unavailable",
            Self::NoVerifiedEmail => "no_email",
        }
    }
}

/// GitHub user info from API.
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    email: Option<String>,
    name: Option<String>,
    avatar_url: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    blog: Option<String>,
    html_url: Option<String>,
}

/// GitHub email info from API.
#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

/// OAuth client type with auth URL and token URL set.
type ConfiguredClient = oauth2::Client<
    oauth2::basic::BasicErrorResponse,
    oauth2::basic::BasicTokenResponse,
    oauth2::basic::BasicTokenIntrospectionResponse,
    oauth2::StandardRevocableToken,
    oauth2::basic::BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;

/// GitHub OAuth handler.
#[derive(Debug, Clone)]
pub struct GitHubOAuth {
    config: OAuthConfig,
    http: Client,
}

impl GitHubOAuth {
    pub fn new(config: OAuthConfig) -> Result<Self, reqwest::Error> {
        // The token endpoint must not be followed through redirects.
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { config, http })
    }

    fn create_client(&self) -> ConfiguredClient {
        BasicClient::new(self.config.client_id.clone())
            .set_client_secret(self.config.client_secret.clone())
            .set_auth_uri(self.config.auth_url.clone())
            .set_token_uri(self.config.token_url.clone())
            .set_redirect_uri(self.config.redirect_url.clone())
    }

    /// Authorization URL with PKCE, plus the state to keep until the callback.
    pub fn authorize(&self) -> (String, PendingLogin) {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let (auth_url, csrf_state) = self
            .create_client()
            .authorize_url(CsrfToken::new_random)
            .add_scope(Scope::new("read:user".to_string()))
            .add_scope(Scope::new("user:email".to_string()))
            .set_pkce_challenge(pkce_challenge)
            .url();

        let pending = PendingLogin {
            state: csrf_state.secret().clone(),
            verifier: pkce_verifier.secret().clone(),
        };
        (auth_url.to_string(), pending)
    }

    /// Exchange authorization code for a token and fetch the account.
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        pending: PendingLogin,
    ) -> Result<GitHubProfile, AuthError> {
        if state != pending.state {
            return Err(AuthError::StateMismatch);
        }

        let token_result = self
            .create_client()
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pending.verifier))
            .request_async(&self.http)
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        let access_token = token_result.access_token().secret();

        let github_user: GitHubUser = self
            .http
            .get(format!("{GITHUB_API}/user"))
            .bearer_auth(access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let email = match &github_user.email {
            Some(email) => email.clone(),
            None => {
                let emails: Vec<GitHubEmail> = self
                    .http
                    .get(format!("{GITHUB_API}/user/emails"))
                    .bearer_auth(access_token)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;

                emails
                    .into_iter()
                    .find(|e| e.primary && e.verified)
                    .map(|e| e.email)
                    .ok_or(AuthError::NoVerifiedEmail)?
            }
        };

        Ok(profile_from(github_user, email))
    }
}

/// Map a GitHub account onto the fields kept for a user.
fn profile_from(user: GitHubUser, email: String) -> GitHubProfile {
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    GitHubProfile {
        github_id: user.id.to_string(),
        name: non_empty(user.name).unwrap_or_else(|| user.login.clone()),
        email,
        username: user.login,
        avatar_url: user.avatar_url,
        bio: non_empty(user.bio),
        location: non_empty(user.location),
        website: non_empty(user.blog),
        github_link: user.html_url,
    }
}
