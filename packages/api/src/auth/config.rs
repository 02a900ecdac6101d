//! OAuth client configuration.

use oauth2::url::ParseError;
use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, TokenUrl};

use crate::settings::GitHubSettings;

const GITHUB_AUTH_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";

/// OAuth provider configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: ClientId,
    pub client_secret: ClientSecret,
    pub auth_url: AuthUrl,
    pub token_url: TokenUrl,
    pub redirect_url: RedirectUrl,
}

impl OAuthConfig {
    pub fn github(settings: &GitHubSettings) -> Result<Self, ParseError> {
        Ok(Self {
            client_id: ClientId::new(settings.client_id.clone()),
            client_secret: ClientSecret::new(settings.client_secret.clone()),
            auth_url: AuthUrl::new(GITHUB_AUTH_URL.to_string())?,
            token_url: TokenUrl::new(GITHUB_TOKEN_URL.to_string())?,
            redirect_url: RedirectUrl::new(settings.redirect_url.clone())?,
        })
    }
}
