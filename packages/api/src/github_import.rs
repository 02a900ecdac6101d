//! Import a GitHub user's public repositories as project drafts.

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;

pub const GITHUB_API: &str = "https://api.github.com";
const IMPORT_CATEGORY: &str = "GitHub Project";
const PER_PAGE: &str = "100";

#[derive(Debug, Deserialize)]
struct RateLimit {
    rate: Rate,
}

#[derive(Debug, Deserialize)]
struct Rate {
    remaining: u64,
}

#[derive(Debug, Deserialize)]
struct Repository {
    id: i64,
    name: String,
    description: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
    html_url: String,
    stargazers_count: u64,
    forks_count: u64,
    language: Option<String>,
    updated_at: DateTime<Utc>,
}

/// A repository shaped as a project the user can choose to publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoDraft {
    pub title: String,
    pub description: serde_json::Value,
    pub tags: Vec<String>,
    pub category: String,
    pub project_url: String,
    pub github_id: i64,
    pub stargazers_count: u64,
    pub forks_count: u64,
    pub language: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl From<Repository> for RepoDraft {
    fn from(repo: Repository) -> Self {
        let description = repo
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| "No description provided".to_string());
        Self {
            title: repo.name,
            description: json!(description),
            tags: repo.topics,
            category: IMPORT_CATEGORY.to_string(),
            project_url: repo.html_url,
            github_id: repo.id,
            stargazers_count: repo.stargazers_count,
            forks_count: repo.forks_count,
            language: repo.language,
            last_updated: repo.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(api_base: impl Into<String>, token: Option<String>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().user_agent("showcase").build()?;
        Ok(Self {
            http,
            api_base: api_base.into(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self
            .http
            .get(format!("{}{path}", self.api_base))
            .header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Public repositories of `username`, most recently updated first.
    pub async fn repositories(&self, username: &str) -> Result<Vec<RepoDraft>, ApiError> {
        if username.is_empty() || !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ApiError::Validation("invalid GitHub username".into()));
        }

        let limit: RateLimit = self
            .get("/rate_limit")
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(upstream)?
            .json()
            .await
            .map_err(upstream)?;
        if limit.rate.remaining == 0 {
            tracing::warn!(username, "GitHub rate limit exhausted");
            return Err(ApiError::RateLimited);
        }

        let response = self
            .get(&format!("/users/{username}/repos"))
            .query(&[("sort", "updated"), ("per_page", PER_PAGE)])
            .send()
            .await
            .map_err(upstream)?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(ApiError::NotFound("GitHub user")),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                return Err(ApiError::RateLimited)
            }
            status if !status.is_success() => {
                return Err(ApiError::Upstream(format!("GitHub responded {status}")))
            }
            _ => {}
        }

        let repos: Vec<Repository> = response.json().await.map_err(upstream)?;
        tracing::debug!(username, count = repos.len(), "imported GitHub repositories");
        Ok(repos.into_iter().map(RepoDraft::from).collect())
    }
}

fn upstream(err: reqwest::Error) -> ApiError {
    ApiError::Upstream(err.to_string())
}

#[cfg(test)]
mod tests {
    use axum::extract::Path;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::Value;

    use super::*;

    async fn fake_github(remaining: u64) -> String {
        let app = Router::new()
            .route(
                "/rate_limit",
                get(move || async move { Json(json!({ "rate": { "remaining": remaining } })) }),
            )
            .route(
                "/users/{username}/repos",
                get(|Path(username): Path<String>| async move {
                    if username != "octocat" {
                        return Err(axum::http::StatusCode::NOT_FOUND);
                    }
                    Ok(Json(json!([{
                        "id": 1,
                        "name": "hello-world",
                        "description": null,
                        "topics": ["demo"],
                        "html_url": "https://github.com/octocat/hello-world",
                        "stargazers_count": 5,
                        "forks_count": 2,
                        "language": "Rust",
                        "updated_at": "2024-01-01T00:00:00Z"
                    }])))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_repositories_map_to_drafts() {
        let client = GitHubClient::new(fake_github(10).await, None).unwrap();
        let drafts = client.repositories("octocat").await.unwrap();
        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.title, "hello-world");
        assert_eq!(draft.description, Value::from("No description provided"));
        assert_eq!(draft.tags, vec!["demo"]);
        assert_eq!(draft.category, "GitHub Project");
        assert_eq!(draft.stargazers_count, 5);
    }

    #[tokio::test]
    async fn test_exhausted_rate_limit() {
        let client = GitHubClient::new(fake_github(0).await, None).unwrap();
        let err = client.repositories("octocat").await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let client = GitHubClient::new(fake_github(10).await, None).unwrap();
        let err = client.repositories("nobody").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_path_characters() {
        let client = GitHubClient::new("http://127.0.0.1:9", None).unwrap();
        let err = client.repositories("../admin").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
