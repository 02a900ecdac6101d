use std::sync::{Arc, Mutex};

use api::auth::{GitHubOAuth, OAuthConfig, SESSION_USER_ID_KEY};
use api::cdn::{CdnError, ImageCdn};
use api::github_import::GitHubClient;
use api::{AppState, Settings, SubdomainRouter};
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::Path;
use axum::http::header::{CONTENT_TYPE, COOKIE, HOST, SET_COOKIE};
use axum::http::{Method, Request, StatusCode};
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use store::{MemoryStore, NewUser, ShowcaseStore, User};
use tower::ServiceExt;
use tower_sessions::{Session, SessionManagerLayer};
use uuid::Uuid;

#[derive(Clone, Default)]
struct FakeCdn {
    assets: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ImageCdn for FakeCdn {
    async fn upload(&self, file_name: &str, _bytes: Vec<u8>) -> Result<String, CdnError> {
        let url = format!("https://cdn.test/{}/{file_name}", Uuid::new_v4());
        self.assets.lock().unwrap().push(url.clone());
        Ok(url)
    }

    async fn delete(&self, url: &str) -> Result<(), CdnError> {
        self.assets.lock().unwrap().retain(|a| a != url);
        Ok(())
    }
}

struct TestApp {
    router: Router,
    store: MemoryStore,
    cdn: FakeCdn,
}

async fn sign_in(session: Session, Path(id): Path<Uuid>) -> StatusCode {
    session.insert(SESSION_USER_ID_KEY, id).await.unwrap();
    StatusCode::NO_CONTENT
}

fn test_app() -> TestApp {
    let settings = Settings::from_toml("").unwrap();
    let store = MemoryStore::new();
    let cdn = FakeCdn::default();
    let oauth = GitHubOAuth::new(OAuthConfig::github(&settings.github).unwrap()).unwrap();
    let github = GitHubClient::new("http://127.0.0.1:9", None).unwrap();
    let state = AppState::new(store.clone(), Arc::new(cdn.clone()), github, oauth);

    let routes = api::routes::router(state).merge(Router::new().route("/test/login/{id}", post(sign_in)));
    let subdomains = SubdomainRouter::new(
        &settings.routing.base_domain,
        settings.routing.dev_hosts.clone(),
    )
    .unwrap();
    let router = api::with_subdomains(routes, subdomains)
        .layer(SessionManagerLayer::new(tower_sessions::MemoryStore::default()));

    TestApp { router, store, cdn }
}

impl TestApp {
    async fn user(&self, username: &str) -> User {
        self.store
            .create_user(NewUser {
                name: username.to_uppercase(),
                email: format!("{username}@example.com"),
                username: username.into(),
                avatar_url: None,
            })
            .await
            .unwrap()
    }

    /// Session cookie for `user`.
    async fn login(&self, user: &User) -> String {
        let request = Request::post(format!("/test/login/{}", user.id))
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        cookie.split(';').next().unwrap().to_string()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn create_project(&self, cookie: &str, title: &str) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/projects",
                Some(cookie),
                Some(json!({ "title": title, "description": "Bar" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"].clone()
    }
}

#[tokio::test]
async fn test_created_project_appears_on_profile() {
    let app = test_app();
    let bob = app.user("bob").await;
    let cookie = app.login(&bob).await;

    let project = app.create_project(&cookie, "Foo").await;
    assert_eq!(project["title"], "Foo");
    assert_eq!(project["description"], "Bar");
    assert_eq!(project["createdBy"], bob.id.to_string());
    assert_eq!(project["likesCount"], 0);

    let (status, body) = app.call(Method::GET, "/api/users/bob", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body["data"]["projects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Foo"]);
    assert!(body["data"].get("email").is_none());
    assert!(body["data"].get("likedProjects").is_none());

    let (_, own) = app.call(Method::GET, "/api/users/BOB", Some(&cookie), None).await;
    assert_eq!(own["data"]["email"], "bob@example.com");
    assert_eq!(own["data"]["likedProjects"], json!([]));
}

#[tokio::test]
async fn test_creator_comes_from_session() {
    let app = test_app();
    let bob = app.user("bob").await;
    let cookie = app.login(&bob).await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/projects",
            Some(&cookie),
            Some(json!({ "title": "T", "description": "D", "tags": ["x"], "createdBy": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, fetched) = app.call(Method::GET, &format!("/api/projects/{id}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["data"]["title"], "T");
    assert_eq!(fetched["data"]["description"], "D");
    assert_eq!(fetched["data"]["tags"], json!(["x"]));
    assert_eq!(fetched["data"]["createdBy"], bob.id.to_string());
    assert_eq!(fetched["data"]["creator"]["username"], "bob");
}

#[tokio::test]
async fn test_batch_create() {
    let app = test_app();
    let bob = app.user("bob").await;
    let cookie = app.login(&bob).await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/projects",
            Some(&cookie),
            Some(json!({ "projects": [
                { "title": "A", "description": "a" },
                { "title": "B", "description": "b" }
            ]})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, _) = app
        .call(
            Method::POST,
            "/api/projects",
            Some(&cookie),
            Some(json!({ "projects": [
                { "title": "C", "description": "c" },
                { "title": "", "description": "d" }
            ]})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.projects_by_owner(bob.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_mutations_require_a_session() {
    let app = test_app();
    let bob = app.user("bob").await;
    let cookie = app.login(&bob).await;
    let project = app.create_project(&cookie, "Foo").await;
    let id = project["id"].as_str().unwrap();

    let (status, body) = app
        .call(Method::POST, "/api/projects", None, Some(json!({ "title": "T", "description": "D" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "authentication required");

    let uri = format!("/api/projects/{id}");
    let (status, _) = app.call(Method::PUT, &uri, None, Some(json!({ "title": "X" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.call(Method::DELETE, &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.call(Method::PATCH, &uri, None, Some(json!({ "action": "like" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Authentication is checked before existence.
    let missing = format!("/api/projects/{}", Uuid::new_v4());
    let (status, _) = app.call(Method::DELETE, &missing, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_owner_is_forbidden() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let alice_cookie = app.login(&alice).await;
    let bob_cookie = app.login(&bob).await;
    let project = app.create_project(&alice_cookie, "Mine").await;
    let uri = format!("/api/projects/{}", project["id"].as_str().unwrap());

    let (status, _) = app
        .call(Method::PUT, &uri, Some(&bob_cookie), Some(json!({ "title": "Stolen" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(Method::DELETE, &uri, Some(&bob_cookie), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/users/{}", alice.id),
            Some(&bob_cookie),
            Some(json!({ "bio": "hi" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .call(Method::PUT, &uri, Some(&alice_cookie), Some(json!({ "title": "Renamed" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Renamed");
    assert_eq!(body["data"]["description"], "Bar");
}

#[tokio::test]
async fn test_missing_resources_are_not_found() {
    let app = test_app();
    let bob = app.user("bob").await;
    let cookie = app.login(&bob).await;

    let (status, body) = app
        .call(Method::GET, &format!("/api/projects/{}", Uuid::new_v4()), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "project not found");

    let (status, _) = app.call(Method::GET, "/api/projects/not-a-uuid", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .call(
            Method::PUT,
            &format!("/api/projects/{}", Uuid::new_v4()),
            Some(&cookie),
            Some(json!({ "title": "X" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.call(Method::GET, "/api/users/ghost", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unsupported_methods() {
    let app = test_app();
    let (status, _) = app.call(Method::POST, "/api/leaderboard", None, None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let (status, _) = app
        .call(Method::PATCH, &format!("/api/users/{}", Uuid::new_v4()), None, None)
        .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_like_is_idempotent_and_reversible() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let alice_cookie = app.login(&alice).await;
    let bob_cookie = app.login(&bob).await;
    let project = app.create_project(&alice_cookie, "Foo").await;
    let uri = format!("/api/projects/{}", project["id"].as_str().unwrap());

    for _ in 0..2 {
        let (status, body) = app
            .call(Method::PATCH, &uri, Some(&bob_cookie), Some(json!({ "action": "like" })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["likesCount"], 1);
        assert_eq!(body["data"]["likes"], json!([bob.id]));
    }

    let (_, body) = app
        .call(Method::PATCH, &uri, Some(&bob_cookie), Some(json!({ "action": "unlike" })))
        .await;
    assert_eq!(body["data"]["likesCount"], 0);
    assert_eq!(body["data"]["likes"], json!([]));

    let (status, _) = app
        .call(Method::PATCH, &uri, Some(&bob_cookie), Some(json!({ "action": "love" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_listing_clamps_page_size() {
    let app = test_app();
    let bob = app.user("bob").await;
    let cookie = app.login(&bob).await;
    for i in 0..3 {
        app.create_project(&cookie, &format!("P{i}")).await;
    }

    let (status, body) = app
        .call(Method::GET, "/api/projects?pageSize=1000&page=0", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["pageSize"], 100);
    assert_eq!(body["pagination"]["currentPage"], 1);
    assert_eq!(body["pagination"]["totalItems"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (_, body) = app
        .call(Method::GET, "/api/projects?pageSize=2&page=2&sortBy=title&sortOrder=asc", None, None)
        .await;
    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["data"][0]["title"], "P2");

    let (status, _) = app.call(Method::GET, "/api/projects?sortBy=secret", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_far_page_is_empty_not_an_error() {
    let app = test_app();
    let bob = app.user("bob").await;
    let cookie = app.login(&bob).await;
    app.create_project(&cookie, "Only").await;

    let (status, body) = app
        .call(
            Method::GET,
            "/api/projects?page=9223372036854775807&pageSize=100",
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["pagination"]["currentPage"], store::query::MAX_PAGE);
    assert_eq!(body["pagination"]["totalItems"], 1);
}

#[tokio::test]
async fn test_leaderboard_orders_by_likes() {
    let app = test_app();
    let alice = app.user("alice").await;
    let bob = app.user("bob").await;
    let alice_cookie = app.login(&alice).await;
    let bob_cookie = app.login(&bob).await;

    app.create_project(&alice_cookie, "Quiet").await;
    let popular = app.create_project(&alice_cookie, "Popular").await;
    for cookie in [&alice_cookie, &bob_cookie] {
        let uri = format!("/api/projects/{}", popular["id"].as_str().unwrap());
        app.call(Method::PATCH, &uri, Some(cookie), Some(json!({ "action": "like" })))
            .await;
    }

    let (status, body) = app.call(Method::GET, "/api/leaderboard", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let board = body["data"].as_array().unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0]["title"], "Popular");
    assert_eq!(board[0]["likesCount"], 2);
    assert_eq!(board[1]["title"], "Quiet");
}

#[tokio::test]
async fn test_subdomain_showcase() {
    let app = test_app();
    let alice = app.user("alice").await;
    let cookie = app.login(&alice).await;
    app.create_project(&cookie, "Foo Bar").await;

    let on_host = |host: &str, path: &str| {
        Request::get(path).header(HOST, host).body(Body::empty()).unwrap()
    };

    let (status, body) = app.send(on_host("alice.sprojects.live", "/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert!(body.get("email").is_none());
    assert_eq!(body["projects"][0]["title"], "Foo Bar");

    let (status, body) = app.send(on_host("alice.sprojects.live", "/Foo%20Bar")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["project"]["title"], "Foo Bar");
    assert_eq!(body["user"]["username"], "alice");

    let (status, body) = app.send(on_host("alice.sprojects.live", "/Nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "project not found");
    let (status, body) = app.send(on_host("carol.sprojects.live", "/Nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "user not found");
    let (status, _) = app.send(on_host("carol.sprojects.live", "/")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.send(on_host("alice.sprojects.live", "/a/b")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.send(on_host("alice.sprojects.live", "/api/leaderboard")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(on_host("www.sprojects.live", "/api/leaderboard")).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.send(on_host("localhost:8080", "/subdomains/alice")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_showcase_for_user_named_like_a_dev_host() {
    let app = test_app();
    let fan = app.user("localhost-fan").await;
    let cookie = app.login(&fan).await;
    app.create_project(&cookie, "Demo").await;

    let request = Request::get("/")
        .header(HOST, "localhost-fan.sprojects.live")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "localhost-fan");
    assert_eq!(body["projects"][0]["title"], "Demo");
}

#[tokio::test]
async fn test_image_upload_and_removal() {
    let app = test_app();
    let alice = app.user("alice").await;
    let cookie = app.login(&alice).await;
    let project = app.create_project(&cookie, "Foo").await;
    let uri = format!("/api/projects/{}/images", project["id"].as_str().unwrap());

    let multipart = "--BOUNDARY\r\n\
        Content-Disposition: form-data; name=\"image\"; filename=\"shot.png\"\r\n\
        Content-Type: image/png\r\n\r\n\
        PNGDATA\r\n\
        --BOUNDARY--\r\n";
    let request = Request::post(&uri)
        .header(COOKIE, &cookie)
        .header(CONTENT_TYPE, "multipart/form-data; boundary=BOUNDARY")
        .body(Body::from(multipart))
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    let images = body["data"]["images"].as_array().unwrap().clone();
    assert_eq!(images.len(), 1);
    let url = images[0].as_str().unwrap().to_string();
    assert!(url.ends_with("/shot.png"));
    assert_eq!(app.cdn.assets.lock().unwrap().len(), 1);

    let (status, body) = app
        .call(Method::DELETE, &uri, Some(&cookie), Some(json!({ "imageUrl": url })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["images"], json!([]));
    assert!(app.cdn.assets.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_registration_conflicts_and_validation() {
    let app = test_app();
    let body = json!({ "name": "Bob", "email": "bob@example.com", "username": "bob" });

    let (status, created) = app.call(Method::POST, "/api/users", None, Some(body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["data"]["username"], "bob");

    let (status, _) = app.call(Method::POST, "/api/users", None, Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .call(Method::POST, "/api/users", None, Some(json!({ "name": "NoEmail", "username": "x" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "email is required");
}

#[tokio::test]
async fn test_search_and_me() {
    let app = test_app();
    let alice = app.user("alice").await;
    app.user("malice").await;
    app.user("bob").await;

    let (status, body) = app.call(Method::GET, "/api/users/search?query=ALI", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, me) = app.call(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(me, Value::Null);
    let cookie = app.login(&alice).await;
    let (_, me) = app.call(Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(me["username"], "alice");
}

#[tokio::test]
async fn test_account_deletion_cascades() {
    let app = test_app();
    let alice = app.user("alice").await;
    let cookie = app.login(&alice).await;
    let project = app.create_project(&cookie, "Foo").await;

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/users/{}", alice.id), Some(&cookie), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");

    let (_, me) = app.call(Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(me, Value::Null);

    let (status, _) = app
        .call(Method::GET, &format!("/api/projects/{}", project["id"].as_str().unwrap()), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call(Method::GET, "/api/users/alice", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_project_deletion_returns_the_project() {
    let app = test_app();
    let alice = app.user("alice").await;
    let cookie = app.login(&alice).await;
    let project = app.create_project(&cookie, "Foo").await;
    let uri = format!("/api/projects/{}", project["id"].as_str().unwrap());

    let (status, body) = app.call(Method::DELETE, &uri, Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], project["id"]);
    assert_eq!(body["data"]["title"], "Foo");
    assert_eq!(body["data"]["creator"]["username"], "alice");

    let (status, _) = app.call(Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.call(Method::DELETE, &uri, Some(&cookie), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
