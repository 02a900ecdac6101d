//! Showcase server: PostgreSQL-backed API behind subdomain routing.

use std::sync::Arc;

use anyhow::Context;
use api::auth::{GitHubOAuth, OAuthConfig};
use api::cdn::Cloudinary;
use api::github_import::{GitHubClient, GITHUB_API};
use api::{db, AppState, PgStore, Settings, SubdomainRouter};
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_sessions::cookie::time::Duration;
use tower_sessions::cookie::{Key, SameSite};
use tower_sessions::session_store::ExpiredDeletion;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const EXPIRED_SESSION_SWEEP: std::time::Duration = std::time::Duration::from_secs(60 * 10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let pool = db::connect(&settings.database)
        .await
        .context("connecting to database")?;
    db::migrate(&pool).await.context("running migrations")?;

    let session_store = PostgresStore::new(pool.clone());
    session_store
        .migrate()
        .await
        .context("creating session table")?;
    let sweeper = tokio::spawn(
        session_store
            .clone()
            .continuously_delete_expired(EXPIRED_SESSION_SWEEP),
    );

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(settings.session.secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::days(
            settings.session.inactivity_days,
        )))
        .with_signed(signing_key(settings.session.secret.as_deref())?);

    let oauth = GitHubOAuth::new(OAuthConfig::github(&settings.github)?)?;
    let github = GitHubClient::new(GITHUB_API, settings.github.api_token.clone())?;
    let cdn = Arc::new(Cloudinary::new(&settings.cdn));
    let state = AppState::new(PgStore::new(pool), cdn, github, oauth);

    let subdomains = SubdomainRouter::new(
        &settings.routing.base_domain,
        settings.routing.dev_hosts.clone(),
    )?;
    let app = api::app(state, subdomains).layer(session_layer);

    let listener = TcpListener::bind(settings.server.address)
        .await
        .with_context(|| format!("binding {}", settings.server.address))?;
    info!(
        address = %settings.server.address,
        base_domain = %settings.routing.base_domain,
        "showcase listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("server stopped");
    Ok(())
}

fn signing_key(secret: Option<&str>) -> anyhow::Result<Key> {
    match secret.filter(|s| !s.is_empty()) {
        Some(secret) => Key::try_from(secret.as_bytes())
            .context("session secret must be at least 64 bytes"),
        None => {
            warn!("no session secret configured, sessions will not survive a restart");
            Ok(Key::generate())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = ctrl_c().await {
            warn!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(error) => {
                warn!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
