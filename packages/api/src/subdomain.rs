//! Host-based rewriting of per-user showcase subdomains.
//!
//! `alice.<base-domain>/` is served by `/subdomains/alice` and
//! `alice.<base-domain>/<title>` by `/subdomains/alice/projects/<title>`.
//! Anything deeper on a user subdomain is a 404. Development hosts, the bare
//! domain, `www`, and the API/auth/asset prefixes pass through untouched.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::HOST;
use axum::http::uri::PathAndQuery;
use axum::http::{StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use regex::Regex;

use crate::error::ApiError;

/// Path prefixes that always reach the normal routes, even on a user subdomain.
const RESERVED_PREFIXES: &[&str] = &["/api/", "/auth/", "/_next/"];
const RESERVED_PATHS: &[&str] = &["/favicon.ico"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routing {
    PassThrough,
    Rewrite(String),
    NotFound,
}

#[derive(Debug, Clone)]
pub struct SubdomainRouter {
    pattern: Regex,
    dev_hosts: Vec<String>,
}

impl SubdomainRouter {
    pub fn new(base_domain: &str, dev_hosts: Vec<String>) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"^([a-zA-Z0-9-]+)\.{}$",
            regex::escape(base_domain)
        ))?;
        Ok(Self { pattern, dev_hosts })
    }

    /// The user label of `host`, if it is `<label>.<base-domain>`.
    pub fn subdomain<'h>(&self, host: &'h str) -> Option<&'h str> {
        self.pattern
            .captures(host)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Decide what to do with a request for `host` and `path`.
    pub fn route(&self, host: &str, path: &str) -> Routing {
        let bare = strip_port(host);
        if self.dev_hosts.iter().any(|dev| dev.eq_ignore_ascii_case(bare)) {
            return Routing::PassThrough;
        }
        let Some(label) = self.subdomain(host) else {
            return Routing::PassThrough;
        };
        if label == "www" {
            return Routing::PassThrough;
        }
        if RESERVED_PATHS.contains(&path) || RESERVED_PREFIXES.iter().any(|p| path.starts_with(p)) {
            return Routing::PassThrough;
        }

        if path == "/" {
            return Routing::Rewrite(format!("/subdomains/{label}"));
        }
        match path.strip_prefix('/') {
            Some(segment) if !segment.is_empty() && !segment.contains('/') => {
                Routing::Rewrite(format!("/subdomains/{label}/projects/{segment}"))
            }
            _ => Routing::NotFound,
        }
    }
}

/// `host` without a trailing `:port`.
fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

fn request_host(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().host())
}

/// Middleware applying [`SubdomainRouter::route`] before the routes see the request.
pub async fn rewrite_subdomains(
    State(router): State<Arc<SubdomainRouter>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(host) = request_host(&request).map(str::to_owned) else {
        return next.run(request).await;
    };
    let host = host.as_str();

    match router.route(host, request.uri().path()) {
        Routing::PassThrough => next.run(request).await,
        Routing::NotFound => {
            tracing::debug!(host, path = request.uri().path(), "no showcase route");
            ApiError::NotFound("page").into_response()
        }
        Routing::Rewrite(path) => {
            tracing::debug!(host, from = request.uri().path(), to = %path, "showcase rewrite");
            match rewritten_uri(request.uri(), &path) {
                Ok(uri) => {
                    *request.uri_mut() = uri;
                    next.run(request).await
                }
                Err(err) => {
                    tracing::debug!(error = %err, "rewritten path is not a valid uri");
                    StatusCode::BAD_REQUEST.into_response()
                }
            }
        }
    }
}

/// `uri` with its path replaced by `path`, keeping the query string.
fn rewritten_uri(uri: &Uri, path: &str) -> Result<Uri, axum::http::Error> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
    Ok(Uri::from_parts(parts)?)
}
