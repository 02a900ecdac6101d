//! Image hosting behind the [`ImageCdn`] trait, with a Cloudinary client.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::settings::CdnSettings;

const CLOUDINARY_API: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug, Error)]
pub enum CdnError {
    #[error("cdn request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("cdn rejected the request: {0}")]
    Rejected(String),
    #[error("not an asset url: {0}")]
    InvalidUrl(String),
}

/// Stores uploaded images and serves them by URL.
#[async_trait]
pub trait ImageCdn: Send + Sync + 'static {
    /// Upload `bytes` and return the public URL.
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, CdnError>;

    /// Remove the asset served at `url`.
    async fn delete(&self, url: &str) -> Result<(), CdnError>;
}

/// The asset id Cloudinary derives from a delivery URL: the last path
/// segment without its extension.
pub fn public_id(url: &str) -> Option<&str> {
    let segment = url.rsplit('/').next().filter(|s| !s.is_empty())?;
    let id = segment.rsplit_once('.').map_or(segment, |(id, _)| id);
    (!id.is_empty()).then_some(id)
}

/// Cloudinary API signature: sorted `key=value` pairs joined with `&`,
/// followed by the secret, hashed with SHA-1.
pub fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Debug, Clone)]
pub struct Cloudinary {
    cloud_name: String,
    api_key: String,
    api_secret: String,
    http: Client,
}

impl Cloudinary {
    pub fn new(settings: &CdnSettings) -> Self {
        Self {
            cloud_name: settings.cloud_name.clone(),
            api_key: settings.api_key.clone(),
            api_secret: settings.api_secret.clone(),
            http: Client::new(),
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{CLOUDINARY_API}/{}/image/{action}", self.cloud_name)
    }

    fn timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }
}

#[async_trait]
impl ImageCdn for Cloudinary {
    async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<String, CdnError> {
        let timestamp = Self::timestamp();
        let signature = sign(&[("timestamp", timestamp.clone())], &self.api_secret);

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name.to_string()))
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let response = self
            .http
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CdnError::Rejected(format!("{status}: {body}")));
        }
        let uploaded: UploadResponse = response.json().await?;
        Ok(uploaded.secure_url)
    }

    async fn delete(&self, url: &str) -> Result<(), CdnError> {
        let public_id = public_id(url).ok_or_else(|| CdnError::InvalidUrl(url.to_string()))?;
        let timestamp = Self::timestamp();
        let signature = sign(
            &[
                ("public_id", public_id.to_string()),
                ("timestamp", timestamp.clone()),
            ],
            &self.api_secret,
        );

        let form = Form::new()
            .text("public_id", public_id.to_string())
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let destroyed: DestroyResponse = self
            .http
            .post(self.endpoint("destroy"))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(CdnError::Rejected(other.to_string())),
        }
    }
}
