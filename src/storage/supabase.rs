//! Supabase Storage API helpers.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header::CONTENT_TYPE};
use serde::Deserialize;

use super::{ObjectStorage, UploadOptions};
use crate::{config::StorageCfg, error::StorageError, submission::StorageKey};

/// Error body returned by the storage service.
#[derive(Debug, Deserialize)]
struct StorageErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Writes objects through `POST {url}/storage/v1/object/{bucket}/{key}`.
#[derive(Clone)]
pub struct SupabaseStorage {
    http: Client,
    url: String,
    service_key: String,
}

impl SupabaseStorage {
    /// Build from config. Missing values surface as `NotConfigured` on upload.
    pub fn new(http: Client, cfg: &StorageCfg) -> Self {
        Self {
            http,
            url: cfg.url.trim_end_matches('/').to_string(),
            service_key: cfg.service_key.clone(),
        }
    }

    fn object_url(&self, bucket: &str, key: &StorageKey) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.url,
            urlencoding::encode(bucket),
            urlencoding::encode(key.as_str())
        )
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &StorageKey,
        bytes: &[u8],
        opts: &UploadOptions,
    ) -> Result<(), StorageError> {
        if self.url.is_empty() || self.service_key.is_empty() || bucket.is_empty() {
            return Err(StorageError::NotConfigured);
        }

        tracing::info!("storage upload: {bucket}/{key} ({} bytes)", bytes.len());
        let resp = self
            .http
            .post(self.object_url(bucket, key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("x-upsert", if opts.overwrite { "true" } else { "false" })
            .header(CONTENT_TYPE, opts.content_type.as_str())
            .body(bytes.to_vec())
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        let message = rejection_message(status, &body);
        tracing::error!("storage upload rejected: {status}: {message}");
        Err(StorageError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

/// `message`, then `error`, then a status-derived fallback.
fn rejection_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<StorageErrorBody>(body)
        .ok()
        .and_then(|b| b.message.or(b.error))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("storage upload failed with status {}", status.as_u16()))
}
