//! HTTP client for the analysis service.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};

use super::types::{AnalysisResult, AnalyzeReq, ErrorBody, HealthStatus};
use crate::{error::ApiError, submission::SelectedFile};

/// Remote operations the orchestrator and worker depend on.
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Probe `GET /health`.
    async fn health_check(&self) -> Result<HealthStatus, ApiError>;
    /// Send the raw file as multipart to the direct upload endpoint.
    async fn upload_and_analyze(&self, file: &SelectedFile) -> Result<AnalysisResult, ApiError>;
    /// Ask the service to analyze a file already staged in storage.
    async fn analyze_from_storage(
        &self,
        bucket: &str,
        path: &str,
    ) -> Result<AnalysisResult, ApiError>;
    /// Fetch a previously generated report.
    async fn get_report_by_id(&self, report_id: &str) -> Result<AnalysisResult, ApiError>;
}

/// reqwest-backed implementation. No retries and no client-side timeout.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    /// Build a client for `base_url` (trailing slashes are ignored).
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl AnalysisApi for ApiClient {
    async fn health_check(&self) -> Result<HealthStatus, ApiError> {
        let resp = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!("health check failed: {status}");
            return Err(ApiError::ServiceUnavailable(format!(
                "health check returned status {}",
                status.as_u16()
            )));
        }
        resp.json::<HealthStatus>()
            .await
            .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))
    }

    async fn upload_and_analyze(&self, file: &SelectedFile) -> Result<AnalysisResult, ApiError> {
        let part = reqwest::multipart::Part::bytes(file.bytes.clone())
            .file_name(file.name.clone())
            .mime_str("text/csv")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::info!("direct upload: {} ({} bytes)", file.name, file.size);
        let resp = self
            .http
            .post(self.url("/api/v1/upload"))
            .multipart(form)
            .send()
            .await?;
        read_result(resp, "Upload failed").await
    }

    async fn analyze_from_storage(
        &self,
        bucket: &str,
        path: &str,
    ) -> Result<AnalysisResult, ApiError> {
        tracing::info!("analyze from storage: {bucket}/{path}");
        let resp = self
            .http
            .post(self.url("/api/v1/analyze-supabase"))
            .json(&AnalyzeReq { bucket, path })
            .send()
            .await?;
        read_result(resp, "Analysis failed").await
    }

    async fn get_report_by_id(&self, report_id: &str) -> Result<AnalysisResult, ApiError> {
        let url = self.url(&format!(
            "/api/v1/reports/{}",
            urlencoding::encode(report_id)
        ));
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            tracing::warn!("fetch report {report_id} failed: {status}");
            return Err(ApiError::RequestFailed {
                status: status.as_u16(),
                message: format!("Failed to fetch report: {}", status.as_u16()),
            });
        }
        decode_result(resp).await
    }
}

/// Turn a response into a report, or a `RequestFailed` with the best message available.
async fn read_result(resp: Response, fallback: &str) -> Result<AnalysisResult, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return decode_result(resp).await;
    }
    // An unreadable body is treated like an unparseable one.
    let body = resp.text().await.unwrap_or_default();
    let message = error_message(status, &body, fallback);
    tracing::warn!("analysis request failed: {status}: {message}");
    Err(ApiError::RequestFailed {
        status: status.as_u16(),
        message,
    })
}

async fn decode_result(resp: Response) -> Result<AnalysisResult, ApiError> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

/// `detail` from a structured error body, else `"<fallback> with status <code>"`.
pub(crate) fn error_message(status: StatusCode, body: &str, fallback: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail)
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("{fallback} with status {}", status.as_u16()))
}
