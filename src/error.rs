//! Error taxonomy shared by the clients and the upload orchestrator.

use thiserror::Error;

/// Terminal failure of one submission. Surfaced to the user as-is.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The selected file does not carry a `.csv` extension.
    #[error("Invalid file type: {filename} is not a .csv file")]
    InvalidFileType { filename: String },
    /// Writing the file into object storage failed.
    #[error("Storage upload failed: {0}")]
    StorageError(String),
    /// The remote analysis call failed.
    #[error("{message}")]
    AnalysisError { message: String },
    /// The health probe did not get a success response.
    #[error("Analysis service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Failures of the analysis HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Health probe failed (non-2xx or no response).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Non-2xx response; `message` is already human readable.
    #[error("{message}")]
    RequestFailed { status: u16, message: String },
    /// No response at all (connect/IO failure).
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    /// 2xx response whose body is not a report payload.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// Failures of the object storage client.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage URL or service key missing from the config/environment.
    #[error("storage is not configured (set storage.url and SUPABASE_SERVICE_ROLE_KEY)")]
    NotConfigured,
    /// The storage service answered with a non-2xx status.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    /// No response at all.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl From<ApiError> for SubmitError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::ServiceUnavailable(msg) => SubmitError::ServiceUnavailable(msg),
            other => SubmitError::AnalysisError {
                message: other.to_string(),
            },
        }
    }
}

impl From<StorageError> for SubmitError {
    fn from(e: StorageError) -> Self {
        SubmitError::StorageError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_failed_keeps_message_verbatim() {
        let e: SubmitError = ApiError::RequestFailed {
            status: 400,
            message: "CSV has no header row".into(),
        }
        .into();
        assert_eq!(
            e,
            SubmitError::AnalysisError {
                message: "CSV has no header row".into()
            }
        );
        assert_eq!(e.to_string(), "CSV has no header row");
    }

    #[test]
    fn test_storage_rejection_maps_to_storage_error() {
        let e: SubmitError = StorageError::Rejected {
            status: 409,
            message: "The resource already exists".into(),
        }
        .into();
        assert_eq!(
            e,
            SubmitError::StorageError("The resource already exists".into())
        );
    }
}
