//! Analysis service client.

/// reqwest client and the `AnalysisApi` seam.
pub mod client;
/// Request/response payloads.
pub mod types;

pub use client::{AnalysisApi, ApiClient};
pub use types::{AnalysisResult, ChartSpec, HealthStatus};
