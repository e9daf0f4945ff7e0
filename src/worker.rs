//! Background worker owning the API clients and the upload orchestrator.

use std::sync::Arc;

use reqwest::Client;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    analysis::{AnalysisApi, AnalysisResult, ApiClient, HealthStatus},
    config::Config,
    error::SubmitError,
    orchestrator::{Orchestrator, OrchestratorSettings},
    storage::{ObjectStorage, SupabaseStorage},
    submission::{ProgressSnapshot, SelectedFile, SubmissionState},
};

/// Commands sent from the UI to the worker.
#[derive(Debug)]
pub enum WorkerCmd {
    /// Stage the file into storage, then analyze it.
    Submit(SelectedFile),
    /// Send the file straight to the direct upload endpoint.
    SubmitDirect(SelectedFile),
    /// Probe the analysis service.
    CheckHealth,
    /// Re-fetch a stored report by id.
    LoadReport(String),
    /// Apply updated settings (clients are rebuilt).
    SaveSettings(Config),
}

/// Events emitted by the worker for UI updates.
#[derive(Clone, Debug)]
pub enum WorkerEvent {
    /// Submission state changed.
    State {
        submission_id: Uuid,
        state: SubmissionState,
    },
    /// Cosmetic progress moved.
    Progress {
        submission_id: Uuid,
        snapshot: ProgressSnapshot,
    },
    /// A report is ready for display (`None` id for reports loaded by id).
    ReportReady {
        submission_id: Option<Uuid>,
        result: Box<AnalysisResult>,
    },
    /// A submission failed; `message` is shown to the user.
    Failed { submission_id: Uuid, message: String },
    /// Health probe outcome.
    Health(Result<HealthStatus, SubmitError>),
    /// Informational log message.
    Log(String),
    /// User-visible error message.
    Error(String),
}

/// Worker state: the clients plus the orchestrator using them.
pub struct Worker {
    api: Arc<dyn AnalysisApi>,
    orchestrator: Orchestrator,
    tx: mpsc::Sender<WorkerEvent>,
}

impl Worker {
    /// Build a worker around explicit clients.
    pub fn new(
        api: Arc<dyn AnalysisApi>,
        storage: Arc<dyn ObjectStorage>,
        settings: OrchestratorSettings,
        tx: mpsc::Sender<WorkerEvent>,
    ) -> Self {
        let orchestrator = Orchestrator::new(storage, api.clone(), settings, tx.clone());
        Self {
            api,
            orchestrator,
            tx,
        }
    }

    /// Build the reqwest-backed clients from config.
    pub fn from_config(http: &Client, cfg: &Config, tx: mpsc::Sender<WorkerEvent>) -> Self {
        let api = Arc::new(ApiClient::new(http.clone(), &cfg.api.base_url));
        let storage = Arc::new(SupabaseStorage::new(http.clone(), &cfg.storage));
        if !cfg.storage_configured() {
            tracing::warn!("storage not configured; staged submissions will fail");
        }
        Self::new(api, storage, OrchestratorSettings::from(cfg), tx)
    }

    /// Handle one command to completion.
    pub async fn handle(&mut self, cmd: WorkerCmd) {
        match cmd {
            WorkerCmd::Submit(file) => {
                // Outcome is reported through events.
                let _ = self.orchestrator.submit(file).await;
            }

            WorkerCmd::SubmitDirect(file) => {
                let _ = self.orchestrator.submit_direct(file).await;
            }

            WorkerCmd::CheckHealth => {
                tracing::info!("health check");
                let res = self.api.health_check().await.map_err(SubmitError::from);
                if let Err(ref e) = res {
                    tracing::warn!("health check failed: {e}");
                }
                let _ = self.tx.send(WorkerEvent::Health(res)).await;
            }

            WorkerCmd::LoadReport(report_id) => {
                tracing::info!("load report: {report_id}");
                match self.api.get_report_by_id(&report_id).await {
                    Ok(result) => {
                        let _ = self
                            .tx
                            .send(WorkerEvent::ReportReady {
                                submission_id: None,
                                result: Box::new(result),
                            })
                            .await;
                    }
                    Err(e) => {
                        tracing::error!("load report failed: {report_id}: {e}");
                        let _ = self
                            .tx
                            .send(WorkerEvent::Error(format!("load report failed: {e}")))
                            .await;
                    }
                }
            }

            // Handled by `run`, which owns the HTTP client.
            WorkerCmd::SaveSettings(_) => {}
        }
    }
}

/// Main worker loop: handle commands sequentially so at most one submission runs.
pub async fn run(mut rx: mpsc::Receiver<WorkerCmd>, tx: mpsc::Sender<WorkerEvent>, cfg: Config) {
    // Shared HTTP client for all API calls.
    let http = Client::new();
    let mut worker = Worker::from_config(&http, &cfg, tx.clone());
    tracing::info!("worker started (api: {})", cfg.api.base_url);

    while let Some(cmd) = rx.recv().await {
        match cmd {
            WorkerCmd::SaveSettings(new_cfg) => {
                tracing::info!("settings updated");
                worker = Worker::from_config(&http, &new_cfg, tx.clone());
                let _ = tx.send(WorkerEvent::Log("settings updated".into())).await;
            }
            other => worker.handle(other).await,
        }
    }
    tracing::info!("worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{ApiError, StorageError},
        storage::UploadOptions,
        submission::StorageKey,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    struct NoStorage;

    #[async_trait]
    impl ObjectStorage for NoStorage {
        async fn upload(
            &self,
            _bucket: &str,
            _key: &StorageKey,
            _bytes: &[u8],
            _opts: &UploadOptions,
        ) -> Result<(), StorageError> {
            Err(StorageError::NotConfigured)
        }
    }

    /// Healthy service with a single stored report `r1`.
    struct StubApi;

    #[async_trait]
    impl AnalysisApi for StubApi {
        async fn health_check(&self) -> Result<HealthStatus, ApiError> {
            Ok(HealthStatus {
                status: "ok".into(),
                service: "analyst".into(),
            })
        }
        async fn upload_and_analyze(&self, _f: &SelectedFile) -> Result<AnalysisResult, ApiError> {
            Err(ApiError::Decode("unused".into()))
        }
        async fn analyze_from_storage(
            &self,
            _b: &str,
            _p: &str,
        ) -> Result<AnalysisResult, ApiError> {
            Err(ApiError::Decode("unused".into()))
        }
        async fn get_report_by_id(&self, id: &str) -> Result<AnalysisResult, ApiError> {
            if id == "r1" {
                Ok(serde_json::from_value(json!({"report_id": "r1"})).unwrap())
            } else {
                Err(ApiError::RequestFailed {
                    status: 404,
                    message: "Failed to fetch report: 404".into(),
                })
            }
        }
    }

    fn worker() -> (Worker, mpsc::Receiver<WorkerEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let settings = OrchestratorSettings {
            bucket: "csv-uploads".into(),
            tick: Duration::from_secs(3),
        };
        (
            Worker::new(Arc::new(StubApi), Arc::new(NoStorage), settings, tx),
            rx,
        )
    }

    #[tokio::test]
    async fn test_health_event() {
        let (mut w, mut rx) = worker();
        w.handle(WorkerCmd::CheckHealth).await;
        match rx.try_recv().unwrap() {
            WorkerEvent::Health(Ok(h)) => assert_eq!(h.status, "ok"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_health_failure_is_typed() {
        // Bind then drop so the port refuses connections.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (tx, mut rx) = mpsc::channel(8);
        let api = Arc::new(ApiClient::new(Client::new(), &format!("http://{addr}")));
        let settings = OrchestratorSettings {
            bucket: "csv-uploads".into(),
            tick: Duration::from_secs(3),
        };
        let mut w = Worker::new(api, Arc::new(NoStorage), settings, tx);

        w.handle(WorkerCmd::CheckHealth).await;
        match rx.try_recv().unwrap() {
            WorkerEvent::Health(Err(SubmitError::ServiceUnavailable(_))) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_load_report_success_and_failure() {
        let (mut w, mut rx) = worker();

        w.handle(WorkerCmd::LoadReport("r1".into())).await;
        match rx.try_recv().unwrap() {
            WorkerEvent::ReportReady {
                submission_id,
                result,
            } => {
                assert!(submission_id.is_none());
                assert_eq!(result.report_id().as_deref(), Some("r1"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        w.handle(WorkerCmd::LoadReport("nope".into())).await;
        match rx.try_recv().unwrap() {
            WorkerEvent::Error(msg) => assert!(msg.contains("404")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_storage_fails_submission() {
        let (mut w, mut rx) = worker();
        w.handle(WorkerCmd::Submit(SelectedFile::new("sales.csv", b"a\n".to_vec())))
            .await;

        let mut failed = None;
        while let Ok(ev) = rx.try_recv() {
            if let WorkerEvent::Failed { message, .. } = ev {
                failed = Some(message);
            }
        }
        let message = failed.expect("failure notification");
        assert!(message.starts_with("Storage upload failed"), "{message}");
    }
}
