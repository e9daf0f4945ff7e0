//! Upload-and-analyze flow: validate, stage to storage, request analysis.

use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    analysis::{AnalysisApi, AnalysisResult},
    config::Config,
    error::{ApiError, SubmitError},
    storage::{ObjectStorage, UploadOptions},
    submission::{
        ANALYSIS_STEPS, ProgressSnapshot, STAGING_STEP, SelectedFile, StorageKey, SubmissionState,
    },
    worker::WorkerEvent,
};

/// Millisecond wall clock used for storage keys.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Per-orchestrator settings derived from the config.
#[derive(Clone, Debug)]
pub struct OrchestratorSettings {
    /// Bucket receiving staged files.
    pub bucket: String,
    /// Cosmetic progress cadence.
    pub tick: Duration,
}

impl From<&Config> for OrchestratorSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            bucket: cfg.storage.bucket.clone(),
            tick: cfg.progress.period(),
        }
    }
}

/// Shared progress writer. The timer task only ever touches this, never the state.
#[derive(Clone)]
struct ProgressHandle {
    snapshot: Arc<Mutex<ProgressSnapshot>>,
    events: mpsc::Sender<WorkerEvent>,
    submission_id: Uuid,
}

impl ProgressHandle {
    /// Replace the snapshot unconditionally and publish it.
    async fn set(&self, next: ProgressSnapshot) {
        *self.lock() = next.clone();
        self.publish(next).await;
    }

    /// Move forward; a lower percentage than the current one is ignored.
    async fn advance(&self, message: &str, percent: u8) {
        let next = {
            let mut cur = self.lock();
            if percent < cur.percent {
                return;
            }
            *cur = ProgressSnapshot::new(message, percent);
            cur.clone()
        };
        self.publish(next).await;
    }

    async fn publish(&self, snapshot: ProgressSnapshot) {
        let _ = self
            .events
            .send(WorkerEvent::Progress {
                submission_id: self.submission_id,
                snapshot,
            })
            .await;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProgressSnapshot> {
        self.snapshot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Runs one submission at a time. `submit` takes `&mut self`, so a second
/// pipeline cannot start while one is running.
pub struct Orchestrator {
    storage: Arc<dyn ObjectStorage>,
    api: Arc<dyn AnalysisApi>,
    settings: OrchestratorSettings,
    clock: Clock,
    events: mpsc::Sender<WorkerEvent>,
    state: SubmissionState,
    progress: ProgressHandle,
    last_key: Option<StorageKey>,
}

impl Orchestrator {
    /// Wire the orchestrator to its collaborators.
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        api: Arc<dyn AnalysisApi>,
        settings: OrchestratorSettings,
        events: mpsc::Sender<WorkerEvent>,
    ) -> Self {
        let progress = ProgressHandle {
            snapshot: Arc::default(),
            events: events.clone(),
            submission_id: Uuid::nil(),
        };
        Self {
            storage,
            api,
            settings,
            clock: Arc::new(|| chrono::Utc::now().timestamp_millis()),
            events,
            state: SubmissionState::Idle,
            progress,
            last_key: None,
        }
    }

    /// Stage `file` into storage, then ask the service to analyze it.
    pub async fn submit(&mut self, file: SelectedFile) -> Result<AnalysisResult, SubmitError> {
        self.begin(&file).await;

        self.transition(SubmissionState::Validating).await;
        if let Err(e) = file.validate() {
            return self.fail(e).await;
        }

        self.transition(SubmissionState::StagingToStorage).await;
        let key = self.next_key(&file.name);
        self.progress.advance(STAGING_STEP.0, STAGING_STEP.1).await;
        if let Err(e) = self
            .storage
            .upload(&self.settings.bucket, &key, &file.bytes, &UploadOptions::csv())
            .await
        {
            return self.fail(e.into()).await;
        }
        tracing::info!("staged {} to {}/{}", file.name, self.settings.bucket, key);

        self.transition(SubmissionState::RequestingAnalysis).await;
        let outcome = self
            .with_cosmetic_progress(
                self.api
                    .analyze_from_storage(&self.settings.bucket, key.as_str()),
            )
            .await;
        self.settle(outcome).await
    }

    /// Send `file` straight to the direct upload endpoint, skipping storage.
    pub async fn submit_direct(
        &mut self,
        file: SelectedFile,
    ) -> Result<AnalysisResult, SubmitError> {
        self.begin(&file).await;

        self.transition(SubmissionState::Validating).await;
        if let Err(e) = file.validate() {
            return self.fail(e).await;
        }

        self.transition(SubmissionState::RequestingAnalysis).await;
        let outcome = self
            .with_cosmetic_progress(self.api.upload_and_analyze(&file))
            .await;
        self.settle(outcome).await
    }

    /// New submission id, back to Idle with a cleared progress bar.
    async fn begin(&mut self, file: &SelectedFile) {
        self.progress.submission_id = Uuid::new_v4();
        tracing::info!(
            "submission {} start: {} ({} bytes)",
            self.progress.submission_id,
            file.name,
            file.size
        );
        self.transition(SubmissionState::Idle).await;
        self.progress.set(ProgressSnapshot::default()).await;
    }

    /// Timestamped key, strictly newer than any key this orchestrator issued.
    fn next_key(&mut self, filename: &str) -> StorageKey {
        let now = (self.clock)();
        let stamp = match &self.last_key {
            Some(prev) if now <= prev.timestamp_ms() => prev.timestamp_ms() + 1,
            _ => now,
        };
        let key = StorageKey::new(stamp, filename);
        self.last_key = Some(key.clone());
        key
    }

    /// Await `call` while a timer walks through `ANALYSIS_STEPS`. The timer is
    /// cancelled and joined before this returns.
    async fn with_cosmetic_progress<F, T>(&self, call: F) -> T
    where
        F: Future<Output = T>,
    {
        let (first, rest) = match ANALYSIS_STEPS.split_first() {
            Some((first, rest)) => (Some(*first), rest),
            None => (None, ANALYSIS_STEPS),
        };
        if let Some((message, percent)) = first {
            self.progress.advance(message, percent).await;
        }

        let token = CancellationToken::new();
        let timer = tokio::spawn(run_progress_timer(
            self.progress.clone(),
            rest,
            self.settings.tick,
            token.clone(),
        ));

        let out = call.await;

        token.cancel();
        if let Err(e) = timer.await {
            tracing::warn!("progress timer ended abnormally: {e}");
        }
        out
    }

    async fn settle(
        &mut self,
        outcome: Result<AnalysisResult, ApiError>,
    ) -> Result<AnalysisResult, SubmitError> {
        match outcome {
            Ok(result) => {
                self.progress.set(ProgressSnapshot::complete()).await;
                self.transition(SubmissionState::Succeeded).await;
                tracing::info!(
                    "submission {} succeeded: report {}",
                    self.progress.submission_id,
                    result.report_label()
                );
                let _ = self
                    .events
                    .send(WorkerEvent::ReportReady {
                        submission_id: Some(self.progress.submission_id),
                        result: Box::new(result.clone()),
                    })
                    .await;
                Ok(result)
            }
            Err(e) => {
                let message = e.to_string();
                self.fail(SubmitError::AnalysisError { message }).await
            }
        }
    }

    async fn fail(&mut self, err: SubmitError) -> Result<AnalysisResult, SubmitError> {
        tracing::error!("submission {} failed: {err}", self.progress.submission_id);
        self.progress.set(ProgressSnapshot::default()).await;
        self.transition(SubmissionState::Failed(err.clone())).await;
        let _ = self
            .events
            .send(WorkerEvent::Failed {
                submission_id: self.progress.submission_id,
                message: err.to_string(),
            })
            .await;
        Err(err)
    }

    async fn transition(&mut self, next: SubmissionState) {
        tracing::debug!("state {} -> {}", self.state.label(), next.label());
        self.state = next.clone();
        let _ = self
            .events
            .send(WorkerEvent::State {
                submission_id: self.progress.submission_id,
                state: next,
            })
            .await;
    }
}

#[cfg(test)]
impl Orchestrator {
    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Current state.
    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    /// Current progress snapshot.
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.lock().clone()
    }

    /// Key used by the most recent staging attempt.
    pub fn last_key(&self) -> Option<&StorageKey> {
        self.last_key.as_ref()
    }

    /// Id of the current (or last) submission.
    pub fn submission_id(&self) -> Uuid {
        self.progress.submission_id
    }
}

/// Advance one step per tick until the steps run out or `token` fires.
async fn run_progress_timer(
    progress: ProgressHandle,
    steps: &'static [(&'static str, u8)],
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    let mut steps = steps.iter();
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => match steps.next() {
                Some((message, percent)) => progress.advance(message, *percent).await,
                // Hold at the last step.
                None => {
                    token.cancelled().await;
                    break;
                }
            },
        }
    }
}
