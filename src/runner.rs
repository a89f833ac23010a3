//! Run orchestration: one worker thread per research run.
//!
//! The runner owns the run store and the selected pipeline. Workers only
//! touch shared state through the store. There is no cancellation and no
//! retry; a failed run keeps its error message and nothing else.

use chrono::Utc;
use scopeguard::defer;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{ErrorCode, ResearchError};
use crate::models::{PipelineMode, RawItem, ResearchPayload, ResearchRequest, ResearchSummary};
use crate::pipeline::{select_pipeline, ResearchPipeline};
use crate::run_store::{RunRecord, RunStatus, RunStatusView, RunStore};

pub struct ResearchRunner {
    store: RunStore,
    pipeline: Arc<dyn ResearchPipeline>,
    workers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl ResearchRunner {
    pub fn new(pipeline: Box<dyn ResearchPipeline>) -> Self {
        Self {
            store: RunStore::new(),
            pipeline: Arc::from(pipeline),
            workers: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(select_pipeline(settings))
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    pub fn pipeline_mode(&self) -> PipelineMode {
        self.pipeline.mode()
    }

    /// Validate, register as queued and hand the run to a worker thread.
    pub fn start_run(
        &self,
        request: ResearchRequest,
        raw_items: Vec<RawItem>,
    ) -> Result<String, ResearchError> {
        request.validate()?;

        let run_id = Uuid::new_v4().to_string();
        self.store.insert(RunRecord::queued(
            run_id.clone(),
            request,
            self.pipeline.mode(),
        ))?;

        let store = self.store.clone();
        let pipeline = Arc::clone(&self.pipeline);
        let worker_id = run_id.clone();
        let handle = std::thread::Builder::new()
            .name(format!("kivo-run-{}", &run_id[..8]))
            .spawn(move || execute_run(&store, pipeline.as_ref(), &worker_id, raw_items))
            .map_err(|e| {
                let error =
                    ResearchError::internal(format!("Failed to spawn research worker: {}", e));
                mark_failed(&self.store, &run_id, &error);
                error
            })?;

        self.workers
            .lock()
            .map_err(|e| ResearchError::internal(format!("Failed to lock worker table: {}", e)))?
            .insert(run_id.clone(), handle);

        info!("Run {} queued ({} mode)", run_id, self.pipeline.mode().as_str());
        Ok(run_id)
    }

    pub fn get_status(&self, run_id: &str) -> Result<Option<RunStatusView>, ResearchError> {
        self.store.status(run_id)
    }

    pub fn get_summary(&self, run_id: &str) -> Result<Option<ResearchSummary>, ResearchError> {
        self.store.summary(run_id)
    }

    pub fn get_payload(&self, run_id: &str) -> Result<Option<ResearchPayload>, ResearchError> {
        self.store.payload(run_id)
    }

    /// Block until the run's worker exits, then return its final status.
    pub fn join(&self, run_id: &str) -> Result<RunStatusView, ResearchError> {
        let handle = self
            .workers
            .lock()
            .map_err(|e| ResearchError::internal(format!("Failed to lock worker table: {}", e)))?
            .remove(run_id);

        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Worker for run {} panicked", run_id);
            }
        }

        self.require_status(run_id)
    }

    /// Poll the store until the run reaches a terminal state.
    pub async fn wait_for(
        &self,
        run_id: &str,
        poll_interval: Duration,
    ) -> Result<RunStatusView, ResearchError> {
        loop {
            let status = self.require_status(run_id)?;
            if status.status.is_terminal() {
                return Ok(status);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    fn require_status(&self, run_id: &str) -> Result<RunStatusView, ResearchError> {
        self.store.status(run_id)?.ok_or_else(|| {
            ResearchError::new(ErrorCode::RunNotFound, format!("Run {} not found", run_id))
        })
    }
}

fn execute_run(
    store: &RunStore,
    pipeline: &dyn ResearchPipeline,
    run_id: &str,
    mut raw_items: Vec<RawItem>,
) {
    // A panicking pipeline still leaves a terminal record behind
    defer! {
        if std::thread::panicking() {
            let error = ResearchError::new(ErrorCode::PipelineFailed, "Research worker panicked");
            mark_failed(store, run_id, &error);
        }
    }

    let mut request = None;
    let started = store.update(run_id, |run| {
        run.status = RunStatus::Running;
        run.started_at = Some(Utc::now());
        run.current_phase = "collecting".to_string();
        request = Some(run.request.clone());
    });
    let request = match (started, request) {
        (Ok(()), Some(request)) => request,
        (Err(e), _) => {
            error!("Run {} vanished before start: {}", run_id, e);
            return;
        }
        (Ok(()), None) => return,
    };

    if let Some(limit) = request.sample_limit {
        raw_items.truncate(limit as usize);
    }
    advance(store, run_id, "analyzing", 1.0 / 3.0);

    match pipeline.process(run_id, &request, &raw_items) {
        Ok((payload, summary)) => {
            advance(store, run_id, "storing results", 2.0 / 3.0);
            let clusters = payload.clusters.len();
            let stored = store.update(run_id, |run| {
                run.status = RunStatus::Completed;
                run.progress = 1.0;
                run.current_phase = "completed".to_string();
                run.finished_at = Some(Utc::now());
                run.summary = Some(summary);
                run.payload = Some(payload);
            });
            match stored {
                Ok(()) => info!("Run {} completed with {} cluster(s)", run_id, clusters),
                Err(e) => error!("Run {} finished but could not be stored: {}", run_id, e),
            }
        }
        Err(e) => {
            error!("Run {} failed: {}", run_id, e);
            mark_failed(store, run_id, &e);
        }
    }
}

/// Move a run to its next phase. Returns false if the store rejected it.
fn advance(store: &RunStore, run_id: &str, phase: &str, progress: f64) -> bool {
    match store.set_phase(run_id, phase, progress) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to set phase '{}' for run {}: {}", phase, run_id, e);
            false
        }
    }
}

fn mark_failed(store: &RunStore, run_id: &str, error: &ResearchError) {
    let result = store.update(run_id, |run| {
        run.status = RunStatus::Failed;
        run.current_phase = "failed".to_string();
        run.finished_at = Some(Utc::now());
        run.message = Some(error.message.clone());
        run.error_code = Some(error.code);
        run.summary = None;
        run.payload = None;
    });
    if let Err(e) = result {
        error!("Failed to record failure for run {}: {}", run_id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Confidence;
    use crate::pipeline::{LitePipeline, PipelineParams};

    struct FailingPipeline;

    impl ResearchPipeline for FailingPipeline {
        fn mode(&self) -> PipelineMode {
            PipelineMode::Lite
        }

        fn process(
            &self,
            _run_id: &str,
            _request: &ResearchRequest,
            _raw_items: &[RawItem],
        ) -> Result<(ResearchPayload, ResearchSummary), ResearchError> {
            Err(ResearchError::new(ErrorCode::PipelineFailed, "tokenizer exploded"))
        }
    }

    struct PanickingPipeline;

    impl ResearchPipeline for PanickingPipeline {
        fn mode(&self) -> PipelineMode {
            PipelineMode::Lite
        }

        fn process(
            &self,
            _run_id: &str,
            _request: &ResearchRequest,
            _raw_items: &[RawItem],
        ) -> Result<(ResearchPayload, ResearchSummary), ResearchError> {
            panic!("unexpected state");
        }
    }

    fn lite_runner() -> ResearchRunner {
        ResearchRunner::new(Box::new(LitePipeline::lite(PipelineParams::default())))
    }

    #[test]
    fn test_empty_run_completes() {
        let runner = lite_runner();
        let run_id = runner
            .start_run(ResearchRequest::new("test topic"), Vec::new())
            .unwrap();
        let status = runner.join(&run_id).unwrap();

        assert_eq!(status.status, RunStatus::Completed);
        assert_eq!(status.progress, 1.0);
        assert!(status.started_at.is_some());
        assert!(status.finished_at.is_some());

        let summary = runner.get_summary(&run_id).unwrap().unwrap();
        assert_eq!(summary.confidence, Confidence::Low);
        assert!(summary.top_pain_points.is_empty());
        let payload = runner.get_payload(&run_id).unwrap().unwrap();
        assert_eq!(payload.pipeline_mode, PipelineMode::Lite);
        assert_eq!(payload.run_id, run_id);
    }

    #[test]
    fn test_invalid_request_rejected_before_run() {
        let runner = lite_runner();
        let error = runner
            .start_run(ResearchRequest::new("ab"), Vec::new())
            .unwrap_err();
        assert_eq!(error.code, ErrorCode::InvalidRequest);
        assert!(runner.store().is_empty().unwrap());
    }

    #[test]
    fn test_sample_limit_caps_items() {
        let runner = lite_runner();
        let mut request = ResearchRequest::new("keyboard firmware");
        request.sample_limit = Some(2);
        let items = vec![
            RawItem::from_text("keys repeat randomly"),
            RawItem::from_text("backlight flickers at night"),
            RawItem::from_text("bluetooth pairing drops"),
        ];
        let run_id = runner.start_run(request, items).unwrap();
        runner.join(&run_id).unwrap();
        let payload = runner.get_payload(&run_id).unwrap().unwrap();
        assert_eq!(payload.items.len(), 2);
        assert_eq!(payload.clusters.len(), 2);
    }

    #[test]
    fn test_failed_run_records_message() {
        let runner = ResearchRunner::new(Box::new(FailingPipeline));
        let run_id = runner
            .start_run(ResearchRequest::new("test topic"), Vec::new())
            .unwrap();
        let status = runner.join(&run_id).unwrap();
        assert_eq!(status.status, RunStatus::Failed);
        assert_eq!(status.message.as_deref(), Some("tokenizer exploded"));
        assert_eq!(status.error_code, Some(ErrorCode::PipelineFailed));
        assert!(runner.get_summary(&run_id).unwrap().is_none());
        assert!(runner.get_payload(&run_id).unwrap().is_none());
    }

    #[test]
    fn test_panicking_worker_marked_failed() {
        let runner = ResearchRunner::new(Box::new(PanickingPipeline));
        let run_id = runner
            .start_run(ResearchRequest::new("test topic"), Vec::new())
            .unwrap();
        let status = runner.join(&run_id).unwrap();
        assert_eq!(status.status, RunStatus::Failed);
        assert_eq!(status.message.as_deref(), Some("Research worker panicked"));
        assert_eq!(status.error_code, Some(ErrorCode::PipelineFailed));
    }

    #[test]
    fn test_advance_reports_missing_run() {
        let store = RunStore::new();
        assert!(!advance(&store, "missing", "analyzing", 0.5));

        store
            .insert(RunRecord::queued(
                "run-a".to_string(),
                ResearchRequest::new("test topic"),
                PipelineMode::Lite,
            ))
            .unwrap();
        assert!(advance(&store, "run-a", "analyzing", 0.5));
        assert_eq!(store.status("run-a").unwrap().unwrap().current_phase, "analyzing");
    }

    #[test]
    fn test_completed_run_has_no_error_code() {
        let runner = lite_runner();
        let run_id = runner
            .start_run(ResearchRequest::new("test topic"), Vec::new())
            .unwrap();
        assert!(runner.join(&run_id).unwrap().error_code.is_none());
    }

    #[test]
    fn test_concurrent_runs_are_independent() {
        let runner = lite_runner();
        let ids: Vec<String> = (0..4)
            .map(|i| {
                runner
                    .start_run(
                        ResearchRequest::new(format!("topic number {}", i)),
                        vec![RawItem::from_text(format!("post about topic {}", i))],
                    )
                    .unwrap()
            })
            .collect();
        for id in &ids {
            assert_eq!(runner.join(id).unwrap().status, RunStatus::Completed);
            let payload = runner.get_payload(id).unwrap().unwrap();
            assert_eq!(&payload.run_id, id);
            assert_eq!(payload.items.len(), 1);
        }
        assert_eq!(runner.store().list().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_wait_for_reaches_terminal_state() {
        let runner = lite_runner();
        let run_id = runner
            .start_run(
                ResearchRequest::new("test topic"),
                vec![RawItem::from_text("the app crashes on launch")],
            )
            .unwrap();
        let status = runner
            .wait_for(&run_id, Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(status.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_wait_for_unknown_run() {
        let runner = lite_runner();
        let error = runner
            .wait_for("missing", Duration::from_millis(10))
            .await
            .unwrap_err();
        assert_eq!(error.code, ErrorCode::RunNotFound);
    }
}
