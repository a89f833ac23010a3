use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ErrorCode, ResearchError};
use crate::models::{PipelineMode, ResearchPayload, ResearchRequest, ResearchSummary};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(RunStatus::Queued),
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("Unknown run status: {}", other)),
        }
    }
}

/// Everything known about one research run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub request: ResearchRequest,
    pub status: RunStatus,
    pub progress: f64,
    pub current_phase: String,
    pub message: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub summary: Option<ResearchSummary>,
    pub payload: Option<ResearchPayload>,
    pub pipeline_mode: PipelineMode,
}

impl RunRecord {
    pub fn queued(run_id: String, request: ResearchRequest, pipeline_mode: PipelineMode) -> Self {
        Self {
            run_id,
            request,
            status: RunStatus::Queued,
            progress: 0.0,
            current_phase: "queued".to_string(),
            message: None,
            error_code: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            summary: None,
            payload: None,
            pipeline_mode,
        }
    }

    pub fn status_view(&self) -> RunStatusView {
        RunStatusView {
            run_id: self.run_id.clone(),
            status: self.status,
            progress: self.progress,
            current_phase: self.current_phase.clone(),
            message: self.message.clone(),
            error_code: self.error_code,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Status snapshot handed to callers polling a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunStatusView {
    pub run_id: String,
    pub status: RunStatus,
    pub progress: f64,
    pub current_phase: String,
    pub message: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Registry of runs keyed by run id. Every access goes through one mutex.
#[derive(Debug, Clone, Default)]
pub struct RunStore {
    runs: Arc<Mutex<HashMap<String, RunRecord>>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, RunRecord>>, ResearchError> {
        self.runs
            .lock()
            .map_err(|e| ResearchError::internal(format!("Failed to lock run store: {}", e)))
    }

    pub fn insert(&self, record: RunRecord) -> Result<(), ResearchError> {
        let mut runs = self.lock()?;
        if runs.contains_key(&record.run_id) {
            return Err(ResearchError::internal(format!(
                "Run {} already exists",
                record.run_id
            )));
        }
        runs.insert(record.run_id.clone(), record);
        Ok(())
    }

    /// Apply `f` to a run while holding the lock.
    pub fn update<F>(&self, run_id: &str, f: F) -> Result<(), ResearchError>
    where
        F: FnOnce(&mut RunRecord),
    {
        let mut runs = self.lock()?;
        let record = runs.get_mut(run_id).ok_or_else(|| not_found(run_id))?;
        f(record);
        Ok(())
    }

    pub fn set_phase(&self, run_id: &str, phase: &str, progress: f64) -> Result<(), ResearchError> {
        self.update(run_id, |run| {
            run.current_phase = phase.to_string();
            run.progress = progress.clamp(0.0, 1.0);
        })
    }

    pub fn get(&self, run_id: &str) -> Result<Option<RunRecord>, ResearchError> {
        Ok(self.lock()?.get(run_id).cloned())
    }

    pub fn status(&self, run_id: &str) -> Result<Option<RunStatusView>, ResearchError> {
        Ok(self.lock()?.get(run_id).map(RunRecord::status_view))
    }

    pub fn summary(&self, run_id: &str) -> Result<Option<ResearchSummary>, ResearchError> {
        Ok(self.lock()?.get(run_id).and_then(|r| r.summary.clone()))
    }

    pub fn payload(&self, run_id: &str) -> Result<Option<ResearchPayload>, ResearchError> {
        Ok(self.lock()?.get(run_id).and_then(|r| r.payload.clone()))
    }

    /// All runs, oldest first.
    pub fn list(&self) -> Result<Vec<RunStatusView>, ResearchError> {
        let runs = self.lock()?;
        let mut records: Vec<&RunRecord> = runs.values().collect();
        records.sort_by_key(|r| r.created_at);
        Ok(records.into_iter().map(RunRecord::status_view).collect())
    }

    pub fn len(&self) -> Result<usize, ResearchError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ResearchError> {
        Ok(self.lock()?.is_empty())
    }
}

fn not_found(run_id: &str) -> ResearchError {
    ResearchError::new(ErrorCode::RunNotFound, format!("Run {} not found", run_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> RunRecord {
        RunRecord::queued(id.to_string(), ResearchRequest::new("test topic"), PipelineMode::Lite)
    }

    #[test]
    fn test_initial_state() {
        let store = RunStore::new();
        assert!(store.is_empty().unwrap());
        assert!(store.status("missing").unwrap().is_none());
    }

    #[test]
    fn test_insert_and_status() {
        let store = RunStore::new();
        store.insert(record("run-a")).unwrap();
        let status = store.status("run-a").unwrap().unwrap();
        assert_eq!(status.status, RunStatus::Queued);
        assert_eq!(status.progress, 0.0);
        assert!(status.started_at.is_none());
        assert!(store.summary("run-a").unwrap().is_none());
        assert!(store.payload("run-a").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let store = RunStore::new();
        store.insert(record("run-a")).unwrap();
        assert!(store.insert(record("run-a")).is_err());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_phase_updates() {
        let store = RunStore::new();
        store.insert(record("run-a")).unwrap();
        store.set_phase("run-a", "clustering", 2.0).unwrap();
        let status = store.status("run-a").unwrap().unwrap();
        assert_eq!(status.current_phase, "clustering");
        assert_eq!(status.progress, 1.0);
    }

    #[test]
    fn test_update_missing_run() {
        let store = RunStore::new();
        let error = store.update("nope", |_| {}).unwrap_err();
        assert_eq!(error.code, ErrorCode::RunNotFound);
    }

    #[test]
    fn test_clones_share_state() {
        let store = RunStore::new();
        let other = store.clone();
        store.insert(record("run-a")).unwrap();
        other
            .update("run-a", |run| run.status = RunStatus::Failed)
            .unwrap();
        assert_eq!(store.status("run-a").unwrap().unwrap().status, RunStatus::Failed);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_poisoned_store_reports_error() {
        let store = RunStore::new();
        store.insert(record("run-a")).unwrap();
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            poisoner
                .update("run-a", |_| panic!("poison the lock"))
                .unwrap();
        })
        .join();

        assert_eq!(store.len().unwrap_err().code, ErrorCode::InternalError);
        assert!(store.is_empty().is_err());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("completed".parse::<RunStatus>().unwrap(), RunStatus::Completed);
        assert!("done".parse::<RunStatus>().is_err());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
    }
}
