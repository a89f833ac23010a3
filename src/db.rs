//! Run history stored in SQLite.
//!
//! One row per run. Summary, payload and request are kept as JSON text so
//! the CLI can show or export a run long after the worker that produced it
//! has exited.

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::models::{ResearchPayload, ResearchRequest, ResearchSummary};
use crate::run_store::RunRecord;

pub const DB_FILE_NAME: &str = "kivo.db";

const RUN_COLUMNS: &str = "id, run_id, topic, status, request_payload, summary, payload, message,
                           error_code, pipeline_mode, created_at, updated_at";

pub fn get_db_path(settings: &Settings) -> PathBuf {
    settings.storage_dir().join(DB_FILE_NAME)
}

/// Open (creating if needed) the database at `path` and apply the schema.
pub fn open_database(path: &Path) -> Result<Connection, String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create storage directory: {}", e))?;
    }
    let conn = Connection::open(path).map_err(|e| format!("Failed to open database: {}", e))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn get_connection(settings: &Settings) -> Result<Connection, String> {
    open_database(&get_db_path(settings))
}

pub fn init_schema(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(include_str!("schema.sql"))
        .map_err(|e| format!("Failed to initialize schema: {}", e))
}

/// A run as stored in the history table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRun {
    pub id: i64,
    pub run_id: String,
    pub topic: String,
    pub status: String,
    pub request_payload: String, // JSON string
    pub summary: Option<String>, // JSON string
    pub payload: Option<String>, // JSON string
    pub message: Option<String>,
    pub error_code: Option<String>,
    pub pipeline_mode: String,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredRun {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(StoredRun {
            id: row.get(0)?,
            run_id: row.get(1)?,
            topic: row.get(2)?,
            status: row.get(3)?,
            request_payload: row.get(4)?,
            summary: row.get(5)?,
            payload: row.get(6)?,
            message: row.get(7)?,
            error_code: row.get(8)?,
            pipeline_mode: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    pub fn request(&self) -> Result<ResearchRequest, String> {
        serde_json::from_str(&self.request_payload)
            .map_err(|e| format!("Failed to parse stored request: {}", e))
    }

    pub fn summary(&self) -> Result<Option<ResearchSummary>, String> {
        self.summary
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| format!("Failed to parse stored summary: {}", e))
    }

    pub fn payload(&self) -> Result<Option<ResearchPayload>, String> {
        self.payload
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| format!("Failed to parse stored payload: {}", e))
    }
}

/// Insert or update the row for `record`.
pub fn save_run(conn: &Connection, record: &RunRecord) -> Result<(), String> {
    let request = serde_json::to_string(&record.request)
        .map_err(|e| format!("Failed to serialize request: {}", e))?;
    let summary = record
        .summary
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| format!("Failed to serialize summary: {}", e))?;
    let payload = record
        .payload
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| format!("Failed to serialize payload: {}", e))?;

    conn.execute(
        "INSERT INTO research_runs
             (run_id, topic, status, request_payload, summary, payload, message,
              error_code, pipeline_mode, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
         ON CONFLICT(run_id) DO UPDATE SET
             status = excluded.status,
             summary = excluded.summary,
             payload = excluded.payload,
             message = excluded.message,
             error_code = excluded.error_code,
             updated_at = excluded.updated_at",
        params![
            record.run_id,
            record.request.topic,
            record.status.as_str(),
            request,
            summary,
            payload,
            record.message,
            record.error_code.map(|code| code.as_str()),
            record.pipeline_mode.as_str(),
            record.created_at.to_rfc3339(),
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| format!("Failed to save run: {}", e))?;

    Ok(())
}

/// Find a run by full id, or by a unique id prefix.
pub fn get_run(conn: &Connection, id_or_prefix: &str) -> Result<Option<StoredRun>, String> {
    let exact = conn
        .query_row(
            &format!("SELECT {} FROM research_runs WHERE run_id = ?1", RUN_COLUMNS),
            [id_or_prefix],
            StoredRun::from_row,
        )
        .optional()
        .map_err(|e| format!("Failed to query run: {}", e))?;
    if exact.is_some() {
        return Ok(exact);
    }

    let pattern = format!("{}%", id_or_prefix.replace('%', "").replace('_', ""));
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM research_runs WHERE run_id LIKE ?1 LIMIT 2",
            RUN_COLUMNS
        ))
        .map_err(|e| format!("Failed to prepare statement: {}", e))?;
    let mut matches = stmt
        .query_map([&pattern], StoredRun::from_row)
        .map_err(|e| format!("Query failed: {}", e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("Failed to collect results: {}", e))?;

    match matches.len() {
        0 => Ok(None),
        1 => Ok(matches.pop()),
        _ => Err(format!("Run id prefix '{}' is ambiguous", id_or_prefix)),
    }
}

pub fn list_runs(conn: &Connection, limit: i64) -> Result<Vec<StoredRun>, String> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM research_runs ORDER BY created_at DESC LIMIT ?1",
            RUN_COLUMNS
        ))
        .map_err(|e| format!("Failed to prepare statement: {}", e))?;

    let runs = stmt
        .query_map([limit], StoredRun::from_row)
        .map_err(|e| format!("Query failed: {}", e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("Failed to collect results: {}", e))?;

    Ok(runs)
}

/// Returns true if a row was deleted.
pub fn delete_run(conn: &Connection, run_id: &str) -> Result<bool, String> {
    let deleted = conn
        .execute("DELETE FROM research_runs WHERE run_id = ?1", [run_id])
        .map_err(|e| format!("Failed to delete run: {}", e))?;
    Ok(deleted > 0)
}

pub fn count_runs(conn: &Connection) -> Result<usize, String> {
    conn.query_row("SELECT COUNT(*) FROM research_runs", [], |row| {
        row.get::<_, i64>(0)
    })
    .map(|n| n as usize)
    .map_err(|e| format!("Failed to count runs: {}", e))
}

fn cutoff(days: i32) -> String {
    (Utc::now() - Duration::days(i64::from(days))).to_rfc3339()
}

/// Runs created more than `days` days ago.
pub fn count_cleanup_candidates(conn: &Connection, days: i32) -> Result<usize, String> {
    conn.query_row(
        "SELECT COUNT(*) FROM research_runs WHERE created_at < ?1",
        [cutoff(days)],
        |row| row.get::<_, i64>(0),
    )
    .map(|n| n as usize)
    .map_err(|e| format!("Failed to count cleanup candidates: {}", e))
}

pub fn cleanup_old_runs(conn: &Connection, days: i32) -> Result<usize, String> {
    conn.execute(
        "DELETE FROM research_runs WHERE created_at < ?1",
        [cutoff(days)],
    )
    .map_err(|e| format!("Failed to clean up runs: {}", e))
}
