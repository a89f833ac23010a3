//! Retention cleanup for the run history.
//!
//! Runs older than `retention_days` are deleted. With no retention set,
//! nothing is ever removed.

use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Settings;
use crate::db;

/// Outcome of one cleanup pass
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CleanupResult {
    pub deleted_count: usize,
    pub remaining_count: usize,
    pub dry_run: bool,
    pub skipped_reason: Option<String>,
}

impl CleanupResult {
    fn skipped(reason: &str) -> Self {
        Self {
            deleted_count: 0,
            remaining_count: 0,
            dry_run: false,
            skipped_reason: Some(reason.to_string()),
        }
    }
}

/// Retention summary shown by `housekeeping status`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RetentionStatus {
    pub retention_days: Option<i32>,
    pub total_runs: usize,
    pub cleanup_candidates: usize,
}

/// Delete runs older than the configured retention. With `dry_run` the
/// candidates are only counted and `deleted_count` is what would go.
pub fn run_cleanup(
    conn: &Connection,
    settings: &Settings,
    dry_run: bool,
) -> Result<CleanupResult, String> {
    let days = match settings.retention_days {
        Some(d) => d,
        None => {
            info!("Housekeeping: retention_days is None, skipping cleanup");
            return Ok(CleanupResult::skipped("Retention is set to 'Never delete'"));
        }
    };

    let before_count = db::count_runs(conn)?;

    if dry_run {
        let candidates = db::count_cleanup_candidates(conn, days)?;
        info!(
            "Housekeeping (dry run): {} of {} run(s) older than {} days",
            candidates, before_count, days
        );
        return Ok(CleanupResult {
            deleted_count: candidates,
            remaining_count: before_count - candidates.min(before_count),
            dry_run: true,
            skipped_reason: None,
        });
    }

    let deleted_count = db::cleanup_old_runs(conn, days)?;
    let remaining_count = db::count_runs(conn)?;

    if deleted_count > 0 {
        info!(
            "Housekeeping: deleted {} run(s) older than {} days ({} remaining)",
            deleted_count, days, remaining_count
        );
    } else {
        info!(
            "Housekeeping: no runs to clean up (retention: {} days, {} total)",
            days, before_count
        );
    }

    Ok(CleanupResult {
        deleted_count,
        remaining_count,
        dry_run: false,
        skipped_reason: None,
    })
}

pub fn retention_status(conn: &Connection, settings: &Settings) -> Result<RetentionStatus, String> {
    let cleanup_candidates = match settings.retention_days {
        Some(days) => db::count_cleanup_candidates(conn, days)?,
        None => 0,
    };
    Ok(RetentionStatus {
        retention_days: settings.retention_days,
        total_runs: db::count_runs(conn)?,
        cleanup_candidates,
    })
}

/// Cleanup before a new run is stored. Logs failures and carries on.
pub fn run_startup_cleanup(conn: &Connection, settings: &Settings) {
    match run_cleanup(conn, settings, false) {
        Ok(result) => {
            if result.deleted_count > 0 {
                info!("Startup cleanup complete: {} run(s) deleted", result.deleted_count);
            }
        }
        Err(e) => warn!("Startup cleanup failed: {}", e),
    }
}
