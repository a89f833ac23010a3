//! Error types for Kivo research runs.
//!
//! Categorized error codes with user-facing messages, shared by request
//! validation, the pipeline and the run orchestrator.

use serde::{Deserialize, Serialize};

// ============================================================================
// Error Types
// ============================================================================

/// Categorized error codes for research operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    // Caller errors (user action required)
    InvalidRequest,
    InvalidConfig,
    RunNotFound,

    // Execution errors
    PipelineFailed,

    // Input data errors
    ParseError,

    // Internal errors
    InternalError,
}

impl ErrorCode {
    /// Returns true if this error requires user action to resolve.
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            ErrorCode::InvalidRequest | ErrorCode::InvalidConfig | ErrorCode::RunNotFound
        )
    }

    /// Get a user-friendly message for this error code.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => {
                "The research request is invalid. Check the topic, dates, sources and sample limit."
            }
            ErrorCode::InvalidConfig => {
                "The pipeline configuration is invalid. Check the thresholds with 'kivo config show'."
            }
            ErrorCode::RunNotFound => "No research run exists with that id.",
            ErrorCode::PipelineFailed => {
                "The research pipeline failed. No partial results were kept."
            }
            ErrorCode::ParseError => "Failed to parse the input data.",
            ErrorCode::InternalError => {
                "An internal error occurred. Please try again or report this issue."
            }
        }
    }

    /// Stable name stored with failed runs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::InvalidConfig => "invalid_config",
            ErrorCode::RunNotFound => "run_not_found",
            ErrorCode::PipelineFailed => "pipeline_failed",
            ErrorCode::ParseError => "parse_error",
            ErrorCode::InternalError => "internal_error",
        }
    }
}

/// A structured research error with user-friendly messaging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchError {
    pub code: ErrorCode,
    pub message: String,
    pub user_message: String,
    pub requires_user_action: bool,
    pub details: Option<String>,
}

impl ResearchError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let user_message = code.user_message().to_string();
        let requires_user_action = code.requires_user_action();
        Self {
            code,
            message: message.into(),
            user_message,
            requires_user_action,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for ResearchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ResearchError {}

impl From<ResearchError> for String {
    fn from(error: ResearchError) -> Self {
        error.message
    }
}
