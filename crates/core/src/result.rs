//! Uniform task outcome returned by the orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind};
use crate::response::TokenUsage;

/// Provider/model sentinel used when a call never produced a response
pub const UNKNOWN: &str = "unknown";

/// Outcome of deterministic output validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ValidationOutcome {
    pub passed: bool,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    /// Passing outcome with no findings
    pub fn pass() -> Self {
        Self {
            passed: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Failing outcome with a single error
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            passed: false,
            errors: vec![error.into()],
            warnings: Vec::new(),
        }
    }

    /// Build from collected findings; any error fails the outcome
    pub fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            passed: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Audit record for one task execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub task_id: String,
    pub run_id: String,
    pub provider: String,
    pub model: String,
    pub usage: TokenUsage,
    pub cost: f64,
    /// Measured from orchestrator entry
    pub duration_ms: u64,
    pub cached: bool,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    /// Audit stub for calls that never reached a provider
    pub fn unknown(task_id: impl Into<String>, run_id: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            task_id: task_id.into(),
            run_id: run_id.into(),
            provider: UNKNOWN.to_string(),
            model: UNKNOWN.to_string(),
            usage: TokenUsage::default(),
            cost: 0.0,
            duration_ms,
            cached: false,
            timestamp: Utc::now(),
        }
    }
}

/// Error summary carried by a failed task result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Error> for TaskError {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result of running one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    pub outputs: Vec<serde_json::Value>,
    pub validation: ValidationOutcome,
    pub audit: AuditRecord,
    /// Set when the task failed before validation could run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl TaskResult {
    /// Failed result for an error raised before or during execution
    pub fn failed(err: &Error, audit: AuditRecord) -> Self {
        Self {
            success: false,
            outputs: Vec::new(),
            validation: ValidationOutcome::fail(err.to_string()),
            audit,
            error: Some(TaskError::from(err)),
        }
    }

    /// Error kind, if the task failed with an error rather than a validation finding
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}
