// 🚨 Error Taxonomy
// Row-level intake errors are isolated per record; only a malformed batch is fatal.

use thiserror::Error;

// ============================================================================
// VENDOR INTAKE ERRORS (recoverable, one per rejected row)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntakeError {
    /// A required column is absent or blank
    #[error("line {line}: missing required field `{field}`")]
    MissingField { line: usize, field: String },

    /// A rate is non-numeric, non-finite or not strictly positive
    #[error("line {line}: invalid {field} `{value}` for {firm}: must be a positive number")]
    InvalidRate {
        line: usize,
        firm: String,
        field: String,
        value: String,
    },

    /// Status is not one of the recognized values
    #[error("line {line}: invalid status `{value}` for {firm}: must be `active` or `inactive`")]
    InvalidStatus {
        line: usize,
        firm: String,
        value: String,
    },
}

impl IntakeError {
    /// Source line of the offending row
    pub fn line(&self) -> usize {
        match self {
            IntakeError::MissingField { line, .. }
            | IntakeError::InvalidRate { line, .. }
            | IntakeError::InvalidStatus { line, .. } => *line,
        }
    }

    /// Stable code used in reports and persisted rows
    pub fn code(&self) -> &'static str {
        match self {
            IntakeError::MissingField { .. } => "missing_field",
            IntakeError::InvalidRate { .. } => "invalid_rate",
            IntakeError::InvalidStatus { .. } => "invalid_status",
        }
    }
}

// ============================================================================
// BATCH ERRORS (fatal for the whole batch)
// ============================================================================

#[derive(Debug, Error)]
pub enum BatchError {
    /// Input could not be shaped into records at all
    #[error("malformed {source_name}: {reason}")]
    Malformed { source_name: String, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BatchError {
    pub fn malformed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        BatchError::Malformed {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}
