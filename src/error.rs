//! Error types for flatnest.
//!
//! [`EngineError`] is what every public operation returns. Per-row coercion
//! failures are a separate [`RowEvalError`]: operators handle them locally by
//! excluding the row, so they never surface through [`EngineError`].

use thiserror::Error;

/// Engine error taxonomy.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The source could not be read, or its header stage failed.
    #[error("failed to load {source_name}: {reason}")]
    Load { source_name: String, reason: String },

    /// Structured-text grammar violation.
    #[error("parse error at byte {position}: {message}")]
    Parse { position: usize, message: String },

    /// An operator referenced a column that the current table does not have.
    #[error("column '{column}' not found; available columns: [{}]", available.join(", "))]
    ColumnNotFound {
        column: String,
        available: Vec<String>,
    },

    /// A join key is missing from one side of a join.
    #[error(
        "join key '{key}' not found in {side} table; available columns: [{}]",
        available.join(", ")
    )]
    KeyNotFound {
        key: String,
        side: &'static str,
        available: Vec<String>,
    },

    /// Unexpected failure while running a pipeline step.
    #[error("execution failed at step {step} ({operator}): {message}")]
    Execution {
        step: usize,
        operator: String,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn column_not_found(column: &str, available: &[String]) -> Self {
        Self::ColumnNotFound {
            column: column.to_string(),
            available: available.to_vec(),
        }
    }

    pub(crate) fn load(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn execution(
        step: usize,
        operator: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self::Execution {
            step,
            operator: operator.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// A single row failed to evaluate against a predicate or aggregate.
///
/// Operators treat this as "exclude the row" and keep going.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowEvalError {
    #[error("value '{0}' is not numeric")]
    NotNumeric(String),

    #[error("null value cannot be compared")]
    Null,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_not_found_lists_available() {
        let err = EngineError::column_not_found("zip", &["name".into(), "age".into()]);
        assert_eq!(
            err.to_string(),
            "column 'zip' not found; available columns: [name, age]"
        );
    }

    #[test]
    fn execution_error_names_the_step() {
        let err = EngineError::execution(2, "Order by: age ASC", "spill write failed");
        assert_eq!(
            err.to_string(),
            "execution failed at step 2 (Order by: age ASC): spill write failed"
        );
    }
}
