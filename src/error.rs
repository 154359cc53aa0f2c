use std::{path::PathBuf, time::Duration};

use thiserror::Error;
use uuid::Uuid;

/// Failure categories callers must keep apart when reporting to users
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed plan/rule input; the write was rejected
    Validation,
    /// Referenced plan or rule does not exist
    NotFound,
    /// Storage could not be read or written; no decision was taken
    Infrastructure,
}

impl ErrorKind {
    /// Render the message shown to an operator for an error of this kind
    pub fn user_message(self, err: &RulewardError) -> String {
        match self {
            ErrorKind::Validation => format!("rule rejected: {err}"),
            ErrorKind::NotFound => format!("not found: {err}"),
            ErrorKind::Infrastructure => "evaluation temporarily unavailable".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RulewardError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("a plan named '{name}' already exists")]
    DuplicatePlanName { name: String },

    #[error("security plan {plan} not found")]
    PlanNotFound { plan: String },

    #[error("rule {rule} not found in plan {plan}")]
    RuleNotFound { plan: Uuid, rule: Uuid },

    #[error("storage unavailable: {reason}")]
    Storage { reason: String },

    #[error("timed out after {timeout:?} reading plan {plan}")]
    SnapshotTimeout { plan: Uuid, timeout: Duration },

    #[error("failed to deliver alert: {reason}")]
    Alert { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl RulewardError {
    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RulewardError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RulewardError::Validation { .. }
            | RulewardError::DuplicatePlanName { .. }
            | RulewardError::ConfigParse { .. } => ErrorKind::Validation,
            RulewardError::PlanNotFound { .. } | RulewardError::RuleNotFound { .. } => {
                ErrorKind::NotFound
            }
            RulewardError::Storage { .. }
            | RulewardError::SnapshotTimeout { .. }
            | RulewardError::Alert { .. }
            | RulewardError::Io(_)
            | RulewardError::Json(_) => ErrorKind::Infrastructure,
        }
    }

    /// Operator-facing description that separates rejected input from outages
    pub fn user_message(&self) -> String {
        self.kind().user_message(self)
    }
}

pub type Result<T> = std::result::Result<T, RulewardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_name_the_reason() {
        let err = RulewardError::validation("port_range", "'abc' is not a port");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.user_message(),
            "rule rejected: invalid port_range: 'abc' is not a port"
        );
    }

    #[test]
    fn infrastructure_errors_hide_details() {
        let err = RulewardError::SnapshotTimeout {
            plan: Uuid::nil(),
            timeout: Duration::from_millis(10),
        };
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert_eq!(err.user_message(), "evaluation temporarily unavailable");
    }

    #[test]
    fn missing_plan_is_not_found() {
        let err = RulewardError::PlanNotFound {
            plan: "web-tier".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.user_message().contains("web-tier"));
    }
}
