use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("cannot {action} {entity} {id}: current state is {state}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        action: &'static str,
        state: String,
    },

    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("{entity} {id} changed concurrently: expected {expected}")]
    Conflict {
        entity: &'static str,
        id: String,
        expected: String,
    },

    #[error("{operation} failed at step {step} ({description}); rolled back: {rolled_back}")]
    StepFailed {
        operation: &'static str,
        step: u8,
        description: &'static str,
        rolled_back: bool,
        #[source]
        source: Box<RosterError>,
    },

    #[error("no volunteer is logged in")]
    NotLoggedIn,

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Backend returned {status}: {message}")]
    BackendError { status: u16, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The requested state change is not allowed from the current state.
    Domain,
    /// A concurrent writer got there first; refresh and decide again.
    Concurrency,
    /// The backing store could not be reached or answered with an error.
    Backend,
    Configuration,
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RosterError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, id: impl ToString, expected: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            id: id.to_string(),
            expected: expected.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } | Self::InvalidTransition { .. } | Self::Forbidden { .. } => {
                ErrorCategory::Domain
            }
            Self::Conflict { .. } => ErrorCategory::Concurrency,
            Self::StepFailed { .. }
            | Self::ApiError(_)
            | Self::BackendError { .. }
            | Self::IoError(_)
            | Self::SerializationError(_) => ErrorCategory::Backend,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::NotLoggedIn => ErrorCategory::Session,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotFound { .. }
            | Self::InvalidTransition { .. }
            | Self::Forbidden { .. }
            | Self::NotLoggedIn => ErrorSeverity::High,
            Self::Conflict { .. } | Self::ApiError(_) | Self::BackendError { .. } => {
                ErrorSeverity::Medium
            }
            // A half-applied operation that could not be undone needs a human.
            Self::StepFailed { rolled_back, .. } => {
                if *rolled_back {
                    ErrorSeverity::Medium
                } else {
                    ErrorSeverity::Critical
                }
            }
            Self::IoError(_) | Self::SerializationError(_) => ErrorSeverity::Critical,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorSeverity::High,
        }
    }

    /// True when the caller should refresh its view before trying again.
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::StepFailed { source, .. } => source.is_conflict(),
            _ => false,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::NotFound { entity, .. } => format!("That {} no longer exists.", entity),
            Self::InvalidTransition { action, state, .. } => {
                format!("You can't {} right now (it is already {}).", action, state)
            }
            Self::Forbidden { reason } => format!("Not allowed: {}.", reason),
            Self::Conflict { entity, .. } if *entity == "swap request" => {
                "Someone else already took this shift.".to_string()
            }
            Self::Conflict { .. } => {
                "Someone else updated this shift at the same time.".to_string()
            }
            Self::StepFailed {
                operation,
                rolled_back: true,
                ..
            } => format!("{} did not go through; nothing was changed.", operation),
            Self::StepFailed { operation, .. } => format!(
                "{} only partly went through and could not be undone.",
                operation
            ),
            Self::NotLoggedIn => "Please log in with your roll number first.".to_string(),
            Self::ApiError(_) | Self::BackendError { .. } => {
                "The schedule service is not responding properly.".to_string()
            }
            Self::IoError(e) => format!("Local file problem: {}", e),
            Self::SerializationError(_) => "Received data in an unexpected format.".to_string(),
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => format!("Configuration problem: {}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self.category() {
            ErrorCategory::Domain => "Refresh the routine or marketplace and check the shift's current state".to_string(),
            ErrorCategory::Concurrency => "Refresh the view; the shift was changed by another volunteer".to_string(),
            ErrorCategory::Session => "Run `roster login <ROLL_NUMBER>`".to_string(),
            ErrorCategory::Configuration => "Check roster.toml and the SUPABASE_* environment variables".to_string(),
            ErrorCategory::Backend => match self {
                Self::StepFailed {
                    rolled_back: false, ..
                } => "Ask a coordinator to fix the shift and swap rows by hand".to_string(),
                _ => "Check the network connection and backend status, then try again".to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn step_failed(rolled_back: bool, source: RosterError) -> RosterError {
        RosterError::StepFailed {
            operation: "accept_swap",
            step: 2,
            description: "reassign shift instance",
            rolled_back,
            source: Box::new(source),
        }
    }

    #[test]
    fn test_conflict_is_distinct_from_invalid_transition() {
        let conflict = RosterError::conflict("swap request", 7, "status open");
        let invalid = RosterError::InvalidTransition {
            entity: "swap request",
            id: "7".into(),
            action: "claim",
            state: "completed".into(),
        };

        assert!(conflict.is_conflict());
        assert!(!invalid.is_conflict());
        assert_eq!(conflict.category(), ErrorCategory::Concurrency);
        assert_eq!(invalid.category(), ErrorCategory::Domain);
        assert_eq!(
            conflict.user_friendly_message(),
            "Someone else already took this shift."
        );
    }

    #[test]
    fn test_step_failed_severity_depends_on_rollback() {
        let backend = || RosterError::BackendError {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(step_failed(true, backend()).severity(), ErrorSeverity::Medium);
        assert_eq!(step_failed(false, backend()).severity(), ErrorSeverity::Critical);
        assert!(step_failed(true, RosterError::conflict("shift instance", 1, "x")).is_conflict());
    }

    #[test]
    fn test_step_failed_reports_step() {
        let err = step_failed(true, RosterError::not_found("shift instance", 1));
        let text = err.to_string();
        assert!(text.contains("accept_swap"));
        assert!(text.contains("step 2"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
