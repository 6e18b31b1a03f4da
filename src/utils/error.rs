use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Source request '{scope}' failed: {message}")]
    SourceError { scope: String, message: String },

    #[error("Target call {function} failed ({errorcode}): {message}")]
    TargetError {
        function: String,
        errorcode: String,
        message: String,
    },

    #[error("Account '{username}' could not be created")]
    AccountCreationFailed { username: String },

    #[error("Module {code} has no course in the target store")]
    CourseNotResolved { code: String },

    #[error("Course {course_id} has no '{method}' enrolment instance")]
    NoEnrolmentInstance { course_id: i64, method: String },

    #[error("Enrolment plugin '{plugin}' is disabled for course {course_id}")]
    EnrolmentPluginDisabled { course_id: i64, plugin: String },

    #[error("Enrolment is forbidden for course {course_id}")]
    EnrolmentForbidden { course_id: i64 },

    #[error("Role '{role}' is not known to the target store")]
    UnknownRole { role: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Source,
    Target,
    Policy,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::HttpError(_) => ErrorCategory::Network,
            SyncError::IoError(_) => ErrorCategory::System,
            SyncError::SerializationError(_) | SyncError::SourceError { .. } => {
                ErrorCategory::Source
            }
            SyncError::ConfigError { .. }
            | SyncError::MissingConfigError { .. }
            | SyncError::InvalidConfigValueError { .. }
            | SyncError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            SyncError::TargetError { .. }
            | SyncError::AccountCreationFailed { .. }
            | SyncError::CourseNotResolved { .. } => ErrorCategory::Target,
            SyncError::NoEnrolmentInstance { .. }
            | SyncError::EnrolmentPluginDisabled { .. }
            | SyncError::EnrolmentForbidden { .. }
            | SyncError::UnknownRole { .. } => ErrorCategory::Policy,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 單一模組或成員的失敗不會中斷整個同步
            ErrorCategory::Policy => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Source | ErrorCategory::Target => {
                ErrorSeverity::Medium
            }
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            SyncError::HttpError(e) if e.is_timeout() => {
                "The remote service did not answer in time".to_string()
            }
            SyncError::HttpError(_) => "Could not reach a remote service".to_string(),
            SyncError::InvalidConfigValueError { field, reason, .. } => {
                format!("Option {} is invalid: {}", field, reason)
            }
            SyncError::MissingConfigError { field } => {
                format!("Option {} is required", field)
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check the endpoints in the configuration file and your network connection",
            ErrorCategory::Configuration => "Fix the configuration file or the command line options and run again",
            ErrorCategory::Source => "Verify that the Evento endpoint returns a JSON list",
            ErrorCategory::Target => "Verify the web service token and its allowed functions",
            ErrorCategory::Policy => "Enable the manual enrolment method for the affected course",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
