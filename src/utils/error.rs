use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlockError {
    #[error("IO error on {path}: {source}")]
    FileIoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to acquire {mode} lock on {path}: {source}")]
    LockError {
        path: PathBuf,
        mode: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File {path} is opened {mode}: {message}")]
    AccessModeError {
        path: PathBuf,
        mode: String,
        message: String,
    },

    #[error("File {path} is not open")]
    NotOpenError { path: PathBuf },

    #[error("Background task failed: {0}")]
    TaskError(#[from] tokio::task::JoinError),

    #[error("Invalid permission mode '{value}': {reason}")]
    InvalidModeError { value: String, reason: String },

    #[error("System call failed: {0}")]
    SystemError(#[from] nix::Error),

    #[error("Unknown user id {uid}")]
    UserLookupError { uid: u32 },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    FileSystem,
    Locking,
    Permissions,
    Configuration,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FlockError {
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FlockError::FileIoError {
            path: path.into(),
            source,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            FlockError::FileIoError { .. } => ErrorCategory::FileSystem,
            FlockError::LockError { .. }
            | FlockError::AccessModeError { .. }
            | FlockError::NotOpenError { .. }
            | FlockError::TaskError(_) => ErrorCategory::Locking,
            FlockError::InvalidModeError { .. }
            | FlockError::SystemError(_)
            | FlockError::UserLookupError { .. } => ErrorCategory::Permissions,
            FlockError::SerializationError(_) => ErrorCategory::Output,
            FlockError::ConfigValidationError { .. }
            | FlockError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Output => ErrorSeverity::Low,
            ErrorCategory::Configuration => ErrorSeverity::Medium,
            ErrorCategory::FileSystem | ErrorCategory::Locking => ErrorSeverity::High,
            ErrorCategory::Permissions => ErrorSeverity::Critical,
        }
    }

    /// 1 for processing failures, 2 for configuration, 3 for system-level ones.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low | ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            FlockError::FileIoError { path, source }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                format!("File not found: {}", path.display())
            }
            FlockError::FileIoError { path, source }
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                format!("Permission denied: {}", path.display())
            }
            FlockError::LockError { path, mode, .. } => {
                format!("Could not take a {} lock on {}", mode, path.display())
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            FlockError::FileIoError { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                "Create the file first, for example with the `hold` command"
            }
            FlockError::FileIoError { .. } => "Check that the path exists and is accessible",
            FlockError::LockError { .. } => {
                "Make sure the filesystem supports flock (local filesystems do, some network mounts do not)"
            }
            FlockError::AccessModeError { .. } => "Reopen the file with the required access mode",
            FlockError::NotOpenError { .. } => "Acquire the lock before working on the file",
            FlockError::TaskError(_) => "Rerun with --verbose to see where the task stopped",
            FlockError::InvalidModeError { .. } => {
                "Use an octal mode such as 0644 or a symbolic one such as rw-r--r--"
            }
            FlockError::SystemError(_) | FlockError::UserLookupError { .. } => {
                "Changing owner or group usually requires elevated privileges"
            }
            FlockError::SerializationError(_) => "Retry with --format text",
            FlockError::ConfigValidationError { .. }
            | FlockError::InvalidConfigValueError { .. } => {
                "Fix the configuration file or command line flags"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, FlockError>;
