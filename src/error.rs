use thiserror::Error;

/// Exit status used when a privileged command exits non-zero.
pub const COMMAND_FAILED_EXIT: i32 = 3;

/// Exit status used when a startup or stage-entry precondition is not met.
pub const PRECONDITION_EXIT: i32 = 2;

#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command '{0}' failed with exit code {1}")]
    CommandFailed(String, i32),

    #[error("Command '{0}' could not be started: {1}")]
    CommandSpawn(String, std::io::Error),

    #[error("Refusing to run an empty command ({0})")]
    EmptyCommand(String),

    #[error("Installation cancelled by user")]
    Cancelled,

    #[error("This installer must be run as root (sudo)")]
    NotRoot,

    #[error("Configuration document {0} is missing")]
    MissingResumeConfig(String),

    #[error("Configuration is incomplete: '{0}' has not been set")]
    Incomplete(&'static str),

    #[error("Invalid {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("Network probe tool failed: {0}")]
    ProbeTool(String),

    #[error("{0} is not implemented yet")]
    NotImplemented(String),

    #[error("Configuration document is malformed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("Could not set up logging: {0}")]
    Logging(String),
}

impl InstallerError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            InstallerError::CommandFailed(..) | InstallerError::CommandSpawn(..) => {
                COMMAND_FAILED_EXIT
            }
            InstallerError::NotRoot | InstallerError::MissingResumeConfig(_) => {
                PRECONDITION_EXIT
            }
            _ => 1,
        }
    }

    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        InstallerError::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_failure_has_distinguished_exit_code() {
        let err = InstallerError::CommandFailed("pacstrap".into(), 1);
        assert_eq!(err.exit_code(), COMMAND_FAILED_EXIT);
        assert_ne!(err.exit_code(), 0);
        assert_ne!(InstallerError::Cancelled.exit_code(), COMMAND_FAILED_EXIT);
    }

    #[test]
    fn preconditions_exit_before_any_stage() {
        assert_eq!(InstallerError::NotRoot.exit_code(), PRECONDITION_EXIT);
        assert_eq!(
            InstallerError::MissingResumeConfig("/root/install_config.json".into()).exit_code(),
            PRECONDITION_EXIT
        );
    }

    #[test]
    fn display_names_field_and_reason() {
        let err = InstallerError::invalid("hostname", "empty label");
        assert_eq!(err.to_string(), "Invalid hostname: empty label");
    }
}
