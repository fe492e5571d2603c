//! Error types for `QuickLaunch`
//!
//! This module defines all error types used throughout the application,
//! providing clear error messages and proper error propagation.
//!
//! Error variants use `#[source]` to preserve error chains for better
//! observability and debugging.

use thiserror::Error;

/// Simple error type for wrapping string messages while implementing `std::error::Error`
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StringError(pub String);

impl StringError {
    /// Create a new `StringError` from a string message
    pub fn new(msg: impl Into<String>) -> Box<Self> {
        Box::new(Self(msg.into()))
    }
}

/// Main error type for `QuickLaunch`
#[derive(Debug, Error)]
pub enum QuickLaunchError {
    /// A tile or setting failed validation (duplicate id, blank required field, bad index)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No tile with the given id exists in the catalog
    #[error("Tile not found: {0}")]
    NotFound(String),

    /// The configuration document could not be durably written
    /// Preserves the underlying error source for full error chain transparency
    #[error("Failed to persist configuration: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Update check or download transport failure
    #[error("Network error: {source}")]
    Network {
        /// HTTP status code, when the server answered at all
        status: Option<u16>,
        /// Underlying transport or protocol error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Malformed semantic version string
    #[error("Invalid version: {0}")]
    VersionParse(#[from] semver::Error),

    /// The update lifecycle does not allow this trigger in its current state
    #[error("Cannot {action} while update status is {status}")]
    InvalidState {
        /// Requested trigger (e.g. "download")
        action: &'static str,
        /// Status name at the time of the request
        status: &'static str,
    },

    /// An operation of the same kind is already running
    #[error("{0} already in progress")]
    OperationInProgress(&'static str),

    /// The operation was cancelled before it completed
    #[error("Operation cancelled")]
    Cancelled,

    /// The downloaded update artifact did not match its advertised size or digest
    #[error("Update verification failed: {0}")]
    VerificationFailed(String),

    /// The remote source reported no newer release
    #[error("No update available")]
    NoUpdateAvailable,

    /// A verified update could not be put in place of the running executable
    #[error("Failed to install update: {0}")]
    Install(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The log file or the global tracing subscriber could not be set up
    #[error("Failed to initialize logging: {0}")]
    Logging(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Failed to read or change the start-at-login entry
    /// Preserves the underlying error source for full error chain transparency
    #[error("Auto-start error: {0}")]
    AutoStart(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An external collaborator (executor, folder picker) failed
    #[error("Action failed: {0}")]
    Collaborator(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl QuickLaunchError {
    /// Wrap a transport error, keeping the HTTP status if the server answered
    pub fn network(status: Option<u16>, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Network {
            status,
            source: source.into(),
        }
    }
}

/// Result type alias for `QuickLaunch` operations
pub type Result<T> = std::result::Result<T, QuickLaunchError>;

/// Convert an error to a user-friendly message
///
/// This function takes a `QuickLaunchError` and returns a message suitable
/// for displaying to end users in the settings view or a notification.
pub fn get_user_friendly_error(error: &QuickLaunchError) -> String {
    match error {
        QuickLaunchError::Validation(reason) => {
            format!("The tile could not be saved:\n\n{reason}")
        }
        QuickLaunchError::NotFound(id) => format!(
            "The tile \"{id}\" no longer exists.\n\n\
             It may have been removed in another window."
        ),
        QuickLaunchError::Persistence(_) => "Failed to save configuration.\n\n\
             Your change was not applied.\n\
             Check that you have write permissions to the QuickLaunch\n\
             configuration folder and that the disk is not full."
            .to_string(),
        QuickLaunchError::Network { .. } => "Network error.\n\n\
             Please check your internet connection and try again."
            .to_string(),
        QuickLaunchError::VersionParse(e) => {
            format!("The release version could not be read:\n\n{e}")
        }
        QuickLaunchError::InvalidState { action, status } => {
            format!("Cannot {action} right now (update status: {status}).")
        }
        QuickLaunchError::OperationInProgress(what) => {
            format!("{what} is already running. Please wait for it to finish.")
        }
        QuickLaunchError::Cancelled => "The operation was cancelled.".to_string(),
        QuickLaunchError::VerificationFailed(_) => "The downloaded update is damaged.\n\n\
             It was discarded. Please try again later."
            .to_string(),
        QuickLaunchError::NoUpdateAvailable => "No update available.".to_string(),
        QuickLaunchError::Install(e) => format!(
            "The update could not be installed:\n\n{e}\n\n\
             The current version was kept. Check that you have write\n\
             permissions to the folder QuickLaunch is installed in."
        ),
        QuickLaunchError::Logging(e) => format!("Logging could not be started:\n\n{e}"),
        QuickLaunchError::AutoStart(e) => format!(
            "Failed to change the start-at-login setting:\n\n{e}"
        ),
        QuickLaunchError::Collaborator(e) => format!("The action could not be started:\n\n{e}"),
        QuickLaunchError::IoError(e) => {
            format!(
                "A file system error occurred:\n\n{e}\n\n\
                 Please check file permissions and disk space."
            )
        }
        QuickLaunchError::JsonError(e) => {
            format!(
                "Configuration file is corrupted:\n\n{e}\n\n\
                 The application will use default settings."
            )
        }
    }
}
