use std::time::Duration;

use thiserror::Error;

/// Pass-level errors raised by the janitor.
///
/// Per-VM failures never surface here; they are recorded in the pass result
/// as [`crate::outcome::VmActionError`] values instead.
#[derive(Error, Debug)]
pub enum JanitorError {
    /// The inventory for a location could not be listed
    #[error("couldn't list VMs at '{location}': {source}")]
    Inventory {
        location: String,
        #[source]
        source: VsphereError,
    },

    /// The pass was cancelled before inventory was retrieved
    #[error("cleanup of '{location}' was cancelled")]
    Cancelled { location: String },
}

/// Result type alias for janitor operations
pub type JanitorResult<T> = Result<T, JanitorError>;

/// Errors from the vSphere inventory client.
#[derive(Error, Debug)]
pub enum VsphereError {
    #[error("vSphere URL is invalid: {0}")]
    InvalidUrl(String),

    #[error("vSphere login failed: {0}")]
    Login(String),

    #[error("network request failed: {0}")]
    Network(String),

    #[error("HTTP error {status} from {endpoint}: {message}")]
    Http {
        status: u16,
        endpoint: String,
        message: String,
    },

    #[error("couldn't decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("couldn't find VM folder '{0}'")]
    FolderNotFound(String),

    #[error("VM folder '{path}' is not a folder but a {kind}")]
    NotAFolder { path: String, kind: String },

    #[error("task {task} failed: {message}")]
    TaskFailed { task: String, message: String },

    #[error("task {task} did not finish within {timeout:?}")]
    TaskTimeout { task: String, timeout: Duration },

    /// Catch-all used by test doubles and non-vSphere listers
    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for VsphereError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            VsphereError::Http {
                status: status.as_u16(),
                endpoint: err.url().map(ToString::to_string).unwrap_or_default(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            VsphereError::Decode {
                endpoint: err.url().map(ToString::to_string).unwrap_or_default(),
                reason: err.to_string(),
            }
        } else {
            VsphereError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for VsphereError {
    fn from(err: url::ParseError) -> Self {
        VsphereError::InvalidUrl(err.to_string())
    }
}
