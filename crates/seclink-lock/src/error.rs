use std::time::Duration;

/// Errors from channel lock acquisition.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// The lock did not become available in time.
    #[error("lock {name} not acquired within {timeout:?}")]
    LockTimeout { name: String, timeout: Duration },

    /// The lock primitive itself failed.
    #[error("lock {name} failed: {source}")]
    LockFailure {
        name: String,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, LockError>;
