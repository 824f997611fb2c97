use thiserror::Error;

/// Failures surfaced by the console core. None of them is fatal: the caller
/// reports the failure and the user may retry the triggering action.
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// Client-side checks, or a payload the backend rejected as invalid.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Transport error or non-2xx response on a read.
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// Transport error or non-2xx response on create/update/delete.
    #[error("Mutation failed: {0}")]
    MutationFailed(String),

    /// Login or registration rejected.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Not logged in")]
    AuthRequired,

    #[error("A save is already in progress")]
    SaveInProgress,

    #[error("Export error: {0}")]
    Export(String),

    #[error("Session storage error: {0}")]
    SessionStorage(#[from] std::io::Error),
}
