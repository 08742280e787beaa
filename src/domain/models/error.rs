use thiserror::Error;

/// Failure kinds the chat core distinguishes. None of them are fatal, each one
/// degrades to a visible state the user can recover from.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("the backend failed: {0}")]
    Backend(String),

    #[error("stored sessions could not be parsed: {0}")]
    PersistedStateCorrupt(String),

    #[error("no session found for id {0}")]
    UnknownSessionId(String),

    #[error("a response is already being revealed for message {0}")]
    RevealInProgress(String),

    #[error("{0}")]
    InvalidAttachment(String),

    #[error("a session title can't be empty")]
    EmptyTitle,
}
