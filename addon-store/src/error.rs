use thiserror::Error as ThisError;

/// Failure reported by the backend process for a single request.
///
/// The message is carried verbatim so that every observer of a rejected
/// handle sees exactly what the backend said.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<&str> for BackendError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for BackendError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Errors surfaced by the addon store.
///
/// `Clone` because a rejected handle hands the same error to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum Error {
    #[error("backend request `{request}` failed: {source}")]
    Backend {
        request: &'static str,
        #[source]
        source: BackendError,
    },
    #[error("backend request `{request}` returned an unexpected payload: {message}")]
    Decode {
        request: &'static str,
        message: String,
    },
    #[error("task settling the handle panicked: {0}")]
    Panicked(String),
    #[error("push events are already being reconciled for this store")]
    AlreadySubscribed,
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
