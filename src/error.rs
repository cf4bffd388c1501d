use Error::*;

use reqwest::StatusCode;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    #[error("request to remote api failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("remote api answered '{status}' for '{path}'")]
    Status { path: String, status: StatusCode },

    #[error("cannot decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid api url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("cannot access preferences: {0}")]
    Preferences(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("operation was cancelled")]
    Cancelled,

    #[error("profile has not been loaded yet")]
    ProfileNotLoaded,

    #[error("cannot load nfts of the cart: {}", failed.join(", "))]
    PartialCart { failed: Vec<String> },
}

/// Coarse classification used by presenters to pick a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Unknown,
}

impl Error {
    pub fn status(path: &str, status: StatusCode) -> Error {
        Error::Status {
            path: path.to_owned(),
            status,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Transport(_) | Status { .. } | Decode(_) | PartialCart { .. } => ErrorKind::Network,
            _ => ErrorKind::Unknown,
        }
    }
}

/// What the user sees when an operation fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorModel {
    pub message: &'static str,
    pub action: Option<&'static str>,
}

impl ErrorModel {
    pub fn retryable(kind: ErrorKind) -> Self {
        Self {
            message: Self::message(kind),
            action: Some("Retry"),
        }
    }

    pub fn notice(kind: ErrorKind) -> Self {
        Self {
            message: Self::message(kind),
            action: None,
        }
    }

    fn message(kind: ErrorKind) -> &'static str {
        match kind {
            ErrorKind::Network => "A network error occurred",
            ErrorKind::Unknown => "An unknown error occurred",
        }
    }
}
