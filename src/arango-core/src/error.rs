/// Errors surfaced by every client operation
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid direction '{0}': expected one of in, out, any")]
    InvalidDirection(String),

    #[error("Referenced document does not exist: {0}")]
    InvalidReference(String),

    #[error("Resultset is empty")]
    EmptyResult,

    #[error("Key not found in body: {0}")]
    KeyNotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote store error: {status} - {message}")]
    RemoteStore {
        status: u16,
        error_num: Option<u32>,
        message: String,
    },

    #[error("Invalid document handle: {0}")]
    InvalidHandle(String),

    #[error("Invalid collection name: {0}")]
    InvalidCollectionName(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Status code reported by the store, if this error came from one
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::RemoteStore { status, .. } => Some(*status),
            Error::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the store answered 404 for the target
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_)) || self.status() == Some(404)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
