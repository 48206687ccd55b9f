use thiserror::Error;

/// Failure talking to a key-value backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key-value store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("key-value store returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("key-value store rejected command: {0}")]
    Command(String),

    #[error("unexpected key-value store reply: {0}")]
    Protocol(String),

    #[error("failed to initialize key-value store runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Failure of a share or rehydrate cycle.
#[derive(Debug, Error)]
pub enum ShareError {
    #[error("failed to serialize session snapshot: {source}")]
    Serialize {
        #[source]
        source: serde_json::Error,
    },

    #[error("shared session '{key}' is missing or expired")]
    NotFound { key: String },

    #[error("shared session '{key}' is not a valid record: {source}")]
    InvalidRecord {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("shared session '{key}' has unsupported version {found}; expected {expected}")]
    UnsupportedVersion { key: String, found: u32, expected: u32 },

    #[error("shared session record stored under '{key}' claims key '{found}'")]
    KeyMismatch { key: String, found: String },

    #[error("shared session store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("failed to format current UTC timestamp as RFC3339: {0}")]
    ClockFormat(#[source] time::error::Format),
}

impl ShareError {
    #[must_use]
    pub fn serialize(source: serde_json::Error) -> Self {
        Self::Serialize { source }
    }

    #[must_use]
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    #[must_use]
    pub fn invalid_record(key: impl Into<String>, source: serde_json::Error) -> Self {
        Self::InvalidRecord {
            key: key.into(),
            source,
        }
    }

    /// True when the store itself could not be reached or used.
    #[must_use]
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
