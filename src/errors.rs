//! Settings Synchronization Error Hierarchy
//!
//! Defines the error types raised while talking to the coordination store,
//! decoding configuration keys and values, and resolving settings.
//! Errors are grouped by the layer that produces them so callers can decide
//! which ones are fatal to a batch, which ones are retried and which ones are
//! only logged.

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Crate configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Coordination store failures (network, protocol, missing keys)
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Key/value codec failures
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A leaf carried a value that could not be decoded.
    /// Fatal to the batch the leaf belongs to.
    #[error(transparent)]
    InvalidValue(#[from] InvalidValueError),

    /// No settings tier defines the requested identifier
    #[error("Setting not found: {0}")]
    NotFound(String),

    /// A resolved setting does not deserialize into the requested type
    #[error("Setting '{identifier}' has an unexpected shape: {source}")]
    Conversion {
        identifier: String,
        #[source]
        source: serde_json::Error,
    },

    /// A watch loop is already running for this path
    #[error("A watch is already active for path '{0}'")]
    WatchAlreadyActive(String),

    /// Dev parameters could not be loaded
    #[error("Failed to load dev params: {0}")]
    DevParams(String),

    /// Background task panicked or was aborted
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// True for the long-poll timeout classification used by watch loops.
    pub fn is_store_timeout(&self) -> bool {
        matches!(self, Error::Store(e) if e.is_timeout())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Long-poll window elapsed without any change
    #[error("Watch on '{path}' timed out after {duration:?}")]
    Timeout { path: String, duration: Duration },

    /// Key or directory does not exist (etcd errorCode 100)
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The requested watch index is older than the retained history
    /// (etcd errorCode 401). `index` is the store's current index.
    #[error("Event index cleared, store is at index {index}")]
    IndexCleared { index: u64 },

    /// Store unreachable
    #[error("Connection to store failed: {0}")]
    Connection(String),

    /// Store answered with an error body
    #[error("Store error {code}: {message} ({cause})")]
    Api {
        code: u32,
        message: String,
        cause: String,
    },

    /// Store answered with something that is not a valid response
    #[error("Invalid store response: {0}")]
    InvalidResponse(String),

    /// HTTP transport failures not covered above
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl StoreError {
    /// Timeouts are the expected outcome of a quiet long-poll window.
    pub fn is_timeout(&self) -> bool {
        matches!(self, StoreError::Timeout { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Store path does not have the `{prefix}/(extensions/)?{scope}/{key}` shape.
    /// Usually a directory node rather than a leaf.
    #[error("Malformed config key: '{key}'")]
    MalformedKey { key: String },

    #[error(transparent)]
    ValueDecode(#[from] ValueDecodeError),

    #[error("Failed to encode config value: {0}")]
    ValueEncode(#[from] serde_json::Error),
}

/// Raw store value that is not a valid encoded config value
#[derive(Debug, thiserror::Error)]
#[error("{cause}")]
pub struct ValueDecodeError {
    pub raw: String,
    #[source]
    pub cause: DecodeFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeFailure {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Unsupported custom type '{0}'")]
    UnknownCustomType(String),

    #[error("Invalid timestamp '{value}': {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Custom type '{0}' is missing a string 'value'")]
    MissingCustomValue(String),
}

/// A leaf value failed to decode while processing a store response
#[derive(Debug, thiserror::Error)]
#[error("Invalid value for key '{key}'. Raising '{cause}', because of value: '{raw_value}'")]
pub struct InvalidValueError {
    pub key: String,
    pub raw_value: String,
    #[source]
    pub cause: ValueDecodeError,
}
