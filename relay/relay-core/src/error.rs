use std::path::PathBuf;
use thiserror::Error;

/// Missing or invalid startup parameters. Raised before any network activity.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// A failure talking to the topic network.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("topic {0} does not exist")]
    TopicNotFound(String),

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("subscription stream closed")]
    StreamClosed,
}

/// A payload that could not be encoded or decoded.
#[derive(Debug, Error)]
#[error("serialization error: {0}")]
pub struct CodecError(#[from] pub serde_json::Error);

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("ledger I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Topic or identity provisioning failed; the run cannot proceed.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to create topic: {0}")]
    Topic(#[source] NetworkError),

    #[error("failed to provision bridge account: {0}")]
    Account(#[source] NetworkError),

    #[error("failed to subscribe to topic {topic}: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: NetworkError,
    },
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Encode(#[from] CodecError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}
