use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to the inference server.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Ollama request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ollama error: {status} - {body}")]
    UpstreamStatus {
        status: StatusCode,
        body: String,
    },
}

/// Failures reading or writing the persisted conversation collection.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored history is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),

    #[error("failed to encode history: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("redis history error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Rejected mutations on the conversation collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("conversation '{0}' not found")]
    ConversationNotFound(String),

    #[error("message '{0}' not found")]
    MessageNotFound(String),

    #[error("conversation '{0}' already has a streaming message")]
    AlreadyStreaming(String),

    #[error("message '{0}' is no longer streaming")]
    MessageSealed(String),

    #[error("message id '{0}' is already in use")]
    DuplicateMessageId(String),
}

/// Failures while a session consumes the relay stream.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("relay responded with {0}")]
    Status(StatusCode),

    #[error("relay reported an error: {0}")]
    Relay(String),

    #[error("relay stream ended before completion")]
    Incomplete,

    #[error(transparent)]
    Store(#[from] StoreError),
}
