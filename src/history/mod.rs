mod file;
mod memory;
mod redis;

pub use self::file::FileHistoryStore;
pub use self::memory::MemoryHistoryStore;
pub use self::redis::RedisHistoryStore;

use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use crate::chat::collection::ConversationCollection;
use crate::cli::ChatArgs;
use crate::error::HistoryError;

/// Persistence for the whole conversation collection, stored as one JSON blob.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet; `Err(Corrupt)` when the
    /// stored blob does not parse.
    async fn load(&self) -> Result<Option<ConversationCollection>, HistoryError>;

    async fn save(&self, chats: &ConversationCollection) -> Result<(), HistoryError>;

    async fn clear(&self) -> Result<(), HistoryError>;
}

pub fn create_history_store(args: &ChatArgs) -> Result<Arc<dyn HistoryStore>, HistoryError> {
    match args.history_type.to_lowercase().as_str() {
        "file" => Ok(Arc::new(FileHistoryStore::new(&args.history_path))),
        "redis" => {
            let store = RedisHistoryStore::new(&args.history_host, &args.history_redis_key)?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryHistoryStore::new())),
        _ =>
            Err(
                HistoryError::Io(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", args.history_type)
                    )
                )
            ),
    }
}

pub fn initialize_history_store(args: &ChatArgs) -> Result<Arc<dyn HistoryStore>, HistoryError> {
    let location = match args.history_type.to_lowercase().as_str() {
        "file" => args.history_path.as_str(),
        "redis" => args.history_host.as_str(),
        _ => "process memory",
    };
    info!("Chat history will be stored in: {} at {}", args.history_type, location);
    create_history_store(args)
}

pub(crate) fn decode(raw: &str) -> Result<ConversationCollection, HistoryError> {
    serde_json::from_str(raw).map_err(HistoryError::Corrupt)
}

pub(crate) fn encode(chats: &ConversationCollection) -> Result<String, HistoryError> {
    serde_json::to_string(chats).map_err(HistoryError::Encode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(history_type: &str) -> ChatArgs {
        ChatArgs {
            relay_url: "http://127.0.0.1:3000".into(),
            history_type: history_type.into(),
            history_path: "chats.json".into(),
            history_host: "redis://127.0.0.1:6379".into(),
            history_redis_key: "chats".into(),
        }
    }

    #[test]
    fn unknown_store_type_is_rejected() {
        assert!(matches!(create_history_store(&args("sqlite")), Err(HistoryError::Io(_))));
    }

    #[test]
    fn known_store_types_are_created() {
        assert!(create_history_store(&args("memory")).is_ok());
        assert!(create_history_store(&args("FILE")).is_ok());
        // Opening a redis client does not connect yet.
        assert!(create_history_store(&args("redis")).is_ok());
    }

    #[test]
    fn decode_reports_corruption() {
        assert!(matches!(decode("{not json"), Err(HistoryError::Corrupt(_))));
        assert!(decode("[]").unwrap().is_empty());
    }
}
