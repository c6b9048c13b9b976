use async_trait::async_trait;
use tokio::sync::Mutex;
use crate::chat::collection::ConversationCollection;
use crate::error::HistoryError;
use crate::history::{ decode, encode, HistoryStore };

/// Process-local store. Holds the serialized blob, not the live collection,
/// so it behaves like the other backends (including on corrupt data).
#[derive(Default)]
pub struct MemoryHistoryStore {
    raw: Mutex<Option<String>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with an arbitrary stored blob.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self { raw: Mutex::new(Some(raw.into())) }
    }

    pub async fn raw(&self) -> Option<String> {
        self.raw.lock().await.clone()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn load(&self) -> Result<Option<ConversationCollection>, HistoryError> {
        self.raw.lock().await.as_deref().map(decode).transpose()
    }

    async fn save(&self, chats: &ConversationCollection) -> Result<(), HistoryError> {
        let json = encode(chats)?;
        *self.raw.lock().await = Some(json);
        Ok(())
    }

    async fn clear(&self) -> Result<(), HistoryError> {
        *self.raw.lock().await = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_until_saved() {
        let store = MemoryHistoryStore::new();
        assert!(store.load().await.unwrap().is_none());

        let mut chats = ConversationCollection::new();
        let id = chats.create_conversation();
        store.save(&chats).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert!(loaded.contains(&id));
    }

    #[tokio::test]
    async fn corrupt_blob_then_clear() {
        let store = MemoryHistoryStore::with_raw("not json");
        assert!(matches!(store.load().await, Err(HistoryError::Corrupt(_))));
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
