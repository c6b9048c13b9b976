use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{ Path, PathBuf };
use crate::chat::collection::ConversationCollection;
use crate::error::HistoryError;
use crate::history::{ decode, encode, HistoryStore };

/// Keeps the collection in one JSON file. Writes go to a sibling temp file
/// that is then renamed over the target.
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn load(&self) -> Result<Option<ConversationCollection>, HistoryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => decode(&raw).map(Some),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(HistoryError::Io(e)),
        }
    }

    async fn save(&self, chats: &ConversationCollection) -> Result<(), HistoryError> {
        let json = encode(chats)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, json).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), HistoryError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HistoryError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path().join("chats.json"));
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHistoryStore::new(dir.path().join("nested").join("chats.json"));

        let mut chats = ConversationCollection::new();
        let id = chats.create_conversation();
        chats.begin_exchange(&id, "hello").unwrap();
        store.save(&chats).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, chats);
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported_and_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chats.json");
        std::fs::write(&path, "{\"oops\":").unwrap();
        let store = FileHistoryStore::new(&path);

        assert!(matches!(store.load().await, Err(HistoryError::Corrupt(_))));
        store.clear().await.unwrap();
        assert!(!path.exists());
        store.clear().await.unwrap();
    }
}
