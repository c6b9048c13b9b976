use async_trait::async_trait;
use crate::chat::collection::ConversationCollection;
use crate::error::HistoryError;
use crate::history::{ decode, encode, HistoryStore };
use log::warn;
use redis::aio::MultiplexedConnection;
use redis::{ AsyncCommands, Client, RedisResult };
use tokio::sync::Mutex;

/// Keeps the collection under a single Redis key.
///
/// One multiplexed connection is opened lazily and shared by every call.
/// It is dropped when Redis reports the link as gone, so the next call
/// reconnects.
pub struct RedisHistoryStore {
    client: Client,
    key: String,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisHistoryStore {
    pub fn new(host: &str, key: &str) -> Result<Self, HistoryError> {
        Ok(Self {
            client: Client::open(host)?,
            key: key.to_string(),
            conn: Mutex::new(None),
        })
    }

    async fn get_connection(&self) -> RedisResult<MultiplexedConnection> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self.client.get_multiplexed_async_connection().await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn checked<T>(&self, result: RedisResult<T>) -> Result<T, HistoryError> {
        if let Err(e) = &result {
            if e.is_connection_dropped() || e.is_io_error() {
                warn!("Redis connection lost, reconnecting on next call: {}", e);
                *self.conn.lock().await = None;
            }
        }
        Ok(result?)
    }
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    async fn load(&self) -> Result<Option<ConversationCollection>, HistoryError> {
        let mut conn = self.get_connection().await?;
        let raw: Option<String> = self.checked(conn.get(&self.key).await).await?;
        raw.as_deref().map(decode).transpose()
    }

    async fn save(&self, chats: &ConversationCollection) -> Result<(), HistoryError> {
        let json = encode(chats)?;
        let mut conn = self.get_connection().await?;
        let _: () = self.checked(conn.set(&self.key, json).await).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), HistoryError> {
        let mut conn = self.get_connection().await?;
        let _: i64 = self.checked(conn.del(&self.key).await).await?;
        Ok(())
    }
}
