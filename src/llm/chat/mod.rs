pub mod ollama;

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use crate::error::LlmError;
use crate::models::chat::ChatTurn;
use crate::models::relay::GenerateChunk;
use self::ollama::OllamaClient;
use super::LlmConfig;

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<GenerateChunk, LlmError>> + Send>>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Starts a streaming generation. A non-success status fails here;
    /// read errors arrive as `Err` items on the stream.
    async fn stream_generate(&self, prompt: &str) -> Result<ChunkStream, LlmError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Arc<dyn ChatClient> {
    Arc::new(OllamaClient::from_config(config))
}

/// Flattens the conversation into the plain-text prompt the model sees.
pub fn build_prompt(turns: &[ChatTurn]) -> String {
    let mut prompt = turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role.prompt_label(), turn.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    prompt.push_str("\n\nAssistant:");
    prompt
}
