use crate::llm::chat::{ build_prompt, ChatClient };
use crate::models::chat::ChatTurn;
use crate::models::relay::RelayEvent;
use futures::StreamExt;
use log::{ debug, error, info, warn };
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub const INCOMPLETE_STREAM: &str = "upstream stream ended before completion";

/// Relays one chat request to the inference server.
///
/// The returned stream yields zero or more `Token` events followed by
/// exactly one terminal event (`Done` or `Error`), then ends. It ends
/// when the relay task drops its sender, which happens on every exit path.
pub fn relay_chat(client: Arc<dyn ChatClient>, turns: Vec<ChatTurn>) -> ReceiverStream<RelayEvent> {
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let prompt = build_prompt(&turns);
        info!("Relaying {} message(s) to model {}", turns.len(), client.get_model());

        let mut full_response = String::new();
        let mut tokens = 0usize;

        let terminal = match client.stream_generate(&prompt).await {
            Err(e) => {
                error!("Upstream request failed: {}", e);
                RelayEvent::error(e.to_string())
            }
            Ok(mut chunks) => {
                loop {
                    match chunks.next().await {
                        Some(Ok(chunk)) => {
                            if let Some(message) = chunk.error {
                                error!("Ollama reported an error: {}", message);
                                break RelayEvent::error(message);
                            }
                            if let Some(fragment) = chunk.response.filter(|r| !r.is_empty()) {
                                full_response.push_str(&fragment);
                                tokens += 1;
                                if tx.send(RelayEvent::token(fragment)).await.is_err() {
                                    warn!("Client went away after {} token(s)", tokens);
                                    return;
                                }
                            }
                            if chunk.done {
                                break RelayEvent::done(std::mem::take(&mut full_response));
                            }
                        }
                        Some(Err(e)) => {
                            error!("Upstream stream error: {}", e);
                            break RelayEvent::error(e.to_string());
                        }
                        None => {
                            warn!("{}", INCOMPLETE_STREAM);
                            break RelayEvent::error(INCOMPLETE_STREAM);
                        }
                    }
                }
            }
        };

        debug!("Relay finished after {} token(s)", tokens);
        if tx.send(terminal).await.is_err() {
            warn!("Client went away before the terminal event");
        }
    });

    ReceiverStream::new(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::chat::ChunkStream;
    use crate::models::chat::Role;
    use crate::models::relay::GenerateChunk;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    /// Replays a fixed script of upstream chunks and records the prompt.
    struct ScriptedClient {
        chunks: Vec<Result<GenerateChunk, LlmError>>,
        fail_status: Option<StatusCode>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn new(chunks: Vec<Result<GenerateChunk, LlmError>>) -> Arc<Self> {
            Arc::new(Self { chunks, fail_status: None, prompts: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn stream_generate(&self, prompt: &str) -> Result<ChunkStream, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if let Some(status) = self.fail_status {
                return Err(LlmError::UpstreamStatus { status, body: "boom".into() });
            }
            let items: Vec<_> = self.chunks
                .iter()
                .map(|c| match c {
                    Ok(chunk) => Ok(chunk.clone()),
                    Err(_) => Err(LlmError::UpstreamStatus {
                        status: StatusCode::BAD_GATEWAY,
                        body: "read failed".into(),
                    }),
                })
                .collect();
            Ok(Box::pin(futures::stream::iter(items)))
        }

        fn get_model(&self) -> String {
            "scripted".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    fn chunk(response: Option<&str>, done: bool) -> Result<GenerateChunk, LlmError> {
        Ok(GenerateChunk { response: response.map(str::to_string), done, error: None })
    }

    fn hello() -> Vec<ChatTurn> {
        vec![ChatTurn { role: Role::User, content: "hello".into() }]
    }

    async fn collect(client: Arc<ScriptedClient>) -> Vec<RelayEvent> {
        relay_chat(client, hello()).collect().await
    }

    #[tokio::test]
    async fn tokens_then_done_with_full_response() {
        let client = ScriptedClient::new(vec![chunk(Some("Hi"), false), chunk(Some(" there"), true)]);
        let events = collect(client.clone()).await;
        assert_eq!(
            events,
            vec![
                RelayEvent::token("Hi"),
                RelayEvent::token(" there"),
                RelayEvent::done("Hi there"),
            ]
        );
        assert_eq!(client.prompts.lock().unwrap()[0], "Human: hello\n\nAssistant:");
    }

    #[tokio::test]
    async fn empty_fragments_are_not_emitted() {
        let client = ScriptedClient::new(vec![chunk(Some(""), false), chunk(None, true)]);
        assert_eq!(collect(client).await, vec![RelayEvent::done("")]);
    }

    #[tokio::test]
    async fn chunks_after_done_are_ignored() {
        let client = ScriptedClient::new(vec![chunk(Some("a"), true), chunk(Some("b"), false)]);
        assert_eq!(collect(client).await, vec![RelayEvent::token("a"), RelayEvent::done("a")]);
    }

    #[tokio::test]
    async fn upstream_status_becomes_single_error() {
        let client = Arc::new(ScriptedClient {
            chunks: Vec::new(),
            fail_status: Some(StatusCode::INTERNAL_SERVER_ERROR),
            prompts: Mutex::new(Vec::new()),
        });
        let events = collect(client).await;
        assert_eq!(events.len(), 1);
        assert!(
            matches!(&events[0], RelayEvent::Error { error } if error.starts_with("Ollama error: 500"))
        );
    }

    #[tokio::test]
    async fn read_error_terminates_after_tokens() {
        let client = ScriptedClient::new(
            vec![
                chunk(Some("Hi"), false),
                Err(LlmError::UpstreamStatus { status: StatusCode::BAD_GATEWAY, body: String::new() })
            ]
        );
        let events = collect(client).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], RelayEvent::token("Hi"));
        assert!(matches!(events[1], RelayEvent::Error { .. }));
    }

    #[tokio::test]
    async fn inline_error_ends_relay_with_its_message() {
        let client = ScriptedClient::new(
            vec![
                chunk(Some("Hi"), false),
                Ok(GenerateChunk { error: Some("out of memory".into()), ..Default::default() }),
                chunk(Some("late"), true)
            ]
        );
        let events = collect(client).await;
        assert_eq!(events, vec![RelayEvent::token("Hi"), RelayEvent::error("out of memory")]);
    }

    #[tokio::test]
    async fn missing_done_still_terminates() {
        let client = ScriptedClient::new(vec![chunk(Some("Hi"), false)]);
        let events = collect(client).await;
        assert_eq!(events, vec![RelayEvent::token("Hi"), RelayEvent::error(INCOMPLETE_STREAM)]);
    }
}
