use async_trait::async_trait;
use bytes::Bytes;
use futures::{ Stream, StreamExt };
use reqwest::Client as HttpClient;
use std::pin::Pin;
use crate::error::ChatError;
use crate::models::chat::ChatRequest;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ChatError>> + Send>>;

/// Opens the relay's SSE response for one request.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, ChatError>;
}

/// Talks to the relay over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRelayTransport {
    http: HttpClient,
    endpoint: String,
}

impl HttpRelayTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: HttpClient::new(),
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RelayTransport for HttpRelayTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        let response = self.http.post(&self.endpoint).json(request).send().await?;
        if !response.status().is_success() {
            return Err(ChatError::Status(response.status()));
        }
        Ok(Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(ChatError::Http))))
    }
}
