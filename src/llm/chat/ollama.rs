use reqwest::Client as HttpClient;
use serde::Serialize;
use async_trait::async_trait;
use super::{ ChatClient, ChunkStream };
use crate::codec::FrameDecoder;
use crate::error::LlmError;
use crate::llm::{ LlmConfig, SamplingOptions, DEFAULT_BASE_URL, DEFAULT_MODEL };
use crate::models::relay::GenerateChunk;
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio::sync::mpsc;
use log::{ debug, warn };

#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
    options: SamplingOptions,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: SamplingOptions,
}

impl OllamaClient {
    pub fn new(
        base_url: Option<String>,
        completion_model: Option<String>,
        options: SamplingOptions
    ) -> Self {
        let model = completion_model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.into());

        Self {
            http: HttpClient::new(),
            base_url: url.trim_end_matches('/').to_string(),
            completion_model: model,
            options,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.base_url.clone(), config.completion_model.clone(), config.options)
    }

    pub async fn generate_stream(&self, prompt: &str) -> Result<ChunkStream, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let req = GenerateRequest {
            model: &self.completion_model,
            prompt,
            stream: true,
            options: self.options,
        };

        let response = self.http.post(&url).json(&req).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::UpstreamStatus { status, body });
        }

        let (tx, rx) = mpsc::channel(32);
        let mut bytes = response.bytes_stream();

        tokio::spawn(async move {
            let mut lines = FrameDecoder::lines();

            while let Some(chunk_result) = bytes.next().await {
                match chunk_result {
                    Ok(chunk) => {
                        for line in lines.push(&chunk) {
                            if let Some(parsed) = parse_line(&line) {
                                if tx.send(Ok(parsed)).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(LlmError::Http(e))).await;
                        return;
                    }
                }
            }

            if let Some(parsed) = lines.finish().as_deref().and_then(parse_line) {
                let _ = tx.send(Ok(parsed)).await;
            }
            debug!("Ollama stream finished");
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

fn parse_line(line: &str) -> Option<GenerateChunk> {
    match serde_json::from_str::<GenerateChunk>(line) {
        Ok(chunk) => Some(chunk),
        Err(e) => {
            warn!("Skipping malformed Ollama line: {} ({})", line, e);
            None
        }
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn stream_generate(&self, prompt: &str) -> Result<ChunkStream, LlmError> {
        self.generate_stream(prompt).await
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_carries_sampling_options() {
        let req = GenerateRequest {
            model: DEFAULT_MODEL,
            prompt: "Human: hi\n\nAssistant:",
            stream: true,
            options: SamplingOptions::default(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "llama3.1:8b");
        assert_eq!(json["stream"], true);
        assert_eq!(json["options"]["max_tokens"], 2000);
        assert!((json["options"]["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!((json["options"]["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
    }

    #[test]
    fn defaults_when_unconfigured() {
        let client = OllamaClient::from_config(&LlmConfig::default());
        assert_eq!(client.get_model(), DEFAULT_MODEL);
        assert_eq!(client.get_base_url().as_deref(), Some(DEFAULT_BASE_URL));
    }

    #[test]
    fn malformed_line_is_skipped() {
        assert!(parse_line("{not json").is_none());
        assert_eq!(
            parse_line(r#"{"response":"Hi"}"#),
            Some(GenerateChunk { response: Some("Hi".into()), done: false, error: None })
        );
    }
}
