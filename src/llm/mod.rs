pub mod chat;

use serde::Serialize;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.1:8b";

/// Sampling options forwarded verbatim to the inference server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            max_tokens: 2000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub completion_model: Option<String>,
    pub options: SamplingOptions,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            completion_model: None,
            options: SamplingOptions::default(),
        }
    }
}
