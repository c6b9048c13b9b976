use serde::{ Deserialize, Serialize };

/// Event emitted by the relay, one per SSE frame.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum RelayEvent {
    Token {
        token: String,
    },
    Done {
        done: bool,
        #[serde(rename = "fullResponse")]
        full_response: String,
    },
    Error {
        error: String,
    },
}

impl RelayEvent {
    pub fn token(token: impl Into<String>) -> Self {
        RelayEvent::Token { token: token.into() }
    }

    pub fn done(full_response: impl Into<String>) -> Self {
        RelayEvent::Done { done: true, full_response: full_response.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        RelayEvent::Error { error: message.into() }
    }

    pub fn to_json(&self) -> String {
        // Only string and bool fields; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A relay payload as seen by the client. Fields are read independently
/// in the order token, done, error.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayFrame {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default, rename = "fullResponse")]
    pub full_response: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One object of Ollama's newline-delimited `/api/generate` stream.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done: bool,
    /// Set when Ollama aborts the generation after sending a 200.
    #[serde(default)]
    pub error: Option<String>,
}
