use clap::{ Args as ClapArgs, Parser, Subcommand };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the SSE relay in front of the local Ollama server.
    Serve(ServeArgs),
    /// Chat with the relay from the terminal.
    Chat(ChatArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ServeArgs {
    /// Host address and port for the relay to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    // --- Ollama Args ---
    /// Base URL of the Ollama server.
    #[arg(long, env = "OLLAMA_BASE_URL", default_value = "http://localhost:11434")]
    pub ollama_base_url: String,

    /// Model name passed to /api/generate.
    #[arg(long, env = "CHAT_MODEL", default_value = "llama3.1:8b")]
    pub chat_model: String,

    /// Sampling temperature.
    #[arg(long, env = "CHAT_TEMPERATURE", default_value = "0.7")]
    pub temperature: f32,

    /// Nucleus sampling threshold.
    #[arg(long, env = "CHAT_TOP_P", default_value = "0.9")]
    pub top_p: f32,

    /// Upper bound on generated tokens.
    #[arg(long, env = "CHAT_MAX_TOKENS", default_value = "2000")]
    pub max_tokens: u32,

    // --- TLS Args ---
    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ChatArgs {
    /// Base URL of the relay (the `serve` subcommand).
    #[arg(long, env = "CHAT_RELAY_URL", default_value = "http://127.0.0.1:3000")]
    pub relay_url: String,

    // --- History Store Args ---
    /// Where conversations are kept (file, redis, memory)
    #[arg(long, env = "HISTORY_TYPE", default_value = "file")]
    pub history_type: String,

    /// JSON file used by the file history store.
    #[arg(long, env = "HISTORY_PATH", default_value = "chats.json")]
    pub history_path: String,

    /// Redis endpoint used by the redis history store (e.g., redis://127.0.0.1:6379)
    #[arg(long, env = "HISTORY_HOST", default_value = "redis://127.0.0.1:6379")]
    pub history_host: String,

    /// Redis key holding the serialized conversations.
    #[arg(long, env = "HISTORY_REDIS_KEY", default_value = "chats")]
    pub history_redis_key: String,
}
