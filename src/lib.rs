pub mod chat;
pub mod cli;
pub mod codec;
pub mod console;
pub mod error;
pub mod history;
pub mod llm;
pub mod models;
pub mod render;
pub mod server;

use chat::{ ChatSession, HttpRelayTransport };
use cli::{ Args, ChatArgs, Command, ServeArgs };
use history::initialize_history_store;
use llm::{ LlmConfig, SamplingOptions };
use log::info;
use server::Server;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use url::Url;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.command {
        Command::Serve(serve) => run_server(serve).await,
        Command::Chat(chat) => run_chat(chat).await,
    }
}

async fn run_server(args: ServeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let base_url = Url::parse(&args.ollama_base_url).map_err(|e|
        format!("Invalid Ollama base URL '{}': {}", args.ollama_base_url, e)
    )?;
    let addr: SocketAddr = args.server_addr
        .parse()
        .map_err(|e| format!("Invalid server address '{}': {}", args.server_addr, e))?;

    info!("--- Relay Configuration ---");
    info!("Server Address: {}", addr);
    info!("Ollama Base URL: {}", base_url);
    info!("Chat Model: {}", args.chat_model);
    info!("Temperature: {}", args.temperature);
    info!("Top P: {}", args.top_p);
    info!("Max Tokens: {}", args.max_tokens);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("---------------------------");

    let config = LlmConfig {
        base_url: Some(base_url.as_str().to_string()),
        completion_model: Some(args.chat_model.clone()),
        options: SamplingOptions {
            temperature: args.temperature,
            top_p: args.top_p,
            max_tokens: args.max_tokens,
        },
    };
    let client = llm::chat::new_client(&config);
    info!(
        "Forwarding chat requests to {} ({})",
        client.get_base_url().unwrap_or_default(),
        client.get_model()
    );
    let server = Server::new(addr, client, args);
    server.run().await
}

async fn run_chat(args: ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let relay_url = Url::parse(&args.relay_url).map_err(|e|
        format!("Invalid relay URL '{}': {}", args.relay_url, e)
    )?;

    info!("--- Chat Configuration ---");
    info!("Relay URL: {}", relay_url);
    info!("History Store Type: {}", args.history_type);
    info!("--------------------------");

    let history = initialize_history_store(&args)?;
    let transport = Arc::new(HttpRelayTransport::new(relay_url.as_str()));
    info!("Sending chat requests to {}", transport.endpoint());
    let session = ChatSession::open(history, transport).await?;
    console::run(session).await
}
