//! Session -> HTTP relay -> mocked Ollama, over real sockets.

use ollama_chat_relay::chat::{ ChatSession, HttpRelayTransport, SubmitOutcome, FAILED_REPLY };
use ollama_chat_relay::history::{ FileHistoryStore, HistoryStore };
use ollama_chat_relay::llm::chat::ollama::OllamaClient;
use ollama_chat_relay::llm::SamplingOptions;
use ollama_chat_relay::models::chat::MessageState;
use ollama_chat_relay::server::api::{ router, AppState };
use std::sync::Arc;
use tokio::net::TcpListener;
use wiremock::matchers::{ method, path };
use wiremock::{ Mock, MockServer, ResponseTemplate };

/// Starts the relay on an ephemeral port and returns its base URL.
async fn start_relay(ollama_url: String) -> String {
    let client = OllamaClient::new(Some(ollama_url), None, SamplingOptions::default());
    let app = router(AppState { client: Arc::new(client) });
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn hello_round_trip_is_persisted() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                "{\"response\":\"Hi\"}\n{\"response\":\" there\",\"done\":true}\n",
                "application/x-ndjson"
            )
        )
        .mount(&upstream).await;
    let relay_url = start_relay(upstream.uri()).await;

    let dir = tempfile::tempdir().unwrap();
    let history = Arc::new(FileHistoryStore::new(dir.path().join("chats.json")));
    let transport = Arc::new(HttpRelayTransport::new(&relay_url));
    let mut session = ChatSession::open(history.clone(), transport).await.unwrap();

    let outcome = session.submit("hello").await;

    assert!(matches!(outcome, SubmitOutcome::Finalized { .. }));
    let chat = session.active().unwrap();
    assert_eq!(chat.title, "hello");
    assert_eq!(chat.messages[1].content, "Hi there");
    assert_eq!(chat.messages[1].state(), MessageState::Finalized);

    let stored = history.load().await.unwrap().unwrap();
    assert_eq!(stored.get(&chat.id).unwrap().messages[1].content, "Hi there");
}

#[tokio::test]
async fn upstream_500_marks_reply_failed() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream).await;
    let relay_url = start_relay(upstream.uri()).await;

    let dir = tempfile::tempdir().unwrap();
    let history = Arc::new(FileHistoryStore::new(dir.path().join("chats.json")));
    let transport = Arc::new(HttpRelayTransport::new(&relay_url));
    let mut session = ChatSession::open(history, transport).await.unwrap();

    let outcome = session.submit("hello").await;

    assert!(matches!(outcome, SubmitOutcome::Failed { .. }));
    let reply = &session.active().unwrap().messages[1];
    assert_eq!(reply.content, FAILED_REPLY);
    assert!(!reply.is_streaming);
}

#[tokio::test]
async fn unreachable_relay_marks_reply_failed() {
    let relay_url = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let dir = tempfile::tempdir().unwrap();
    let history = Arc::new(FileHistoryStore::new(dir.path().join("chats.json")));
    let transport = Arc::new(HttpRelayTransport::new(&relay_url));
    let mut session = ChatSession::open(history, transport).await.unwrap();

    assert!(matches!(session.submit("hello").await, SubmitOutcome::Failed { .. }));
    assert!(!session.is_in_flight());
}
