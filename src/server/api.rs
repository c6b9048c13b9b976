use crate::llm::chat::ChatClient;
use crate::models::chat::ChatRequest;
use crate::server::relay::relay_chat;
use std::convert::Infallible;
use std::sync::Arc;
use axum::{
    routing::post,
    Router,
    Json,
    extract::State,
    response::{ IntoResponse, Response },
    response::sse::{ Event, Sse },
    http::{ header, HeaderValue, StatusCode, Version },
};
use futures::StreamExt;
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::warn;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn ChatClient>,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .layer(cors)
        .with_state(state)
}

async fn chat_handler(
    State(state): State<AppState>,
    version: Version,
    Json(req): Json<ChatRequest>
) -> Response {
    if req.messages.is_empty() {
        warn!("Rejecting chat request without messages");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse { error: "messages must not be empty".into() }),
        ).into_response();
    }

    let events = relay_chat(state.client.clone(), req.messages).map(|event| {
        Ok::<_, Infallible>(Event::default().data(event.to_json()))
    });

    let mut response = ([(header::CACHE_CONTROL, "no-cache")], Sse::new(events)).into_response();
    // Connection-specific headers are forbidden from HTTP/2 on.
    if version <= Version::HTTP_11 {
        response.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    }
    response
}
