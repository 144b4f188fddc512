use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info};

use crate::api::{error::ApiError, state::AppState};
use crate::domain::DomainError;

const FRAGMENT_BUFFER: usize = 64;
pub const DONE: &str = "[DONE]";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn chat_completions(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    if request.question.trim().is_empty() {
        return Err(DomainError::validation("question must not be empty").into());
    }
    if !state.is_ready() {
        return Err(DomainError::NotReady.into());
    }

    if request.stream {
        return Ok(stream_answer(state, request.question).into_response());
    }

    let answer = state.assistant.lock().await.chat(&request.question).await?;
    Ok(Json(ChatResponse { answer }).into_response())
}

/// Runs the chain in its own task so the answer completes and is recorded
/// even when the client disconnects.
fn stream_answer(
    state: AppState,
    question: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<String>(FRAGMENT_BUFFER);
    let (done_tx, done_rx) = oneshot::channel::<Result<(), DomainError>>();

    tokio::spawn(async move {
        let mut assistant = state.assistant.lock().await;
        let result = assistant.chat_streaming(&question, tx).await.map(|_| ());
        if let Err(e) = &result {
            error!(error = %e, "streaming answer failed");
        }
        let _ = done_tx.send(result);
    });

    let fragments = ReceiverStream::new(rx)
        .map(|fragment| Ok::<_, Infallible>(Event::default().data(sse_safe(&fragment))));
    let failure = stream::once(async move {
        match done_rx.await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some("answer task ended unexpectedly".to_string()),
        }
    })
    .filter_map(|message| async move {
        message.map(|m| Ok::<_, Infallible>(Event::default().event("error").data(sse_safe(&m))))
    });
    let done = stream::once(async { Ok::<_, Infallible>(Event::default().data(DONE)) });

    Sse::new(fragments.chain(failure).chain(done)).keep_alive(KeepAlive::default())
}

// SSE framing forbids carriage returns inside a data field.
fn sse_safe(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

pub async fn new_chat(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    state.assistant.lock().await.new_chat()?;
    info!("conversation reset over http");
    Ok(Json(StatusResponse {
        status: "success".to_string(),
        message: "New conversation started".to_string(),
    }))
}

pub async fn test() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "API is running".to_string(),
    })
}
