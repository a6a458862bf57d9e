//! Chat page and the document Q&A API.
//!
//! `send` and `stream` share validation and bookkeeping: the question is
//! stored before the history window is read, so the prompt history ends with
//! the question being asked.

use crate::auth::CurrentUser;
use crate::errors::{AppError, ChatApiError};
use crate::models::{ChatMessageView, ChatPageResponse, ChatReply, ChatSendRequest, DocumentSummary};
use crate::rag::{answer_failure, PreparedAnswer, EMPTY_ANSWER};
use crate::sse::{
    create_content_delta_event, create_error_event, create_sse_stream, create_stream_end_event,
    create_stream_start_event,
};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::Json;
use chrono::Utc;
use docchat_core::history::ChatTurn;
use docchat_core::{ChatMessage, Role};
use futures::stream::{Stream, StreamExt};
use llm::StreamEvent;
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::{debug, error};
use uuid::Uuid;

/// A validated question with the user's message already stored.
struct ChatTurnRequest {
    question: String,
    document_ids: Vec<Uuid>,
    history: Vec<ChatTurn>,
}

/// GET /chat/
pub async fn chat_page(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ChatPageResponse>, AppError> {
    let documents = state.records.active_documents(user.user_id).await?;
    let cutoff = state.history.cutoff(Utc::now());
    let messages = state.records.messages_since(user.user_id, cutoff).await?;

    Ok(Json(ChatPageResponse {
        documents: documents.iter().map(DocumentSummary::from).collect(),
        messages: messages.iter().map(ChatMessageView::from).collect(),
    }))
}

async fn begin_turn(
    state: &AppState,
    user: &CurrentUser,
    body: &[u8],
) -> Result<ChatTurnRequest, ChatApiError> {
    let request: ChatSendRequest = serde_json::from_slice(body)
        .map_err(|_| AppError::BadRequest("Invalid request format.".to_string()))?;

    let question = request.message.trim().to_string();
    if question.is_empty() {
        return Err(AppError::BadRequest("Please enter a message.".to_string()).into());
    }
    if request.document_ids.is_empty() {
        return Err(AppError::BadRequest("Please select at least one document.".to_string()).into());
    }

    let requested: Vec<Uuid> = request
        .document_ids
        .iter()
        .filter_map(|id| Uuid::parse_str(id.trim()).ok())
        .collect();
    let document_ids = state
        .records
        .filter_active_ids(user.user_id, &requested)
        .await?;
    if document_ids.is_empty() {
        return Err(
            AppError::BadRequest("Selected documents are not available.".to_string()).into(),
        );
    }

    state
        .records
        .append_message(&ChatMessage::new(user.user_id, Role::User, &question))
        .await?;

    let now = Utc::now();
    let recent = state
        .records
        .messages_since(user.user_id, state.history.cutoff(now))
        .await?;
    let history = state.history.for_context(&recent, now);
    debug!(
        "Answering over {} documents with {} history turns",
        document_ids.len(),
        history.len()
    );

    Ok(ChatTurnRequest {
        question,
        document_ids,
        history,
    })
}

/// POST /chat/api/send/
pub async fn send_message(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Bytes,
) -> Result<Json<ChatReply>, ChatApiError> {
    let turn = begin_turn(&state, &user, &body).await?;

    let answer = state
        .rag
        .answer_question(
            &turn.question,
            user.user_id,
            &turn.document_ids,
            &turn.history,
        )
        .await;

    let reply = ChatMessage::new(user.user_id, Role::Assistant, answer);
    state.records.append_message(&reply).await?;

    Ok(Json(ChatReply {
        success: true,
        message: ChatMessageView::from(&reply),
    }))
}

/// POST /chat/api/stream/. Emits `stream_start`, `content_delta` events and
/// a final `stream_end` carrying the stored assistant message.
pub async fn stream_message(
    State(state): State<AppState>,
    user: CurrentUser,
    body: Bytes,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>> + Send>, ChatApiError> {
    let turn = begin_turn(&state, &user, &body).await?;
    let user_id = user.user_id;

    let stream = async_stream::stream! {
        yield Ok(create_stream_start_event());

        let mut answer = String::new();
        let mut failure: Option<anyhow::Error> = None;

        match state
            .rag
            .prepare_answer(&turn.question, user_id, &turn.document_ids, &turn.history)
            .await
        {
            Ok(PreparedAnswer::Ready(text)) => {
                yield Ok(create_content_delta_event(&text));
                answer = text;
            }
            Ok(PreparedAnswer::Prompt(prompt)) => match state.rag.llm().stream_generate(&prompt).await {
                Ok(mut events) => {
                    while let Some(event) = events.next().await {
                        match event {
                            Ok(StreamEvent::ContentDelta { text }) => {
                                yield Ok(create_content_delta_event(&text));
                                answer.push_str(&text);
                            }
                            Ok(StreamEvent::Error { message }) => {
                                failure = Some(anyhow::anyhow!(message));
                                break;
                            }
                            Ok(_) => {}
                            Err(e) => {
                                failure = Some(e);
                                break;
                            }
                        }
                    }
                }
                Err(e) => failure = Some(e),
            },
            Err(e) => failure = Some(e),
        }

        if let Some(e) = failure {
            error!("Streaming answer failed: {:#}", e);
            answer = answer_failure(&e);
            yield Ok(create_error_event(&AppError::Internal(e)));
        } else if answer.trim().is_empty() {
            answer = EMPTY_ANSWER.to_string();
        }

        let reply = ChatMessage::new(user_id, Role::Assistant, answer);
        if let Err(e) = state.records.append_message(&reply).await {
            error!("Failed to store streamed answer: {:#}", e);
            yield Ok(create_error_event(&AppError::Internal(e)));
        }
        yield Ok(create_stream_end_event(&ChatMessageView::from(&reply)));
    };

    Ok(create_sse_stream(stream))
}

/// POST /chat/api/clear/
pub async fn clear_history(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Value>, ChatApiError> {
    let deleted = state.records.clear_messages(user.user_id).await?;
    debug!("Cleared {} chat messages for {}", deleted, user.user_id);
    Ok(Json(json!({"success": true})))
}
