use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use orderly_agent::OrderWorkflow;
use orderly_core::CartEntry;

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<OrderWorkflow>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub thread_id: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub thread_id: String,
    pub response: String,
    pub cart_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CartResponse {
    pub thread_id: String,
    pub stage: String,
    pub cart: Vec<CartEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn router(workflow: Arc<OrderWorkflow>) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/cart/{thread_id}", get(cart))
        .with_state(AppState { workflow })
}

/// One conversation turn. The same `thread_id` continues a conversation;
/// a new one starts fresh.
async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorBody>)> {
    let thread_id = request.thread_id.trim();
    let message = request.message.trim();
    if thread_id.is_empty() || message.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorBody { error: "thread_id and message must be non-empty".to_string() }),
        ));
    }

    match state.workflow.handle_turn(thread_id, message).await {
        Ok(outcome) => Ok(Json(ChatResponse {
            thread_id: thread_id.to_string(),
            response: outcome.response_text,
            cart_count: outcome.cart_item_count,
        })),
        Err(turn_error) => {
            error!(
                event_name = "server.turn_failed",
                thread_id = %thread_id,
                error = %turn_error,
                "turn failed on infrastructure fault"
            );
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody {
                    error: "conversation state is temporarily unavailable; retry the same message"
                        .to_string(),
                }),
            ))
        }
    }
}

async fn cart(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<CartResponse>, (StatusCode, Json<ErrorBody>)> {
    match state.workflow.snapshot(&thread_id).await {
        Ok(snapshot) => Ok(Json(CartResponse {
            thread_id,
            stage: snapshot.stage.as_str().to_string(),
            cart: snapshot.cart,
        })),
        Err(turn_error) => {
            error!(
                event_name = "server.cart_read_failed",
                thread_id = %thread_id,
                error = %turn_error,
                "cart read failed"
            );
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody {
                    error: "conversation state is temporarily unavailable".to_string(),
                }),
            ))
        }
    }
}
