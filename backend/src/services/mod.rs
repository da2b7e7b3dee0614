mod attachment;
mod history;
mod reply_engine;
mod web_search;

pub use attachment::Attachment;
pub use history::ConversationHistory;
pub use reply_engine::{build_prompt, GeminiEngine, PromptInput, ReplyEngine, FALLBACK_REPLY};
pub use web_search::WebSearch;

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use thiserror::Error;

use crate::types::ReplyMessage;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("invalid upload: {0}")]
    Upload(#[from] MultipartError),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, reply) = match &self {
            ServiceError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServiceError::Upload(_) => (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", self)),
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "ask request failed");
        }
        (status, Json(ReplyMessage { reply })).into_response()
    }
}
