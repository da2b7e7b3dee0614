use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::header,
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{Map, Value};
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::{
    config::Config,
    services::{
        build_prompt, Attachment, ConversationHistory, GeminiEngine, PromptInput, ReplyEngine,
        ServiceError, WebSearch, FALLBACK_REPLY,
    },
    types::{AskJson, AskResponse, ChatSummary, NewChatResponse},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub history: Arc<ConversationHistory>,
    pub engine: Arc<dyn ReplyEngine>,
    pub search: Option<Arc<WebSearch>>,
}

impl AppState {
    pub fn from_config(config: Arc<Config>) -> Self {
        Self {
            history: Arc::new(ConversationHistory::new(config.max_history_turns)),
            engine: Arc::new(GeminiEngine::from_config(&config)),
            search: WebSearch::from_config(&config).map(Arc::new),
            config,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let static_files = ServeDir::new(state.config.static_dir());
    Router::new()
        .route("/new_chat", post(new_chat))
        .route("/ask", post(ask))
        .route("/chats", get(list_chats))
        .fallback_service(static_files)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn new_chat(State(state): State<AppState>) -> Json<NewChatResponse> {
    let chat_id = state.history.open();
    tracing::info!(%chat_id, "opened chat");
    Json(NewChatResponse {
        chat_id,
        title: "New Chat".to_string(),
    })
}

struct AskInput {
    message: String,
    chat_id: Option<String>,
    attachment: Option<Attachment>,
}

async fn read_ask(state: &AppState, request: Request) -> Result<AskInput, ServiceError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if !is_multipart {
        let body = Bytes::from_request(request, state)
            .await
            .map_err(|e| ServiceError::InvalidInput(e.body_text()))?;
        // Anything that is not a JSON object counts as an empty question.
        let parsed: AskJson = serde_json::from_slice(&body).unwrap_or_default();
        return Ok(AskInput {
            message: parsed.message.unwrap_or_default(),
            chat_id: parsed.chat_id,
            attachment: None,
        });
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| ServiceError::InvalidInput(e.body_text()))?;
    let mut input = AskInput {
        message: String::new(),
        chat_id: None,
        attachment: None,
    };
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "message" => input.message = field.text().await?,
            "chat_id" => input.chat_id = Some(field.text().await?),
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await?;
                tracing::debug!(%file_name, size = bytes.len(), "received attachment");
                input.attachment = Some(Attachment {
                    file_name,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }
    Ok(input)
}

pub async fn ask(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<AskResponse>, ServiceError> {
    let AskInput {
        message,
        chat_id,
        attachment,
    } = read_ask(&state, request).await?;

    let mut message = message.trim().to_string();
    let mut attachment_text = String::new();
    if let Some(file) = &attachment {
        attachment_text = file.text().unwrap_or_default();
        message = format!("{} {}", message, file.marker()).trim().to_string();
    }
    if message.is_empty() {
        return Err(ServiceError::InvalidInput("Please enter a message.".to_string()));
    }

    let chat_id = match chat_id.filter(|id| !id.trim().is_empty()) {
        Some(id) => {
            state.history.ensure(&id);
            id
        }
        None => state.history.open(),
    };
    state.history.record(&chat_id, format!("User: {}", message));

    let web_context = match &state.search {
        Some(search) => search.snippets(&message).await.unwrap_or_default(),
        None => String::new(),
    };
    let history = state.history.context(&chat_id);
    let prompt = build_prompt(&PromptInput {
        message: &message,
        history: &history,
        web_context: &web_context,
        attachment_text: &attachment_text,
    });

    let reply = match state.engine.generate(&prompt).await {
        Ok(reply) if !reply.is_empty() => reply,
        Ok(_) => FALLBACK_REPLY.to_string(),
        Err(e) => {
            tracing::error!(error = %e, %chat_id, "reply generation failed");
            FALLBACK_REPLY.to_string()
        }
    };
    state.history.record(&chat_id, format!("AI: {}", reply));
    tracing::info!(%chat_id, "answered question");

    let title = message.chars().take(40).collect();
    Ok(Json(AskResponse {
        reply,
        chat_id,
        title,
    }))
}

pub async fn list_chats(State(state): State<AppState>) -> Json<Value> {
    let mut chats = Map::new();
    for (id, title) in state.history.summaries() {
        let summary = ChatSummary {
            title,
            messages: Vec::new(),
        };
        chats.insert(id, serde_json::to_value(summary).unwrap_or(Value::Null));
    }
    Json(Value::Object(chats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request as HttpRequest, StatusCode},
    };
    use tower::ServiceExt;

    use crate::types::ReplyMessage;

    #[derive(Default)]
    struct CannedEngine {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReplyEngine for CannedEngine {
        async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().ok_or_else(|| anyhow!("engine offline"))
        }
    }

    fn test_app(reply: Option<&str>) -> (Router, Arc<CannedEngine>, Arc<ConversationHistory>) {
        let config = Arc::new(Config::from_lookup(|_| None));
        let engine = Arc::new(CannedEngine {
            reply: reply.map(str::to_string),
            prompts: Mutex::new(Vec::new()),
        });
        let history = Arc::new(ConversationHistory::new(config.max_history_turns));
        let state = AppState {
            config,
            history: history.clone(),
            engine: engine.clone(),
            search: None,
        };
        (router(state), engine, history)
    }

    fn json_post(uri: &str, body: &str) -> HttpRequest<Body> {
        HttpRequest::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_new_chat() {
        let (app, _, _) = test_app(Some("hi"));
        let response = app
            .oneshot(HttpRequest::builder().method("POST").uri("/new_chat").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: NewChatResponse = body_json(response).await;
        assert!(body.chat_id.starts_with("chat_"));
        assert_eq!(body.title, "New Chat");
    }

    #[tokio::test]
    async fn test_ask_json_without_chat_id() {
        let (app, engine, history) = test_app(Some("Hello there"));
        let response = app
            .oneshot(json_post(
                "/ask",
                r#"{"message":"  please explain how rainbows form in the sky  ","chat_id":""}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: AskResponse = body_json(response).await;
        assert_eq!(body.reply, "Hello there");
        assert!(body.chat_id.starts_with("chat_"));
        assert_eq!(body.title, "please explain how rainbows form in the ");

        let prompts = engine.prompts.lock().unwrap();
        assert!(prompts[0].contains("User question: please explain how rainbows form in the sky"));
        assert_eq!(
            history.context(&body.chat_id),
            "AI: Hello there\nUser: please explain how rainbows form in the sky"
        );
    }

    #[tokio::test]
    async fn test_ask_keeps_client_chat_id() {
        let (app, _, history) = test_app(Some("again"));
        let first = app.clone().oneshot(json_post("/ask", r#"{"message":"one","chat_id":"c1"}"#)).await.unwrap();
        let first: AskResponse = body_json(first).await;
        assert_eq!(first.chat_id, "c1");
        app.oneshot(json_post("/ask", r#"{"message":"two","chat_id":"c1"}"#)).await.unwrap();
        assert_eq!(history.context("c1"), "AI: again\nUser: two\nAI: again\nUser: one");
    }

    #[tokio::test]
    async fn test_ask_rejects_empty_message() {
        let (app, engine, _) = test_app(Some("unused"));
        let response = app.clone().oneshot(json_post("/ask", r#"{"message":"   "}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ReplyMessage = body_json(response).await;
        assert_eq!(body.reply, "Please enter a message.");

        let response = app.oneshot(json_post("/ask", "not json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(engine.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_engine_failure_falls_back() {
        let (app, _, _) = test_app(None);
        let response = app.oneshot(json_post("/ask", r#"{"message":"hi"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: AskResponse = body_json(response).await;
        assert_eq!(body.reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn test_ask_multipart_with_text_file() {
        let (app, engine, _) = test_app(Some("Buy milk."));
        let body = concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"message\"\r\n\r\n",
            "summarize\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"chat_id\"\r\n\r\n",
            "\r\n",
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "remember the milk\r\n",
            "--XBOUNDARY--\r\n",
        );
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/ask")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let reply: AskResponse = body_json(response).await;
        assert_eq!(reply.reply, "Buy milk.");
        assert!(reply.chat_id.starts_with("chat_"));
        assert_eq!(reply.title, "summarize [file attached: notes.txt]");

        let prompts = engine.prompts.lock().unwrap();
        assert!(prompts[0].contains("Attached file:\nremember the milk"));
    }

    #[tokio::test]
    async fn test_list_chats() {
        let (app, _, history) = test_app(Some("ok"));
        let id = history.open();
        history.record(&id, "User: hello".to_string());
        let response = app
            .oneshot(HttpRequest::builder().uri("/chats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body: Value = body_json(response).await;
        assert_eq!(body[&id]["title"], "hello");
        assert_eq!(body[&id]["messages"], serde_json::json!([]));
    }
}
