use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct NewChatResponse {
    pub chat_id: String,
    pub title: String,
}

/// JSON body of `/ask`. Missing fields are treated as empty.
#[derive(Debug, Default, Deserialize)]
pub struct AskJson {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub reply: String,
    pub chat_id: String,
    pub title: String,
}

/// Error bodies reuse the `reply` field so the widget can show them.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyMessage {
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct ChatSummary {
    pub title: String,
    pub messages: Vec<String>,
}
