use std::sync::{Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

struct Conversation {
    id: String,
    lines: Vec<String>,
}

/// Per-chat `User: …` / `AI: …` lines, capped to the most recent turns.
pub struct ConversationHistory {
    max_lines: usize,
    chats: Mutex<Vec<Conversation>>,
}

impl ConversationHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_lines: max_turns * 2,
            chats: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Conversation>> {
        self.chats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mint_id() -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("chat_{}", &hex[..8])
    }

    /// Register a fresh chat and return its id.
    pub fn open(&self) -> String {
        let mut chats = self.lock();
        let id = loop {
            let id = Self::mint_id();
            if !chats.iter().any(|c| c.id == id) {
                break id;
            }
        };
        chats.push(Conversation {
            id: id.clone(),
            lines: Vec::new(),
        });
        id
    }

    /// Make sure a client-supplied id has a history entry.
    pub fn ensure(&self, id: &str) {
        let mut chats = self.lock();
        if !chats.iter().any(|c| c.id == id) {
            chats.push(Conversation {
                id: id.to_string(),
                lines: Vec::new(),
            });
        }
    }

    pub fn record(&self, id: &str, line: String) {
        let mut chats = self.lock();
        let Some(chat) = chats.iter_mut().find(|c| c.id == id) else {
            return;
        };
        chat.lines.push(line);
        if chat.lines.len() > self.max_lines {
            let excess = chat.lines.len() - self.max_lines;
            chat.lines.drain(..excess);
        }
    }

    /// Conversation so far, most recent line first.
    pub fn context(&self, id: &str) -> String {
        let chats = self.lock();
        chats
            .iter()
            .find(|c| c.id == id)
            .map(|c| {
                c.lines
                    .iter()
                    .rev()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }

    /// `(id, title)` for every chat, titled after its first user line.
    pub fn summaries(&self) -> Vec<(String, String)> {
        self.lock()
            .iter()
            .map(|c| {
                let title = match c.lines.first() {
                    Some(first) => first.replace("User: ", "").chars().take(30).collect(),
                    None => "Chat".to_string(),
                };
                (c.id.clone(), title)
            })
            .collect()
    }
}
