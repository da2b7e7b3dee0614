use lopdf::Document;

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "csv", "tsv", "json", "log", "xml", "html", "htm", "yaml", "yml",
    "toml", "ini",
];

const MAX_INLINE_CHARS: usize = 20_000;

/// A file uploaded alongside a question.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    fn extension(&self) -> Option<String> {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
    }

    pub fn is_text_like(&self) -> bool {
        self.extension()
            .map(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    pub fn is_pdf(&self) -> bool {
        self.extension().as_deref() == Some("pdf")
    }

    /// Text to feed into the prompt, if the file is something we can read as text.
    pub fn text(&self) -> Option<String> {
        let text = if self.is_pdf() {
            self.pdf_text()?
        } else if self.is_text_like() {
            String::from_utf8_lossy(&self.bytes).into_owned()
        } else {
            return None;
        };
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(text.chars().take(MAX_INLINE_CHARS).collect())
    }

    fn pdf_text(&self) -> Option<String> {
        let doc = match Document::load_mem(&self.bytes) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!("could not open PDF {}: {}", self.file_name, e);
                return None;
            }
        };
        let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
        match doc.extract_text(&pages) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!("could not extract text from PDF {}: {}", self.file_name, e);
                None
            }
        }
    }

    /// Marker appended to the user's message so the history records the upload.
    pub fn marker(&self) -> String {
        format!("[file attached: {}]", self.file_name)
    }
}
