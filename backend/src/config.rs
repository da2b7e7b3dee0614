use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: String,
    pub static_dir: String,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub google_api_key: Option<String>,
    pub search_engine_id: Option<String>,
    pub max_history_turns: usize,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let secret = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:9000".to_string()),
            static_dir: lookup("STATIC_DIR").unwrap_or_else(|| "dist".to_string()),
            gemini_api_key: secret("GEMINI_API_KEY"),
            gemini_model: lookup("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            gemini_base_url: lookup("GEMINI_BASE_URL")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            google_api_key: secret("GOOGLE_API_KEY"),
            search_engine_id: secret("SEARCH_ENGINE_ID"),
            max_history_turns: lookup("MAX_HISTORY_TURNS")
                .and_then(|value| value.parse().ok())
                .unwrap_or(15),
            max_upload_bytes: lookup("MAX_UPLOAD_BYTES")
                .and_then(|value| value.parse().ok())
                .unwrap_or(20 * 1024 * 1024),
        }
    }

    pub fn static_dir(&self) -> PathBuf {
        PathBuf::from(&self.static_dir)
    }

    /// Both halves of the Custom Search credentials, when configured.
    pub fn search_credentials(&self) -> Option<(String, String)> {
        Some((self.google_api_key.clone()?, self.search_engine_id.clone()?))
    }
}
