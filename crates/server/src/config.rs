use std::fmt;

/// Env-driven service configuration. Everything has a default so the server
/// comes up offline-friendly (dry-run extraction, no CORS allowlist).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub llm: LlmSettings,
    /// Single allowed CORS origin; absent means permissive.
    pub cors_origin: Option<String>,
    pub tesseract_lang: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    /// When set, the LLM extractor returns its fixed mock record instead of
    /// calling out. Defaults to on, mirroring the offline-first posture.
    pub dry_run: bool,
}

// Manual Debug: the API key must never end up in logs.
impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            llm: LlmSettings {
                api_key: None,
                model: "gpt-4o-mini".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                dry_run: true,
            },
            cors_origin: None,
            tesseract_lang: "eng".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = AppConfig::default();
        AppConfig {
            server: ServerConfig {
                host: std::env::var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: std::env::var("SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(defaults.server.port),
            },
            llm: LlmSettings {
                api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
                model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.llm.model),
                base_url: std::env::var("OPENAI_API_BASE").unwrap_or(defaults.llm.base_url),
                dry_run: std::env::var("DRY_RUN").map(|v| v == "1").unwrap_or(true),
            },
            cors_origin: std::env::var("CORS_ORIGIN").ok().filter(|o| !o.is_empty()),
            tesseract_lang: std::env::var("TESSERACT_LANG").unwrap_or(defaults.tesseract_lang),
        }
    }
}
