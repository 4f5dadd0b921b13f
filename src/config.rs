use serde::Deserialize;
use time::UtcOffset;

const DEFAULT_MODELS: &[&str] = &[
    "gemini-2.5-flash",
    "gemini-2.0-flash",
    "gemini-2.0-flash-latest",
    "gemini-2.0-flash-lite",
    "gemini-2.0-pro",
    "gemini-2.0-pro-exp-02-05",
    "gemini-1.5-pro-latest",
    "gemini-1.5-flash-latest",
    "gemini-1.5-flash",
];

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Tried in order until one of them answers.
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub gemini: GeminiConfig,
    pub max_image_mb: usize,
    /// Offset used to stamp water entries that arrive without date/time.
    #[serde(skip, default = "utc")]
    pub local_offset: UtcOffset,
}

fn utc() -> UtcOffset {
    UtcOffset::UTC
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            access_secret: std::env::var("ACCESS_TOKEN_SECRET")?,
            refresh_secret: std::env::var("REFRESH_TOKEN_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "aquatrack".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "aquatrack-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
        };
        let gemini = GeminiConfig {
            api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into()),
            models: std::env::var("GEMINI_MODELS")
                .ok()
                .map(|v| parse_models(&v))
                .filter(|m| !m.is_empty())
                .unwrap_or_else(default_models),
        };
        let max_image_mb = std::env::var("MAX_IMAGE_MB")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(20);
        Ok(Self {
            database_url,
            jwt,
            gemini,
            max_image_mb,
            local_offset: UtcOffset::UTC,
        })
    }

    pub fn with_local_offset(mut self, offset: UtcOffset) -> Self {
        self.local_offset = offset;
        self
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_mb * 1024 * 1024
    }
}

pub fn default_models() -> Vec<String> {
    DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
}

fn parse_models(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}
