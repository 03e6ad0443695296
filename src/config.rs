use serde::Deserialize;

use crate::models::ContentKind;

/// Application configuration loaded from environment variables
///
/// Credentials have no defaults on purpose: a missing media-server or API key
/// aborts startup instead of running a service that can never answer.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Media server (Emby-compatible) base URL
    pub media_server_url: String,

    /// Media server API key
    pub media_api_key: String,

    /// Media-server user whose history drives the taste signal
    pub media_user: String,

    /// Optional second user; when set, both histories feed the shared signal
    #[serde(default)]
    pub media_user_2: Option<String>,

    /// Taste-graph API key
    pub taste_api_key: String,

    /// Taste-graph API base URL
    #[serde(default = "default_taste_api_url")]
    pub taste_api_url: String,

    /// Narrator API key
    pub gemini_api_key: String,

    /// Narrator API base URL
    #[serde(default = "default_gemini_api_url")]
    pub gemini_api_url: String,

    /// Narrator model name
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,

    /// Location used for the location-based recommendation query
    #[serde(default)]
    pub user_location: Option<String>,

    /// Genre used when no signal can be derived from history
    #[serde(default = "default_fallback_genre")]
    pub fallback_genre: String,

    /// Minimum release year requested from the taste graph
    #[serde(default = "default_year_floor")]
    pub year_floor: i32,

    /// Content kind served by this instance
    #[serde(default)]
    pub content_kind: ContentKind,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_taste_api_url() -> String {
    "https://hackathon.api.qloo.com".to_string()
}

fn default_gemini_api_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_fallback_genre() -> String {
    "drama".to_string()
}

fn default_year_floor() -> i32 {
    2020
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}
