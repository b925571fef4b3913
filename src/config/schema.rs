use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Speech-to-text service settings
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Text-generation providers
    #[serde(default)]
    pub ai: AiConfig,

    /// Browser-automation agent controller settings
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional API key required on all routes except /api/health
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Directory with the static front-end
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_key: None,
            static_dir: default_static_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Base URL of the recognition service
    #[serde(default = "default_speech_url")]
    pub base_url: String,

    /// Recognition model
    #[serde(default = "default_speech_model")]
    pub model: String,

    /// API key (VOXPILOT_SPEECH_API_KEY overrides)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: default_speech_url(),
            model: default_speech_model(),
            api_key: None,
        }
    }
}

/// API type for a generation provider
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    #[default]
    Openai,
    Gemini,
    Watsonx,
}

/// Generation provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name for this provider
    pub name: String,
    /// API type (determines request format)
    #[serde(default)]
    pub api_type: ApiType,
    /// Base URL for the API
    pub base_url: String,
    /// API key (optional for self-hosted endpoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Project identifier (watsonx deployments)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Available models for this provider
    #[serde(default)]
    pub models: Vec<String>,
}

/// Generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// Default generator to use (format: "provider_id:model_name")
    #[serde(default)]
    pub default_generator: Option<String>,

    /// Providers keyed by id
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            default_generator: None,
            providers: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Base URL of the agent controller service
    #[serde(default = "default_controller_url")]
    pub controller_url: String,

    /// API key sent to the controller (VOXPILOT_AGENT_API_KEY overrides)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Path where the controller writes the run recording GIF
    #[serde(default = "default_gif_path")]
    pub gif_path: PathBuf,

    /// Maximum agent steps per run
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Event poll interval in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            controller_url: default_controller_url(),
            api_key: None,
            gif_path: default_gif_path(),
            max_steps: default_max_steps(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_speech_url() -> String {
    "https://api.eu-de.speech-to-text.watson.cloud.ibm.com".to_string()
}

fn default_speech_model() -> String {
    "en-US_BroadbandModel".to_string()
}

fn default_controller_url() -> String {
    "http://127.0.0.1:38570".to_string()
}

fn default_gif_path() -> PathBuf {
    PathBuf::from("logs/agent_history.gif")
}

fn default_max_steps() -> u32 {
    20
}

fn default_poll_interval() -> u64 {
    500
}
