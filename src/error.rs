use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxpilotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Speech service error: {0}")]
    Speech(String),

    #[error("No speech detected")]
    NoSpeechDetected,

    #[error("Generation provider error: {0}")]
    Generator(String),

    #[error("Agent controller error: {0}")]
    Controller(String),

    #[error("Invalid session transition: {0}")]
    Transition(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

pub type Result<T> = std::result::Result<T, VoxpilotError>;
