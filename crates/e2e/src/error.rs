//! Error types for session bootstrap

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Failed to launch device bridge `{program}`: {source}")]
    BridgeLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Empty device bridge command line")]
    EmptyCommand,

    #[error("Session not created: {0}")]
    SessionNotCreated(String),

    #[error("WebDriver error `{error}`: {message}")]
    WebDriver { error: String, message: String },

    #[error("Unexpected response from {endpoint}: {reason}")]
    UnexpectedResponse { endpoint: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
