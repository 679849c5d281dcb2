use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutosubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Input '{text}' ({tokens} tokens) longer than {max_tokens}")]
    InputTooLarge {
        text: String,
        tokens: usize,
        max_tokens: usize,
    },

    #[error("Only {remaining} tokens remained, at least {required} needed for input")]
    InsufficientBudget { remaining: i64, required: usize },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Transcription error: {0}")]
    Transcriber(String),
}

pub type Result<T> = std::result::Result<T, AutosubError>;
