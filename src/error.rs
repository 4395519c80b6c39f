use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Report source unavailable for '{report}': {message}")]
    SourceUnavailable { report: String, message: String },

    #[error("Unknown report: {0}")]
    UnknownReport(String),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),
}

pub type Result<T> = std::result::Result<T, ReportError>;
