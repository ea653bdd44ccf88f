/// Startup configuration failures. Any of these aborts the process before it binds a socket.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("language model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to serialize analysis: {0}")]
    Serialization(serde_json::Error),
}

impl From<habit_types::TextError> for CoreError {
    fn from(e: habit_types::TextError) -> Self {
        CoreError::InvalidInput(e.to_string())
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
