use thiserror::Error;

#[derive(Debug, Error)]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Context detection or element extraction exceeded its deadline.
    #[error("Detection timed out after {0} ms")]
    DetectionTimeout(u64),

    #[error("Command cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    /// The generated script failed allow-list or deny-list validation.
    #[error("Generated script rejected: {0}")]
    GenerationRejected(String),

    #[error("Execution step failed: {0}")]
    ExecutionStepFailed(String),

    #[error("Execution timed out after {0} ms")]
    ExecutionTimeout(u64),

    #[error("Invalid script line: {0}")]
    InvalidStep(String),

    #[error("Shell error: {0}")]
    Shell(String),

    #[error("Skill error: {0}")]
    Skill(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Task cancelled")]
    Cancelled,
}

impl PilotError {
    /// Whether the retry wrapper may re-run a script after this failure.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PilotError::ExecutionTimeout(_) | PilotError::Cancelled | PilotError::InvalidStep(_)
        )
    }
}

impl serde::Serialize for PilotError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type PilotResult<T> = Result<T, PilotError>;
