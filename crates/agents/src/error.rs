use thiserror::Error;

pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors surfaced to the host runtime.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Named inputs or parameters did not match the agent's expected shape.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No agent registered under the requested name.
    #[error("Agent '{0}' not found")]
    AgentNotFound(String),

    /// No credential in the call parameters, the configuration, or the
    /// process environment.
    #[error("No API key in parameters, configuration, or the DEEPSEEK_API_KEY environment variable")]
    MissingApiKey,

    /// Authentication failed (missing or invalid API key).
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Insufficient quota or credits.
    #[error("Insufficient quota: {0}")]
    InsufficientQuota(String),

    /// Model not found at the provider.
    #[error("{0}")]
    ModelNotFound(String),

    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded { message: String },

    /// Provider API returned an error.
    #[error("Provider API error ({status}): {message}")]
    ProviderApiError { status: u16, message: String },

    /// Network or connection error.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Response decoding or another internal failure.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AgentError {
    /// Map an upstream HTTP status to the matching error variant.
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        match status {
            400 => Self::InvalidRequest(message),
            401 => Self::AuthenticationFailed(message),
            403 => Self::InsufficientQuota(message),
            404 => Self::ModelNotFound(message),
            429 => Self::RateLimitExceeded { message },
            500 => Self::InternalError(message),
            _ => Self::ProviderApiError { status, message },
        }
    }
}
