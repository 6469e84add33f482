use std::fmt;

/// Error types that can occur when interacting with chat/embedding providers.
#[derive(Debug)]
pub enum LLMError {
    /// HTTP request/response errors.
    Http(String),
    /// Authentication and authorization errors.
    Auth(String),
    /// Invalid request parameters or format.
    InvalidRequest(String),
    /// Errors returned by the provider itself.
    Provider(String),
    /// API response parsing or format error.
    ResponseFormat { message: String, raw_response: String },
    /// JSON serialization/deserialization errors.
    Json(String),
    /// The provider does not implement the requested capability.
    NotImplemented(String),
}

impl fmt::Display for LLMError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LLMError::Http(e) => write!(f, "HTTP error: {e}"),
            LLMError::Auth(e) => write!(f, "auth error: {e}"),
            LLMError::InvalidRequest(e) => write!(f, "invalid request: {e}"),
            LLMError::Provider(e) => write!(f, "provider error: {e}"),
            LLMError::ResponseFormat { message, raw_response } => {
                write!(f, "response format error: {message}. raw: {raw_response}")
            }
            LLMError::Json(e) => write!(f, "json error: {e}"),
            LLMError::NotImplemented(e) => write!(f, "not implemented: {e}"),
        }
    }
}

impl std::error::Error for LLMError {}

impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        LLMError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        LLMError::Json(format!("{err} at line {} column {}", err.line(), err.column()))
    }
}

impl From<url::ParseError> for LLMError {
    fn from(err: url::ParseError) -> Self {
        LLMError::InvalidRequest(format!("error parsing url: {err}"))
    }
}
