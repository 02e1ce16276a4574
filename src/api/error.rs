//! Client-side error taxonomy for backend calls.

use serde::Deserialize;

use crate::models::ModelError;
use crate::session::AuthFailure;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Session is over; the caller must send the user back to login.
    #[error("{0}")]
    Auth(AuthFailure),

    #[error("Cannot connect to backend at {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Backend returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    /// Backend rejected an action; the message is meant for the user.
    #[error("{0}")]
    Domain(String),

    #[error("No tiene permiso para cambiar el estado del caso")]
    NotAuthorized,
}

impl ApiError {
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    pub fn auth_failure(&self) -> Option<AuthFailure> {
        match self {
            Self::Auth(failure) => Some(*failure),
            _ => None,
        }
    }

    /// Worth trying again at the next tick.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Auth(_) | Self::Domain(_) | Self::NotAuthorized)
    }
}

impl From<AuthFailure> for ApiError {
    fn from(failure: AuthFailure) -> Self {
        Self::Auth(failure)
    }
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        Self::ResponseParsing(e.to_string())
    }
}

/// Error body shapes the backend uses: `{ code }`, `{ error }`, `{ message }`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub(crate) fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    /// Human-readable text, `error` before `message`.
    pub(crate) fn text(&self) -> Option<&str> {
        self.error
            .as_deref()
            .or(self.message.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Decide whether a 401 body is one of the recognized authentication
/// failures. Code wins; message text is the fallback.
pub(crate) fn classify_unauthorized(body: &str) -> Option<AuthFailure> {
    let parsed = ErrorBody::parse(body);
    if let Some(failure) = parsed.code.as_deref().and_then(AuthFailure::from_code) {
        return Some(failure);
    }
    match parsed.text() {
        Some(text) => AuthFailure::from_message(text),
        None => AuthFailure::from_message(body),
    }
}
