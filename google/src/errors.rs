use reqwest::StatusCode;
use serde::Deserialize;

#[derive(thiserror::Error, Debug)]
pub enum GoogleError {
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("Google API returned {status}: {message}")]
    Api { status: StatusCode, message: String },
}

impl GoogleError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GoogleError::NotFound(_))
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Turns a non-success response into the matching `GoogleError`.
///
/// Successful responses are passed through untouched.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, GoogleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or(body);

    Err(match status {
        StatusCode::UNAUTHORIZED => GoogleError::Auth(message),
        StatusCode::FORBIDDEN => GoogleError::PermissionDenied(message),
        StatusCode::NOT_FOUND => GoogleError::NotFound(message),
        _ => GoogleError::Api { status, message },
    })
}
