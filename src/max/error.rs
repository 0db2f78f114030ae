use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Failure of a single MAX API call
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to MAX API failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(
        "MAX API error ({status}{}): {message}",
        .code.as_ref().map(|c| format!(", {c}")).unwrap_or_default()
    )]
    Status {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },

    #[error("failed to decode MAX API response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Build a `Status` error from a non-2xx response body. MAX answers with
    /// `{"code": ..., "message": ...}`; anything else is kept verbatim.
    pub(crate) fn from_response(status: StatusCode, body: &[u8]) -> Self {
        #[derive(Deserialize)]
        struct ErrorBody {
            #[serde(default)]
            code: Option<String>,
            #[serde(default)]
            message: Option<String>,
        }

        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(parsed) => ApiError::Status {
                status,
                code: parsed.code,
                message: parsed
                    .message
                    .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned()),
            },
            Err(_) => ApiError::Status {
                status,
                code: None,
                message: String::from_utf8_lossy(body).into_owned(),
            },
        }
    }
}

/// Fatal startup failure: the bot cannot authenticate against the API.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("bot token is missing; set the TOKEN environment variable")]
    MissingToken,

    #[error("invalid API base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to fetch bot info: {0}")]
    Liveness(#[source] ApiError),
}
