use axum::http::StatusCode;
use axum::Json;

#[derive(Debug, thiserror::Error)]
pub enum MnemoError {
    #[error("content must not be empty")]
    EmptyContent,

    #[error("query must not be empty")]
    EmptyQuery,

    #[error("content exceeds maximum length")]
    ContentTooLong,

    #[error("invalid privacy tier: {0} (expected 1, 2, or 3)")]
    InvalidPrivacy(u8),

    #[error("invalid memory mode: {0} (expected 'persistent' or 'humanized')")]
    InvalidMode(String),

    #[error("no team mapping for {0}")]
    UnknownTeam(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("embedding backend error: {0}")]
    EmbedBackend(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MnemoError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound | Self::UnknownTeam(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::EmbedBackend(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl axum::response::IntoResponse for MnemoError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
