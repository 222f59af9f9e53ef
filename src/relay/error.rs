use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid credentials")]
    Authentication,

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    MissingCredentials(String),

    #[error("{0}")]
    BadRequest(String),

    /// An extractor refused the request, axum's status is kept.
    #[error("{1}")]
    Rejected(StatusCode, String),
}

impl From<JsonRejection> for RelayError {
    fn from(rejection: JsonRejection) -> Self {
        RelayError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for RelayError {
    fn from(rejection: PathRejection) -> Self {
        RelayError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for RelayError {
    fn from(rejection: QueryRejection) -> Self {
        RelayError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = match self {
            RelayError::Authentication | RelayError::MissingCredentials(_) => {
                StatusCode::UNAUTHORIZED
            }
            RelayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Rejected(status, _) => status,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
