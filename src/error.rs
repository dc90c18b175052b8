use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Multipart error: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("Excel export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            Error::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            Error::Validation(errs) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Validation failed", "fields": field_messages(&errs) }),
            ),
            Error::Database(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            ),
            Error::Json(err) => (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() })),
            Error::Reqwest(err) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": format!("External service error: {}", err) }),
            ),
            Error::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg })),
            Error::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            ),
            Error::Multipart(err) => (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() })),
            Error::Xlsx(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": format!("Export error: {}", err) }),
            ),
            Error::Anyhow(err) => (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() })),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "An unexpected error occurred" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Flattens `ValidationErrors` into `{ field: [message, ...] }` so API
/// consumers can attach messages to inputs without parsing display strings.
fn field_messages(errs: &validator::ValidationErrors) -> serde_json::Value {
    let mut fields = serde_json::Map::new();
    for (field, kinds) in errs.errors() {
        if let validator::ValidationErrorsKind::Field(list) = kinds {
            let messages: Vec<String> = list
                .iter()
                .map(|e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("The {} field is invalid", field),
                })
                .collect();
            fields.insert((*field).to_string(), json!(messages));
        }
    }
    serde_json::Value::Object(fields)
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}
