use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Text refused by the dosing/protocol screen
    #[error("Submission contains dosing or protocol language")]
    Screened(Vec<&'static str>),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) | AppError::Screened(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Internal(_)
            | AppError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::NotFound => json!({ "ok": false, "error": "Not found" }),
            AppError::Unauthorized => json!({ "ok": false, "error": "Unauthorized" }),
            AppError::Forbidden(msg) | AppError::BadRequest(msg) => {
                json!({ "ok": false, "error": msg })
            }
            AppError::Screened(reasons) => json!({
                "ok": false,
                "error": "Dosing or protocol instructions are not allowed",
                "reasons": reasons,
            }),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                internal_body()
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                internal_body()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal_body()
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                internal_body()
            }
        };

        (status, Json(body)).into_response()
    }
}

fn internal_body() -> serde_json::Value {
    json!({ "ok": false, "error": "Internal server error" })
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

pub type AppResult<T> = Result<T, AppError>;
