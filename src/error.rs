use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Every way an arbitration decision can come back negative.
///
/// Everything except `Database` is a decision: the services never retry it and the
/// caller gets it verbatim. `Conflict` means a race was lost; re-read state before
/// deciding to try again.
#[derive(Debug, Error)]
pub enum ArbitrationError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("not enough capacity: requested {requested}, available {available}")]
    CapacityExceeded { requested: i64, available: i64 },

    #[error("user is already registered for this hackathon")]
    AlreadyRegistered,

    #[error("organizers cannot register for their own hackathon")]
    OrganizerRestriction,

    #[error("registration window is closed")]
    WindowClosed,

    #[error("not allowed: {0}")]
    Authorization(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("payment required: {0}")]
    PaymentRequired(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

pub type ArbitrationResult<T> = Result<T, ArbitrationError>;

impl ArbitrationError {
    pub fn code(&self) -> &'static str {
        match self {
            ArbitrationError::Validation(_) => "validation_error",
            ArbitrationError::CapacityExceeded { .. } => "capacity_exceeded",
            ArbitrationError::AlreadyRegistered => "already_registered",
            ArbitrationError::OrganizerRestriction => "organizer_restriction",
            ArbitrationError::WindowClosed => "window_closed",
            ArbitrationError::Authorization(_) => "authorization_error",
            ArbitrationError::NotFound(_) => "not_found",
            ArbitrationError::PaymentRequired(_) => "payment_required",
            ArbitrationError::Conflict(_) => "conflict",
            ArbitrationError::Database(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ArbitrationError::Validation(_) => StatusCode::BAD_REQUEST,
            ArbitrationError::CapacityExceeded { .. }
            | ArbitrationError::AlreadyRegistered
            | ArbitrationError::Conflict(_) => StatusCode::CONFLICT,
            ArbitrationError::OrganizerRestriction | ArbitrationError::Authorization(_) => {
                StatusCode::FORBIDDEN
            }
            ArbitrationError::WindowClosed => StatusCode::UNPROCESSABLE_ENTITY,
            ArbitrationError::NotFound(_) => StatusCode::NOT_FOUND,
            ArbitrationError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            ArbitrationError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for ArbitrationError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // SQLITE_BUSY / SQLITE_LOCKED and their extended codes: another writer won.
            let busy = matches!(db_err.code().as_deref(), Some("5" | "6" | "261" | "262" | "517"));
            if busy {
                return ArbitrationError::Conflict("storage is busy, re-read and retry".into());
            }
            if db_err.is_unique_violation() || db_err.is_check_violation() {
                return ArbitrationError::Conflict(db_err.message().to_string());
            }
        }
        ArbitrationError::Database(err)
    }
}

impl IntoResponse for ArbitrationError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        }
        let body = serde_json::json!({
            "error": self.code(),
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
