use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::services::payment::DelegateError;
use crate::store::StoreError;

/// Everything that can go wrong inside one booking session. None of these
/// are fatal to the process; the user can always restart the flow.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),
    #[error("movie '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Delegate(#[from] DelegateError),
    /// Деньги списаны, а бронь не сохранилась: нужна ручная сверка.
    #[error("payment {reference} succeeded but the booking could not be recorded: {source}")]
    PaymentNotRecorded {
        reference: String,
        #[source]
        source: StoreError,
    },
    #[error("another request for this booking session is still in progress")]
    Busy,
    #[error("booking session {0} not found")]
    SessionNotFound(Uuid),
}

impl BookingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BookingError::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            BookingError::NotFound(_) | BookingError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            BookingError::Store(StoreError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            BookingError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            BookingError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            BookingError::Delegate(_) => StatusCode::BAD_GATEWAY,
            BookingError::PaymentNotRecorded { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            BookingError::Busy => StatusCode::CONFLICT,
        }
    }
}

#[derive(Serialize)]
pub struct ApiError {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payment_reference: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            payment_reference: None,
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            BookingError::PaymentNotRecorded { reference, .. } => ApiError {
                success: false,
                message: "Payment was successful, but we couldn't save the booking. Please contact support."
                    .to_string(),
                payment_reference: Some(reference.clone()),
            },
            // внутренние детали хранилища наружу не отдаём
            BookingError::Store(e) if !matches!(e, StoreError::NotFound(_)) => {
                ApiError::new("Booking storage is temporarily unavailable, please try again")
            }
            other => ApiError::new(other.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn maps_error_kinds_to_status_codes() {
        assert_eq!(BookingError::validation("x").status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(BookingError::NotFound("Dune".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(BookingError::Busy.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            BookingError::Store(StoreError::Timeout(Duration::from_secs(5))).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            BookingError::Store(StoreError::Unavailable("down".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        let unrecorded = BookingError::PaymentNotRecorded {
            reference: "ref_1".into(),
            source: StoreError::Unavailable("down".into()),
        };
        assert_eq!(unrecorded.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(unrecorded.to_string().contains("ref_1"));
    }
}
