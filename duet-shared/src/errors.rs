use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::store::StoreError;
use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{domain}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors
/// - E2xxx: Profile errors
/// - E3xxx: Matching errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    ServiceUnavailable,
    StoreConflict,

    // Auth (E1xxx)
    TokenExpired,
    TokenInvalid,

    // Profile (E2xxx)
    OnboardingIncomplete,
    CannotBlockSelf,

    // Matching (E3xxx)
    MatchNotFound,
    DeckNotBuilt,
    DeckExhausted,
    SwipeInFlight,
    CannotSwipeSelf,
    MatchPending,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::ServiceUnavailable => "E0006",
            Self::StoreConflict => "E0007",

            // Auth
            Self::TokenExpired => "E1001",
            Self::TokenInvalid => "E1002",

            // Profile
            Self::OnboardingIncomplete => "E2001",
            Self::CannotBlockSelf => "E2002",

            // Matching
            Self::MatchNotFound => "E3001",
            Self::DeckNotBuilt => "E3002",
            Self::DeckExhausted => "E3003",
            Self::SwipeInFlight => "E3004",
            Self::CannotSwipeSelf => "E3005",
            Self::MatchPending => "E3006",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable | Self::StoreConflict | Self::MatchPending => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::ValidationError => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::MatchNotFound | Self::DeckNotBuilt => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden | Self::OnboardingIncomplete => StatusCode::FORBIDDEN,
            Self::SwipeInFlight | Self::DeckExhausted => StatusCode::CONFLICT,
            Self::CannotBlockSelf | Self::CannotSwipeSelf => StatusCode::FORBIDDEN,
        }
    }

    /// Whether a client may simply repeat the request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable
                | Self::StoreConflict
                | Self::MatchPending
                | Self::SwipeInFlight
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Error code this error is reported under.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::Known { code, .. } => *code,
            AppError::Store(err) => store_error_code(err),
        }
    }
}

fn store_error_code(err: &StoreError) -> ErrorCode {
    match err {
        StoreError::NotFound { .. } => ErrorCode::NotFound,
        StoreError::Conflict { .. } => ErrorCode::StoreConflict,
        StoreError::Unavailable(_) => ErrorCode::ServiceUnavailable,
        _ => ErrorCode::InternalError,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                if *code == ErrorCode::InternalError {
                    tracing::error!(error = %message, "internal server error");
                }
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Store(err) => {
                let code = store_error_code(err);
                if err.is_retryable() {
                    tracing::warn!(error = %err, "transient store error");
                } else {
                    tracing::error!(error = %err, "store error");
                }
                let message = match code {
                    ErrorCode::NotFound => "resource not found",
                    ErrorCode::StoreConflict => "concurrent update, please retry",
                    ErrorCode::ServiceUnavailable => "store unavailable, please retry",
                    _ => "store error",
                };
                let resp = ApiErrorResponse::new(code.code(), message)
                    .with_details(serde_json::json!({ "retryable": err.is_retryable() }));
                (code.status_code(), resp)
            }
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_domain_ranges() {
        assert_eq!(ErrorCode::StoreConflict.code(), "E0007");
        assert_eq!(ErrorCode::OnboardingIncomplete.code(), "E2001");
        assert_eq!(ErrorCode::SwipeInFlight.code(), "E3004");
    }

    #[test]
    fn transient_codes_are_retryable() {
        assert!(ErrorCode::MatchPending.is_retryable());
        assert!(ErrorCode::StoreConflict.is_retryable());
        assert!(!ErrorCode::DeckExhausted.is_retryable());
        assert_eq!(ErrorCode::MatchPending.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn store_errors_map_to_codes() {
        let conflict = AppError::from(StoreError::Conflict { attempts: 5 });
        assert_eq!(conflict.error_code(), ErrorCode::StoreConflict);

        let missing = AppError::from(StoreError::NotFound {
            collection: "matches".into(),
            id: "a_b".into(),
        });
        assert_eq!(missing.error_code(), ErrorCode::NotFound);

        let response = AppError::from(StoreError::Unavailable("timeout".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn validation_errors_are_bad_requests() {
        let err = AppError::validation("preferredGenders: unknown variant");
        assert_eq!(err.error_code(), ErrorCode::ValidationError);
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
