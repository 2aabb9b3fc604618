//! Error types for feed-ranking-service

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedRankingError>;

#[derive(Debug, Error)]
pub enum FeedRankingError {
    /// A store query failed or timed out. Signals recover from this locally.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ranking deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// Fatal at startup only, never raised while serving a request.
    #[error("Invalid weights: {0}")]
    InvalidWeights(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<envy::Error> for FeedRankingError {
    fn from(err: envy::Error) -> Self {
        FeedRankingError::Config(err.to_string())
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl ResponseError for FeedRankingError {
    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        HttpResponse::build(code).json(ErrorResponse {
            error: self.to_string(),
            code: code.as_u16(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match self {
            FeedRankingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            FeedRankingError::DataUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_maps_to_bad_request() {
        let err = FeedRankingError::InvalidInput("limit must be positive".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_deadline_message() {
        let err = FeedRankingError::DeadlineExceeded(Duration::from_millis(1500));
        assert!(err.to_string().contains("1.5s"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
