use academy::leveling::XpError;
use academy::portfolio::PortfolioError;
use academy::quest::QuestError;
use academy::quiz::QuizError;
use academy::social::SocialError;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::market_data::MarketDataError;

/// Every failure a handler can return. Rendered as
/// `{"success": false, "error": "<message>"}` with the matching status.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {:#}", self);
        }
        let body = json!({
            "success": false,
            "error": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

impl From<PortfolioError> for ApiError {
    fn from(err: PortfolioError) -> Self {
        match err {
            PortfolioError::PositionNotFound => ApiError::NotFound(err.to_string()),
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<QuizError> for ApiError {
    fn from(err: QuizError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<XpError> for ApiError {
    fn from(err: XpError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<QuestError> for ApiError {
    fn from(err: QuestError) -> Self {
        ApiError::Forbidden(err.to_string())
    }
}

impl From<SocialError> for ApiError {
    fn from(err: SocialError) -> Self {
        let msg = err.to_string();
        match err {
            SocialError::SelfRequest => ApiError::BadRequest(msg),
            SocialError::AlreadyFriends | SocialError::DuplicateRequest => ApiError::Conflict(msg),
            SocialError::RequestNotFound => ApiError::NotFound(msg),
            SocialError::NotFriends => ApiError::Forbidden(msg),
        }
    }
}

impl From<MarketDataError> for ApiError {
    fn from(err: MarketDataError) -> Self {
        match err {
            MarketDataError::NotFound(_) | MarketDataError::NoOptions(_) => {
                ApiError::NotFound(err.to_string())
            }
            MarketDataError::InvalidPeriod(_) => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
