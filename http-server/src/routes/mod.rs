use axum::{Json, http::StatusCode};
use serde::Serialize;

use crate::error::ApiError;

pub mod auth;
pub mod education;
pub mod friends;
pub mod leaderboard;
pub mod market;
pub mod portfolio;
pub mod quizzes;
pub mod users;

/// Success envelope shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
pub type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        message: None,
        data,
    }))
}

pub fn ok_with<T>(message: impl Into<String>, data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        message: Some(message.into()),
        data,
    }))
}

pub fn created<T>(message: impl Into<String>, data: T) -> Created<T> {
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            success: true,
            message: Some(message.into()),
            data,
        }),
    ))
}
