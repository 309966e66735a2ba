use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{ApiResult, Created, created, ok, ok_with};
use crate::{
    AppState,
    error::ApiError,
    extract::ApiJson,
    middleware::AuthUser,
    models::{AuthenticatedUser, User},
};

pub const MIN_PASSWORD_LEN: usize = 8;

// Register request
#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub username: String,
    pub display_name: Option<String>,
}

// Login request
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

// Session issued on login/registration
#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: AuthenticatedUser,
}

/// `local@domain.tld` with no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    }
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Created<SessionResponse> {
    let email = payload.email.trim().to_lowercase();
    let username = payload.username.trim().to_string();

    if email.is_empty() || payload.password.is_empty() || username.is_empty() {
        return Err(ApiError::bad_request(
            "Email, password and username are required",
        ));
    }
    if !is_valid_email(&email) {
        return Err(ApiError::bad_request("Invalid email format"));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let starting_cash = state.config.starting_cash;
    let session = state.write(|t| {
        if t.user_exists(&email, &username) {
            return Err(ApiError::Conflict(
                "User with this email or username already exists".to_string(),
            ));
        }
        let user = User::new(
            &email,
            &username,
            payload.display_name,
            &payload.password,
            starting_cash,
            Utc::now(),
        );
        let view = AuthenticatedUser::from(&user);
        t.users.push(user);
        let token = t.create_session(view.user_id);
        Ok::<_, ApiError>(SessionResponse { token, user: view })
    })?;

    tracing::info!("Registered user {} ({})", session.user.username, session.user.user_id);
    created("User registered successfully", session)
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<SessionResponse> {
    if payload.email.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let session = state.write(|t| {
        let user_id = t
            .user_by_email(payload.email.trim())
            .filter(|u| u.is_active && u.verify_password(&payload.password))
            .map(|u| u.user_id)
            .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;
        let user = t.user_mut(user_id)?;
        user.last_active = Utc::now();
        let view = AuthenticatedUser::from(&*user);
        let token = t.create_session(user_id);
        Ok::<_, ApiError>(SessionResponse { token, user: view })
    })?;

    tracing::info!("User {} logged in", session.user.user_id);
    ok_with("Login successful", session)
}

pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> ApiResult<()> {
    state.write(|t| t.end_session(&auth.token));
    tracing::info!("User {} logged out", auth.user_id);
    ok_with("Logged out", ())
}

pub async fn deactivate(State(state): State<AppState>, auth: AuthUser) -> ApiResult<()> {
    let ended = state.write(|t| t.deactivate_user(auth.user_id))?;
    tracing::info!("User {} deactivated, {} sessions ended", auth.user_id, ended);
    ok_with("Account deactivated", ())
}

pub async fn get_profile(State(state): State<AppState>, auth: AuthUser) -> ApiResult<User> {
    let user = state.storage.read(|t| t.user(auth.user_id).cloned())?;
    ok(user)
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> ApiResult<User> {
    let display_name = payload
        .display_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let avatar = payload
        .avatar
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty());
    if display_name.is_none() && avatar.is_none() {
        return Err(ApiError::bad_request("No valid fields to update"));
    }

    let user = state.write(|t| {
        let user = t.user_mut(auth.user_id)?;
        if let Some(name) = display_name {
            user.display_name = name;
        }
        if avatar.is_some() {
            user.avatar = avatar;
        }
        user.last_active = Utc::now();
        Ok::<_, ApiError>(user.clone())
    })?;
    ok_with("Profile updated", user)
}
