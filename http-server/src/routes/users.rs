use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    models::AuthenticatedUser,
};

// Login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// Login response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub message: String,
    pub session_id: String,
    pub user: AuthenticatedUser,
}

// Login endpoint
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(payload) = payload?;

    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::InvalidRequest(
            "Email and password are required".to_string(),
        ));
    }

    // Generate session_id hash from email, a NUL separator, then password
    let mut hasher = Sha256::new();
    hasher.update(payload.email.as_bytes());
    hasher.update([0u8]);
    hasher.update(payload.password.as_bytes());
    let session_id = hex::encode(hasher.finalize());

    let user = state
        .storage
        .get_or_create_account_with_session(&payload.email, &session_id)
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".to_string()))?;

    tracing::info!(
        "User {} logged in ({} registered)",
        user.user_id,
        state.storage.user_count()
    );

    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        session_id: user.session_id.clone(),
        user: AuthenticatedUser::from(user),
    }))
}

// User profile response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileResponse {
    pub success: bool,
    pub user: AuthenticatedUser,
    pub balance: i64,
}

// Get user profile endpoint (protected route)
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Json<UserProfileResponse> {
    let balance = state.ledger.balance(user.user_id);
    Json(UserProfileResponse {
        success: true,
        user,
        balance,
    })
}
