//! Staff authentication endpoints.

use crate::error::AppError;
use crate::extractors::{BearerToken, StaffActor};
use crate::state::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use helpdesk_auth::NewStaff;
use helpdesk_core::User;
use serde::{Deserialize, Serialize};

/// Login form.
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    /// Account email.
    pub email: String,
    /// Plaintext password.
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests.
    pub token: String,
    /// The token stops working at this instant.
    pub expires_at: DateTime<Utc>,
    /// The logged in account.
    pub user: User,
}

/// `POST /api/auth/login`
///
/// # Errors
///
/// 401 on unknown email or wrong password (indistinguishable).
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let login = state.gateway.login(&request.email, &request.password).await?;

    Ok(Json(LoginResponse {
        token: login.session.token,
        expires_at: login.session.expires_at,
        user: login.user,
    }))
}

/// `POST /api/auth/logout`. Unknown tokens are accepted silently.
///
/// # Errors
///
/// 401 if the header is missing or malformed.
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<StatusCode, AppError> {
    state.gateway.logout(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/auth/register`: an administrator creates a staff account.
///
/// # Errors
///
/// 401 without a session, 403 for non-admins, 409 if the email is taken,
/// 422 on invalid fields.
pub async fn register(
    State(state): State<AppState>,
    StaffActor(actor): StaffActor,
    Json(staff): Json<NewStaff>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.gateway.register(&actor, staff).await?;
    tracing::info!(admin = %actor.name, user = %user.email, "Staff account registered");
    Ok((StatusCode::CREATED, Json(user)))
}
