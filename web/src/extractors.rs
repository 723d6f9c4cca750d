//! Custom Axum extractors.
//!
//! - [`BearerToken`]: the token from `Authorization: Bearer <token>`
//! - [`StaffActor`]: the staff identity the token resolves to
//! - [`RequestId`]: the id assigned by [`request_id`](crate::middleware::request_id)

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use helpdesk_core::Actor;
use uuid::Uuid;

/// Bearer token from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("Invalid authorization format. Expected 'Bearer <token>'"))?
            .trim();

        if token.is_empty() {
            return Err(AppError::unauthorized("Empty bearer token"));
        }

        Ok(Self(token.to_string()))
    }
}

/// An authenticated staff member.
///
/// Rejects the request with 401 if the token is missing, unknown or expired.
#[derive(Debug, Clone)]
pub struct StaffActor(pub Actor);

#[async_trait]
impl FromRequestParts<AppState> for StaffActor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let actor = state.gateway.resolve(&token).await?;
        Ok(Self(actor))
    }
}

/// Id of the current request.
#[derive(Debug, Clone, Copy)]
pub struct RequestId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Uuid>().copied().unwrap_or_else(Uuid::new_v4)))
    }
}
