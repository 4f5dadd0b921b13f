use axum::{
    async_trait,
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRef, FromRequest, FromRequestParts, Query, Request,
    },
    http::request::Parts,
    Json,
};
use tracing::warn;

use super::{dto::RefreshRequest, jwt::JwtKeys, repo_types::User};
use crate::{error::AppError, state::AppState};

/// Resolves the bearer access token to its user. The token must be the one
/// currently stored on the user row, so logged-out or superseded tokens fail.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|auth| auth.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AppError::Unauthorized)?;

        let keys = JwtKeys::from_ref(state);
        let user_id = keys.verify_access(token).map_err(|e| {
            warn!(error = %e, "invalid or expired access token");
            AppError::Unauthorized
        })?;

        let user = state
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;
        if user.token.as_deref() != Some(token) {
            warn!(user_id = %user.id, "access token is not the live one");
            return Err(AppError::Unauthorized);
        }
        Ok(CurrentUser(user))
    }
}

/// Same contract as [`CurrentUser`], keyed on `refreshToken` in the JSON body.
pub struct RefreshUser(pub User);

#[async_trait]
impl FromRequest<AppState> for RefreshUser {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|_| AppError::Unauthorized)?;
        let token = serde_json::from_slice::<RefreshRequest>(&body)
            .ok()
            .and_then(|r| r.refresh_token)
            .filter(|t| !t.trim().is_empty())
            .ok_or(AppError::Unauthorized)?;

        let keys = JwtKeys::from_ref(state);
        let user_id = keys.verify_refresh(&token).map_err(|e| {
            warn!(error = %e, "invalid or expired refresh token");
            AppError::Unauthorized
        })?;

        let user = state
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::Unauthorized)?;
        if user.refresh_token.as_deref() != Some(token.as_str()) {
            warn!(user_id = %user.id, "refresh token is not the live one");
            return Err(AppError::Unauthorized);
        }
        Ok(RefreshUser(user))
    }
}

/// `Json` whose rejections render as validation errors.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(ValidJson(value))
    }
}

/// `Query` whose rejections render as validation errors.
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(ValidQuery(value))
    }
}
