use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::Value;
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, PublicUser, RegisterRequest, TokensResponse,
            UserEnvelope,
        },
        extractors::{CurrentUser, RefreshUser, ValidJson},
        services,
    },
    error::AppError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/logout", get(logout))
        .route("/users/current", get(current))
        .route("/users/update", patch(update))
        .route("/users/refresh", patch(refresh))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let (user, tokens) = services::register_user(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: PublicUser::from(&user),
            token: tokens.token,
            refresh_token: tokens.refresh_token,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ValidJson(payload): ValidJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let (user, tokens) = services::login_user(&state, payload).await?;
    Ok(Json(AuthResponse {
        user: PublicUser::from(&user),
        token: tokens.token,
        refresh_token: tokens.refresh_token,
    }))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<StatusCode, AppError> {
    services::logout_user(&state, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn current(CurrentUser(user): CurrentUser) -> Json<UserEnvelope> {
    Json(UserEnvelope {
        user: PublicUser::from(&user),
    })
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidJson(body): ValidJson<Value>,
) -> Result<Json<UserEnvelope>, AppError> {
    let changes = services::parse_profile_changes(body)?;
    let user = services::update_user(&state, user, changes).await?;
    Ok(Json(UserEnvelope {
        user: PublicUser::from(&user),
    }))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn refresh(
    State(state): State<AppState>,
    RefreshUser(user): RefreshUser,
) -> Result<Json<TokensResponse>, AppError> {
    let tokens = services::refresh_tokens(&state, &user).await?;
    Ok(Json(TokensResponse {
        token: tokens.token,
        refresh_token: tokens.refresh_token,
    }))
}
