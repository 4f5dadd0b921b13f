use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::repo_types::{Gender, User};

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Profile update body, after empty values have been pruned.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub weight: Option<f64>,
    pub daily_activity_time: Option<String>,
    pub daily_water_norm: Option<f64>,
    #[serde(rename = "avatarURL")]
    pub avatar_url: Option<String>,
}

/// Response returned after login or register.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
    pub refresh_token: String,
}

/// Response returned after refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensResponse {
    pub token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: PublicUser,
}

/// Public part of the user returned to the client. Credentials never leave the server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub email: String,
    pub name: Option<String>,
    pub gender: Gender,
    pub weight: f64,
    pub daily_activity_time: String,
    pub daily_water_norm: f64,
    #[serde(rename = "avatarURL")]
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
            gender: user.gender,
            weight: user.weight,
            daily_activity_time: user.daily_activity_time.clone(),
            daily_water_norm: user.daily_water_norm,
            avatar_url: user.avatar_url.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
