use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest, UpdateUserRequest},
        jwt::{issue_tokens, revoke_tokens, JwtKeys, TokenPair},
        password::{hash_password, verify_password},
        repo::EmailTaken,
        repo_types::{Gender, NewUser, ProfileChanges, User},
    },
    error::AppError,
    state::AppState,
};

const PASSWORD_MIN: usize = 4;
const PASSWORD_MAX: usize = 22;

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref ACTIVITY_TIME_RE: Regex = Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").unwrap();
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn required<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str, AppError> {
    match value.as_deref() {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!("\"{field}\" is required"))),
    }
}

fn check_email(email: &str) -> Result<(), AppError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(AppError::Validation("\"email\" must be a valid email".into()))
    }
}

fn check_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if len < PASSWORD_MIN {
        return Err(AppError::Validation(format!(
            "\"password\" length must be at least {PASSWORD_MIN} characters long"
        )));
    }
    if len > PASSWORD_MAX {
        return Err(AppError::Validation(format!(
            "\"password\" length must be less than or equal to {PASSWORD_MAX} characters long"
        )));
    }
    Ok(())
}

/// Drops null values, blank strings and empty arrays from an update body.
pub(crate) fn remove_empty_props(body: Map<String, Value>) -> Map<String, Value> {
    body.into_iter()
        .filter(|(_, value)| match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        })
        .collect()
}

pub(crate) fn parse_profile_changes(body: Value) -> Result<ProfileChanges, AppError> {
    let Value::Object(map) = body else {
        return Err(AppError::Validation("\"value\" must be of type object".into()));
    };
    let req: UpdateUserRequest = serde_json::from_value(Value::Object(remove_empty_props(map)))
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let email = match req.email {
        Some(raw) => {
            let email = normalize_email(&raw);
            check_email(&email)?;
            Some(email)
        }
        None => None,
    };
    let gender = req
        .gender
        .map(|g| {
            Gender::try_from(g)
                .map_err(|_| AppError::Validation("\"gender\" must be one of [woman, man]".into()))
        })
        .transpose()?;
    if req.weight.is_some_and(|w| w < 0.0) {
        return Err(AppError::Validation(
            "\"weight\" must be greater than or equal to 0".into(),
        ));
    }
    if req.daily_water_norm.is_some_and(|n| n < 0.0) {
        return Err(AppError::Validation(
            "\"dailyWaterNorm\" must be greater than or equal to 0".into(),
        ));
    }
    if let Some(t) = &req.daily_activity_time {
        if !ACTIVITY_TIME_RE.is_match(t) {
            return Err(AppError::Validation(
                "\"dailyActivityTime\" must be hh:mm".into(),
            ));
        }
    }

    Ok(ProfileChanges {
        name: req.name,
        email,
        gender,
        weight: req.weight,
        daily_activity_time: req.daily_activity_time,
        daily_water_norm: req.daily_water_norm,
        avatar_url: req.avatar_url,
    })
}

pub async fn register_user(
    state: &AppState,
    req: RegisterRequest,
) -> Result<(User, TokenPair), AppError> {
    let email = normalize_email(required("email", &req.email)?);
    check_email(&email)?;
    let password = required("password", &req.password)?;
    check_password(password)?;

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("Email in use".into()));
    }

    let password_hash = hash_password(password)?;
    let user = state
        .users
        .create(NewUser {
            email,
            name: req.name.filter(|n| !n.trim().is_empty()),
            password_hash,
        })
        .await?
        .ok_or_else(|| AppError::Conflict("Email in use".into()))?;

    let keys = JwtKeys::from_ref(state);
    let tokens = issue_tokens(&keys, state.users.as_ref(), user.id).await?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((user, tokens))
}

pub async fn login_user(state: &AppState, req: LoginRequest) -> Result<(User, TokenPair), AppError> {
    let email = normalize_email(required("email", &req.email)?);
    check_email(&email)?;
    let password = required("password", &req.password)?;
    check_password(password)?;

    let Some(user) = state.users.find_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(state);
    let tokens = issue_tokens(&keys, state.users.as_ref(), user.id).await?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((user, tokens))
}

pub async fn logout_user(state: &AppState, user: &User) -> Result<(), AppError> {
    revoke_tokens(state.users.as_ref(), user.id).await?;
    info!(user_id = %user.id, "user logged out");
    Ok(())
}

pub async fn update_user(
    state: &AppState,
    user: User,
    changes: ProfileChanges,
) -> Result<User, AppError> {
    if changes.is_empty() {
        return Ok(user);
    }
    if let Some(email) = changes.email.as_deref().filter(|e| *e != user.email) {
        if let Some(other) = state.users.find_by_email(email).await? {
            if other.id != user.id {
                warn!(user_id = %user.id, email = %email, "email already registered");
                return Err(AppError::Conflict("Email in use".into()));
            }
        }
    }
    state
        .users
        .update_profile(user.id, &changes)
        .await
        .map_err(|e| {
            if e.is::<EmailTaken>() {
                warn!(user_id = %user.id, "email taken concurrently");
                AppError::Conflict("Email in use".into())
            } else {
                AppError::Internal(e)
            }
        })?
        .ok_or(AppError::Unauthorized)
}

pub async fn refresh_tokens(state: &AppState, user: &User) -> Result<TokenPair, AppError> {
    let keys = JwtKeys::from_ref(state);
    let tokens = issue_tokens(&keys, state.users.as_ref(), user.id).await?;
    info!(user_id = %user.id, "tokens refreshed");
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;
    use uuid::Uuid;

    use crate::{
        auth::repo::UserStore,
        memory::{MemoryUserStore, ScriptedModels},
    };

    /// Hides existing emails from lookups, so the uniqueness check only
    /// happens at write time, as when two updates race.
    #[derive(Default)]
    struct StaleLookups(MemoryUserStore);

    #[async_trait]
    impl UserStore for StaleLookups {
        async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
            self.0.find_by_id(id).await
        }

        async fn find_by_email(&self, _email: &str) -> anyhow::Result<Option<User>> {
            Ok(None)
        }

        async fn create(&self, new_user: NewUser) -> anyhow::Result<Option<User>> {
            self.0.create(new_user).await
        }

        async fn set_tokens(
            &self,
            id: Uuid,
            token: Option<&str>,
            refresh_token: Option<&str>,
        ) -> anyhow::Result<()> {
            self.0.set_tokens(id, token, refresh_token).await
        }

        async fn update_profile(
            &self,
            id: Uuid,
            changes: &ProfileChanges,
        ) -> anyhow::Result<Option<User>> {
            self.0.update_profile(id, changes).await
        }
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            name: None,
            password_hash: "x".into(),
        }
    }

    #[tokio::test]
    async fn email_taken_at_write_time_is_conflict() {
        let users = Arc::new(StaleLookups::default());
        users.create(new_user("first@example.com")).await.unwrap();
        let second = users
            .create(new_user("second@example.com"))
            .await
            .unwrap()
            .unwrap();

        let base = AppState::fake(Arc::new(ScriptedModels::new()));
        let state =
            AppState::from_parts(base.config.clone(), users, base.water.clone(), base.ai.clone());
        let changes = ProfileChanges {
            email: Some("first@example.com".into()),
            ..Default::default()
        };

        let err = update_user(&state, second, changes).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(ref m) if m == "Email in use"));
    }

    #[test]
    fn email_format() {
        assert!(is_valid_email("jane@example.com"));
        assert!(!is_valid_email("jane@example"));
        assert!(!is_valid_email("jane example@x.io"));
    }

    #[test]
    fn remove_empty_props_drops_blank_values() {
        let Value::Object(map) = json!({
            "name": "  ",
            "avatarURL": null,
            "tags": [],
            "weight": 0,
            "gender": "man"
        }) else {
            unreachable!()
        };
        let pruned = remove_empty_props(map);
        assert_eq!(pruned.len(), 2);
        assert_eq!(pruned["weight"], json!(0));
        assert_eq!(pruned["gender"], json!("man"));
    }

    #[test]
    fn blank_update_yields_no_changes() {
        let changes =
            parse_profile_changes(json!({ "name": "", "email": "   ", "avatarURL": null }))
                .unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn update_rejects_unknown_gender() {
        let err = parse_profile_changes(json!({ "gender": "other" })).unwrap_err();
        assert!(err.to_string().contains("\"gender\" must be one of"));
    }

    #[test]
    fn update_rejects_unknown_field() {
        let err = parse_profile_changes(json!({ "password": "hunter22" })).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn update_normalizes_email() {
        let changes = parse_profile_changes(json!({ "email": " New@Mail.com " })).unwrap();
        assert_eq!(changes.email.as_deref(), Some("new@mail.com"));
    }

    #[test]
    fn update_checks_activity_time() {
        assert!(parse_profile_changes(json!({ "dailyActivityTime": "01:30" })).is_ok());
        assert!(parse_profile_changes(json!({ "dailyActivityTime": "1h30" })).is_err());
    }

    #[test]
    fn password_length_bounds() {
        assert!(check_password("abc").is_err());
        assert!(check_password("abcd").is_ok());
        assert!(check_password(&"x".repeat(22)).is_ok());
        assert!(check_password(&"x".repeat(23)).is_err());
    }
}
