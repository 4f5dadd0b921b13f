use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, ProfileChanges, User};

const USER_COLUMNS: &str = "id, email, password_hash, name, gender, weight, daily_activity_time, \
     daily_water_norm, avatar_url, token, refresh_token, created_at, updated_at";

/// Another row already holds the requested email.
#[derive(Debug, Error)]
#[error("email already in use")]
pub struct EmailTaken;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// Returns `None` when the email is already taken.
    async fn create(&self, new_user: NewUser) -> anyhow::Result<Option<User>>;
    /// Overwrites both token columns in a single write.
    async fn set_tokens(
        &self,
        id: Uuid,
        token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> anyhow::Result<()>;
    /// Fails with [`EmailTaken`] when the new email belongs to someone else.
    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> anyhow::Result<Option<User>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, name, password_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO NOTHING
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new_user.email)
        .bind(&new_user.name)
        .bind(&new_user.password_hash)
        .fetch_optional(&self.db)
        .await
        .context("insert user")?;
        Ok(user)
    }

    async fn set_tokens(
        &self,
        id: Uuid,
        token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET token = $2, refresh_token = $3, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .bind(refresh_token)
        .execute(&self.db)
        .await
        .context("store user tokens")?;
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET name                = COALESCE($2, name),
                   email               = COALESCE($3, email),
                   gender              = COALESCE($4, gender),
                   weight              = COALESCE($5, weight),
                   daily_activity_time = COALESCE($6, daily_activity_time),
                   daily_water_norm    = COALESCE($7, daily_water_norm),
                   avatar_url          = COALESCE($8, avatar_url),
                   updated_at          = now()
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.email)
        .bind(changes.gender.map(|g| g.as_str()))
        .bind(changes.weight)
        .bind(&changes.daily_activity_time)
        .bind(changes.daily_water_norm)
        .bind(&changes.avatar_url)
        .fetch_optional(&self.db)
        .await;
        match user {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(EmailTaken.into()),
            Err(e) => Err(anyhow::Error::new(e).context("update user profile")),
        }
    }
}
