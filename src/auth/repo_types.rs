use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[default]
    Woman,
    Man,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Woman => "woman",
            Gender::Man => "man",
        }
    }
}

impl TryFrom<String> for Gender {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "woman" => Ok(Gender::Woman),
            "man" => Ok(Gender::Man),
            other => Err(format!("unknown gender {other}")),
        }
    }
}

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    #[sqlx(try_from = "String")]
    pub gender: Gender,
    pub weight: f64,
    pub daily_activity_time: String,
    pub daily_water_norm: f64,
    pub avatar_url: Option<String>,
    pub token: Option<String>,        // live access token
    pub refresh_token: Option<String>, // live refresh token
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields needed to insert a user; everything else takes column defaults.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
}

/// Profile fields to overwrite. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub gender: Option<Gender>,
    pub weight: Option<f64>,
    pub daily_activity_time: Option<String>,
    pub daily_water_norm: Option<f64>,
    pub avatar_url: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        *self == ProfileChanges::default()
    }
}
