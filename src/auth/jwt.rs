use std::time::Duration;

use anyhow::Context;
use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::{
        claims::{Claims, TokenKind},
        repo::UserStore,
    },
    config::JwtConfig,
    state::AppState,
};

/// Signing and verification keys. Access and refresh tokens use separate secrets.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

/// Freshly minted pair, already persisted on the user row.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(cfg.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(cfg.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64) * 60),
            refresh_ttl: Duration::from_secs((cfg.refresh_ttl_minutes.max(0) as u64) * 60),
        }
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        JwtKeys::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn sign_with_kind(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let (ttl, key) = match kind {
            TokenKind::Access => (self.access_ttl, &self.access_encoding),
            TokenKind::Refresh => (self.refresh_ttl, &self.refresh_encoding),
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::default(), &claims, key)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok(token)
    }

    pub fn sign_access(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, TokenKind::Access)
    }

    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.sign_with_kind(user_id, TokenKind::Refresh)
    }

    fn verify_with_kind(&self, token: &str, kind: TokenKind) -> anyhow::Result<Claims> {
        let key = match kind {
            TokenKind::Access => &self.access_decoding,
            TokenKind::Refresh => &self.refresh_decoding,
        };
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, key, &validation)?;
        if data.claims.kind != kind {
            anyhow::bail!("expected {kind:?} token");
        }
        debug!(user_id = %data.claims.sub, kind = ?kind, "jwt verified");
        Ok(data.claims)
    }

    /// Returns the user id carried by a valid access token.
    pub fn verify_access(&self, token: &str) -> anyhow::Result<Uuid> {
        Ok(self.verify_with_kind(token, TokenKind::Access)?.sub)
    }

    /// Returns the user id carried by a valid refresh token.
    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Uuid> {
        Ok(self.verify_with_kind(token, TokenKind::Refresh)?.sub)
    }
}

/// Mints a new pair and stores it on the user, replacing whatever pair was live.
pub async fn issue_tokens(
    keys: &JwtKeys,
    users: &dyn UserStore,
    user_id: Uuid,
) -> anyhow::Result<TokenPair> {
    let token = keys.sign_access(user_id).context("sign access token")?;
    let refresh_token = keys.sign_refresh(user_id).context("sign refresh token")?;
    users
        .set_tokens(user_id, Some(&token), Some(&refresh_token))
        .await?;
    Ok(TokenPair {
        token,
        refresh_token,
    })
}

/// Drops the live pair. Calling it twice is harmless.
pub async fn revoke_tokens(users: &dyn UserStore, user_id: Uuid) -> anyhow::Result<()> {
    users.set_tokens(user_id, None, None).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::NewUser;
    use crate::memory::MemoryUserStore;

    fn jwt_config(issuer: &str, audience: &str) -> JwtConfig {
        JwtConfig {
            access_secret: "access-secret".into(),
            refresh_secret: "refresh-secret".into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
            refresh_ttl_minutes: 60,
        }
    }

    fn make_keys() -> JwtKeys {
        JwtKeys::from(&jwt_config("test-issuer", "test-aud"))
    }

    #[test]
    fn sign_and_verify_access_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_access(user_id).expect("sign access");
        assert_eq!(keys.verify_access(&token).expect("verify access"), user_id);
    }

    #[test]
    fn sign_and_verify_refresh_token() {
        let keys = make_keys();
        let user_id = Uuid::new_v4();
        let token = keys.sign_refresh(user_id).expect("sign refresh");
        assert_eq!(keys.verify_refresh(&token).expect("verify refresh"), user_id);
    }

    #[test]
    fn tokens_are_not_interchangeable() {
        let keys = make_keys();
        let access = keys.sign_access(Uuid::new_v4()).expect("sign access");
        let refresh = keys.sign_refresh(Uuid::new_v4()).expect("sign refresh");
        assert!(keys.verify_refresh(&access).is_err());
        assert!(keys.verify_access(&refresh).is_err());
    }

    #[test]
    fn verify_rejects_wrong_issuer_or_audience() {
        let good_keys = make_keys();
        let bad_keys = JwtKeys::from(&jwt_config("bad-iss", "bad-aud"));
        let token = good_keys.sign_access(Uuid::new_v4()).expect("sign access");
        assert!(bad_keys.verify_access(&token).is_err());
    }

    #[test]
    fn verify_rejects_garbage() {
        assert!(make_keys().verify_access("not.a.jwt").is_err());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = make_keys();
        let past = OffsetDateTime::now_utc() - TimeDuration::hours(2);
        let claims = Claims {
            sub: Uuid::new_v4(),
            iat: past.unix_timestamp() as usize,
            exp: (past + TimeDuration::minutes(5)).unix_timestamp() as usize,
            iss: keys.issuer.clone(),
            aud: keys.audience.clone(),
            kind: TokenKind::Access,
            jti: Uuid::new_v4(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"access-secret"),
        )
        .expect("encode");
        assert!(keys.verify_access(&token).is_err());
    }

    #[tokio::test]
    async fn issue_overwrites_previous_pair() {
        let keys = make_keys();
        let users = MemoryUserStore::default();
        let user = users
            .create(NewUser {
                email: "a@b.co".into(),
                name: None,
                password_hash: "x".into(),
            })
            .await
            .unwrap()
            .unwrap();

        let first = issue_tokens(&keys, &users, user.id).await.unwrap();
        let second = issue_tokens(&keys, &users, user.id).await.unwrap();
        assert_ne!(first.token, second.token);

        let stored = users.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.token.as_deref(), Some(second.token.as_str()));
        assert_eq!(
            stored.refresh_token.as_deref(),
            Some(second.refresh_token.as_str())
        );
        assert_eq!(users.token_writes(), 2);

        revoke_tokens(&users, user.id).await.unwrap();
        revoke_tokens(&users, user.id).await.unwrap();
        let stored = users.find_by_id(user.id).await.unwrap().unwrap();
        assert!(stored.token.is_none() && stored.refresh_token.is_none());
    }
}
