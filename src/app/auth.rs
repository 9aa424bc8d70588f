use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use sha2::{Digest, Sha256};
use sqlx::Row;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::user::{SubscriptionTier, User, UserRole};
use crate::infra::db::Db;

const TOKEN_ISSUER: &str = "voicetext";

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: OffsetDateTime,
}

pub enum SignupOutcome {
    Created(User),
    EmailTaken,
    UsernameTaken,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    session_key: [u8; 32],
    session_ttl_days: u64,
}

impl AuthService {
    pub fn new(db: Db, session_key: [u8; 32], session_ttl_days: u64) -> Self {
        Self {
            db,
            session_key,
            session_ttl_days,
        }
    }

    pub async fn signup(
        &self,
        email: String,
        username: String,
        password: String,
    ) -> Result<SignupOutcome> {
        let email_taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(&email)
                .fetch_one(self.db.pool())
                .await?;
        if email_taken {
            return Ok(SignupOutcome::EmailTaken);
        }
        let username_taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(&username)
                .fetch_one(self.db.pool())
                .await?;
        if username_taken {
            return Ok(SignupOutcome::UsernameTaken);
        }

        let password_hash = hash_password(&password)?;
        let row = sqlx::query(
            "INSERT INTO users (email, username, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING id, email, username, role, tier, created_at",
        )
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .fetch_one(self.db.pool())
        .await?;

        Ok(SignupOutcome::Created(user_from_row(&row)?))
    }

    pub async fn login(&self, identifier: &str, password: &str) -> Result<Option<(User, IssuedSession)>> {
        let row = sqlx::query(
            "SELECT id, email, username, role, tier, created_at, password_hash \
             FROM users WHERE email = $1 OR username = $1",
        )
        .bind(identifier)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let password_hash: String = row.get("password_hash");
        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        let user = user_from_row(&row)?;
        let session = self.issue_session(user.id).await?;
        Ok(Some((user, session)))
    }

    /// Mint a session token and persist its hash for revocation.
    pub async fn issue_session(&self, user_id: i64) -> Result<IssuedSession> {
        let session_id = Uuid::new_v4();
        let (claims, expires_at) = self.build_session_claims(user_id, session_id)?;
        let key = SymmetricKey::<V4>::from(&self.session_key)?;
        let token = local::encrypt(&key, &claims, None, None)?;
        let token_hash = hash_token(&token);

        sqlx::query(
            "INSERT INTO sessions (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(self.db.pool())
        .await?;

        Ok(IssuedSession { token, expires_at })
    }

    /// Resolve a session cookie value to a live session, or None if the token
    /// is malformed, expired, revoked, or the row is gone (cascade).
    pub async fn authenticate(&self, token: &str) -> Result<Option<AuthSession>> {
        let claims = match self.decrypt_claims(token)? {
            Some(claims) => claims,
            None => return Ok(None),
        };
        let user_id = claim_i64(&claims, "sub")?;
        let session_id = claim_uuid(&claims, "jti")?;
        let token_hash = hash_token(token);

        let row = sqlx::query(
            "SELECT id FROM sessions \
             WHERE id = $1 \
               AND user_id = $2 \
               AND token_hash = $3 \
               AND revoked_at IS NULL \
               AND expires_at > now()",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(token_hash)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|_| AuthSession { user_id }))
    }

    pub async fn revoke_session(&self, token: &str) -> Result<bool> {
        let claims = match self.decrypt_claims(token)? {
            Some(claims) => claims,
            None => return Ok(false),
        };
        let session_id = claim_uuid(&claims, "jti")?;
        let token_hash = hash_token(token);

        let result = sqlx::query(
            "UPDATE sessions SET revoked_at = now() \
             WHERE id = $1 AND token_hash = $2 AND revoked_at IS NULL",
        )
        .bind(session_id)
        .bind(token_hash)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_current_user(&self, user_id: i64) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, username, role, tier, created_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|row| user_from_row(&row)).transpose()
    }

    fn build_session_claims(
        &self,
        user_id: i64,
        session_id: Uuid,
    ) -> Result<(Claims, OffsetDateTime)> {
        let duration = std::time::Duration::from_secs(self.session_ttl_days * 24 * 60 * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.token_identifier(&session_id.to_string())?;
        let expires_at = OffsetDateTime::now_utc() + Duration::days(self.session_ttl_days as i64);
        Ok((claims, expires_at))
    }

    fn decrypt_claims(&self, token: &str) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.session_key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }
}

pub(crate) fn user_from_row(row: &sqlx::postgres::PgRow) -> Result<User> {
    let role: String = row.get("role");
    let tier: String = row.get("tier");
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        role: UserRole::parse(&role).ok_or_else(|| anyhow!("unknown role: {}", role))?,
        tier: SubscriptionTier::parse(&tier).ok_or_else(|| anyhow!("unknown tier: {}", tier))?,
        created_at: row.get("created_at"),
    })
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn claim_i64(claims: &Claims, name: &str) -> Result<i64> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(value.parse()?)
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}
