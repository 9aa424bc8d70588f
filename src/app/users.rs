use anyhow::Result;
use sqlx::Row;

use crate::app::auth::user_from_row;
use crate::app::notifications::{NewNotification, NotificationService};
use crate::domain::notification::NotificationKind;
use crate::domain::user::{SubscriptionTier, User, UserRole};
use crate::infra::db::Db;

pub enum ProfileUpdateOutcome {
    Updated(User),
    EmailTaken,
    UsernameTaken,
    NotFound,
}

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, username, role, tier, created_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|row| user_from_row(&row)).transpose()
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        username: Option<String>,
        email: Option<String>,
    ) -> Result<ProfileUpdateOutcome> {
        if let Some(username) = &username {
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND id <> $2)",
            )
            .bind(username)
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
            if taken {
                return Ok(ProfileUpdateOutcome::UsernameTaken);
            }
        }
        if let Some(email) = &email {
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND id <> $2)",
            )
            .bind(email)
            .bind(user_id)
            .fetch_one(self.db.pool())
            .await?;
            if taken {
                return Ok(ProfileUpdateOutcome::EmailTaken);
            }
        }

        let row = sqlx::query(
            "UPDATE users \
             SET username = COALESCE($2, username), \
                 email = COALESCE($3, email), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING id, email, username, role, tier, created_at",
        )
        .bind(user_id)
        .bind(username)
        .bind(email)
        .fetch_optional(self.db.pool())
        .await?;

        match row.map(|row| user_from_row(&row)).transpose()? {
            Some(user) => Ok(ProfileUpdateOutcome::Updated(user)),
            None => Ok(ProfileUpdateOutcome::NotFound),
        }
    }

    /// Delete the account. Sessions, audio rows, and notifications go with it
    /// via ON DELETE CASCADE; the caller removes audio bytes from disk.
    pub async fn delete_account(&self, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// File keys owned by a user, fetched before deletion so the on-disk
    /// audio can be cleaned up after the cascade.
    pub async fn audio_keys(&self, user_id: i64) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT file_key FROM audio_files WHERE user_id = $1")
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows.iter().map(|row| row.get("file_key")).collect())
    }

    pub async fn list_users(&self, offset: i64, limit: i64) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, email, username, role, tier, created_at \
             FROM users ORDER BY id \
             OFFSET $1 LIMIT $2",
        )
        .bind(offset)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    pub async fn set_role(&self, user_id: i64, role: UserRole) -> Result<Option<User>> {
        let row = sqlx::query(
            "UPDATE users SET role = $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING id, email, username, role, tier, created_at",
        )
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|row| user_from_row(&row)).transpose()
    }

    /// Change the subscription tier and tell the user. The payment processor
    /// itself lives outside this service; only its outcome lands here.
    pub async fn set_tier(&self, user_id: i64, tier: SubscriptionTier) -> Result<Option<User>> {
        let row = sqlx::query(
            "UPDATE users SET tier = $2, updated_at = now() \
             WHERE id = $1 \
             RETURNING id, email, username, role, tier, created_at",
        )
        .bind(user_id)
        .bind(tier.as_str())
        .fetch_optional(self.db.pool())
        .await?;

        let user = match row.map(|row| user_from_row(&row)).transpose()? {
            Some(user) => user,
            None => return Ok(None),
        };

        let notifications = NotificationService::new(self.db.clone());
        notifications
            .create(NewNotification {
                user_id,
                kind: NotificationKind::Payment,
                title: "Subscription updated".to_string(),
                message: format!("Your plan is now {}.", tier.as_str()),
                metadata: Some(serde_json::json!({ "tier": tier.as_str() })),
            })
            .await?;

        Ok(Some(user))
    }
}
