use anyhow::Result;
use sqlx::Row;
use time::OffsetDateTime;

use crate::domain::notification::{Notification, NotificationKind};
use crate::infra::db::Db;

pub struct NewNotification {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct NotificationService {
    db: Db,
}

impl NotificationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Insert a notification for an existing user. Returns None when the
    /// target user does not exist. The kind arrives as the closed enum, so
    /// only the four allowed values can ever reach the INSERT.
    pub async fn create(&self, new: NewNotification) -> Result<Option<Notification>> {
        let user_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(new.user_id)
                .fetch_one(self.db.pool())
                .await?;
        if !user_exists {
            return Ok(None);
        }

        let row = sqlx::query(
            "INSERT INTO notifications (user_id, kind, title, message, metadata) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, kind, title, message, is_read, metadata, created_at, updated_at",
        )
        .bind(new.user_id)
        .bind(new.kind.as_str())
        .bind(new.title)
        .bind(new.message)
        .bind(new.metadata)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Some(notification_from_row(&row)))
    }

    pub async fn list(
        &self,
        user_id: i64,
        unread_only: bool,
        cursor: Option<(OffsetDateTime, i32)>,
        limit: i64,
    ) -> Result<Vec<Notification>> {
        // The unread filter leads with is_read so the (is_read, user_id)
        // index serves it; the plain listing uses the (user_id) index.
        let rows = match (unread_only, cursor) {
            (false, None) => {
                sqlx::query(
                    "SELECT id, user_id, kind, title, message, is_read, metadata, created_at, updated_at \
                     FROM notifications \
                     WHERE user_id = $1 \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $2",
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            (false, Some((created_at, id))) => {
                sqlx::query(
                    "SELECT id, user_id, kind, title, message, is_read, metadata, created_at, updated_at \
                     FROM notifications \
                     WHERE user_id = $1 \
                       AND (created_at < $2 OR (created_at = $2 AND id < $3)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $4",
                )
                .bind(user_id)
                .bind(created_at)
                .bind(id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            (true, None) => {
                sqlx::query(
                    "SELECT id, user_id, kind, title, message, is_read, metadata, created_at, updated_at \
                     FROM notifications \
                     WHERE is_read = false AND user_id = $1 \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $2",
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            (true, Some((created_at, id))) => {
                sqlx::query(
                    "SELECT id, user_id, kind, title, message, is_read, metadata, created_at, updated_at \
                     FROM notifications \
                     WHERE is_read = false AND user_id = $1 \
                       AND (created_at < $2 OR (created_at = $2 AND id < $3)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $4",
                )
                .bind(user_id)
                .bind(created_at)
                .bind(id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(notification_from_row).collect())
    }

    /// Flip is_read. Idempotent: re-reading an already-read row is a success;
    /// only a row that does not belong to the user (or does not exist) is a
    /// miss.
    pub async fn mark_read(&self, notification_id: i32, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications \
             SET is_read = true, updated_at = now() \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE is_read = false AND user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(count)
    }
}

fn notification_from_row(row: &sqlx::postgres::PgRow) -> Notification {
    let kind: String = row.get("kind");
    Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        // The CHECK constraint guarantees the stored value is in the set.
        kind: NotificationKind::parse(&kind).unwrap_or(NotificationKind::System),
        title: row.get("title"),
        message: row.get("message"),
        is_read: row.get("is_read"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
