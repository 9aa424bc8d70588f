use anyhow::Result;
use sqlx::Row;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::notifications::{NewNotification, NotificationService};
use crate::app::quota::QuotaLimiter;
use crate::domain::audio::{find_voice, AudioFile};
use crate::domain::notification::NotificationKind;
use crate::domain::user::User;
use crate::config::limits::TierLimits;
use crate::infra::db::Db;
use crate::infra::files::AudioStore;
use crate::infra::tts::TtsClient;

pub enum GenerateOutcome {
    Created(AudioFile),
    UnknownVoice,
    TextTooLong { max: usize },
    QuotaExceeded { used: i64, quota: i64 },
    RateLimited,
    ProviderFailed(anyhow::Error),
}

#[derive(Clone)]
pub struct AudioService {
    db: Db,
    tts: Arc<dyn TtsClient>,
    store: AudioStore,
    quota: QuotaLimiter,
    max_text_chars: usize,
}

impl AudioService {
    pub fn new(
        db: Db,
        tts: Arc<dyn TtsClient>,
        store: AudioStore,
        quota: QuotaLimiter,
        max_text_chars: usize,
    ) -> Self {
        Self {
            db,
            tts,
            store,
            quota,
            max_text_chars,
        }
    }

    /// The generation pipeline: validate, check quotas, synthesize, persist
    /// bytes, persist the row, notify. Nothing is written unless the
    /// provider call succeeded, and a failed row insert removes the
    /// just-written file so disk and table stay in step.
    pub async fn generate(
        &self,
        user: &User,
        voice_id: &str,
        text: &str,
        title: Option<String>,
    ) -> Result<GenerateOutcome> {
        let voice = match find_voice(voice_id) {
            Some(voice) => voice,
            None => return Ok(GenerateOutcome::UnknownVoice),
        };

        let char_count = text.chars().count();
        if char_count > self.max_text_chars {
            return Ok(GenerateOutcome::TextTooLong {
                max: self.max_text_chars,
            });
        }

        let quota = TierLimits::for_tier(user.tier).monthly_char_quota;
        let used = self.chars_used_this_month(user.id).await?;
        if used + char_count as i64 > quota {
            return Ok(GenerateOutcome::QuotaExceeded { used, quota });
        }

        if self.quota.generation_limited(user.id, user.tier).await? {
            return Ok(GenerateOutcome::RateLimited);
        }

        let audio = match self.tts.synthesize(voice_id, text).await {
            Ok(audio) => audio,
            Err(err) => return Ok(GenerateOutcome::ProviderFailed(err)),
        };

        let file_id = Uuid::new_v4();
        let file_key = format!("audio/{}/{}.mp3", user.id, file_id);
        self.store.save(&file_key, &audio).await?;

        let title = title
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| derive_title(text));

        let row = sqlx::query(
            "INSERT INTO audio_files (id, user_id, voice_id, voice_name, title, char_count, file_key, bytes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING id, user_id, voice_id, voice_name, title, char_count, file_key, bytes, created_at",
        )
        .bind(file_id)
        .bind(user.id)
        .bind(voice.id)
        .bind(voice.name)
        .bind(&title)
        .bind(char_count as i32)
        .bind(&file_key)
        .bind(audio.len() as i64)
        .fetch_one(self.db.pool())
        .await;

        let row = match row {
            Ok(row) => row,
            Err(err) => {
                if let Err(remove_err) = self.store.remove(&file_key).await {
                    tracing::warn!(error = ?remove_err, file_key, "failed to remove orphaned audio file");
                }
                return Err(err.into());
            }
        };
        let file = audio_from_row(&row);

        let notifications = NotificationService::new(self.db.clone());
        let notified = notifications
            .create(NewNotification {
                user_id: user.id,
                kind: NotificationKind::Audio,
                title: "Audio ready".to_string(),
                message: format!("\"{}\" was generated with {}.", file.title, file.voice_name),
                metadata: Some(serde_json::json!({
                    "audio_id": file.id,
                    "voice_id": file.voice_id,
                })),
            })
            .await;
        if let Err(err) = notified {
            tracing::warn!(error = ?err, audio_id = %file.id, "failed to create audio notification");
        }

        if let Err(err) = self.quota.record_generation(user.id).await {
            tracing::warn!(error = ?err, user_id = user.id, "failed to record generation counter");
        }

        Ok(GenerateOutcome::Created(file))
    }

    async fn chars_used_this_month(&self, user_id: i64) -> Result<i64> {
        let used: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(char_count), 0)::BIGINT \
             FROM audio_files \
             WHERE user_id = $1 AND created_at >= date_trunc('month', now())",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(used)
    }

    pub async fn list(
        &self,
        user_id: i64,
        cursor: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> Result<Vec<AudioFile>> {
        let rows = match cursor {
            Some((created_at, id)) => {
                sqlx::query(
                    "SELECT id, user_id, voice_id, voice_name, title, char_count, file_key, bytes, created_at \
                     FROM audio_files \
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
            None => {
                sqlx::query(
                    "SELECT id, user_id, voice_id, voice_name, title, char_count, file_key, bytes, created_at \
                     FROM audio_files \
                     WHERE user_id = $1 \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $2",
                )
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(audio_from_row).collect())
    }

    pub async fn get(&self, id: Uuid, user_id: i64) -> Result<Option<AudioFile>> {
        let row = sqlx::query(
            "SELECT id, user_id, voice_id, voice_name, title, char_count, file_key, bytes, created_at \
             FROM audio_files WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| audio_from_row(&row)))
    }

    pub async fn read_bytes(&self, file: &AudioFile) -> Result<bytes::Bytes> {
        self.store.read(&file.file_key).await
    }

    /// Remove the row, then the bytes. A failed disk removal is logged and
    /// not surfaced: the row is the source of truth and it is already gone.
    pub async fn delete(&self, id: Uuid, user_id: i64) -> Result<bool> {
        let row = sqlx::query(
            "DELETE FROM audio_files WHERE id = $1 AND user_id = $2 RETURNING file_key",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        let file_key: String = match row {
            Some(row) => row.get("file_key"),
            None => return Ok(false),
        };

        if let Err(err) = self.store.remove(&file_key).await {
            tracing::warn!(error = ?err, file_key, "failed to remove audio file from disk");
        }
        Ok(true)
    }

    /// Best-effort disk cleanup for a batch of keys (account deletion).
    pub async fn remove_files(&self, keys: &[String]) {
        for key in keys {
            if let Err(err) = self.store.remove(key).await {
                tracing::warn!(error = ?err, file_key = %key, "failed to remove audio file from disk");
            }
        }
    }
}

fn derive_title(text: &str) -> String {
    let trimmed = text.trim();
    let title: String = trimmed.chars().take(48).collect();
    if trimmed.chars().count() > 48 {
        format!("{}…", title)
    } else {
        title
    }
}

fn audio_from_row(row: &sqlx::postgres::PgRow) -> AudioFile {
    AudioFile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        voice_id: row.get("voice_id"),
        voice_name: row.get("voice_name"),
        title: row.get("title"),
        char_count: row.get("char_count"),
        file_key: row.get("file_key"),
        bytes: row.get("bytes"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_title_truncates() {
        assert_eq!(derive_title("  hello world  "), "hello world");
        let long = "a".repeat(100);
        let title = derive_title(&long);
        assert_eq!(title.chars().count(), 49);
        assert!(title.ends_with('…'));
    }
}
