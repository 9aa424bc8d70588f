use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Closed set of notification kinds. Anything outside these four variants is
/// rejected at the API boundary; the `notifications.kind` CHECK constraint
/// backs the same invariant in the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Payment,
    User,
    System,
    Audio,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Payment => "payment",
            NotificationKind::User => "user",
            NotificationKind::System => "system",
            NotificationKind::Audio => "audio",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "payment" => Some(NotificationKind::Payment),
            "user" => Some(NotificationKind::User),
            "system" => Some(NotificationKind::System),
            "audio" => Some(NotificationKind::Audio),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i32,
    pub user_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub metadata: Option<Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
