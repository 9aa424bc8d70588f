use crate::domain::user::SubscriptionTier;

/// Usage limits attached to a subscription tier.
#[derive(Debug, Clone, Copy)]
pub struct TierLimits {
    pub generations_per_hour: u32,
    pub monthly_char_quota: i64,
}

impl TierLimits {
    pub fn for_tier(tier: SubscriptionTier) -> Self {
        match tier {
            SubscriptionTier::Free => TierLimits {
                generations_per_hour: 10,
                monthly_char_quota: 10_000,
            },
            SubscriptionTier::Starter => TierLimits {
                generations_per_hour: 60,
                monthly_char_quota: 100_000,
            },
            SubscriptionTier::Pro => TierLimits {
                generations_per_hour: 300,
                monthly_char_quota: 1_000_000,
            },
        }
    }
}

/// Counter windows for Redis-backed rate limits.
#[derive(Debug, Clone, Copy)]
pub enum RateWindow {
    Hour,
    Day,
}

impl RateWindow {
    pub fn seconds(&self) -> u64 {
        match self {
            RateWindow::Hour => 3600,
            RateWindow::Day => 86400,
        }
    }
}

/// Bucket timestamps into fixed windows so counter keys roll over naturally.
pub fn current_window(window_seconds: u64) -> u64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    now / window_seconds
}

/// IP caps for unauthenticated auth endpoints.
pub const LOGIN_ATTEMPTS_PER_HOUR: u32 = 10;
pub const SIGNUPS_PER_DAY: u32 = 5;
