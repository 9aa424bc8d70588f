use anyhow::Result;
use redis::AsyncCommands;

use crate::config::limits::{current_window, RateWindow, TierLimits};
use crate::domain::user::SubscriptionTier;
use crate::infra::cache::RedisCache;

/// Redis-backed windowed counters: hourly generation caps per tier and IP
/// caps on the unauthenticated auth endpoints. Monthly character quotas are
/// durable and live in Postgres (see AudioService).
#[derive(Clone)]
pub struct QuotaLimiter {
    cache: RedisCache,
}

impl QuotaLimiter {
    pub fn new(cache: RedisCache) -> Self {
        Self { cache }
    }

    /// True when the user has exhausted this hour's generation allowance.
    pub async fn generation_limited(&self, user_id: i64, tier: SubscriptionTier) -> Result<bool> {
        let limit = TierLimits::for_tier(tier).generations_per_hour;
        let key = generation_key(user_id);

        let mut conn = self.cache.client().get_multiplexed_async_connection().await?;
        let count: u32 = conn.get(&key).await.unwrap_or(0);

        if count >= limit {
            tracing::debug!(user_id, tier = tier.as_str(), count, limit, "generation cap hit");
            return Ok(true);
        }
        Ok(false)
    }

    pub async fn record_generation(&self, user_id: i64) -> Result<()> {
        let key = generation_key(user_id);
        let mut conn = self.cache.client().get_multiplexed_async_connection().await?;

        let count: u32 = conn.get(&key).await.unwrap_or(0);
        let _: () = conn.incr(&key, 1).await?;
        if count == 0 {
            let _: () = conn.expire(&key, RateWindow::Hour.seconds() as i64).await?;
        }
        Ok(())
    }

    pub async fn ip_limited(
        &self,
        ip: &str,
        action: &str,
        limit: u32,
        window: RateWindow,
    ) -> Result<bool> {
        let key = ip_key(ip, action, window);
        let mut conn = self.cache.client().get_multiplexed_async_connection().await?;

        let count: u32 = conn.get(&key).await.unwrap_or(0);
        if count >= limit {
            tracing::debug!(ip, action, count, limit, "ip cap hit");
            return Ok(true);
        }
        Ok(false)
    }

    pub async fn record_ip(&self, ip: &str, action: &str, window: RateWindow) -> Result<()> {
        let key = ip_key(ip, action, window);
        let mut conn = self.cache.client().get_multiplexed_async_connection().await?;

        let count: u32 = conn.get(&key).await.unwrap_or(0);
        let _: () = conn.incr(&key, 1).await?;
        if count == 0 {
            let _: () = conn.expire(&key, window.seconds() as i64).await?;
        }
        Ok(())
    }
}

fn generation_key(user_id: i64) -> String {
    let window_seconds = RateWindow::Hour.seconds();
    format!(
        "quota:{}:generate:{}",
        user_id,
        current_window(window_seconds)
    )
}

fn ip_key(ip: &str, action: &str, window: RateWindow) -> String {
    format!(
        "quota:ip:{}:{}:{}",
        ip,
        action,
        current_window(window.seconds())
    )
}
