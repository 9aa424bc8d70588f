pub mod limits;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::str::FromStr;
use url::Url;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub app_mode: String,
    pub database_url: String,
    pub redis_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub session_key: [u8; 32],
    pub session_ttl_days: u64,
    pub tts_base_url: String,
    pub tts_api_key: String,
    pub audio_root: String,
    pub samples_dir: String,
    pub max_text_chars: usize,
    pub public_addr: String,
    pub internal_port: u16,
    pub static_dir: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "127.0.0.1:5001");
        SocketAddr::from_str(&http_addr).map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;
        let app_mode = env_or("APP_MODE", "api");

        let public_addr = env_or("PUBLIC_ADDR", "0.0.0.0:8080");
        SocketAddr::from_str(&public_addr)
            .map_err(|err| anyhow!("invalid PUBLIC_ADDR: {}", err))?;

        let tts_base_url = env_or("TTS_BASE_URL", "https://api.elevenlabs.io");
        Url::parse(&tts_base_url).map_err(|err| anyhow!("invalid TTS_BASE_URL: {}", err))?;

        Ok(Self {
            http_addr,
            app_mode,
            database_url: env_or_err("DATABASE_URL")?,
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1/"),
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            session_key: env_key_32("SESSION_KEY")?,
            session_ttl_days: env_or_parse("SESSION_TTL_DAYS", "30")?,
            tts_base_url,
            tts_api_key: env_or("TTS_API_KEY", ""),
            audio_root: env_or("AUDIO_ROOT", "data/audio"),
            samples_dir: env_or("SAMPLES_DIR", "data/samples"),
            max_text_chars: env_or_parse("MAX_TEXT_CHARS", "5000")?,
            public_addr,
            internal_port: env_or_parse("INTERNAL_PORT", "5001")?,
            static_dir: env_or("STATIC_DIR", "dist/public"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

fn env_key_32(key: &str) -> Result<[u8; 32]> {
    let value = env_or_err(key)?;
    let decoded = STANDARD
        .decode(value.as_bytes())
        .map_err(|err| anyhow!("invalid {}: {}", key, err))?;
    if decoded.len() != 32 {
        return Err(anyhow!("invalid {}: expected 32 bytes", key));
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&decoded);
    Ok(key_bytes)
}
