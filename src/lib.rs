pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod jobs;
pub mod proxy;

use std::sync::Arc;

use crate::infra::{cache::RedisCache, db::Db, files::AudioStore, tts::TtsClient};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub tts: Arc<dyn TtsClient>,
    pub audio_store: AudioStore,
    pub session_key: [u8; 32],
    pub session_ttl_days: u64,
    pub max_text_chars: usize,
}
