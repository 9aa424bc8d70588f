use anyhow::anyhow;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voicetext::config::AppConfig;
use voicetext::infra::{cache::RedisCache, db::Db, files::AudioStore, tts::ElevenLabsClient};
use voicetext::{http, jobs, proxy, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    match config.app_mode.as_str() {
        "api" => {
            let db = Db::connect(&config).await?;
            let cache = RedisCache::connect(&config.redis_url).await?;
            let audio_store = AudioStore::new(&config.audio_root).await?;
            let tts = Arc::new(ElevenLabsClient::new(&config));

            let state = AppState {
                db,
                cache,
                tts,
                audio_store,
                session_key: config.session_key,
                session_ttl_days: config.session_ttl_days,
                max_text_chars: config.max_text_chars,
            };

            let app: Router = http::router(state).layer(TraceLayer::new_for_http());
            let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
            tracing::info!("listening on {}", config.http_addr);

            let app = app.into_make_service_with_connect_info::<SocketAddr>();

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
        }
        "proxy" => {
            tokio::select! {
                result = proxy::run(&config) => {
                    result?;
                }
                _ = shutdown_signal() => {}
            }
        }
        "samples" => {
            let tts = ElevenLabsClient::new(&config);
            let summary =
                jobs::sample_generator::run(&tts, std::path::Path::new(&config.samples_dir))
                    .await?;
            tracing::info!(
                written = summary.written,
                failed = summary.failed,
                "sample batch complete"
            );
        }
        other => return Err(anyhow!("unknown APP_MODE: {}", other)),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
