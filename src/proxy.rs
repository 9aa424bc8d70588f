use anyhow::{anyhow, Result};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header;
use axum::response::Response;
use axum::routing::any;
use axum::Router;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::http::AppError;

const MAX_FORWARD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
struct ProxyState {
    client: reqwest::Client,
    upstream: String,
}

/// Production bootstrap: bind the public port, serve the built client, spawn
/// the API process on the internal port and pass `/api/*` through to it.
/// Returns when the server stops or the child process dies.
pub async fn run(config: &AppConfig) -> Result<()> {
    let mut child = spawn_api_process(config)?;

    let state = ProxyState {
        client: reqwest::Client::new(),
        upstream: format!("http://127.0.0.1:{}", config.internal_port),
    };

    let static_dir = Path::new(&config.static_dir);
    let static_service =
        ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")));

    let app: Router = Router::new()
        .route("/api/*path", any(forward))
        .route("/health", any(forward))
        .fallback_service(static_service)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.public_addr).await?;
    info!(
        public_addr = %config.public_addr,
        internal_port = config.internal_port,
        "proxy listening"
    );

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
            Ok(())
        }
        status = child.wait() => {
            let status = status?;
            error!(%status, "api process exited");
            Err(anyhow!("api process exited: {}", status))
        }
    }
}

/// Spawn this same binary in API mode and relay its output line by line so
/// the child's logs land in the parent's stream.
fn spawn_api_process(config: &AppConfig) -> Result<Child> {
    let exe = std::env::current_exe()?;
    let mut child = Command::new(exe)
        .env("APP_MODE", "api")
        .env("HTTP_ADDR", format!("127.0.0.1:{}", config.internal_port))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("api process has no stdout"))?;
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!(stream = "stdout", "api: {}", line);
        }
    });

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("api process has no stderr"))?;
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            warn!(stream = "stderr", "api: {}", line);
        }
    });

    Ok(child)
}

/// Pass a request through unchanged: same method, same headers (cookies and
/// content type included), same body. No retry and no added timeout; a dead
/// upstream is a 502.
async fn forward(State(state): State<ProxyState>, req: Request) -> Result<Response, AppError> {
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let url = format!("{}{}", state.upstream, path_and_query);

    let (parts, body) = req.into_parts();
    let body = axum::body::to_bytes(body, MAX_FORWARD_BYTES)
        .await
        .map_err(|_| AppError::bad_request("request body too large"))?;

    let mut builder = state.client.request(parts.method, url);
    for (name, value) in parts.headers.iter() {
        if name == header::HOST || name == header::CONTENT_LENGTH {
            continue;
        }
        builder = builder.header(name, value);
    }

    let upstream_response = builder.body(body).send().await.map_err(|err| {
        warn!(error = ?err, "upstream request failed");
        AppError::bad_gateway("application process unavailable")
    })?;

    let status = upstream_response.status();
    let headers = upstream_response.headers().clone();
    let bytes = upstream_response.bytes().await.map_err(|err| {
        warn!(error = ?err, "failed to read upstream response");
        AppError::bad_gateway("application process unavailable")
    })?;

    let mut response = Response::builder().status(status);
    for (name, value) in headers.iter() {
        if name == header::TRANSFER_ENCODING || name == header::CONTENT_LENGTH {
            continue;
        }
        response = response.header(name, value);
    }
    response
        .body(Body::from(bytes))
        .map_err(|_| AppError::internal("failed to build response"))
}
