//! Local echo backend for the client demo.
//!
//! Serves on `127.0.0.1:8080`:
//! - `/api/http/{method}`: any HTTP method, echoes method, path, query
//!   and body as JSON
//! - `/sse`: one JSON string event per second, `"SSE event - <n>"`
//! - `/ws`: echoes every text frame as the JSON string `"Echo: <payload>"`
//!
//! Usage:
//!   cargo run --example server
//!
//! Set `RUST_LOG=server=debug` for per-request logs.

// ============================================================================
// Imports
// ============================================================================

use std::convert::Infallible;
use std::time::Duration;

use anyhow::Context;
use axum::Json;
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, RawQuery};
use axum::http::Method;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use futures_util::{Stream, stream};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

/// Listen address.
const ADDR: &str = "127.0.0.1:8080";

/// Interval between SSE events.
const SSE_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("server=info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(ADDR)
        .await
        .with_context(|| format!("failed to bind {ADDR}"))?;

    info!("Listening on http://{ADDR}");
    axum::serve(listener, app()).await.context("server failed")?;

    Ok(())
}

fn app() -> Router {
    Router::new()
        .route("/api/http/{method}", any(http_echo))
        .route("/sse", get(sse_ticks))
        .route("/ws", get(ws_upgrade))
}

// ============================================================================
// HTTP
// ============================================================================

async fn http_echo(
    method: Method,
    Path(route): Path<String>,
    RawQuery(query): RawQuery,
    body: String,
) -> Json<Value> {
    debug!(%method, route, "HTTP request");

    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&body).unwrap_or(Value::String(body))
    };

    Json(json!({
        "method": method.as_str(),
        "route": route,
        "query": query,
        "body": body,
    }))
}

// ============================================================================
// SSE
// ============================================================================

async fn sse_ticks() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("SSE subscriber connected");

    let ticks = stream::unfold(1u64, |n| async move {
        tokio::time::sleep(SSE_INTERVAL).await;
        let data = json!(format!("SSE event - {n}")).to_string();
        Some((Ok(Event::default().data(data)), n + 1))
    });

    Sse::new(ticks).keep_alive(KeepAlive::default())
}

// ============================================================================
// WebSocket
// ============================================================================

async fn ws_upgrade(ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(echo_socket)
}

async fn echo_socket(mut socket: WebSocket) {
    debug!("WebSocket client connected");

    while let Some(message) = socket.recv().await {
        let text = match message {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(data)) => String::from_utf8_lossy(&data).into_owned(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "WebSocket receive failed");
                break;
            }
        };

        let reply = json!(format!("Echo: {text}")).to_string();
        if socket.send(Message::Text(reply.into())).await.is_err() {
            break;
        }
    }

    debug!("WebSocket client disconnected");
}

// ============================================================================
// Tests
// ============================================================================
