//! Command-line probe for HTTP, WebSocket and SSE endpoints.
//!
//! Demonstrates:
//! - Building a client with custom options
//! - Routing requests through `ApiClient::execute`
//! - Consuming WebSocket and SSE event streams
//! - Observing connection state and history
//!
//! Usage, against the local backend (`cargo run --example server`):
//!   cargo run --example probe -- http GET http://localhost:8080/api/http/get
//!   cargo run --example probe -- http POST http://localhost:8080/api/http/post '{"value":"hello"}'
//!   cargo run --example probe -- ws ws://localhost:8080/ws '{"a":1}'
//!   cargo run --example probe -- sse http://localhost:8080/sse
//!
//! Set `RUST_LOG=api_probe=debug` for adapter logs.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::{Context, bail};
use api_probe::{ApiClient, ApiRequest, Dispatch, HttpMethod, WebSocketEventKind};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::time::timeout;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

/// Events printed before a streaming session is closed.
const MAX_EVENTS: usize = 10;

/// Idle time after which a streaming session is closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(15);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("api_probe=info")),
        )
        .init();

    if let Err(e) = run(std::env::args().skip(1).collect()).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Vec<String>) -> anyhow::Result<()> {
    let client = ApiClient::builder()
        .request_timeout(Duration::from_secs(15))
        .history_capacity(20)
        .build()?;

    let request = parse_request(&args)?;
    println!("=== {} {} ===\n", request.protocol, request.url);

    match client.execute(request).await {
        Dispatch::Http(response) => {
            println!("Status:  {:?} {:?}", response.status, response.status_text);
            println!("Time:    {}ms", response.response_time_ms);
            println!("Body:    {}", serde_json::to_string_pretty(&response.data)?);
        }

        Dispatch::WebSocketOpened(mut events) => {
            let message = args.get(2).map(|raw| parse_value(raw));
            let mut seen = 0;

            while let Ok(Some(event)) = timeout(IDLE_TIMEOUT, events.next()).await {
                println!("[ws] {:?} {}", event.kind, display(event.data.as_ref()));

                if event.kind == WebSocketEventKind::Open
                    && let Some(message) = &message
                {
                    client.send_websocket_message(message)?;
                }

                seen += 1;
                if seen >= MAX_EVENTS {
                    break;
                }
            }

            client.close_websocket();
        }

        Dispatch::SseOpened(events) => {
            let mut events = events.take(MAX_EVENTS);

            while let Ok(Some(item)) = timeout(IDLE_TIMEOUT, events.next()).await {
                match item {
                    Ok(event) => println!("[sse] {} {}", event.event_type, event.data),
                    Err(e) => println!("[sse] failed: {e}"),
                }
            }

            client.close_sse();
        }

        Dispatch::WebSocketSent(result) => result?,
    }

    println!("\nState:   {}", client.connection_state());
    println!("History: {} request(s)", client.history().len());

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_request(args: &[String]) -> anyhow::Result<ApiRequest> {
    let kind = args.first().context("missing protocol: http | ws | sse")?;

    let request = match kind.as_str() {
        "http" => {
            let method = args.get(1).context("missing HTTP method")?;
            let url = args.get(2).context("missing URL")?;
            let request = ApiRequest::http(HttpMethod::parse_or_default(method), url);
            match args.get(3) {
                Some(body) => request.with_body(parse_value(body)),
                None => request,
            }
        }
        "ws" => ApiRequest::websocket(args.get(1).context("missing URL")?),
        "sse" => ApiRequest::sse(args.get(1).context("missing URL")?),
        other => bail!("unknown protocol '{other}', expected http | ws | sse"),
    };

    Ok(request)
}

/// Parses JSON, falling back to a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn display(data: Option<&Value>) -> String {
    data.map(Value::to_string).unwrap_or_default()
}
