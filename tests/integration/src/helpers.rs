//! Test helpers for integration tests
//!
//! Provides a scripted mock gateway, client configuration and polling helpers.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use cord_common::{ClientConfig, Compression, Encoding};
use cord_gateway::codec::etf;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Token every test client identifies with
pub const TEST_TOKEN: &str = "test-token";

/// One frame the mock gateway sends
#[derive(Debug, Clone)]
pub enum ScriptFrame {
    Text(String),
    Binary(Vec<u8>),
    Close(u16),
}

impl ScriptFrame {
    fn to_message(&self) -> Message {
        match self {
            Self::Text(text) => Message::Text(text.clone()),
            Self::Binary(bytes) => Message::Binary(bytes.clone()),
            Self::Close(code) => Message::Close(Some(CloseFrame {
                code: *code,
                reason: Cow::Borrowed(""),
            })),
        }
    }
}

struct MockState {
    script: Vec<ScriptFrame>,
    received: Mutex<Vec<Value>>,
    connections: Mutex<usize>,
}

impl MockState {
    fn record(&self, message: Message) {
        let value = match message {
            Message::Text(text) => serde_json::from_str(&text).ok(),
            Message::Binary(bytes) => etf::decode(&bytes).ok(),
            _ => None,
        };
        if let Some(value) = value {
            self.received.lock().push(value);
        }
    }
}

/// Gateway stand-in that replays a script to every connection
///
/// Each connection waits for the client's first message (IDENTIFY or RESUME),
/// sends the script in order, then records whatever else the client sends.
pub struct MockGateway {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    _handle: JoinHandle<()>,
}

impl MockGateway {
    /// Start a mock gateway on an ephemeral port
    pub async fn start(script: Vec<ScriptFrame>) -> Result<Self> {
        let state = Arc::new(MockState {
            script,
            received: Mutex::new(Vec::new()),
            connections: Mutex::new(0),
        });

        let app = Router::new()
            .route("/", get(gateway_handler))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Base URL clients connect to
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Everything clients sent so far, decoded
    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().clone()
    }

    pub fn connections(&self) -> usize {
        *self.state.connections.lock()
    }

    /// Wait until at least `count` client messages arrived
    pub async fn wait_for_received(&self, count: usize) -> Vec<Value> {
        wait_until(|| self.state.received.lock().len() >= count).await;
        self.received()
    }
}

async fn gateway_handler(State(state): State<Arc<MockState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<MockState>) {
    *state.connections.lock() += 1;

    match socket.recv().await {
        Some(Ok(first)) => state.record(first),
        _ => return,
    }

    for frame in &state.script {
        if socket.send(frame.to_message()).await.is_err() {
            return;
        }
        if matches!(frame, ScriptFrame::Close(_)) {
            return;
        }
    }

    while let Some(Ok(message)) = socket.recv().await {
        if matches!(message, Message::Close(_)) {
            break;
        }
        state.record(message);
    }
}

/// Client configuration pointed at a mock gateway
pub fn test_config(url: &str, encoding: Encoding, compression: Compression) -> ClientConfig {
    let mut config = ClientConfig::new(TEST_TOKEN);
    config.gateway.url = url.to_string();
    config.gateway.encoding = encoding;
    config.gateway.compression = compression;
    config
}

/// Poll `condition` until it holds, for at most five seconds
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
