//! Shared utilities for gateway integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use edge_gateway::config::GatewayConfig;
use edge_gateway::http::GatewayServer;
use edge_gateway::lifecycle::{Lifecycle, LifecycleError, Phase, Shutdown, StopOutcome};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

pub const SECRET: &str = "integration-secret";

/// A request as seen by a mock upstream.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub target: String,
    /// Header names lowercased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

pub type Log = Arc<Mutex<Vec<Recorded>>>;

/// Read one HTTP/1.1 request off `socket`.
async fn read_request(socket: &mut TcpStream) -> Option<Recorded> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = buf[head_end..].to_vec();
    while body.len() < length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(Recorded {
        method,
        target,
        headers,
        body: String::from_utf8_lossy(&body).to_string(),
    })
}

/// Start a mock upstream that records every request and answers via `respond`.
pub async fn start_recording_backend<F>(respond: F) -> (SocketAddr, Log)
where
    F: Fn(&Recorded) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let recorded = log.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let respond = respond.clone();
            let recorded = recorded.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                let (status, body) = respond(&request);
                recorded.lock().unwrap().push(request);

                let response = format!(
                    "HTTP/1.1 {status} Mock\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len(),
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (addr, log)
}

/// Start a mock upstream that returns a fixed status and body.
pub async fn start_mock_backend(status: u16, body: &'static str) -> (SocketAddr, Log) {
    start_recording_backend(move |_| (status, body.to_string())).await
}

/// Start a mock upstream that accepts connections but never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut sink = [0u8; 1024];
                while matches!(socket.read(&mut sink).await, Ok(n) if n > 0) {}
            });
        }
    });
    addr
}

/// Start a mock upstream that sends headers and the first bytes of a
/// 1000-byte body, then stalls. The receiver fires when the gateway closes
/// the connection.
pub async fn start_stalling_backend() -> (SocketAddr, oneshot::Receiver<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();
    tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        if read_request(&mut socket).await.is_none() {
            return;
        }
        let head = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 1000\r\n\r\nhello";
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        let mut sink = [0u8; 1024];
        while matches!(socket.read(&mut sink).await, Ok(n) if n > 0) {}
        let _ = closed_tx.send(());
    });
    (addr, closed_rx)
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Complete configuration pointing every upstream at the given addresses.
pub fn config(auth: SocketAddr, templates: SocketAddr, pdf: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.upstreams.auth = format!("http://{auth}");
    config.upstreams.templates = format!("http://{templates}");
    config.upstreams.pdf = format!("http://{pdf}");
    config.auth.jwt_secret = SECRET.into();
    config.auth.cookie_secure = Some(false);
    config.cors.allowed_origin = "http://localhost:3000".into();
    config.timeouts.connect_secs = 1;
    config.timeouts.response_header_secs = 1;
    config.shutdown.grace_period_secs = 2;
    config
}

/// A gateway serving on an ephemeral port.
pub struct RunningGateway {
    pub addr: SocketAddr,
    pub phases: watch::Receiver<Phase>,
    stop: Shutdown,
    handle: JoinHandle<Result<StopOutcome, LifecycleError>>,
}

impl RunningGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Signal a stop and wait for the lifecycle to finish.
    pub async fn stop(self) -> Result<StopOutcome, LifecycleError> {
        self.stop.trigger();
        self.handle.await.unwrap()
    }
}

pub async fn spawn_gateway(config: GatewayConfig) -> RunningGateway {
    let server = GatewayServer::from_config(&config).unwrap();
    let lifecycle = Lifecycle::new(config.shutdown.grace_period());
    let phases = lifecycle.subscribe();

    let listener = lifecycle.bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let stop = Shutdown::new();
    let signal = stop.clone();
    let handle = tokio::spawn(async move {
        lifecycle
            .serve(listener, server, async move { signal.triggered().await })
            .await
    });

    let mut ready = phases.clone();
    wait_for(ready.wait_for(|phase| *phase == Phase::Listening))
        .await
        .expect("gateway stopped before listening");

    RunningGateway {
        addr,
        phases,
        stop,
        handle,
    }
}

async fn wait_for<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Sign an HS256 token for `subject`, valid for an hour.
pub fn mint_token(subject: &str) -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs();
    let claims = json!({ "sub": subject, "iat": now, "exp": now + 3600 });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}
