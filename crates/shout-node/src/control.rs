use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};

use crate::event::{Event, Responder};
use crate::membership::Member;

pub const PROTOCOL_VERSION: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub v: u8,
    pub id: String,
    pub cmd: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ControlError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlError {
    pub code: String,
    pub message: String,
}

impl ControlError {
    fn invalid_request(msg: impl Into<String>) -> Self {
        Self {
            code: "invalid_request".into(),
            message: msg.into(),
        }
    }

    fn unknown_method() -> Self {
        Self {
            code: "unknown_method".into(),
            message: "unknown command".into(),
        }
    }

    fn decode(msg: impl Into<String>) -> Self {
        Self {
            code: "decode_error".into(),
            message: msg.into(),
        }
    }

    fn unavailable() -> Self {
        Self {
            code: "unavailable".into(),
            message: "node is shutting down".into(),
        }
    }
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[derive(Debug, Deserialize)]
struct QueryPayload {
    name: String,
    #[serde(default)]
    payload: Option<String>,
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    name: String,
    #[serde(default)]
    payload: Option<String>,
}

/// What the control server needs from the agent that owns it.
#[derive(Debug, Clone)]
pub struct ControlContext {
    pub node_name: String,
    pub events_tx: mpsc::UnboundedSender<Event>,
    pub members: Vec<Member>,
    pub query_timeout: Duration,
    pub max_response_bytes: usize,
}

/// Control-plane server (TCP, NDJSON framing) that turns requests into
/// cluster events for the dispatch loop.
pub struct ControlServer {
    listener: TcpListener,
    context: Arc<ControlContext>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl ControlServer {
    pub fn new(
        listener: TcpListener,
        context: ControlContext,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        let shutdown_rx = shutdown_tx.subscribe();
        Self {
            listener,
            context: Arc::new(context),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub async fn run(mut self) {
        loop {
            tokio::select! {
                res = self.listener.accept() => {
                    match res {
                        Ok((stream, peer)) => {
                            tracing::debug!(%peer, "control connection");
                            let context = Arc::clone(&self.context);
                            let shutdown_tx = self.shutdown_tx.clone();
                            tokio::spawn(handle_conn(stream, context, shutdown_tx));
                        }
                        Err(e) => tracing::warn!("control accept failed: {e}"),
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    tracing::debug!("control server stopping");
                    break;
                }
            }
        }
    }
}

async fn handle_conn(
    stream: TcpStream,
    context: Arc<ControlContext>,
    shutdown_tx: broadcast::Sender<()>,
) {
    let (r, mut w) = stream.into_split();
    let mut reader = BufReader::new(r);
    let mut line = String::new();

    while let Ok(n) = reader.read_line(&mut line).await {
        if n == 0 {
            break;
        }
        if line.trim().is_empty() {
            line.clear();
            continue;
        }
        let resp = match serde_json::from_str::<RequestEnvelope>(&line) {
            Ok(req) => handle_request(req, &context, &shutdown_tx).await,
            Err(e) => ResponseEnvelope {
                id: "".into(),
                ok: false,
                result: None,
                error: Some(ControlError::decode(e.to_string())),
            },
        };
        if let Ok(json) = serde_json::to_string(&resp) {
            if w.write_all(json.as_bytes()).await.is_err() || w.write_all(b"\n").await.is_err() {
                break;
            }
        }
        line.clear();
    }
}

async fn handle_request(
    req: RequestEnvelope,
    context: &ControlContext,
    shutdown_tx: &broadcast::Sender<()>,
) -> ResponseEnvelope {
    let id = req.id.clone();
    let res = dispatch_command(req, context, shutdown_tx).await;
    match res {
        Ok(val) => ResponseEnvelope {
            id,
            ok: true,
            result: Some(val),
            error: None,
        },
        Err(e) => ResponseEnvelope {
            id,
            ok: false,
            result: None,
            error: Some(e),
        },
    }
}

async fn dispatch_command(
    req: RequestEnvelope,
    context: &ControlContext,
    shutdown_tx: &broadcast::Sender<()>,
) -> Result<serde_json::Value, ControlError> {
    if req.v != PROTOCOL_VERSION {
        return Err(ControlError::invalid_request(
            "unsupported protocol version",
        ));
    }
    match req.cmd.as_str() {
        "query" => {
            let p: QueryPayload =
                serde_json::from_value(req.payload).map_err(|e| ControlError::decode(e.to_string()))?;
            let timeout = p
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(context.query_timeout);
            let deadline = tokio::time::Instant::now() + timeout;

            let (responder, rx) = Responder::channel();
            let responder = responder.with_limit(context.max_response_bytes);
            let payload = p.payload.unwrap_or_default().into_bytes();
            context
                .events_tx
                .send(Event::query(p.name, payload, responder))
                .map_err(|_| ControlError::unavailable())?;

            // A dropped query looks like a silent node: the caller gets no
            // entry for it once the deadline passes.
            let mut responses = BTreeMap::new();
            match tokio::time::timeout_at(deadline, rx).await {
                Ok(Ok(bytes)) => {
                    let value = serde_json::from_slice::<serde_json::Value>(&bytes).unwrap_or_else(
                        |_| serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned()),
                    );
                    responses.insert(context.node_name.clone(), value);
                }
                Ok(Err(_)) => tokio::time::sleep_until(deadline).await,
                Err(_) => {}
            }
            Ok(serde_json::json!({ "responses": responses }))
        }
        "event" => {
            let p: EventPayload =
                serde_json::from_value(req.payload).map_err(|e| ControlError::decode(e.to_string()))?;
            let payload = p.payload.unwrap_or_default().into_bytes();
            context
                .events_tx
                .send(Event::broadcast(p.name, payload))
                .map_err(|_| ControlError::unavailable())?;
            Ok(serde_json::json!({}))
        }
        "members" => Ok(serde_json::json!({ "members": context.members })),
        "leave" => {
            tracing::info!("leave requested via control plane");
            let _ = shutdown_tx.send(());
            Ok(serde_json::json!({}))
        }
        _ => Err(ControlError::unknown_method()),
    }
}

/// Control client used by the CLI and tests.
pub struct ControlClient {
    reader: BufReader<tokio::net::tcp::OwnedReadHalf>,
    writer: tokio::net::tcp::OwnedWriteHalf,
    next_id: AtomicU64,
}

impl ControlClient {
    pub async fn connect(addr: &str) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let (r, w) = stream.into_split();
        let reader = BufReader::new(r);
        Ok(Self {
            reader,
            writer: w,
            next_id: AtomicU64::new(1),
        })
    }

    pub async fn request(
        &mut self,
        envelope: &RequestEnvelope,
    ) -> std::io::Result<ResponseEnvelope> {
        let json = serde_json::to_string(envelope).map_err(std::io::Error::other)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "control connection closed",
            ));
        }
        serde_json::from_str(&line).map_err(std::io::Error::other)
    }

    async fn command(
        &mut self,
        cmd: &str,
        payload: serde_json::Value,
    ) -> std::io::Result<ResponseEnvelope> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        self.request(&RequestEnvelope {
            v: PROTOCOL_VERSION,
            id,
            cmd: cmd.into(),
            payload,
        })
        .await
    }

    pub async fn query(
        &mut self,
        name: &str,
        payload: Option<&str>,
        timeout: Option<Duration>,
    ) -> std::io::Result<ResponseEnvelope> {
        let timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self.command(
            "query",
            serde_json::json!({ "name": name, "payload": payload, "timeout_ms": timeout_ms }),
        )
        .await
    }

    pub async fn event(
        &mut self,
        name: &str,
        payload: Option<&str>,
    ) -> std::io::Result<ResponseEnvelope> {
        self.command("event", serde_json::json!({ "name": name, "payload": payload }))
            .await
    }

    pub async fn members(&mut self) -> std::io::Result<ResponseEnvelope> {
        self.command("members", serde_json::json!({})).await
    }

    pub async fn leave(&mut self) -> std::io::Result<ResponseEnvelope> {
        self.command("leave", serde_json::json!({})).await
    }
}
