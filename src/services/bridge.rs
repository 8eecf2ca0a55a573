// src/services/bridge.rs

//! Request channel between a front end and the import backend.
//!
//! Messages travel over a pair of `mpsc` channels; the transport that
//! carries them between processes (stdio in the CLI) is up to the caller.
//! The client owns its pending-request map: an entry is inserted when a
//! request is sent and removed when its response arrives or it times out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};

use crate::error::{AppError, Result};
use crate::models::{Config, SourceKind};
use crate::page::PageHost;
use crate::pipeline::run_import;

/// Backend version reported in [`BridgeMessage::Ready`].
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything that crosses the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BridgeMessage {
    /// Liveness probe from the front end
    Ping,
    /// The backend is up
    Ready { version: String },
    #[serde(rename_all = "camelCase")]
    Request {
        request_id: String,
        action: String,
        #[serde(default)]
        payload: Value,
    },
    #[serde(rename_all = "camelCase")]
    Response { request_id: String, response: Value },
}

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<Value>>>>;
type ReadyWaiters = Arc<Mutex<Vec<oneshot::Sender<String>>>>;

/// Front-end side of the channel.
pub struct BridgeClient {
    outgoing: mpsc::Sender<BridgeMessage>,
    pending: Pending,
    ready_waiters: ReadyWaiters,
    next_id: AtomicU64,
    timeout: Duration,
}

impl BridgeClient {
    /// Start routing `incoming` responses to waiting requests.
    ///
    /// Must be called inside a tokio runtime. When `incoming` closes, every
    /// request still waiting fails.
    pub fn connect(
        outgoing: mpsc::Sender<BridgeMessage>,
        mut incoming: mpsc::Receiver<BridgeMessage>,
        timeout: Duration,
    ) -> Self {
        let pending: Pending = Arc::default();
        let ready_waiters: ReadyWaiters = Arc::default();

        let routes = (Arc::clone(&pending), Arc::clone(&ready_waiters));
        tokio::spawn(async move {
            let (pending, ready_waiters) = routes;
            while let Some(message) = incoming.recv().await {
                route(&pending, &ready_waiters, message);
            }
            log::debug!("Bridge channel closed");
            if let Ok(mut map) = pending.lock() {
                map.clear();
            }
            if let Ok(mut waiters) = ready_waiters.lock() {
                waiters.clear();
            }
        });

        Self {
            outgoing,
            pending,
            ready_waiters,
            next_id: AtomicU64::new(1),
            timeout,
        }
    }

    /// Requests sent and not yet answered.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|map| map.len()).unwrap_or(0)
    }

    fn lock_pending(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<Value>>>> {
        self.pending
            .lock()
            .map_err(|_| AppError::bridge("pending map lock poisoned"))
    }

    /// Send `action` and wait for its response.
    pub async fn request(&self, action: &str, payload: Value) -> Result<Value> {
        let request_id = format!("req-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.lock_pending()?.insert(request_id.clone(), tx);

        let message = BridgeMessage::Request {
            request_id: request_id.clone(),
            action: action.to_string(),
            payload,
        };
        if self.outgoing.send(message).await.is_err() {
            self.lock_pending()?.remove(&request_id);
            return Err(AppError::bridge("backend is not listening"));
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(AppError::bridge(format!(
                "channel closed before {} was answered",
                request_id
            ))),
            Err(_) => {
                self.lock_pending()?.remove(&request_id);
                Err(AppError::RequestTimeout {
                    request_id,
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }

    /// Probe the backend; returns its version.
    pub async fn ping(&self) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.ready_waiters
            .lock()
            .map_err(|_| AppError::bridge("ready waiters lock poisoned"))?
            .push(tx);

        self.outgoing
            .send(BridgeMessage::Ping)
            .await
            .map_err(|_| AppError::bridge("backend is not listening"))?;

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(version)) => Ok(version),
            Ok(Err(_)) => Err(AppError::bridge("channel closed before backend answered")),
            Err(_) => Err(AppError::RequestTimeout {
                request_id: "ping".to_string(),
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

fn route(pending: &Pending, ready_waiters: &ReadyWaiters, message: BridgeMessage) {
    match message {
        BridgeMessage::Response {
            request_id,
            response,
        } => {
            let waiter = pending.lock().ok().and_then(|mut map| map.remove(&request_id));
            match waiter {
                Some(tx) => {
                    let _ = tx.send(response);
                }
                None => log::debug!("Dropping response for unknown request {}", request_id),
            }
        }
        BridgeMessage::Ready { version } => {
            let waiters = ready_waiters
                .lock()
                .map(|mut w| std::mem::take(&mut *w))
                .unwrap_or_default();
            for tx in waiters {
                let _ = tx.send(version.clone());
            }
        }
        other => log::debug!("Client ignoring {:?}", other),
    }
}

/// Backend side: answers one action.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, action: &str, payload: Value) -> Result<Value>;
}

/// Answer pings and requests until `incoming` closes.
///
/// Pings are answered as they arrive; requests run concurrently and reply
/// in completion order. Handler failures become
/// `{ "success": false, "error": .. }` responses.
pub async fn serve<R>(
    handler: &R,
    mut incoming: mpsc::Receiver<BridgeMessage>,
    outgoing: mpsc::Sender<BridgeMessage>,
) -> Result<()>
where
    R: RequestHandler + ?Sized,
{
    let mut running = FuturesUnordered::new();
    let mut open = true;

    loop {
        tokio::select! {
            message = incoming.recv(), if open => match message {
                Some(BridgeMessage::Ping) => {
                    let ready = BridgeMessage::Ready {
                        version: VERSION.to_string(),
                    };
                    reply(&outgoing, ready).await?;
                }
                Some(BridgeMessage::Request {
                    request_id,
                    action,
                    payload,
                }) => {
                    log::debug!("Handling {} ({})", request_id, action);
                    running.push(answer(handler, request_id, action, payload));
                }
                Some(other) => log::debug!("Backend ignoring {:?}", other),
                None => open = false,
            },
            Some(response) = running.next(), if !running.is_empty() => {
                reply(&outgoing, response).await?;
            }
            else => break,
        }
    }
    Ok(())
}

async fn answer<R>(handler: &R, request_id: String, action: String, payload: Value) -> BridgeMessage
where
    R: RequestHandler + ?Sized,
{
    let response = match handler.handle(&action, payload).await {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Request {} ({}) failed: {}", request_id, action, e);
            json!({ "success": false, "error": e.to_string() })
        }
    };
    BridgeMessage::Response {
        request_id,
        response,
    }
}

async fn reply(outgoing: &mpsc::Sender<BridgeMessage>, message: BridgeMessage) -> Result<()> {
    outgoing
        .send(message)
        .await
        .map_err(|_| AppError::bridge("front end stopped listening"))
}

#[derive(Debug, Default, Deserialize)]
struct ImportAllPayload {
    #[serde(default)]
    sources: Option<Vec<SourceKind>>,
}

#[derive(Debug, Deserialize)]
struct ImportSourcePayload {
    source: SourceKind,
}

/// Serves `ping`, `import-all` and `import-source` against a page host.
pub struct ImportHandler {
    host: Arc<dyn PageHost>,
    config: Config,
}

impl ImportHandler {
    pub fn new(host: Arc<dyn PageHost>, config: Config) -> Self {
        Self { host, config }
    }
}

#[async_trait]
impl RequestHandler for ImportHandler {
    async fn handle(&self, action: &str, payload: Value) -> Result<Value> {
        match action {
            "ping" => Ok(json!({ "success": true, "version": VERSION })),
            "import-all" => {
                let request: ImportAllPayload = if payload.is_null() {
                    ImportAllPayload::default()
                } else {
                    serde_json::from_value(payload)?
                };
                let sources = request.sources.unwrap_or_else(|| SourceKind::ALL.to_vec());
                let report = run_import(self.host.as_ref(), &self.config, &sources).await;
                Ok(json!({ "success": true, "results": report }))
            }
            "import-source" => {
                let request: ImportSourcePayload = serde_json::from_value(payload)?;
                let report = run_import(self.host.as_ref(), &self.config, &[request.source]).await;
                let result = report.get(request.source).ok_or_else(|| {
                    AppError::bridge(format!("no result for {}", request.source))
                })?;
                Ok(json!({ "success": true, "result": result }))
            }
            other => Err(AppError::bridge(format!("unknown action '{}'", other))),
        }
    }
}
