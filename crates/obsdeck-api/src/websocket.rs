//! obs-websocket v5 client over `tokio-tungstenite`.
//!
//! One [`ObsClient`] owns one socket. After the Hello/Identify handshake
//! it splits into a reader task (responses + events) and a writer task
//! (outgoing requests). Requests are matched to responses by `requestId`,
//! so any number of calls may be in flight concurrently.
//!
//! # Example
//!
//! ```rust,ignore
//! use obsdeck_api::{ConnectTarget, ObsClient, TransportConfig};
//!
//! let target = ConnectTarget::new("192.168.1.10", 4455);
//! let client = ObsClient::connect(&target, TransportConfig::default()).await?;
//! let scenes = client.request("GetSceneList", None).await?;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use secrecy::ExposeSecret;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use crate::binding::{Connector, Link, Signal};
use crate::error::Error;
use crate::event::RemoteEvent;
use crate::protocol::{self, EventFrame, Frame, Hello, RequestResponse, op};
use crate::transport::{ConnectTarget, TransportConfig};

// ── Broadcast channel capacity ───────────────────────────────────────

const SIGNAL_CHANNEL_CAPACITY: usize = 512;

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, Error>>>>>;

// ── ObsClient ────────────────────────────────────────────────────────

/// A connected, identified obs-websocket session.
pub struct ObsClient {
    outgoing: mpsc::UnboundedSender<Message>,
    pending: PendingMap,
    signals: broadcast::Sender<Arc<Signal>>,
    closed: Arc<AtomicBool>,
    cancel: CancellationToken,
    next_id: AtomicU64,
    config: TransportConfig,
}

impl ObsClient {
    /// Open the socket, run the handshake, and spawn the I/O tasks.
    ///
    /// The whole handshake is bounded by the transport's request timeout.
    pub async fn connect(target: &ConnectTarget, config: TransportConfig) -> Result<Self, Error> {
        let url = target.url()?;
        tracing::info!(url = %url, "connecting to obs-websocket");

        let handshake = async {
            let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| Error::WebSocketConnect(e.to_string()))?;
            let (mut write, mut read) = ws_stream.split();
            identify(&mut write, &mut read, target).await?;
            Ok::<_, Error>((write, read))
        };

        let (write, read) = tokio::time::timeout(config.request_timeout, handshake)
            .await
            .map_err(|_| Error::Timeout {
                request_type: "Identify".into(),
                timeout_ms: duration_ms(&config),
            })??;

        tracing::info!(target = %target.key(), "obs-websocket identified");

        let (signals, _) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        tokio::spawn(write_loop(write, outgoing_rx, cancel.clone()));
        tokio::spawn(read_loop(
            read,
            Arc::clone(&pending),
            signals.clone(),
            Arc::clone(&closed),
            cancel.clone(),
        ));

        Ok(Self {
            outgoing,
            pending,
            signals,
            closed,
            cancel,
            next_id: AtomicU64::new(1),
            config,
        })
    }

    /// Send one request and wait for its response data.
    pub async fn request(
        &self,
        request_type: &str,
        request_data: Option<Value>,
    ) -> Result<Value, Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(closed_error("link already closed"));
        }

        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(request_id.clone(), tx);

        // The reader may have drained `pending` between the check above and
        // the insert; don't leave this request waiting for a timeout.
        if self.closed.load(Ordering::SeqCst) {
            lock(&self.pending).remove(&request_id);
            return Err(closed_error("link already closed"));
        }

        let frame = protocol::request(request_type, &request_id, request_data);
        let text = serde_json::to_string(&frame)?;
        if self.outgoing.send(Message::text(text)).is_err() {
            lock(&self.pending).remove(&request_id);
            return Err(closed_error("writer task stopped"));
        }

        tracing::trace!(request_type, request_id = %request_id, "request sent");

        match tokio::time::timeout(self.config.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(closed_error("request abandoned")),
            Err(_) => {
                lock(&self.pending).remove(&request_id);
                Err(Error::Timeout {
                    request_type: request_type.to_owned(),
                    timeout_ms: duration_ms(&self.config),
                })
            }
        }
    }

    /// Number of requests waiting for a response.
    pub fn in_flight(&self) -> usize {
        lock(&self.pending).len()
    }
}

impl Drop for ObsClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl Link for ObsClient {
    async fn call(
        &self,
        request_type: &str,
        request_data: Option<Value>,
    ) -> Result<Value, Error> {
        self.request(request_type, request_data).await
    }

    fn signals(&self) -> broadcast::Receiver<Arc<Signal>> {
        self.signals.subscribe()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.cancel.cancel();
    }
}

// ── WebSocketConnector ───────────────────────────────────────────────

/// Production [`Connector`]: every `open` dials a fresh WebSocket.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    config: TransportConfig,
}

impl WebSocketConnector {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, target: &ConnectTarget) -> Result<Arc<dyn Link>, Error> {
        let client = ObsClient::connect(target, self.config.clone()).await?;
        Ok(Arc::new(client))
    }
}

// ── Handshake ────────────────────────────────────────────────────────

async fn identify<W, R>(write: &mut W, read: &mut R, target: &ConnectTarget) -> Result<(), Error>
where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let hello_frame = read_frame(read).await?;
    if hello_frame.op != op::HELLO {
        return Err(Error::UnexpectedOp {
            expected: "Hello",
            got: hello_frame.op,
        });
    }
    let hello: Hello = serde_json::from_value(hello_frame.d)?;
    tracing::debug!(
        version = hello.obs_web_socket_version.as_deref().unwrap_or("unknown"),
        rpc = hello.rpc_version.unwrap_or(0),
        auth_required = hello.authentication.is_some(),
        "received Hello"
    );

    let authentication = match (hello.authentication, &target.password) {
        (Some(challenge), Some(password)) => Some(protocol::auth_string(
            password.expose_secret(),
            &challenge.challenge,
            &challenge.salt,
        )),
        (Some(_), None) => {
            return Err(Error::Authentication {
                message: "server requires a password but none was provided".into(),
            });
        }
        (None, _) => None,
    };
    let sent_auth = authentication.is_some();

    let text = serde_json::to_string(&protocol::identify(authentication))?;
    write
        .send(Message::text(text))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    // A rejected password shows up as the server closing the socket.
    let identified = match read_frame(read).await {
        Ok(frame) => frame,
        Err(Error::ConnectionClosed { reason }) if sent_auth => {
            return Err(Error::Authentication { message: reason });
        }
        Err(e) => return Err(e),
    };
    if identified.op != op::IDENTIFIED {
        return Err(Error::UnexpectedOp {
            expected: "Identified",
            got: identified.op,
        });
    }
    Ok(())
}

/// Read the next text frame, skipping control frames.
async fn read_frame<R>(read: &mut R) -> Result<Frame, Error>
where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(text.as_str()).map_err(|e| Error::Deserialization {
                    message: e.to_string(),
                    body: text.as_str().to_owned(),
                });
            }
            Some(Ok(Message::Close(frame))) => {
                let reason = frame.map_or_else(
                    || "server closed the connection".to_owned(),
                    |cf| format!("code {}: {}", u16::from(cf.code), cf.reason.as_str()),
                );
                return Err(Error::ConnectionClosed { reason });
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
            None => return Err(closed_error("stream ended during handshake")),
        }
    }
}

// ── I/O tasks ────────────────────────────────────────────────────────

async fn write_loop<W>(
    mut write: W,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
) where
    W: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                let _ = write.close().await;
                break;
            }
            msg = outgoing.recv() => {
                let Some(msg) = msg else { break };
                if let Err(e) = write.send(msg).await {
                    tracing::warn!(error = %e, "obs-websocket write failed");
                    cancel.cancel();
                    break;
                }
            }
        }
    }
    tracing::debug!("obs-websocket writer exiting");
}

async fn read_loop<R>(
    mut read: R,
    pending: PendingMap,
    signals: broadcast::Sender<Arc<Signal>>,
    closed: Arc<AtomicBool>,
    cancel: CancellationToken,
) where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let reason = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break "closed by client".to_owned(),
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_text(text.as_str(), &pending, &signals);
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map_or_else(
                            || "server closed the connection".to_owned(),
                            |cf| format!("code {}: {}", u16::from(cf.code), cf.reason.as_str()),
                        );
                    }
                    Some(Ok(_)) => {
                        // Ping/Pong/Binary -- tungstenite answers pings itself
                    }
                    Some(Err(e)) => break e.to_string(),
                    None => break "stream ended".to_owned(),
                }
            }
        }
    };

    cancel.cancel();
    if !closed.swap(true, Ordering::SeqCst) {
        tracing::info!(reason = %reason, "obs-websocket closed");
        let drained: Vec<_> = lock(&pending).drain().collect();
        for (_, tx) in drained {
            let _ = tx.send(Err(closed_error(&reason)));
        }
        let _ = signals.send(Arc::new(Signal::Closed { reason }));
    }
}

/// Route one text frame to its waiting request or to the signal channel.
fn dispatch_text(text: &str, pending: &PendingMap, signals: &broadcast::Sender<Arc<Signal>>) {
    let frame: Frame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable obs-websocket frame");
            let _ = signals.send(Arc::new(Signal::Error {
                message: format!("unparseable frame: {e}"),
            }));
            return;
        }
    };

    match frame.op {
        op::EVENT => match serde_json::from_value::<EventFrame>(frame.d) {
            Ok(event) => {
                let decoded = RemoteEvent::decode(&event.event_type, event.event_data);
                tracing::trace!(event_type = decoded.event_type(), "event received");
                let _ = signals.send(Arc::new(Signal::Event(decoded)));
            }
            Err(e) => {
                let _ = signals.send(Arc::new(Signal::Error {
                    message: format!("malformed event: {e}"),
                }));
            }
        },
        op::REQUEST_RESPONSE => match serde_json::from_value::<RequestResponse>(frame.d) {
            Ok(resp) => {
                let Some(tx) = lock(pending).remove(&resp.request_id) else {
                    tracing::debug!(request_id = %resp.request_id, "response for unknown request");
                    return;
                };
                let result = if resp.request_status.result {
                    Ok(resp.response_data.unwrap_or(Value::Null))
                } else {
                    Err(Error::Request {
                        request_type: resp.request_type,
                        code: resp.request_status.code,
                        comment: resp.request_status.comment.unwrap_or_default(),
                    })
                };
                let _ = tx.send(result);
            }
            Err(e) => {
                let _ = signals.send(Arc::new(Signal::Error {
                    message: format!("malformed response: {e}"),
                }));
            }
        },
        other => {
            tracing::debug!(op = other, "ignoring unexpected op");
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn closed_error(reason: &str) -> Error {
    Error::ConnectionClosed {
        reason: reason.to_owned(),
    }
}

fn duration_ms(config: &TransportConfig) -> u64 {
    u64::try_from(config.request_timeout.as_millis()).unwrap_or(u64::MAX)
}
