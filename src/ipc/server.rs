//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of voice
//! events and media actions to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::controller::{ControlInput, VoiceStatus};
use crate::dispatch::RemoteMedia;
use crate::events::VoiceEvent;

use super::protocol::{DaemonStatus, Notification, Request, Response};

/// Largest accepted message body
const MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Handles the server needs into the rest of the daemon
#[derive(Clone)]
pub struct ServerContext {
    /// Requests for the voice controller
    pub input_tx: mpsc::UnboundedSender<ControlInput>,
    /// Latest controller status
    pub status_rx: watch::Receiver<VoiceStatus>,
    /// Voice events, for subscribers
    pub event_tx: broadcast::Sender<VoiceEvent>,
    /// The remote player mirror
    pub media: RemoteMedia,
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    context: Arc<ServerContext>,
    start_time: Instant,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Create a new IPC server
    pub fn new(socket_path: &Path, context: ServerContext) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            context: Arc::new(context),
            start_time: Instant::now(),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let context = Arc::clone(&self.context);
                    let start_time = self.start_time;
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, context, start_time) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        stream: UnixStream,
        context: Arc<ServerContext>,
        start_time: Instant,
    ) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let (request_tx, mut request_rx) = mpsc::channel(16);
        let read_task = tokio::spawn(Self::read_requests(reader, request_tx));

        let mut events: Option<broadcast::Receiver<VoiceEvent>> = None;
        let mut actions = None;

        let result = loop {
            tokio::select! {
                request = request_rx.recv() => {
                    let Some(request) = request else {
                        debug!("client disconnected");
                        break Ok(());
                    };

                    let response = match request {
                        Ok(request) => {
                            debug!(?request, "received request");
                            let (response, subscribe) =
                                Self::process_request(request, &context, start_time);
                            if subscribe && events.is_none() {
                                events = Some(context.event_tx.subscribe());
                                actions = Some(context.media.subscribe());
                                debug!("client subscribed to notifications");
                            }
                            response
                        }
                        Err(message) => Response::error("bad_request", message),
                    };

                    if let Err(e) = Self::send_message(&mut writer, &response).await {
                        break Err(e);
                    }
                }
                event = recv_subscribed(&mut events) => {
                    if let Some(event) = event {
                        let notification = Response::Notification(Notification::VoiceEvent(event));
                        if let Err(e) = Self::send_message(&mut writer, &notification).await {
                            break Err(e);
                        }
                    }
                }
                action = recv_subscribed(&mut actions) => {
                    if let Some(action) = action {
                        let notification = Response::Notification(Notification::Media(action));
                        if let Err(e) = Self::send_message(&mut writer, &notification).await {
                            break Err(e);
                        }
                    }
                }
            }
        };

        read_task.abort();
        result
    }

    /// Read length-prefixed requests until the client goes away
    async fn read_requests(
        mut reader: OwnedReadHalf,
        request_tx: mpsc::Sender<std::result::Result<Request, String>>,
    ) {
        let mut len_buf = [0u8; 4];

        loop {
            // Read message length (4-byte little-endian)
            if let Err(e) = reader.read_exact(&mut len_buf).await {
                if e.kind() != std::io::ErrorKind::UnexpectedEof {
                    warn!(?e, "failed to read from client");
                }
                return;
            }

            let len = u32::from_le_bytes(len_buf) as usize;
            if len > MAX_MESSAGE_LEN {
                warn!(len, "message too large, disconnecting");
                return;
            }

            // Read message body
            let mut msg_buf = vec![0u8; len];
            if let Err(e) = reader.read_exact(&mut msg_buf).await {
                warn!(?e, "failed to read message body");
                return;
            }

            let request = serde_json::from_slice::<Request>(&msg_buf)
                .map_err(|e| format!("failed to parse request: {e}"));

            if request_tx.send(request).await.is_err() {
                return;
            }
        }
    }

    /// Send a length-prefixed JSON message
    async fn send_message<T: serde::Serialize>(writer: &mut OwnedWriteHalf, msg: &T) -> Result<()> {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        writer.write_all(&msg_len).await?;
        writer.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    fn process_request(
        request: Request,
        context: &ServerContext,
        start_time: Instant,
    ) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let status = DaemonStatus {
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    uptime_secs: start_time.elapsed().as_secs(),
                    media_attached: context.media.snapshot().is_some(),
                    voice: context.status_rx.borrow().clone(),
                };
                (Response::Status(status), false)
            }

            Request::Subscribe => (Response::Subscribed, true),

            Request::StartListening => (Self::forward(context, ControlInput::Start), false),

            Request::StopListening => (Self::forward(context, ControlInput::Stop), false),

            Request::SetLanguage { language } => {
                let language = language.trim().to_string();
                if language.is_empty() {
                    return (Response::error("invalid_language", "language tag is empty"), false);
                }
                info!(%language, "language change requested via IPC");
                (Self::forward(context, ControlInput::SetLanguage(language)), false)
            }

            Request::ReportPlayback { state } => {
                context.media.report(state);
                (Response::Ok, false)
            }

            Request::DetachMedia => {
                context.media.detach();
                (Response::Ok, false)
            }
        }
    }

    fn forward(context: &ServerContext, input: ControlInput) -> Response {
        match context.input_tx.send(input) {
            Ok(()) => Response::Ok,
            Err(_) => Response::error("controller_stopped", "voice controller is not running"),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Next item from an optional subscription; pending while unsubscribed
async fn recv_subscribed<T: Clone>(rx: &mut Option<broadcast::Receiver<T>>) -> Option<T> {
    let Some(receiver) = rx.as_mut() else {
        return std::future::pending().await;
    };

    match receiver.recv().await {
        Ok(item) => Some(item),
        Err(broadcast::error::RecvError::Lagged(n)) => {
            warn!(skipped = n, "subscriber lagged");
            None
        }
        Err(broadcast::error::RecvError::Closed) => {
            *rx = None;
            None
        }
    }
}
