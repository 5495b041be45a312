//! Inter-process communication between the `oraculo` CLI and the server.
//!
//! Unix socket IPC using a JSON-over-newlines protocol. The server runs an
//! [`IpcServer`] over a [`SessionStore`]; clients connect with [`IpcClient`].
//!
//! # Protocol
//!
//! - Each message is a single line of JSON followed by a newline
//! - Requests ([`IpcRequest`]) and responses ([`IpcResponse`]) are tagged by
//!   a `type` field
//! - Every request gets exactly one response line
//!
//! # Socket Location
//!
//! Sockets are created in `~/.oraculo/` with the naming pattern
//! `oraculo_{name}.sock`. Use [`socket_path`] to get the path for a name.
//!
//! # Example
//!
//! ```no_run
//! use oraculo_core::ipc::{IpcClient, IpcRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut client = IpcClient::connect("default").await.unwrap();
//!     let response = client
//!         .send(&IpcRequest::Interpret { code: "print \"hi\"".into(), session_id: None })
//!         .await
//!         .unwrap();
//!     println!("Response: {:?}", response);
//! }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::evaluator::RunResult;
use crate::session::{SessionError, SessionStore};

/// Errors that can occur during IPC operations.
#[derive(Error, Debug)]
pub enum IpcError {
    /// An I/O error occurred (connection, read, write).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The peer broke the protocol (e.g. closed the connection mid-request).
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// A request sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcRequest {
    /// Parse and run `code`, in a new session or replacing a live one.
    Interpret {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<Uuid>,
    },

    /// Run a session from where it stopped.
    Continue { session_id: Uuid },

    /// Answer a pending `ask` and continue.
    SubmitInput {
        session_id: Uuid,
        variable_name: String,
        input_value: String,
    },

    /// Run a registered event callback.
    TriggerEvent { session_id: Uuid, event_id: String },

    EndSession { session_id: Uuid },

    /// Stop the server.
    Shutdown,
}

/// A response sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IpcResponse {
    /// Outcome of a run or event trigger.
    Run { session_id: Uuid, result: RunResult },

    SessionEnded { session_id: Uuid },

    /// The request failed. Runtime errors inside a script are not reported
    /// here; they appear in the run's console log.
    Error { message: String },

    ShutdownAck,
}

/// Returns the oraculo directory path (`~/.oraculo/`).
///
/// Creates the directory if it doesn't exist. Falls back to the system temp
/// directory when no home directory is known.
pub fn oraculo_dir() -> PathBuf {
    let dir = dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".oraculo");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Returns the logs directory path (`~/.oraculo/logs/`).
///
/// Creates the directory if it doesn't exist.
pub fn logs_dir() -> PathBuf {
    let dir = oraculo_dir().join("logs");
    std::fs::create_dir_all(&dir).ok();
    dir
}

/// Returns the Unix socket path for a server name
/// (e.g. `~/.oraculo/oraculo_default.sock`).
pub fn socket_path(name: &str) -> PathBuf {
    oraculo_dir().join(format!("oraculo_{}.sock", name))
}

/// Unix socket server exposing a [`SessionStore`].
///
/// The server removes the socket file when dropped.
pub struct IpcServer {
    store: Arc<SessionStore>,
    socket_path: PathBuf,
    shutdown: Arc<Notify>,
}

impl IpcServer {
    /// Creates a server for `~/.oraculo/oraculo_{name}.sock` (not yet running).
    pub fn new(store: Arc<SessionStore>, name: &str) -> Self {
        Self::with_path(store, socket_path(name))
    }

    /// Creates a server bound to an explicit socket path.
    pub fn with_path(store: Arc<SessionStore>, socket_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            socket_path: socket_path.into(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Resolves once a client has sent [`IpcRequest::Shutdown`].
    pub fn shutdown_signal(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Binds the socket and serves clients until an accept fails.
    ///
    /// Any existing socket file at the path is removed before binding. Each
    /// client is served on its own task. Use with `tokio::select!` alongside
    /// [`shutdown_signal`](Self::shutdown_signal) to stop.
    pub async fn run(&self) -> Result<(), IpcError> {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "failed to remove existing socket");
            }
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = ?self.socket_path, "IPC server listening");

        loop {
            let (stream, _) = listener.accept().await?;
            debug!("client connected");
            let store = Arc::clone(&self.store);
            let shutdown = Arc::clone(&self.shutdown);

            tokio::spawn(async move {
                if let Err(e) = Self::handle_client(stream, store, shutdown).await {
                    warn!(error = %e, "client error");
                }
            });
        }
    }

    async fn handle_client(
        stream: UnixStream,
        store: Arc<SessionStore>,
        shutdown: Arc<Notify>,
    ) -> Result<(), IpcError> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let request = serde_json::from_str::<IpcRequest>(line.trim());
            let shutting_down = matches!(request, Ok(IpcRequest::Shutdown));
            let response = match request {
                Ok(request) => Self::dispatch(&store, request).await,
                Err(e) => IpcResponse::Error {
                    message: format!("invalid request: {}", e),
                },
            };

            let json = serde_json::to_string(&response)? + "\n";
            writer.write_all(json.as_bytes()).await?;
            writer.flush().await?;

            // Acknowledge before signalling so the client sees the reply.
            if shutting_down {
                info!("shutdown requested over IPC");
                shutdown.notify_one();
                return Ok(());
            }
        }
        debug!("client disconnected");
        Ok(())
    }

    async fn dispatch(store: &SessionStore, request: IpcRequest) -> IpcResponse {
        let outcome: Result<IpcResponse, SessionError> = match request {
            IpcRequest::Interpret { code, session_id } => store
                .interpret(&code, session_id)
                .await
                .map(|(session_id, result)| IpcResponse::Run { session_id, result }),
            IpcRequest::Continue { session_id } => store
                .continue_run(session_id)
                .await
                .map(|result| IpcResponse::Run { session_id, result }),
            IpcRequest::SubmitInput {
                session_id,
                variable_name,
                input_value,
            } => store
                .submit_input(session_id, &variable_name, &input_value)
                .await
                .map(|result| IpcResponse::Run { session_id, result }),
            IpcRequest::TriggerEvent {
                session_id,
                event_id,
            } => store
                .trigger_event(session_id, &event_id)
                .await
                .map(|result| IpcResponse::Run { session_id, result }),
            IpcRequest::EndSession { session_id } => store
                .end(session_id)
                .await
                .map(|()| IpcResponse::SessionEnded { session_id }),
            IpcRequest::Shutdown => Ok(IpcResponse::ShutdownAck),
        };

        outcome.unwrap_or_else(|e| IpcResponse::Error {
            message: e.to_string(),
        })
    }

    /// Returns a reference to the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "failed to clean up socket on drop");
            }
        }
    }
}

/// Unix socket client for an [`IpcServer`].
pub struct IpcClient {
    stream: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
}

impl IpcClient {
    /// Connects to the server named `name`.
    ///
    /// # Errors
    ///
    /// - [`IpcError::Io`] if the connection fails (e.g., server not running)
    pub async fn connect(name: &str) -> Result<Self, IpcError> {
        Self::connect_path(socket_path(name)).await
    }

    /// Connects to a server at an explicit socket path.
    pub async fn connect_path(path: impl AsRef<Path>) -> Result<Self, IpcError> {
        let stream = UnixStream::connect(path.as_ref()).await?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            stream: BufReader::new(reader),
            writer,
        })
    }

    /// Sends a request and waits for its response line.
    ///
    /// # Errors
    ///
    /// - [`IpcError::Io`] if the send or receive fails
    /// - [`IpcError::Json`] if serialization or deserialization fails
    /// - [`IpcError::Protocol`] if the server closes the connection first
    pub async fn send(&mut self, request: &IpcRequest) -> Result<IpcResponse, IpcError> {
        let json = serde_json::to_string(request)? + "\n";
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.flush().await?;

        let mut line = String::new();
        let n = self.stream.read_line(&mut line).await?;
        if n == 0 {
            return Err(IpcError::Protocol(
                "server closed the connection before responding".to_string(),
            ));
        }
        let response: IpcResponse = serde_json::from_str(line.trim())?;
        Ok(response)
    }
}
