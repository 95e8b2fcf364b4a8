//! IPC control surface for the Litany daemon
//!
//! One JSON request per line in, one JSON response per line out.

use crate::engine::SpeechEngine;
use crate::LitanyDaemon;
use anyhow::Result;
use litany_core::{Dialect, LitanyError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

/// IPC request types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum IpcRequest {
    /// Replace (or create) a grammar from a rule body
    Compose {
        name: String,
        rule: String,
        #[serde(default)]
        dialect: Dialect,
    },
    Find { name: String },
    FindExample { rule_id: String },
    SetEnabled { name: String, enabled: bool },
    Rescan,
    List,
    Status,
}

/// IPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum IpcResponse {
    Success { data: Value },
    Error { kind: String, message: String },
}

impl IpcResponse {
    fn success(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => IpcResponse::Success { data },
            Err(e) => IpcResponse::Error {
                kind: "serialize".to_string(),
                message: format!("Failed to encode response: {}", e),
            },
        }
    }

    fn error(err: &LitanyError) -> Self {
        IpcResponse::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    fn not_found(what: impl Into<String>) -> Self {
        Self::error(&LitanyError::NotFound(what.into()))
    }
}

/// Unix socket server in front of a [`LitanyDaemon`]
pub struct ControlServer<E: SpeechEngine> {
    socket_path: PathBuf,
    daemon: Arc<LitanyDaemon<E>>,
}

impl<E: SpeechEngine> ControlServer<E> {
    pub fn new(socket_path: PathBuf, daemon: Arc<LitanyDaemon<E>>) -> Self {
        Self { socket_path, daemon }
    }

    /// Accept clients until the process exits
    pub async fn run(&self) -> Result<()> {
        // Remove existing socket
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!("Litany IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let daemon = Arc::clone(&self.daemon);
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, daemon).await {
                            tracing::error!("Client error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                }
            }
        }
    }
}

async fn handle_client<E: SpeechEngine>(stream: UnixStream, daemon: Arc<LitanyDaemon<E>>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    while reader.read_line(&mut line).await? > 0 {
        let response = match serde_json::from_str::<IpcRequest>(&line) {
            Ok(request) => process_request(request, &*daemon).await,
            Err(e) => IpcResponse::Error {
                kind: "request".to_string(),
                message: format!("Invalid request: {}", e),
            },
        };

        let response_json = serde_json::to_string(&response)?;
        writer.write_all(response_json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;

        line.clear();
    }

    Ok(())
}

pub async fn process_request<E: SpeechEngine>(request: IpcRequest, daemon: &LitanyDaemon<E>) -> IpcResponse {
    match request {
        IpcRequest::Compose { name, rule, dialect } => {
            match daemon.composer.compose(&name, &rule, dialect).await {
                Ok(grammar) => IpcResponse::Success {
                    data: serde_json::json!({
                        "name": grammar.name,
                        "enabled": grammar.enabled,
                        "last_modified": grammar.last_modified,
                        "wake_word_injected": grammar.wake_word_injected,
                    }),
                },
                Err(e) => IpcResponse::error(&e),
            }
        }

        IpcRequest::Find { name } => match daemon.store.find_by_name(&name).await {
            Some(grammar) => IpcResponse::success(&grammar),
            None => IpcResponse::not_found(format!("grammar {}", name)),
        },

        IpcRequest::FindExample { rule_id } => {
            match daemon.store.find_example_by_rule_id(&rule_id).await {
                Some(example) => IpcResponse::Success {
                    data: serde_json::json!({ "rule_id": rule_id, "example": example }),
                },
                None => IpcResponse::not_found(format!("rule {}", rule_id)),
            }
        }

        IpcRequest::SetEnabled { name, enabled } => {
            let gate = daemon.store.exclusive().await;
            if !daemon.store.set_enabled(&gate, &name, enabled).await {
                return IpcResponse::not_found(format!("grammar {}", name));
            }
            daemon.store.sync_enabled_to_engine(&gate, daemon.engine.as_ref()).await;

            IpcResponse::Success {
                data: serde_json::json!({ "name": name, "enabled": enabled }),
            }
        }

        IpcRequest::Rescan => match daemon.reloader.reload().await {
            Ok(report) => IpcResponse::success(report),
            Err(e) => IpcResponse::Error {
                kind: "rescan".to_string(),
                message: e.to_string(),
            },
        },

        IpcRequest::List => IpcResponse::Success {
            data: serde_json::json!({ "grammars": daemon.store.names().await }),
        },

        IpcRequest::Status => IpcResponse::success(daemon.status().await),
    }
}

/// IPC client for other components
pub struct ControlClient {
    socket_path: PathBuf,
}

impl ControlClient {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    pub async fn compose(&self, name: &str, rule: &str, dialect: Dialect) -> Result<Value> {
        let response = self
            .send(IpcRequest::Compose {
                name: name.to_string(),
                rule: rule.to_string(),
                dialect,
            })
            .await?;

        match response {
            IpcResponse::Success { data } => Ok(data),
            IpcResponse::Error { message, .. } => Err(anyhow::anyhow!(message)),
        }
    }

    async fn send(&self, request: IpcRequest) -> Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;

        let request_json = serde_json::to_string(&request)?;
        stream.write_all(request_json.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        reader.read_line(&mut line).await?;

        Ok(serde_json::from_str(&line)?)
    }
}
