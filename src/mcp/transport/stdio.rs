//! Stdio transport for locally spawned MCP servers.
//!
//! The child process speaks newline-delimited JSON-RPC on its pipes. A reader
//! task routes responses to pending requests by id; a wait task reaps the
//! process and flips the shared health cell when it exits. Closing the
//! transport kills the child rather than waiting for it to notice EOF.

use crate::core::config::ServerConfig;
use crate::mcp::connection::{ConnectionStatus, SharedHealth};
use crate::mcp::transport::{parse_initialize_result, McpTransport, SendError};
use async_trait::async_trait;
use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
    ServerMessage,
};
use rust_mcp_schema::{InitializeRequestParams, InitializeResult, RequestId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

const STDIO_WRITE_TIMEOUT_SECONDS: u64 = 10;

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<ServerMessage>>>>;

pub(crate) struct StdioTransport {
    server_name: String,
    stdin: ChildStdin,
    pending: PendingMap,
    next_request_id: i64,
    kill_tx: Option<oneshot::Sender<()>>,
}

impl StdioTransport {
    pub(crate) async fn spawn(
        name: &str,
        command: &str,
        config: &ServerConfig,
        health: SharedHealth,
    ) -> Result<StdioTransport, String> {
        let args = config.args.clone().unwrap_or_default();
        debug!(server = %name, command = %command, args = ?args, "Starting MCP stdio server");
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        if let Some(env) = config.env.clone() {
            cmd.envs(env);
        }
        if let Some(cwd) = config.cwd.as_deref() {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|err| err.to_string())?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| "Unable to retrieve stdin.".to_string())?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| "Unable to retrieve stdout.".to_string())?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| "Unable to retrieve stderr.".to_string())?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (kill_tx, kill_rx) = oneshot::channel();

        Self::spawn_stdout_reader(pending.clone(), stdout, name.to_string());
        Self::spawn_stderr_drain(stderr, name.to_string());
        Self::spawn_wait_task(child, kill_rx, pending.clone(), health, name.to_string());

        Ok(StdioTransport {
            server_name: name.to_string(),
            stdin,
            pending,
            next_request_id: 0,
            kill_tx: Some(kill_tx),
        })
    }

    fn spawn_stdout_reader(pending: PendingMap, stdout: ChildStdout, server_name: String) {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                let value = match serde_json::from_str::<serde_json::Value>(&line) {
                    Ok(value) => value,
                    Err(_) => continue,
                };
                if let Some(items) = value.as_array() {
                    for item in items {
                        if let Ok(message) = serde_json::from_value::<ServerMessage>(item.clone()) {
                            Self::dispatch_message(&pending, message, &server_name).await;
                        }
                    }
                } else if let Ok(message) = serde_json::from_value::<ServerMessage>(value) {
                    Self::dispatch_message(&pending, message, &server_name).await;
                }
            }
            debug!(server = %server_name, "MCP stdio read loop ended");
        });
    }

    fn spawn_stderr_drain(stderr: ChildStderr, server_name: String) {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                debug!(server = %server_name, line = %line, "MCP stdio server stderr");
            }
        });
    }

    fn spawn_wait_task(
        mut child: Child,
        kill_rx: oneshot::Receiver<()>,
        pending: PendingMap,
        health: SharedHealth,
        server_name: String,
    ) {
        tokio::spawn(async move {
            let mut kill_rx = kill_rx;
            tokio::select! {
                status = child.wait() => {
                    debug!(
                        server = %server_name,
                        status = ?status.as_ref().ok(),
                        "MCP stdio server exited"
                    );
                    health.mark_disconnected("MCP server process exited.");
                }
                _ = &mut kill_rx => {
                    let _ = child.kill().await;
                    health.set_status(ConnectionStatus::Disconnected);
                }
            }
            pending.lock().await.clear();
        });
    }

    async fn dispatch_message(pending: &PendingMap, message: ServerMessage, server_name: &str) {
        match &message {
            ServerMessage::Response(response) => {
                debug!(
                    server = %server_name,
                    response_id = ?response.id,
                    "Received MCP stdio response"
                );
                if let Some(tx) = pending.lock().await.remove(&response.id) {
                    let _ = tx.send(message);
                }
            }
            ServerMessage::Error(error) => {
                debug!(
                    server = %server_name,
                    error_id = ?error.id,
                    error_code = error.error.code,
                    "Received MCP stdio error"
                );
                if let Some(id) = error.id.as_ref() {
                    if let Some(tx) = pending.lock().await.remove(id) {
                        let _ = tx.send(message);
                    }
                }
            }
            ServerMessage::Request(request) => {
                debug!(
                    server = %server_name,
                    method = %request.method(),
                    request_id = ?request.request_id(),
                    "Ignoring MCP server request"
                );
            }
            ServerMessage::Notification(_) => {
                debug!(server = %server_name, "Received MCP stdio notification");
            }
        }
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = self.next_request_id;
        self.next_request_id += 1;
        RequestId::Integer(id)
    }

    async fn write_message(&mut self, message: &ClientMessage) -> Result<(), String> {
        let payload = serde_json::to_string(message).map_err(|err| err.to_string())?;
        let write_timeout = Duration::from_secs(STDIO_WRITE_TIMEOUT_SECONDS);
        debug!(
            server = %self.server_name,
            bytes = payload.len(),
            "Writing MCP stdio message"
        );
        tokio::time::timeout(write_timeout, self.stdin.write_all(payload.as_bytes()))
            .await
            .map_err(|_| "Timed out writing MCP stdio message.".to_string())?
            .map_err(|err| err.to_string())?;
        tokio::time::timeout(write_timeout, self.stdin.write_all(b"\n"))
            .await
            .map_err(|_| "Timed out writing MCP stdio message newline.".to_string())?
            .map_err(|err| err.to_string())?;
        tokio::time::timeout(write_timeout, self.stdin.flush())
            .await
            .map_err(|_| "Timed out flushing MCP stdio message.".to_string())?
            .map_err(|err| err.to_string())?;
        Ok(())
    }

    async fn send_notification(
        &mut self,
        notification: NotificationFromClient,
    ) -> Result<(), String> {
        let message = ClientMessage::from_message(
            MessageFromClient::NotificationFromClient(notification),
            None,
        )
        .map_err(|err| err.to_string())?;
        self.write_message(&message).await?;
        debug!(server = %self.server_name, "MCP stdio notification sent");
        Ok(())
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn initialize(
        &mut self,
        request: InitializeRequestParams,
        timeout: Duration,
    ) -> Result<InitializeResult, String> {
        let response = self
            .send_request(RequestFromClient::InitializeRequest(request), timeout)
            .await
            .map_err(|err| err.to_string())?;
        let result = parse_initialize_result(response)?;
        self.send_notification(NotificationFromClient::InitializedNotification(None))
            .await?;
        Ok(result)
    }

    async fn send_request(
        &mut self,
        request: RequestFromClient,
        timeout: Duration,
    ) -> Result<ServerMessage, SendError> {
        let request_id = self.next_request_id();
        debug!(
            server = %self.server_name,
            request_id = ?request_id,
            "Sending MCP stdio request"
        );
        let message = ClientMessage::from_message(
            MessageFromClient::RequestFromClient(request),
            Some(request_id.clone()),
        )
        .map_err(|err| SendError::Failed(err.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(request_id.clone(), tx);

        if let Err(err) = self.write_message(&message).await {
            self.pending.lock().await.remove(&request_id);
            return Err(SendError::Failed(err));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(message)) => {
                debug!(
                    server = %self.server_name,
                    request_id = ?request_id,
                    "MCP stdio response received"
                );
                Ok(message)
            }
            Ok(Err(_)) => Err(SendError::Failed(
                "MCP stdio response channel closed.".to_string(),
            )),
            Err(_) => {
                self.pending.lock().await.remove(&request_id);
                let millis = timeout.as_millis() as u64;
                debug!(
                    server = %self.server_name,
                    request_id = ?request_id,
                    timeout_ms = millis,
                    "MCP stdio request timed out"
                );
                Err(SendError::TimedOut { millis })
            }
        }
    }

    async fn close(&mut self) {
        if let Some(kill_tx) = self.kill_tx.take() {
            let _ = kill_tx.send(());
        }
    }
}
