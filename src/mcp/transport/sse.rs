//! HTTP event-stream transport for remote MCP servers.
//!
//! Requests are POSTed to the server endpoint; replies come back either as a
//! plain JSON body or as a text/event-stream whose first response or error
//! frame answers the request. Session ids offered by the server are echoed on
//! every subsequent request, but servers that never issue one still work.

use crate::mcp::transport::{parse_initialize_result, McpTransport, SendError};
use async_trait::async_trait;
use futures_util::StreamExt;
use rust_mcp_schema::schema_utils::{
    ClientMessage, FromMessage, MessageFromClient, NotificationFromClient, RequestFromClient,
    ServerMessage,
};
use rust_mcp_schema::{
    InitializeRequestParams, InitializeResult, RequestId, LATEST_PROTOCOL_VERSION,
};
use std::time::Duration;
use tracing::debug;

pub(crate) const MCP_JSON_CONTENT_TYPE: &str = "application/json";
pub(crate) const MCP_JSON_AND_SSE_ACCEPT: &str = "application/json, text/event-stream";
pub(crate) const MCP_PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";
pub(crate) const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

const HTTP_CONNECT_TIMEOUT_SECONDS: u64 = 10;
const HTTP_REQUEST_TIMEOUT_SECONDS: u64 = 60;
const HTTP_POOL_IDLE_TIMEOUT_SECONDS: u64 = 90;
const HTTP_POOL_MAX_IDLE_PER_HOST: usize = 8;

pub(crate) struct SseTransport {
    server_name: String,
    url: String,
    http: reqwest::Client,
    session_id: Option<String>,
    negotiated_protocol_version: Option<String>,
    next_request_id: i64,
}

impl SseTransport {
    pub(crate) fn new(name: &str, url: String) -> Result<SseTransport, String> {
        let http = build_http_client()?;
        Ok(SseTransport {
            server_name: name.to_string(),
            url,
            http,
            session_id: None,
            negotiated_protocol_version: None,
            next_request_id: 0,
        })
    }

    fn next_request_id(&mut self) -> i64 {
        let id = self.next_request_id;
        self.next_request_id += 1;
        id
    }

    fn effective_protocol_version(&self) -> String {
        match self.negotiated_protocol_version.as_deref() {
            Some(version) if !version.trim().is_empty() => version.to_string(),
            _ => LATEST_PROTOCOL_VERSION.to_string(),
        }
    }

    fn post(&self, payload: String) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .post(&self.url)
            .header("Content-Type", MCP_JSON_CONTENT_TYPE)
            .header("Accept", MCP_JSON_AND_SSE_ACCEPT)
            .header(MCP_PROTOCOL_VERSION_HEADER, self.effective_protocol_version())
            .body(payload);
        if let Some(session_id) = self.session_id.as_ref() {
            request = request.header(MCP_SESSION_ID_HEADER, session_id);
        }
        request
    }

    async fn post_message(
        &mut self,
        message: &ClientMessage,
        timeout: Duration,
    ) -> Result<ServerMessage, SendError> {
        let payload =
            serde_json::to_string(message).map_err(|err| SendError::Failed(err.to_string()))?;
        debug!(server = %self.server_name, url = %self.url, "Sending MCP HTTP request");

        let millis = timeout.as_millis() as u64;
        let response = self
            .post(payload)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| classify_reqwest_error(err, millis))?;

        if !response.status().is_success() {
            return Err(SendError::Failed(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(session_id) = header_value(&response, MCP_SESSION_ID_HEADER) {
            self.session_id = Some(session_id);
        }
        let content_type = header_value(&response, "content-type").unwrap_or_default();

        if is_event_stream_content_type(&content_type) {
            first_message_in_stream(response, &self.server_name, millis).await
        } else {
            let body = response
                .bytes()
                .await
                .map_err(|err| classify_reqwest_error(err, millis))?;
            serde_json::from_slice::<ServerMessage>(&body)
                .map_err(|err| SendError::Failed(err.to_string()))
        }
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
        let payload = serde_json::to_string(&message).map_err(|err| err.to_string())?;

        let response = self.post(payload).send().await.map_err(|err| err.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP error: {}", response.status()));
        }
        if let Some(session_id) = header_value(&response, MCP_SESSION_ID_HEADER) {
            self.session_id = Some(session_id);
        }
        Ok(())
    }
}

#[async_trait]
impl McpTransport for SseTransport {
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
        self.negotiated_protocol_version = Some(result.protocol_version.clone());
        if self.session_id.is_none() {
            debug!(server = %self.server_name, "MCP server did not issue a session id");
        }
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
        let message = ClientMessage::from_message(
            MessageFromClient::RequestFromClient(request),
            Some(RequestId::Integer(request_id)),
        )
        .map_err(|err| SendError::Failed(err.to_string()))?;
        self.post_message(&message, timeout).await
    }

    async fn close(&mut self) {
        self.session_id = None;
    }
}

fn build_http_client() -> Result<reqwest::Client, String> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECONDS))
        .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECONDS))
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECONDS))
        .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE_PER_HOST)
        .build()
        .map_err(|err| err.to_string())
}

fn classify_reqwest_error(err: reqwest::Error, millis: u64) -> SendError {
    if err.is_timeout() {
        SendError::TimedOut { millis }
    } else {
        SendError::Failed(err.to_string())
    }
}

fn header_value(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

pub(crate) fn is_event_stream_content_type(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .map(str::trim)
        .is_some_and(|value| value.eq_ignore_ascii_case("text/event-stream"))
}

fn event_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

fn decode_event_line(line: &str) -> Result<Option<ServerMessage>, String> {
    let Some(payload) = event_data_payload(line) else {
        return Ok(None);
    };
    if payload.is_empty() {
        return Ok(None);
    }
    serde_json::from_str::<ServerMessage>(payload)
        .map(Some)
        .map_err(|err| err.to_string())
}

/// Reads the stream until the first response or error frame. Requests and
/// notifications pushed by the server are not part of this crate's surface
/// and are skipped.
async fn first_message_in_stream(
    response: reqwest::Response,
    server_name: &str,
    millis: u64,
) -> Result<ServerMessage, SendError> {
    let mut stream = response.bytes_stream();
    let mut buffer = EventStreamLines::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| classify_reqwest_error(err, millis))?;
        for line in buffer.push(&chunk) {
            if let Some(message) = decode_event_line(&line).map_err(SendError::Failed)? {
                if is_reply(&message) {
                    return Ok(message);
                }
                debug!(server = %server_name, "Skipping MCP event-stream frame");
            }
        }
    }

    for line in buffer.finish() {
        if let Some(message) = decode_event_line(&line).map_err(SendError::Failed)? {
            if is_reply(&message) {
                return Ok(message);
            }
            debug!(server = %server_name, "Skipping MCP event-stream frame");
        }
    }

    Err(SendError::Failed("Empty event-stream response.".to_string()))
}

fn is_reply(message: &ServerMessage) -> bool {
    matches!(
        message,
        ServerMessage::Response(_) | ServerMessage::Error(_)
    )
}

/// Reassembles complete lines from chunked event-stream bytes, holding any
/// trailing partial line until the next chunk arrives.
#[derive(Default)]
struct EventStreamLines {
    partial: Vec<u8>,
}

impl EventStreamLines {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.partial.drain(..=pos).collect();
            let mut end = raw.len() - 1;
            if end > 0 && raw[end - 1] == b'\r' {
                end -= 1;
            }
            if let Ok(text) = std::str::from_utf8(&raw[..end]) {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    lines.push(trimmed.to_string());
                }
            }
        }
        lines
    }

    fn finish(&mut self) -> Vec<String> {
        let raw = std::mem::take(&mut self.partial);
        let mut lines = Vec::new();
        if let Ok(text) = std::str::from_utf8(&raw) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_buffer_handles_chunk_boundaries() {
        let mut buffer = EventStreamLines::default();
        assert_eq!(buffer.push(b"data: one\n\n"), vec!["data: one"]);
        assert_eq!(buffer.push(b"data: t"), Vec::<String>::new());
        assert_eq!(buffer.push(b"wo\r\n"), vec!["data: two"]);
        assert_eq!(buffer.finish(), Vec::<String>::new());
    }

    #[test]
    fn event_buffer_flushes_trailing_partial_line() {
        let mut buffer = EventStreamLines::default();
        assert!(buffer.push(b"data: tail").is_empty());
        assert_eq!(buffer.finish(), vec!["data: tail"]);
    }

    #[test]
    fn detects_event_stream_content_type() {
        assert!(is_event_stream_content_type(
            "text/event-stream; charset=utf-8"
        ));
        assert!(is_event_stream_content_type("TEXT/EVENT-STREAM"));
        assert!(!is_event_stream_content_type("application/json"));
    }

    #[test]
    fn extracts_event_data_payload() {
        assert_eq!(event_data_payload("data: {\"id\":1}"), Some("{\"id\":1}"));
        assert_eq!(event_data_payload("event: ping"), None);
    }

    #[test]
    fn protocol_version_falls_back_until_negotiated() {
        let mut transport =
            SseTransport::new("alpha", "https://example.com/mcp".to_string()).expect("transport");
        assert_eq!(
            transport.effective_protocol_version(),
            LATEST_PROTOCOL_VERSION
        );

        transport.negotiated_protocol_version = Some("2025-03-26".to_string());
        assert_eq!(transport.effective_protocol_version(), "2025-03-26");
    }
}
