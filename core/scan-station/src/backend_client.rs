//! Client for the check-in backend over its Unix socket.
//!
//! One connection per request: write a single JSON line, read a single JSON
//! line back. Timeouts are applied by the request stages in checkin-core, not
//! here.

use checkin_core::{
    BackendConfig, BackendError, CheckinBackend, CheckinError, CheckinReceipt, ScanCode,
    ValidationResult,
};
use checkin_protocol::{
    CheckinParams, Method, Request, Response, ResponseError, ValidateParams, MAX_MESSAGE_BYTES,
    PROTOCOL_VERSION,
};
use chrono::Utc;
use rand::RngCore;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

pub const SOCKET_ENV: &str = "SCAN_STATION_SOCKET";
const CONNECT_RETRY_DELAY_MS: u64 = 50;

/// Resolution order: explicit flag, `SCAN_STATION_SOCKET`, config file,
/// `~/.scan-station/backend.sock`.
pub fn resolve_socket_path(
    flag: Option<PathBuf>,
    config: &BackendConfig,
) -> Result<PathBuf, CheckinError> {
    resolve_socket_path_with(flag, env::var(SOCKET_ENV).ok(), config)
}

fn resolve_socket_path_with(
    flag: Option<PathBuf>,
    env_value: Option<String>,
    config: &BackendConfig,
) -> Result<PathBuf, CheckinError> {
    if let Some(path) = flag {
        return Ok(path);
    }
    if let Some(value) = env_value.filter(|value| !value.trim().is_empty()) {
        return Ok(PathBuf::from(value));
    }
    if let Some(path) = &config.socket_path {
        return Ok(path.clone());
    }
    checkin_core::default_socket_path()
}

#[derive(Debug, Clone)]
pub struct SocketBackend {
    socket_path: PathBuf,
}

impl SocketBackend {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// True when the backend answers `get_health` with `status: "ok"`.
    pub async fn health(&self) -> Result<bool, BackendError> {
        let response = self.call(Method::GetHealth, None).await?;
        if !response.ok {
            return Ok(false);
        }
        let status = response
            .data
            .as_ref()
            .and_then(|data| data.get("status"))
            .and_then(|value| value.as_str());
        Ok(matches!(status, Some("ok")))
    }

    async fn call(
        &self,
        method: Method,
        params: Option<serde_json::Value>,
    ) -> Result<Response, BackendError> {
        let id = make_request_id(method);
        let request = Request {
            protocol_version: PROTOCOL_VERSION,
            method,
            id: Some(id.clone()),
            params,
        };
        let mut payload = serde_json::to_vec(&request)
            .map_err(|err| BackendError::Malformed(format!("Failed to serialize request: {}", err)))?;
        payload.push(b'\n');

        let mut stream = self.connect_with_retry().await?;
        tracing::debug!(method = ?method, id = %id, "Backend request sent");
        stream
            .write_all(&payload)
            .await
            .map_err(|err| BackendError::Transport(format!("Failed to write request: {}", err)))?;
        stream.flush().await.ok();

        let response = read_response(stream).await?;
        if let Some(response_id) = &response.id {
            if response_id != &id {
                return Err(BackendError::Malformed(format!(
                    "Response id {} does not match request id {}",
                    response_id, id
                )));
            }
        }
        Ok(response)
    }

    /// Connection failures mean nothing was sent, so one retry is safe for
    /// every method.
    async fn connect_with_retry(&self) -> Result<UnixStream, BackendError> {
        match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => Ok(stream),
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    socket = %self.socket_path.display(),
                    "Failed to connect to backend; retrying"
                );
                tokio::time::sleep(Duration::from_millis(CONNECT_RETRY_DELAY_MS)).await;
                UnixStream::connect(&self.socket_path).await.map_err(|retry_err| {
                    BackendError::Transport(format!(
                        "Failed to connect to backend socket: {}",
                        retry_err
                    ))
                })
            }
        }
    }
}

impl CheckinBackend for SocketBackend {
    async fn validate(&self, code: &ScanCode) -> Result<Option<ValidationResult>, BackendError> {
        let params = ValidateParams {
            code: code.as_str().to_string(),
        };
        let response = self
            .call(Method::ValidateTicket, Some(to_params(&params)?))
            .await?;
        response.into_data().map_err(map_response_error)
    }

    async fn check_in(&self, ticket_id: &str) -> Result<CheckinReceipt, BackendError> {
        let params = CheckinParams {
            ticket_id: ticket_id.to_string(),
        };
        let response = self
            .call(Method::CheckinTicket, Some(to_params(&params)?))
            .await?;
        response
            .into_data::<CheckinReceipt>()
            .map_err(map_response_error)?
            .ok_or_else(|| BackendError::Malformed("checkin_ticket returned no receipt".to_string()))
    }
}

fn to_params<T: serde::Serialize>(params: &T) -> Result<serde_json::Value, BackendError> {
    serde_json::to_value(params)
        .map_err(|err| BackendError::Malformed(format!("Failed to serialize params: {}", err)))
}

fn map_response_error(err: ResponseError) -> BackendError {
    match err {
        ResponseError::Remote(info) => match info.rejection() {
            Some(rejection) => BackendError::Rejected(rejection),
            None => BackendError::Remote {
                code: info.code,
                message: info.message,
            },
        },
        ResponseError::Malformed(details) => BackendError::Malformed(details),
    }
}

async fn read_response(stream: UnixStream) -> Result<Response, BackendError> {
    let mut reader = BufReader::new(stream.take(MAX_MESSAGE_BYTES as u64 + 1));
    let mut buffer = Vec::new();
    reader
        .read_until(b'\n', &mut buffer)
        .await
        .map_err(|err| BackendError::Transport(format!("Failed to read response: {}", err)))?;

    if buffer.len() > MAX_MESSAGE_BYTES {
        return Err(BackendError::Malformed(
            "Response exceeded maximum size".to_string(),
        ));
    }
    if buffer.last() == Some(&b'\n') {
        buffer.pop();
    }
    if buffer.is_empty() {
        return Err(BackendError::Transport(
            "Backend closed the connection without a response".to_string(),
        ));
    }

    serde_json::from_slice(&buffer)
        .map_err(|err| BackendError::Malformed(format!("Failed to parse response JSON: {}", err)))
}

fn make_request_id(method: Method) -> String {
    let rand = rand::thread_rng().next_u64();
    let label = match method {
        Method::GetHealth => "health",
        Method::ValidateTicket => "validate",
        Method::CheckinTicket => "checkin",
    };
    format!("{}-{}-{:x}", label, Utc::now().timestamp_millis(), rand)
}
