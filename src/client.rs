//! Thin control-socket client
//!
//! Opens the socket, sends one request, reads one response, closes. Exit
//! codes: 0 on success, 1 when the service is unreachable or the response
//! carries `success:false`.

use crate::adapters::emitter::detect_clipboard;
use crate::adapters::storage::SqliteTranscriptStore;
use crate::config::{self, CONTROL_SOCKET_PATH};
use crate::error::{AppError, Result};
use crate::ports::emitter::TextEmitterPort;
use crate::ports::storage::TranscriptStorePort;
use crate::service::protocol::{Request, Response};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Control-socket caller
pub struct Client {
    path: PathBuf,
}

impl Client {
    pub fn new() -> Self {
        Self {
            path: PathBuf::from(CONTROL_SOCKET_PATH),
        }
    }

    /// Whether the service answers on the socket at all.
    pub async fn is_connected(&self) -> bool {
        matches!(
            tokio::time::timeout(PROBE_TIMEOUT, UnixStream::connect(&self.path)).await,
            Ok(Ok(_))
        )
    }

    /// One request/response exchange.
    pub async fn send(&self, action: &str, args: Option<Vec<String>>) -> Result<Response> {
        let request = Request {
            id: uuid::Uuid::new_v4().to_string(),
            action: action.to_string(),
            args,
            timestamp: chrono::Utc::now().timestamp(),
        };

        let exchange = async {
            let mut stream = UnixStream::connect(&self.path)
                .await
                .map_err(|e| AppError::Other(format!("service not reachable: {}", e)))?;
            stream.write_all(&serde_json::to_vec(&request)?).await?;

            let mut buffer = vec![0u8; 64 * 1024];
            let n = stream.read(&mut buffer).await?;
            let response: Response = serde_json::from_slice(&buffer[..n])?;
            Ok::<Response, AppError>(response)
        };

        let response = tokio::time::timeout(COMMAND_TIMEOUT, exchange)
            .await
            .map_err(|_| AppError::Other("request timed out".to_string()))??;

        if response.id != request.id {
            return Err(AppError::Protocol(format!(
                "response id '{}' does not echo request id '{}'",
                response.id, request.id
            )));
        }
        Ok(response)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// Send one action and print a human-readable result.
pub async fn run_action(action: &str) -> i32 {
    let client = Client::new();
    match client.send(action, None).await {
        Ok(response) if response.success => {
            print_response(action, &response);
            0
        }
        Ok(response) => {
            eprintln!(
                "voicetyped: {}",
                response.error.as_deref().unwrap_or("request failed")
            );
            1
        }
        Err(e) => {
            if client.is_connected().await {
                eprintln!("voicetyped: {}", e);
            } else {
                eprintln!("voicetyped: service is not running (start it with `voicetyped daemon`)");
            }
            1
        }
    }
}

fn print_response(action: &str, response: &Response) {
    let Some(data) = &response.data else {
        println!("ok");
        return;
    };
    if action == "status" {
        if let Some(state) = data.get("state") {
            println!("state: {}", state);
        }
        if let Some(uptime) = data.get("uptime") {
            println!("uptime: {}s", uptime);
        }
        if let Some(duration) = data.get("recording_duration") {
            println!("recording: {}s", duration);
        }
        if let Some(error) = data.get("last_error") {
            println!("last error: {}", error);
        }
    } else if let Some(state) = data.get("state") {
        println!("{}", state);
    }
}

fn open_store() -> Result<SqliteTranscriptStore> {
    let db_path = config::data_dir()?.join("transcripts.db");
    if !db_path.exists() {
        return Err(AppError::Other("no transcripts recorded yet".to_string()));
    }
    SqliteTranscriptStore::open_read_only(db_path)
}

/// `transcript list` — all records as a JSON array.
pub async fn transcript_list() -> i32 {
    let result = async {
        let store = open_store()?;
        let records = store.list(None).await?;
        Ok::<String, AppError>(serde_json::to_string_pretty(&records)?)
    }
    .await;
    match result {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("voicetyped: {}", e);
            1
        }
    }
}

/// `transcript last [--clip]` — print or copy the newest transcript.
pub async fn transcript_last(clip: bool) -> i32 {
    let result = async {
        let store = open_store()?;
        store
            .get_last()
            .await?
            .ok_or_else(|| AppError::Other("no transcripts recorded yet".to_string()))
    }
    .await;
    let record = match result {
        Ok(record) => record,
        Err(e) => {
            eprintln!("voicetyped: {}", e);
            return 1;
        }
    };

    if clip {
        let clipboard = match detect_clipboard() {
            Ok(clipboard) => clipboard,
            Err(e) => {
                eprintln!("voicetyped: {}", e);
                return 1;
            }
        };
        let cancel = CancellationToken::new();
        if let Err(e) = clipboard.emit_full(&cancel, &record.text).await {
            eprintln!("voicetyped: {}", e);
            return 1;
        }
        eprintln!("copied to clipboard");
    } else {
        println!("{}", record.text);
    }
    0
}
