//! Control socket
//!
//! Accepts short-lived connections on a local socket; each carries exactly
//! one request/response exchange under a 30-second deadline. Connections are
//! handled concurrently; the orchestrator's lock serializes transitions.

use crate::error::{AppError, Result};
use crate::service::orchestrator::Orchestrator;
use crate::service::protocol::{Request, Response};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

const CONNECTION_DEADLINE: Duration = Duration::from_secs(30);
const MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Control-plane listener
pub struct ControlServer {
    listener: UnixListener,
    path: PathBuf,
}

impl ControlServer {
    /// Bind the listener, unlinking any stale socket path first.
    pub fn bind(path: &Path) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| {
                AppError::ConfigInvalid(format!(
                    "cannot remove stale socket {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }
        let listener = UnixListener::bind(path).map_err(|e| {
            AppError::ConfigInvalid(format!("cannot bind {}: {}", path.display(), e))
        })?;
        log::info!("Control socket listening at {}", path.display());
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Accept loop; returns when `shutdown` fires. Removes the socket path
    /// on exit.
    pub async fn run(self, orchestrator: Orchestrator, shutdown: CancellationToken) {
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            match accepted {
                Ok((stream, _)) => {
                    let orchestrator = orchestrator.clone();
                    tokio::spawn(async move {
                        match tokio::time::timeout(
                            CONNECTION_DEADLINE,
                            serve_connection(stream, orchestrator),
                        )
                        .await
                        {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => log::warn!("Control connection failed: {}", e),
                            Err(_) => log::warn!("Control connection hit its deadline"),
                        }
                    });
                }
                Err(e) => {
                    log::error!("Accept failed: {}", e);
                }
            }
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::debug!("Socket path cleanup: {}", e);
        }
        log::info!("Control socket closed");
    }
}

async fn serve_connection(mut stream: UnixStream, orchestrator: Orchestrator) -> Result<()> {
    let mut buffer = vec![0u8; MAX_REQUEST_BYTES];
    let n = stream.read(&mut buffer).await?;
    if n == 0 {
        return Ok(());
    }

    let response = match serde_json::from_slice::<Request>(&buffer[..n]) {
        Ok(request) => {
            log::debug!("Request {} action={}", request.id, request.action);
            dispatch(&orchestrator, &request).await
        }
        Err(e) => {
            // No decodable id to echo; best effort.
            log::warn!("Undecodable request: {}", e);
            Response::err("", "invalid request")
        }
    };

    let encoded = serde_json::to_vec(&response)?;
    stream.write_all(&encoded).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Map one request to an orchestrator operation.
pub async fn dispatch(orchestrator: &Orchestrator, request: &Request) -> Response {
    let id = request.id.as_str();
    match request.action.as_str() {
        "start" => state_response(id, orchestrator.start().await),
        "stop" => state_response(id, orchestrator.stop().await),
        "toggle" => state_response(id, orchestrator.toggle().await),
        "stream" => state_response(id, orchestrator.stream().await),
        "cancel" => Response::state(id, orchestrator.cancel().await),
        "status" => {
            let report = orchestrator.status().await;
            let mut data = HashMap::new();
            data.insert("state".to_string(), report.state.to_string());
            data.insert("uptime".to_string(), report.uptime.as_secs().to_string());
            if let Some(duration) = report.recording_duration {
                data.insert(
                    "recording_duration".to_string(),
                    duration.as_secs().to_string(),
                );
            }
            if let Some(error) = report.last_error {
                data.insert("last_error".to_string(), error);
            }
            Response::ok(id, data)
        }
        _ => Response::err(id, "invalid command"),
    }
}

fn state_response(id: &str, result: Result<crate::domain::models::ServiceState>) -> Response {
    match result {
        Ok(state) => Response::state(id, state),
        Err(e) => Response::err(id, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, AudioConfig, Config, Mode, ProviderConfig, StreamingConfig};
    use crate::ports::mocks::{
        MockAudioSource, MockBatchTranscriber, MockEmitter, MockNotifier, MockStore,
    };
    use crate::service::orchestrator::Components;
    use std::sync::Arc;
    use std::time::Duration;

    fn orchestrator() -> Orchestrator {
        let mut providers = std::collections::HashMap::new();
        providers.insert(
            "test".to_string(),
            ProviderConfig {
                endpoint: "https://api.example.com".to_string(),
                key: "k".to_string(),
                model: None,
            },
        );
        let config = Config {
            api: ApiConfig {
                active_provider: "test".to_string(),
                providers,
                timeout_seconds: 5,
            },
            audio: AudioConfig::default(),
            mode: Mode::Batch,
            streaming: StreamingConfig::default(),
        };
        Orchestrator::new(
            config,
            Components {
                audio: Arc::new(MockAudioSource::new(vec![0.0; 160], Duration::from_millis(10))),
                batch: Arc::new(MockBatchTranscriber::returning("ok")),
                streaming: None,
                emitter: Arc::new(MockEmitter::new()),
                notifier: Arc::new(MockNotifier::new()),
                store: Arc::new(MockStore::new()),
                overlay: None,
            },
        )
    }

    fn request(id: &str, action: &str) -> Request {
        Request {
            id: id.to_string(),
            action: action.to_string(),
            args: None,
            timestamp: 1_700_000_000,
        }
    }

    #[tokio::test]
    async fn test_unknown_action_is_invalid_command() {
        let orchestrator = orchestrator();
        let response = dispatch(&orchestrator, &request("r1", "frobnicate")).await;
        assert_eq!(response.id, "r1");
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("invalid command"));
    }

    #[tokio::test]
    async fn test_every_response_echoes_the_request_id() {
        let orchestrator = orchestrator();
        for action in ["start", "stop", "toggle", "cancel", "status", "stream", "nope"] {
            let id = format!("id-{}", action);
            let response = dispatch(&orchestrator, &request(&id, action)).await;
            assert_eq!(response.id, id);
            orchestrator.cancel().await;
        }
    }

    #[tokio::test]
    async fn test_cancel_on_idle_succeeds_with_idle_state() {
        let orchestrator = orchestrator();
        let response = dispatch(&orchestrator, &request("r2", "cancel")).await;
        assert!(response.success);
        assert_eq!(response.data.unwrap()["state"], "idle");
    }

    #[tokio::test]
    async fn test_status_reports_recording_fields() {
        let orchestrator = orchestrator();
        let response = dispatch(&orchestrator, &request("r3", "status")).await;
        let data = response.data.unwrap();
        assert_eq!(data["state"], "idle");
        assert!(data.contains_key("uptime"));
        assert!(!data.contains_key("recording_duration"));

        dispatch(&orchestrator, &request("r4", "start")).await;
        let response = dispatch(&orchestrator, &request("r5", "status")).await;
        let data = response.data.unwrap();
        assert_eq!(data["state"], "recording");
        assert!(data.contains_key("recording_duration"));
    }

    #[tokio::test]
    async fn test_start_twice_reports_already_recording() {
        let orchestrator = orchestrator();
        let first = dispatch(&orchestrator, &request("a", "start")).await;
        assert!(first.success);
        assert_eq!(first.data.unwrap()["state"], "recording");

        let second = dispatch(&orchestrator, &request("b", "start")).await;
        assert!(!second.success);
        assert_eq!(second.error.as_deref(), Some("already_recording"));
    }
}
