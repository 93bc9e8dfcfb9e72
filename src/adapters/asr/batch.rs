//! Batch transcription over an OpenAI-compatible endpoint
//!
//! Uploads the complete clip as one multipart request. Transport-level
//! failures (connect, TLS, timeout) get exactly one silent retry after a
//! one-second delay; a response actually received from the server is never
//! retried.

use crate::config::{ApiConfig, DEFAULT_MODEL};
use crate::error::{AppError, Result};
use crate::ports::transcription::BatchTranscriberPort;
use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const RETRY_DELAY: Duration = Duration::from_secs(1);
const BODY_SNIPPET_LEN: usize = 200;

/// HTTP batch transcriber for the active provider
#[derive(Debug)]
pub struct HttpBatchTranscriber {
    client: reqwest::Client,
    endpoint: String,
    key: String,
    default_model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl HttpBatchTranscriber {
    /// Build from the API section of the configuration.
    ///
    /// Fails with `ProviderMisconfigured` when the active provider entry is
    /// missing or its key is empty.
    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        let provider = api.providers.get(&api.active_provider).ok_or_else(|| {
            AppError::ProviderMisconfigured(format!(
                "active provider '{}' not defined",
                api.active_provider
            ))
        })?;
        if provider.key.is_empty() {
            return Err(AppError::ProviderMisconfigured(format!(
                "provider '{}' has no API key",
                api.active_provider
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_seconds))
            .build()
            .map_err(|e| AppError::ProviderTransport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: normalize_endpoint(&provider.endpoint),
            key: provider.key.clone(),
            default_model: provider.model.clone(),
        })
    }

    fn resolve_model(&self, model: Option<&str>) -> String {
        model
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .or_else(|| self.default_model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    async fn attempt(
        &self,
        audio: &[u8],
        filename: &str,
        model: &str,
        language: Option<&str>,
    ) -> Result<String> {
        let part = multipart::Part::bytes(audio.to_vec())
            .file_name(filename.to_string())
            .mime_str("audio/wav")
            .map_err(|e| AppError::ProviderTransport(format!("multipart: {}", e)))?;
        let mut form = multipart::Form::new()
            .part("file", part)
            .text("model", model.to_string());
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::ProviderTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ProviderError {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| AppError::ProviderTransport(format!("response decode: {}", e)))?;
        Ok(parsed.text)
    }
}

#[async_trait]
impl BatchTranscriberPort for HttpBatchTranscriber {
    async fn transcribe(
        &self,
        cancel: &CancellationToken,
        audio: Vec<u8>,
        filename: &str,
        model: Option<&str>,
        language: Option<&str>,
    ) -> Result<String> {
        let model = self.resolve_model(model);
        log::info!(
            "Uploading {} bytes to {} (model {})",
            audio.len(),
            self.endpoint,
            model
        );

        let first = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            result = self.attempt(&audio, filename, &model, language) => result,
        };
        match first {
            Err(AppError::ProviderTransport(reason)) => {
                log::warn!("Transcription transport failure, retrying once: {}", reason);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(AppError::Cancelled),
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
                tokio::select! {
                    _ = cancel.cancelled() => Err(AppError::Cancelled),
                    result = self.attempt(&audio, filename, &model, language) => result,
                }
            }
            other => other,
        }
    }
}

/// Stand-in installed when the active provider cannot be constructed at
/// startup. A misconfigured provider is not fatal to the daemon; each
/// session surfaces the error instead.
pub struct MisconfiguredTranscriber {
    reason: String,
}

impl MisconfiguredTranscriber {
    pub fn new(reason: String) -> Self {
        Self { reason }
    }
}

#[async_trait]
impl BatchTranscriberPort for MisconfiguredTranscriber {
    async fn transcribe(
        &self,
        _cancel: &CancellationToken,
        _audio: Vec<u8>,
        _filename: &str,
        _model: Option<&str>,
        _language: Option<&str>,
    ) -> Result<String> {
        Err(AppError::ProviderMisconfigured(self.reason.clone()))
    }
}

/// Complete a provider endpoint up to the `/v1/audio/transcriptions` route.
fn normalize_endpoint(endpoint: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    if base.ends_with("/v1/audio/transcriptions") {
        base.to_string()
    } else if base.ends_with("/v1/audio") {
        format!("{}/transcriptions", base)
    } else if base.ends_with("/v1") {
        format!("{}/audio/transcriptions", base)
    } else {
        format!("{}/v1/audio/transcriptions", base)
    }
}

fn snippet(body: &str) -> String {
    if body.len() <= BODY_SNIPPET_LEN {
        body.to_string()
    } else {
        let mut end = BODY_SNIPPET_LEN;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use std::collections::HashMap;

    #[test]
    fn test_normalize_endpoint_suffixes() {
        assert_eq!(
            normalize_endpoint("https://api.example.com"),
            "https://api.example.com/v1/audio/transcriptions"
        );
        assert_eq!(
            normalize_endpoint("https://api.example.com/v1"),
            "https://api.example.com/v1/audio/transcriptions"
        );
        assert_eq!(
            normalize_endpoint("https://api.example.com/v1/audio"),
            "https://api.example.com/v1/audio/transcriptions"
        );
        assert_eq!(
            normalize_endpoint("https://api.example.com/v1/audio/transcriptions"),
            "https://api.example.com/v1/audio/transcriptions"
        );
        // Trailing slash is not a distinct case.
        assert_eq!(
            normalize_endpoint("https://api.example.com/v1/"),
            "https://api.example.com/v1/audio/transcriptions"
        );
    }

    fn api_config(key: &str) -> ApiConfig {
        let mut providers = HashMap::new();
        providers.insert(
            "test".to_string(),
            ProviderConfig {
                endpoint: "https://api.example.com".to_string(),
                key: key.to_string(),
                model: Some("whisper-large".to_string()),
            },
        );
        ApiConfig {
            active_provider: "test".to_string(),
            providers,
            timeout_seconds: 5,
        }
    }

    #[test]
    fn test_empty_key_is_misconfigured() {
        let err = HttpBatchTranscriber::from_config(&api_config("")).unwrap_err();
        assert!(matches!(err, AppError::ProviderMisconfigured(_)));
    }

    #[test]
    fn test_missing_provider_is_misconfigured() {
        let mut api = api_config("k");
        api.active_provider = "absent".to_string();
        let err = HttpBatchTranscriber::from_config(&api).unwrap_err();
        assert!(matches!(err, AppError::ProviderMisconfigured(_)));
    }

    #[test]
    fn test_model_fallback_chain() {
        let transcriber = HttpBatchTranscriber::from_config(&api_config("k")).unwrap();
        assert_eq!(transcriber.resolve_model(Some("given")), "given");
        assert_eq!(transcriber.resolve_model(Some("")), "whisper-large");
        assert_eq!(transcriber.resolve_model(None), "whisper-large");

        let mut api = api_config("k");
        api.providers.get_mut("test").unwrap().model = None;
        let transcriber = HttpBatchTranscriber::from_config(&api).unwrap();
        assert_eq!(transcriber.resolve_model(None), DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn test_transport_failure_retried_once_then_surfaced() {
        let mut api = api_config("k");
        // Nothing listens on port 1; both attempts are refused.
        api.providers.get_mut("test").unwrap().endpoint = "http://127.0.0.1:1".to_string();
        let transcriber = HttpBatchTranscriber::from_config(&api).unwrap();
        let cancel = CancellationToken::new();

        let started = std::time::Instant::now();
        let err = transcriber
            .transcribe(&cancel, vec![0u8; 4], "a.wav", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ProviderTransport(_)));
        // The single silent retry inserts its one-second delay.
        assert!(started.elapsed() >= RETRY_DELAY);
    }

    #[tokio::test]
    async fn test_cancelled_before_upload() {
        let transcriber = HttpBatchTranscriber::from_config(&api_config("k")).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = transcriber
            .transcribe(&cancel, vec![0u8; 4], "a.wav", None, None)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_snippet_truncates_long_bodies() {
        let long = "x".repeat(500);
        let cut = snippet(&long);
        assert!(cut.chars().count() <= BODY_SNIPPET_LEN + 1);
        assert!(cut.ends_with('…'));
        assert_eq!(snippet("short"), "short");
    }
}
