//! Service configuration
//!
//! Read once at startup from the user configuration directory. Unknown keys
//! are ignored; validation failures are fatal. `${env:NAME}` placeholders are
//! resolved against the process environment, but only for provider key
//! fields, and only the active provider's key is required to resolve.

use crate::error::{AppError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Well-known control-socket path.
pub const CONTROL_SOCKET_PATH: &str = "/tmp/voicetyped.sock";

/// Well-known overlay-socket path, distinct from the control socket.
pub const OVERLAY_SOCKET_PATH: &str = "/tmp/voicetyped-overlay.sock";

/// Fallback transcription model when neither the request nor the provider
/// entry names one.
pub const DEFAULT_MODEL: &str = "whisper-1";

/// Operating mode for a session started via `toggle`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Batch,
    Streaming,
}

/// Destination for streaming partials.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamOutput {
    /// Type stable prefixes directly into the focused application.
    Direct,
    /// Forward updates to the preview overlay; type only on confirm.
    Overlay,
}

/// One transcription provider entry under `[api.providers.<name>]`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProviderConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    #[serde(default = "default_bit_depth")]
    pub bit_depth: u16,
    #[serde(default = "default_frames_per_block")]
    pub frames_per_block: usize,
    #[serde(default = "default_max_duration_minutes")]
    pub max_duration_minutes: f64,
}

fn default_sample_rate() -> u32 {
    16_000
}
fn default_channels() -> u16 {
    1
}
fn default_bit_depth() -> u16 {
    16
}
fn default_frames_per_block() -> usize {
    1024
}
fn default_max_duration_minutes() -> f64 {
    5.0
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            bit_depth: default_bit_depth(),
            frames_per_block: default_frames_per_block(),
            max_duration_minutes: default_max_duration_minutes(),
        }
    }
}

impl AudioConfig {
    pub fn max_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.max_duration_minutes * 60.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamingConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_chunk_frames")]
    pub chunk_frames: usize,
    #[serde(default = "default_stream_output")]
    pub output: StreamOutput,
}

fn default_chunk_frames() -> usize {
    4
}
fn default_stream_output() -> StreamOutput {
    StreamOutput::Direct
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            chunk_frames: default_chunk_frames(),
            output: default_stream_output(),
        }
    }
}

/// Top-level configuration value consumed by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default)]
    pub streaming: StreamingConfig,
}

fn default_mode() -> Mode {
    Mode::Batch
}

impl Config {
    /// Load and validate the configuration file at the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&default_config_path()?)
    }

    /// Load and validate a configuration file at an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigInvalid(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&raw)
    }

    /// Parse, resolve `${env:NAME}` placeholders, and validate.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(raw)
            .map_err(|e| AppError::ConfigInvalid(format!("parse error: {}", e)))?;
        config.resolve_env()?;
        config.validate()?;
        Ok(config)
    }

    /// The provider entry named by `api.active_provider`.
    pub fn active_provider(&self) -> Result<&ProviderConfig> {
        self.api
            .providers
            .get(&self.api.active_provider)
            .ok_or_else(|| {
                AppError::ProviderMisconfigured(format!(
                    "active provider '{}' not defined",
                    self.api.active_provider
                ))
            })
    }

    /// Substitute `${env:NAME}` in provider key fields. A placeholder that
    /// names a missing variable is fatal only for the active provider.
    fn resolve_env(&mut self) -> Result<()> {
        let active = self.api.active_provider.clone();
        for (name, provider) in self.api.providers.iter_mut() {
            match resolve_env_placeholders(&provider.key) {
                Ok(resolved) => provider.key = resolved,
                Err(missing) => {
                    if *name == active {
                        return Err(AppError::ConfigInvalid(format!(
                            "provider '{}': environment variable '{}' is not set",
                            name, missing
                        )));
                    }
                    log::warn!(
                        "provider '{}': environment variable '{}' is not set; \
                         provider is unusable until it is",
                        name,
                        missing
                    );
                    provider.key = String::new();
                }
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.api.timeout_seconds == 0 {
            return Err(AppError::ConfigInvalid(
                "api.timeout_seconds must be positive".to_string(),
            ));
        }
        let audio = &self.audio;
        if audio.sample_rate == 0
            || audio.channels == 0
            || audio.bit_depth == 0
            || audio.frames_per_block == 0
        {
            return Err(AppError::ConfigInvalid(
                "audio parameters must all be positive".to_string(),
            ));
        }
        if audio.max_duration_minutes <= 0.0 {
            return Err(AppError::ConfigInvalid(
                "audio.max_duration_minutes must be positive".to_string(),
            ));
        }
        // Streaming options only matter when the mode can reach them.
        if self.mode == Mode::Streaming {
            if self.streaming.endpoint.is_empty() {
                return Err(AppError::ConfigInvalid(
                    "streaming.endpoint is required in streaming mode".to_string(),
                ));
            }
            if !(1..=20).contains(&self.streaming.chunk_frames) {
                return Err(AppError::ConfigInvalid(
                    "streaming.chunk_frames must be between 1 and 20".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Replace every `${env:NAME}` in `value`, or return the first missing
/// variable name.
fn resolve_env_placeholders(value: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${env:") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 6..];
        let Some(end) = tail.find('}') else {
            // Unterminated placeholder is kept literally.
            out.push_str(&rest[start..]);
            return Ok(out);
        };
        let name = &tail[..end];
        match std::env::var(name) {
            Ok(v) => out.push_str(&v),
            Err(_) => return Err(name.to_string()),
        }
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// `$XDG_CONFIG_HOME/voicetyped/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| AppError::ConfigInvalid("no user config directory".to_string()))?;
    Ok(base.join("voicetyped").join("config.toml"))
}

/// `$XDG_DATA_HOME/voicetyped` — transcript store and recordings live here.
pub fn data_dir() -> Result<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| AppError::ConfigInvalid("no user data directory".to_string()))?;
    Ok(base.join("voicetyped"))
}

/// `$XDG_STATE_HOME/voicetyped` — the log file lives here.
pub fn state_dir() -> Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .ok_or_else(|| AppError::ConfigInvalid("no user state directory".to_string()))?;
    Ok(base.join("voicetyped"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_toml() -> String {
        r#"
            [api]
            active_provider = "openai"
            timeout_seconds = 30

            [api.providers.openai]
            endpoint = "https://api.openai.com"
            key = "sk-test"
            model = "whisper-1"
        "#
        .to_string()
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::parse(&base_toml()).unwrap();
        assert_eq!(config.api.active_provider, "openai");
        assert_eq!(config.mode, Mode::Batch);
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.audio.frames_per_block, 1024);
        assert_eq!(config.active_provider().unwrap().key, "sk-test");
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let toml = format!("{}\nfuture_option = true\n", base_toml());
        assert!(Config::parse(&toml).is_ok());
    }

    #[test]
    fn test_env_placeholder_resolved() {
        std::env::set_var("VOICETYPED_TEST_KEY", "resolved-secret");
        let toml = base_toml().replace("sk-test", "${env:VOICETYPED_TEST_KEY}");
        let config = Config::parse(&toml).unwrap();
        assert_eq!(config.active_provider().unwrap().key, "resolved-secret");
    }

    #[test]
    fn test_missing_env_for_active_provider_is_fatal() {
        std::env::remove_var("VOICETYPED_TEST_MISSING");
        let toml = base_toml().replace("sk-test", "${env:VOICETYPED_TEST_MISSING}");
        let err = Config::parse(&toml).unwrap_err();
        assert!(matches!(err, AppError::ConfigInvalid(_)));
    }

    #[test]
    fn test_missing_env_for_inactive_provider_is_tolerated() {
        std::env::remove_var("VOICETYPED_TEST_MISSING");
        let toml = format!(
            "{}\n[api.providers.spare]\nendpoint = \"https://spare\"\nkey = \"${{env:VOICETYPED_TEST_MISSING}}\"\n",
            base_toml()
        );
        let config = Config::parse(&toml).unwrap();
        assert_eq!(config.api.providers["spare"].key, "");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let toml = base_toml().replace("timeout_seconds = 30", "timeout_seconds = 0");
        assert!(Config::parse(&toml).is_err());
    }

    #[test]
    fn test_streaming_validation_only_in_streaming_mode() {
        // chunk_frames out of range is fine while mode = batch...
        let toml = format!("{}\n[streaming]\nchunk_frames = 50\n", base_toml());
        assert!(Config::parse(&toml).is_ok());

        // ...and rejected once streaming mode is selected.
        let toml = format!(
            "{}\nmode = \"streaming\"\n[streaming]\nendpoint = \"wss://x\"\nchunk_frames = 50\n",
            base_toml()
        );
        assert!(Config::parse(&toml).is_err());
    }

    #[test]
    fn test_streaming_mode_requires_endpoint() {
        let toml = format!("{}\nmode = \"streaming\"\n", base_toml());
        assert!(Config::parse(&toml).is_err());
    }

    #[test]
    fn test_fractional_max_duration() {
        let toml = format!(
            "{}\n[audio]\nmax_duration_minutes = 0.0166\n",
            base_toml()
        );
        let config = Config::parse(&toml).unwrap();
        let max = config.audio.max_duration();
        assert!(max.as_millis() > 900 && max.as_millis() < 1100);
    }
}
