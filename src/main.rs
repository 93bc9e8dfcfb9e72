//! voicetyped — background voice-typing service for the Linux desktop
//!
//! One executable, two roles: `voicetyped daemon` runs the long-lived
//! service; every other subcommand is a thin client that sends one request
//! over the control socket and prints the answer.

mod adapters;
mod client;
mod config;
mod domain;
mod error;
mod logging;
mod ports;
mod service;
mod utils;

use adapters::asr::{HttpBatchTranscriber, MisconfiguredTranscriber, WsStreamingTranscriber};
use adapters::audio::PulseAudioSource;
use adapters::emitter::{detect_backend, UnavailableEmitter};
use adapters::notify::DesktopNotifier;
use adapters::overlay::OverlayServer;
use adapters::storage::SqliteTranscriptStore;
use clap::{Parser, Subcommand};
use config::{Config, Mode, StreamOutput, CONTROL_SOCKET_PATH, OVERLAY_SOCKET_PATH};
use ports::emitter::TextEmitterPort;
use service::control::ControlServer;
use service::orchestrator::{Components, Orchestrator};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "voicetyped", version, about = "Voice typing for the Linux desktop")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the background service
    Daemon,
    /// Start recording
    Start,
    /// Stop recording and transcribe
    Stop,
    /// Start or stop, depending on the current state and mode
    Toggle,
    /// Cancel any in-flight session
    Cancel,
    /// Start a live streaming session
    Stream,
    /// Show service state
    Status,
    /// Inspect stored transcripts
    Transcript {
        #[command(subcommand)]
        command: TranscriptCommand,
    },
}

#[derive(Subcommand)]
enum TranscriptCommand {
    /// Print all records as a JSON array
    List,
    /// Print the most recent transcript
    Last {
        /// Copy to the clipboard instead of printing
        #[arg(long)]
        clip: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Command::Daemon => run_daemon().await,
        Command::Start => run_client("start").await,
        Command::Stop => run_client("stop").await,
        Command::Toggle => run_client("toggle").await,
        Command::Cancel => run_client("cancel").await,
        Command::Stream => run_client("stream").await,
        Command::Status => run_client("status").await,
        Command::Transcript { command } => {
            logging::init_client_logging();
            match command {
                TranscriptCommand::List => client::transcript_list().await,
                TranscriptCommand::Last { clip } => client::transcript_last(clip).await,
            }
        }
    };
    std::process::exit(code);
}

async fn run_client(action: &str) -> i32 {
    logging::init_client_logging();
    client::run_action(action).await
}

/// Composition root: construct every collaborator, run until a signal.
async fn run_daemon() -> i32 {
    if let Err(e) = logging::init_daemon_logging() {
        eprintln!("voicetyped: cannot set up logging: {}", e);
        return 1;
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return 1;
        }
    };
    let data_dir = match config::data_dir() {
        Ok(dir) => dir,
        Err(e) => {
            log::error!("{}", e);
            return 1;
        }
    };

    let store = match SqliteTranscriptStore::open(data_dir.join("transcripts.db")) {
        Ok(store) => store,
        Err(e) => {
            log::error!("Cannot open transcript store: {}", e);
            return 1;
        }
    };

    // A misconfigured provider or missing emitter backend is surfaced per
    // session, not at startup; only config/socket problems are fatal.
    let batch: Arc<dyn ports::BatchTranscriberPort> =
        match HttpBatchTranscriber::from_config(&config.api) {
            Ok(transcriber) => Arc::new(transcriber),
            Err(e) => {
                log::warn!("Batch transcriber unavailable: {}", e);
                Arc::new(MisconfiguredTranscriber::new(e.to_string()))
            }
        };

    let streaming: Option<Arc<dyn ports::StreamingTranscriberPort>> =
        if config.mode == Mode::Streaming {
            let key = config
                .active_provider()
                .map(|p| p.key.clone())
                .unwrap_or_default();
            Some(Arc::new(WsStreamingTranscriber::new(&config.streaming, key)))
        } else {
            None
        };

    let emitter: Arc<dyn TextEmitterPort> = match detect_backend() {
        Ok(emitter) => emitter,
        Err(e) => {
            log::warn!("{}; text will not be injected", e);
            Arc::new(UnavailableEmitter)
        }
    };

    let audio = PulseAudioSource::new(config.audio.clone(), data_dir.clone());
    let notifier = DesktopNotifier::new();
    let shutdown = CancellationToken::new();

    // The overlay socket exists only when streaming output is routed there.
    let mut overlay_hub = None;
    let mut overlay_events = None;
    if config.mode == Mode::Streaming && config.streaming.output == StreamOutput::Overlay {
        match OverlayServer::bind(Path::new(OVERLAY_SOCKET_PATH)) {
            Ok((server, hub, events)) => {
                let server_shutdown = shutdown.clone();
                tokio::spawn(async move { server.run(server_shutdown).await });
                let hub: Arc<dyn ports::OverlayPort> = hub;
                overlay_hub = Some(hub);
                overlay_events = Some(events);
            }
            Err(e) => {
                log::error!("{}", e);
                return 1;
            }
        }
    }

    let mode_label = match config.mode {
        Mode::Batch => "batch",
        Mode::Streaming => "streaming",
    };
    let orchestrator = Orchestrator::new(
        config,
        Components {
            audio: Arc::new(audio),
            batch,
            streaming,
            emitter,
            notifier: Arc::new(notifier),
            store: Arc::new(store),
            overlay: overlay_hub,
        },
    );
    if let Some(events) = overlay_events {
        orchestrator.attach_overlay_events(events);
    }

    let control = match ControlServer::bind(Path::new(CONTROL_SOCKET_PATH)) {
        Ok(control) => control,
        Err(e) => {
            log::error!("{}", e);
            return 1;
        }
    };
    let control_task = {
        let orchestrator = orchestrator.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { control.run(orchestrator, shutdown).await })
    };
    log::info!("Service ready ({} mode)", mode_label);

    wait_for_signal().await;

    // Teardown in reverse construction order.
    orchestrator.shutdown().await;
    shutdown.cancel();
    let _ = control_task.await;
    log::info!("Shutdown complete");
    0
}

async fn wait_for_signal() {
    let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
    {
        Ok(signal) => signal,
        Err(e) => {
            log::error!("Cannot register SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => log::info!("Received SIGTERM, shutting down"),
        _ = tokio::signal::ctrl_c() => log::info!("Received SIGINT, shutting down"),
    }
}
