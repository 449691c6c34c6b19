//! heychef-voiced: hands-free playback control for recipe videos
//!
//! The daemon listens continuously through an external recognizer and provides:
//! - Wake-word gating ("hey chef") with a short command window
//! - A bilingual command grammar (English, Marathi)
//! - Media actions and feedback pushed to the UI over IPC
//!
//! The UI owns the video element; it reports playback state in and applies
//! the actions it is sent.

mod clock;
mod config;
mod controller;
mod dispatch;
mod events;
mod gate;
mod grammar;
mod ipc;
mod lifecycle;
mod locale;
mod session;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::clock::SystemClock;
use crate::config::Config;
use crate::controller::{ControlInput, VoiceController};
use crate::dispatch::RemoteMedia;
use crate::events::VoiceEvent;
use crate::ipc::{Server, ServerContext};
use crate::lifecycle::ShutdownSignal;
use crate::session::CommandEngineFactory;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "heychef-voiced starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, language = %config.language, "configuration loaded");

    let mut shutdown = ShutdownSignal::new()?;

    // Engine instances -> controller
    let (engine_tx, engine_rx) = mpsc::unbounded_channel();
    // IPC clients -> controller
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    // Controller -> IPC subscribers
    let (event_tx, _event_rx) = broadcast::channel::<VoiceEvent>(64);

    let media = RemoteMedia::new(64);
    let factory = CommandEngineFactory::new(
        config.recognizer_command.as_deref(),
        config.recognizer_args.clone(),
    );

    let mut controller = VoiceController::new(
        &config,
        Box::new(factory),
        engine_tx,
        Box::new(media.clone()),
        event_tx.clone(),
        Arc::new(SystemClock),
    );

    let server = Server::new(
        &config.socket_path,
        ServerContext {
            input_tx: input_tx.clone(),
            status_rx: controller.subscribe_status(),
            event_tx: event_tx.clone(),
            media,
        },
    )?;

    if config.autostart {
        if input_tx.send(ControlInput::Start).is_err() {
            warn!("controller input closed before autostart");
        }
    } else {
        info!("autostart disabled, waiting for a start request");
    }

    let mut log_rx = event_tx.subscribe();

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the voice pipeline
        _ = controller.run(input_rx, engine_rx) => {
            info!("voice controller exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Record the pipeline's activity
        _ = async {
            loop {
                match log_rx.recv().await {
                    Ok(VoiceEvent::Transcript { .. }) => {}
                    Ok(event) => info!(%event, "voice event"),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "voice event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        } => {
            info!("voice event logger exited");
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    controller.handle_input(ControlInput::Stop);
    server.shutdown().await;

    info!("heychef-voiced stopped");

    Ok(())
}
