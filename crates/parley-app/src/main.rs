//! Parley console binary - composition root.
//!
//! 1. Parse flags and load configuration from TOML
//! 2. Install tracing on stderr
//! 3. Build the session controller and the voice input adapter
//! 4. Render session events on stdout
//! 5. Read questions and commands from stdin until `/quit` or EOF

mod cli;
mod console;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::{JoinHandle, JoinSet};

use parley_chat::{SessionController, SubmitOutcome};
use parley_core::config::{ParleyConfig, VoiceConfig};
use parley_core::events::EventBus;
use parley_voice::{
    CommandRecognizer, RecognitionConfig, SpeechRecognizer, UnavailableRecognizer,
    VoiceError, VoiceInputAdapter,
};

use cli::CliArgs;
use console::{Command, ConsoleNotifier};

/// How long to let the renderer drain after the last task finished.
const RENDER_DRAIN: Duration = Duration::from_secs(1);

/// Pick the recognizer for this system.
fn build_recognizer(voice: &VoiceConfig) -> Arc<dyn SpeechRecognizer> {
    if !voice.enabled {
        tracing::info!("Voice input disabled in config");
        return Arc::new(UnavailableRecognizer);
    }
    match CommandRecognizer::from_config(voice) {
        Some(recognizer) if recognizer.is_available() => {
            tracing::info!(command = %recognizer.program(), "Voice input ready");
            Arc::new(recognizer)
        }
        Some(recognizer) => {
            tracing::warn!(command = %recognizer.program(), "Voice command not found on PATH");
            Arc::new(UnavailableRecognizer)
        }
        None => {
            tracing::info!("No voice command configured");
            Arc::new(UnavailableRecognizer)
        }
    }
}

/// Print every visible event until the bus closes.
fn spawn_renderer(events: &EventBus) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(text) = console::render_event(&event) {
                        println!("{}", text);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Renderer fell behind; some events were not shown");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let (mut config, load_error) = ParleyConfig::load_or_default(&config_file);
    args.apply(&mut config);

    // Tracing.
    logging::init(&config.general.log_level)?;
    tracing::info!("Starting Parley v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        Some(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
        None => tracing::debug!(path = %config_file.display(), "Configuration resolved"),
    }
    config.validate()?;

    // === Session ===

    let events = EventBus::new();
    let controller = Arc::new(
        SessionController::from_config(&config.service).with_events(events.clone()),
    );

    let adapter = Arc::new(
        VoiceInputAdapter::new(
            build_recognizer(&config.voice),
            Arc::clone(&controller),
            Arc::new(ConsoleNotifier),
        )
        .with_config(RecognitionConfig::from(&config.voice)),
    );

    let renderer = spawn_renderer(&events);
    let mut tasks = JoinSet::new();

    println!("Parley. Type a question, or /help for commands.");

    // === Input loop ===

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match console::parse_command(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => println!("{}", console::HELP),
            Command::History => println!("{}", console::render_history(&controller.history())),
            Command::Ask(question) => {
                if controller.is_busy() {
                    eprintln!("{}", console::BUSY);
                    continue;
                }
                let controller = Arc::clone(&controller);
                tasks.spawn(async move {
                    if controller.submit(&question).await == SubmitOutcome::Busy {
                        eprintln!("{}", console::BUSY);
                    }
                });
            }
            Command::Voice => match adapter.start() {
                Ok(activation) => {
                    tasks.spawn(async move {
                        let outcome = activation.finished().await;
                        tracing::debug!(?outcome, "Voice input finished");
                    });
                }
                Err(VoiceError::Busy) => eprintln!("{}", console::BUSY),
                // Already shown to the user by the notifier.
                Err(e) => tracing::debug!(error = %e, "Voice input not started"),
            },
            Command::Stop => {
                if !adapter.stop() {
                    eprintln!("Not listening.");
                }
            }
            Command::Unknown(cmd) => eprintln!("Unknown command {}. Type /help.", cmd),
        }

        // Reap finished tasks so the set does not grow.
        while tasks.try_join_next().is_some() {}
    }

    // === Shutdown ===

    adapter.stop();
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "Session task failed");
        }
    }

    drop(adapter);
    drop(controller);
    drop(events);
    if tokio::time::timeout(RENDER_DRAIN, renderer).await.is_err() {
        tracing::debug!("Renderer still running at exit");
    }

    tracing::info!("Parley stopped");
    Ok(())
}
