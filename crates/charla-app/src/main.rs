//! Charla application binary - composition root.
//!
//! 1. Parse CLI arguments and load configuration (file, env, flags)
//! 2. Initialize tracing
//! 3. Build the hosted service clients once and inject them
//! 4. Run either the HTTP server or the interactive console

mod cli;
mod console;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use charla_api::state::AppState;
use charla_chat::{ConversationOrchestrator, OrchestratorSettings, TurnProfile};
use charla_core::config::CharlaConfig;
use charla_core::services::{DialogueService, TranscriptionService};

use cli::{CliArgs, Command};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = CharlaConfig::load_or_default(&config_file);
    config.apply_env_overrides();
    args.apply_overrides(&mut config);

    // Tracing. RUST_LOG wins over --log-level and the config file. Logs go to
    // stderr so they stay out of the chat transcript.
    let level = args.resolve_log_level(&config);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Charla v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    if let Err(e) = run(args.command(), config).await {
        tracing::error!(error = %e, "Charla exited with an error");
        std::process::exit(1);
    }
}

async fn run(command: Command, config: CharlaConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let (assistant, speech) = charla_watson::clients_from_config(&config)?;
    let dialogue: Arc<dyn DialogueService> = Arc::new(assistant);
    let transcription: Arc<dyn TranscriptionService> = Arc::new(speech);
    let settings = OrchestratorSettings::from_config(&config);

    match command {
        Command::Serve { .. } => {
            let orchestrator = ConversationOrchestrator::new(
                dialogue,
                transcription,
                settings,
                TurnProfile::http(),
            );
            let state = AppState::new(config.clone(), orchestrator);
            charla_api::start_server(&config, state).await?;
        }
        Command::Chat { profile } => {
            tracing::info!(profile = ?profile, "Starting interactive chat");
            let orchestrator = Arc::new(ConversationOrchestrator::new(
                dialogue,
                transcription,
                settings,
                profile.turn_profile(),
            ));
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            console::run_console(orchestrator, stdin, &mut stdout).await?;
        }
    }

    Ok(())
}
