//! SuaraAI Studio CLI
//!
//! Command-line front end for speech and melody generation, trim/fade
//! editing and WAV export.

use clap::Parser;
use log::info;
use tracing_subscriber::EnvFilter;

use suara::cli::{commands, Cli, Commands, SessionAction};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("SuaraAI Studio v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(&cli.state_dir, cli.mock, cmd),
        None => {
            println!("SuaraAI Studio v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(state_dir: &std::path::Path, mock: bool, cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Speak { script, output } => {
            commands::speak(state_dir, mock, script.as_deref(), output.as_deref())
        }
        Commands::Melody {
            genre,
            mood,
            text,
            output,
        } => commands::melody(
            state_dir,
            mock,
            genre.as_deref(),
            mood.as_deref(),
            text.as_deref(),
            output.as_deref(),
        ),
        Commands::Upload { file, output } => commands::upload(state_dir, &file, output.as_deref()),
        Commands::Transform {
            file,
            instruction,
            output,
        } => commands::transform(state_dir, mock, &file, &instruction, output.as_deref()),
        Commands::Edit {
            trim_start,
            trim_end,
            fade_in,
            fade_out,
        } => commands::edit(state_dir, trim_start, trim_end, fade_in, fade_out),
        Commands::Export { input, output } => commands::export(state_dir, &input, &output),
        Commands::Session { action } => {
            commands::session(state_dir, matches!(action, SessionAction::Reset))
        }
        Commands::Voices => {
            commands::voices();
            Ok(())
        }
    }
}
