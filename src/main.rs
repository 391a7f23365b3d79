// Clippy project config
#![warn(clippy::unwrap_used)]

use clap::{Args, Parser};
use std::{path::PathBuf, process::ExitCode, sync::Arc};
use tracing::info;
use tracing_subscriber::prelude::*;
use ytaudio::config::{get_data_dir, Config};

mod cli;

const LOG_FILE_NAME: &str = "debug.log";

#[derive(Parser, Debug)]
#[command(author,version,about,long_about=None)]
/// Extract the audio from a YouTube video into a tagged mp3 file.
struct Arguments {
    /// Display and log additional debug information.
    #[arg(short, long, default_value_t = false)]
    debug: bool,
    #[command(flatten)]
    cli: Cli,
}

#[derive(Args, Debug, Clone)]
struct Cli {
    /// Url of the video to extract audio from.
    url: String,
    /// Identifier (itag) of the format to download. Use --list-formats to see
    /// the formats available for a video.
    #[arg(short, long, required_unless_present = "list_formats")]
    itag: Option<u64>,
    /// Directory to write the mp3 file into. Created if it doesn't exist.
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
    /// Path to the encoder binary, overriding the configuration file.
    #[arg(short, long)]
    encoder: Option<PathBuf>,
    /// Fail instead of overwriting an existing output file.
    #[arg(long, default_value_t = false)]
    no_overwrite: bool,
    /// List the available formats for the video and exit.
    #[arg(short, long, default_value_t = false)]
    list_formats: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Using try block to print error using Display instead of Debug.
    if let Err(e) = try_main().await {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    };
    ExitCode::SUCCESS
}

// Main function is refactored here so that we can pretty print errors.
// Regular main function returns debug errors so not as friendly.
async fn try_main() -> anyhow::Result<()> {
    let Arguments { debug, cli } = Arguments::parse();
    init_tracing(debug).await?;
    let mut config = Config::new().await?;
    // Command line flags should override the configuration file.
    if let Some(encoder) = &cli.encoder {
        config.encoder_path = encoder.clone();
    }
    if cli.no_overwrite {
        config.overwrite = false;
    }
    cli::handle_cli_command(cli, config).await
}

/// Initialise tracing with a stderr subscriber, and additionally file logging
/// in debug mode.
async fn init_tracing(debug: bool) -> anyhow::Result<()> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    if debug {
        let data_dir = get_data_dir()?;
        tokio::fs::create_dir_all(&data_dir).await?;
        let log_file_name = data_dir.join(LOG_FILE_NAME);
        let log_file = std::fs::File::create(&log_file_name)?;
        let log_file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Arc::new(log_file));
        let context_layer =
            tracing_subscriber::filter::Targets::new().with_target("ytaudio", tracing::Level::DEBUG);
        tracing_subscriber::registry()
            .with(stderr_layer.and_then(log_file_layer))
            .with(context_layer)
            .init();
        info!("Started in debug mode, logging to {:?}.", log_file_name);
    } else {
        let context_layer =
            tracing_subscriber::filter::Targets::new().with_target("ytaudio", tracing::Level::INFO);
        tracing_subscriber::registry()
            .with(stderr_layer)
            .with(context_layer)
            .init();
    }
    Ok(())
}
