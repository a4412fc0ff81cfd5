//! DeepTrace CLI - Deepfake classification from the command line.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use deeptrace_core::MediaKind;

mod commands;
mod exit_codes;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success (media classified as authentic, or no verdict to report)
  65  Media classified as manipulated
  66  Input file missing or undecodable
  69  Inference service unavailable
  74  I/O or record store error";

#[derive(Parser)]
#[command(name = "deeptrace")]
#[command(author, version, about = "Deepfake detection for images, audio and video", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// When to use colored output
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a media file as real or fake
    Classify {
        /// Path to the image, audio or video file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Media kind (defaults to detection from the file extension)
        #[arg(short, long, value_parser = parse_kind)]
        kind: Option<MediaKind>,

        /// Base URL of the inference service
        #[arg(long, env = "INFERENCE_URL")]
        inference_url: Option<String>,

        /// Use mock models instead of the inference service (for testing)
        #[arg(long)]
        mock: bool,

        /// Score returned by the mock models for every face and clip
        #[arg(long, default_value_t = 0.2)]
        mock_score: f64,

        /// Seed for reproducible video frame sampling
        #[arg(long)]
        seed: Option<u64>,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// List classification records from the record store
    Records {
        /// Record store URL
        #[arg(long, env = "DATABASE_URL", default_value = "sqlite://predictions.db")]
        database: String,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_kind(value: &str) -> Result<MediaKind, String> {
    MediaKind::parse(value).map_err(|e| e.to_string())
}

fn init_tracing(quiet: bool, verbose: u8) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, _) => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(format!(
            "deeptrace={level},deeptrace_core={level}"
        )))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.color {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {}
    }
    init_tracing(cli.quiet, cli.verbose);

    let result = match cli.command {
        Commands::Classify {
            file,
            kind,
            inference_url,
            mock,
            mock_score,
            seed,
            json,
        } => {
            let options = commands::classify::ClassifyOptions {
                kind,
                inference_url,
                mock_score: mock.then_some(mock_score),
                seed,
                json,
                quiet: cli.quiet,
            };
            commands::classify::execute(file, options).await
        }
        Commands::Records { database, json } => {
            commands::records::execute(&database, json, cli.quiet).await
        }
    };

    let exit = match result {
        Ok(()) => ExitCode::success(),
        Err(err) => ExitCode::from_anyhow(&err),
    };
    if let Some(message) = exit.message {
        eprintln!("Error: {message}");
    }
    std::process::exit(exit.code);
}
