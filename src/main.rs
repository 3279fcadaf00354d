use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "image-text-translator",
    version,
    about = "Replace the text in images with its translation"
)]
struct Cli {
    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<String>,

    /// Font file used for the overlay text (overrides overlay.font_path)
    #[arg(long = "font", global = true)]
    font: Option<String>,

    /// Translation endpoint (overrides translate.endpoint)
    #[arg(long = "endpoint", global = true)]
    endpoint: Option<String>,

    /// Minimum OCR confidence for a region to be redrawn
    #[arg(long = "min-confidence", global = true)]
    min_confidence: Option<f32>,

    /// Write each page's translated regions as JSON into this directory
    #[arg(long = "debug-dir", global = true)]
    debug_dir: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate one image
    Page {
        input: PathBuf,
        output: PathBuf,
    },
    /// Translate several images into one PDF
    Batch {
        /// Output PDF path
        output: PathBuf,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    image_text_translator::logging::init(cli.verbose)?;

    let job = match cli.command {
        Command::Page { input, output } => image_text_translator::Job::Page { input, output },
        Command::Batch { output, inputs } => image_text_translator::Job::Batch { inputs, output },
    };
    let output = image_text_translator::run(
        image_text_translator::Config {
            settings_path: cli.read_settings,
            font_path: cli.font,
            endpoint: cli.endpoint,
            min_confidence: cli.min_confidence,
            debug_dir: cli.debug_dir,
        },
        job,
    )
    .await?;

    println!("{}", output);
    Ok(())
}
