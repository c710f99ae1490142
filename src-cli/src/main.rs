//! DearDiary Command-Line Interface
//!
//! A headless tool for inspecting a diary directory and recovering leftover
//! diary files into a video, without requiring the recording host.

mod colors;
mod commands;
mod exit_codes;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use exit_codes::ExitCode;
use tracing_subscriber::EnvFilter;

/// DearDiary - sliding-window recording CLI
#[derive(Parser, Debug)]
#[command(name = "deardiary")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List leftover diary files and their contents
    Inspect {
        /// Diary directory (defaults to the platform data directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Export leftover diary files to an MP4 video
    Export {
        /// Diary directory (defaults to the platform data directory)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Output video path
        #[arg(short, long, default_value = "diary.mp4")]
        output: PathBuf,

        /// Video bitrate in bits per second
        #[arg(long)]
        bitrate: Option<u32>,
    },
    /// Delete leftover diary files without exporting
    Clean {
        /// Diary directory (defaults to the platform data directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let exit_code = run(cli);
    std::process::exit(exit_code.as_i32());
}

fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Commands::Inspect { dir } => commands::inspect(dir, cli.quiet),
        Commands::Export { dir, output, bitrate } => {
            commands::export(dir, output, bitrate, cli.quiet)
        }
        Commands::Clean { dir } => commands::clean(dir, cli.quiet),
    }
}
