//! Burnin CLI: burn subtitle cues into video files.
//!
//! Usage:
//!   burnin burn <VIDEO> --cues <SRT>   Render cues onto every frame and re-encode
//!   burnin cues <SRT>                  Validate a cue file, optionally convert it
//!   burnin check                       Check ffmpeg and font availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use burnin_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "burnin",
    about = "Burn subtitles into video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Burn subtitle cues into a video
    Burn {
        /// Source video
        video: PathBuf,

        /// Cue file (.srt or .json)
        #[arg(short, long)]
        cues: PathBuf,

        /// Style file (JSON); defaults to bottom-centered white text
        #[arg(short, long)]
        style: Option<PathBuf>,

        /// Output file path (defaults to <video>.burned.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: webm|mp4
        #[arg(long)]
        format: Option<String>,

        /// Sampling and output frame rate
        #[arg(long)]
        fps: Option<u32>,
    },

    /// Validate a cue file and optionally convert it
    Cues {
        /// Path to the cue file (.srt or .json)
        path: PathBuf,

        /// Write the cues as WebVTT
        #[arg(long)]
        vtt: Option<PathBuf>,

        /// Write the cues as SRT with sequential numbering
        #[arg(long)]
        srt: Option<PathBuf>,
    },

    /// Check ffmpeg, ffprobe and font availability
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    burnin_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Burn {
            video,
            cues,
            style,
            output,
            format,
            fps,
        } => {
            commands::burn::run(
                &config,
                commands::burn::BurnArgs {
                    video,
                    cues,
                    style,
                    output,
                    format,
                    fps,
                },
            )
            .await
        }
        Commands::Cues { path, vtt, srt } => commands::cues::run(path, vtt, srt),
        Commands::Check => commands::check::run(&config),
    }
}
