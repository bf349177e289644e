// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use selfie_zone::backends::camera::CameraBackendType;
use selfie_zone::capture::CaptureMode;
use selfie_zone::config::{self, Config};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "selfie-zone")]
#[command(about = "Photo booth for photos, boomerangs and short videos")]
#[command(version = selfie_zone::constants::app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    /// Config file (default: ~/.config/selfie-zone/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Camera backend: pipewire, v4l2, synthetic (or gphoto2 with that feature)
    #[arg(long, global = true)]
    backend: Option<CameraBackendType>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras and video encoders
    List,

    /// Take a photo after the countdown and save it
    Photo,

    /// Record a boomerang and save it
    Boomerang {
        /// Recording window in seconds
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Record a video and save it
    Video {
        /// Recording duration in seconds (default: until Ctrl+C)
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Show the config file path and effective configuration
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so they stay out of the terminal UI
    // Examples: RUST_LOG=debug, RUST_LOG=selfie_zone=debug, RUST_LOG=info
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    if let Some(backend) = cli.backend {
        config.camera.backend = backend;
    }

    match cli.command {
        Some(Commands::List) => cli::list_cameras(config.camera.backend),
        Some(Commands::Photo) => cli::capture(&config, CaptureMode::Photo, None),
        Some(Commands::Boomerang { duration }) => {
            cli::capture(&config, CaptureMode::Boomerang, duration)
        }
        Some(Commands::Video { duration }) => cli::capture(&config, CaptureMode::Video, duration),
        Some(Commands::Config) => cli::show_config(&config, &config_path),
        None => selfie_zone::terminal::run(&config),
    }
}
