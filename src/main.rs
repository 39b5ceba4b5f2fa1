mod cli;
mod constraints;
mod daemon;
mod geometry;
mod probe;
mod wayland;
mod xwayland;

use std::time::Duration;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            interval_ms,
            warp_interval_ms,
            no_warp,
            monitors_file,
            screen_width,
            screen_height,
            screen_scale,
        } => {
            let config = daemon::DaemonConfig {
                poll_interval: Duration::from_millis(interval_ms),
                warp_interval: Duration::from_millis(warp_interval_ms),
                warp: !no_warp,
                monitors_file: monitors_file.or_else(geometry::default_monitors_path),
                fallback_screen: geometry::ScreenSize {
                    width: screen_width,
                    height: screen_height,
                    scale: screen_scale.max(1),
                },
            };
            if let Err(e) = daemon::run(config).await {
                tracing::error!(error = %e, "daemon failed");
                eprintln!("demonhide run: {e}");
                std::process::exit(1);
            }
        }
        Command::Probe { globals } => {
            if let Err(e) = probe::run(globals) {
                tracing::error!(error = %e, "probe failed");
                eprintln!("demonhide probe: {e}");
                std::process::exit(1);
            }
        }
    }
}
