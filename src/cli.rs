use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "demonhide",
    version,
    about = "Automatic pointer constraint daemon for XWayland fullscreen applications"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the pointer lock daemon
    Run {
        /// Focus probe interval in milliseconds
        #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: u64,

        /// Cursor warp interval in milliseconds
        #[arg(long, default_value_t = 250, value_parser = clap::value_parser!(u64).range(1..))]
        warp_interval_ms: u64,

        /// Do not warp the X11 cursor while the pointer is locked
        #[arg(long)]
        no_warp: bool,

        /// GNOME monitor configuration (default: ~/.config/monitors.xml)
        #[arg(long)]
        monitors_file: Option<PathBuf>,

        /// Fallback screen width when no monitor information is available
        #[arg(long, env = "WAYLAND_SCREEN_WIDTH", default_value_t = 1920)]
        screen_width: i32,

        /// Fallback screen height when no monitor information is available
        #[arg(long, env = "WAYLAND_SCREEN_HEIGHT", default_value_t = 1080)]
        screen_height: i32,

        /// Fallback screen scale when no monitor information is available
        #[arg(long, env = "WAYLAND_SCREEN_SCALE", default_value_t = 1)]
        screen_scale: i32,
    },

    /// Bind pointer constraints once and report what the compositor offers
    Probe {
        /// List every advertised global
        #[arg(long)]
        globals: bool,
    },
}
