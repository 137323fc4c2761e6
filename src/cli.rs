use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stillcast")]
#[command(author, version, about = "Live HLS streams from still images")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the redirect and stream server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Print the stream key for an image or slideshow
    Fingerprint {
        /// Image URL or path; repeat for a slideshow
        #[arg(short, long = "url", required = true)]
        urls: Vec<String>,

        /// Seconds per slideshow image
        #[arg(long, default_value = "5")]
        duration: u32,

        /// Slideshow repeat count
        #[arg(long = "loop", default_value = "1")]
        loop_count: u32,
    },

    /// Display version information
    Version,
}
