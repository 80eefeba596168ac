//! oxcrops - offline ROP buffer tool
//!
//! Inspects, decodes and encodes framed ROP input and output buffers.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oxcrops")]
#[command(about = "Inspect, decode and encode mailbox ROP buffers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file with RPC limits and XOR settings
    #[arg(short, long, env = "OXCROPS_CONFIG")]
    pub config: Option<std::path::PathBuf>,

    /// Emit JSON without colors or headings
    #[arg(long)]
    pub raw: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List RopIds and their properties
    Catalog {
        /// Only show RopIds the configured limits reject
        #[arg(long)]
        reserved: bool,
    },

    /// Show the chunks of a framed buffer
    Inspect {
        /// Buffer as hex, or @file with raw bytes
        buffer: String,
    },

    /// Decode a framed request buffer to JSON
    DecodeRequest {
        /// Buffer as hex, or @file with raw bytes
        buffer: String,
    },

    /// Decode a response buffer against the request that produced it
    DecodeResponse {
        /// Request buffer as hex, or @file with raw bytes
        #[arg(long)]
        request: String,

        /// Response buffer as hex, or @file with raw bytes
        response: String,
    },

    /// Encode requests into a framed request buffer
    Encode {
        /// JSON object {"requests": [...], "handles": [...]}, or @file.json
        input: String,

        /// Obfuscate the payload with XOR 0xA5
        #[arg(long)]
        xor: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // --config falls back to OXCROPS_CONFIG through clap.
    let config = match oxcrops_client::SessionConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };

    match commands::execute(&config, cli.command, cli.raw) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    Ok(())
}
