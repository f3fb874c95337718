//! CLI for syringe-sim: a simulated syringe inspection line.

mod commands;
mod tui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::ConfigArgs;

#[derive(Parser)]
#[command(name = "syringe-sim")]
#[command(about = "syringe-sim: synthetic defect streams from a simulated inspection line")]
#[command(version = syringe_sim_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Live interactive inspection dashboard (TUI)
    Monitor {
        #[command(flatten)]
        config: ConfigArgs,

        /// File written when pressing `s` (.json for JSON, anything else CSV)
        #[arg(long, default_value = syringe_sim_core::DEFAULT_EXPORT_PATH)]
        output: String,

        /// Start streaming as soon as the dashboard opens
        #[arg(long)]
        autostart: bool,
    },

    /// Stream intervals headlessly, printing running metrics per interval
    Stream {
        #[command(flatten)]
        config: ConfigArgs,

        /// Stop after this many intervals
        #[arg(long)]
        intervals: Option<u64>,

        /// Stop after this long (e.g. "30s", "5m", "1h")
        #[arg(long)]
        duration: Option<String>,

        /// Save the sample log here on exit (.json for JSON, anything else CSV)
        #[arg(long)]
        output: Option<String>,
    },

    /// Start an HTTP server exposing metrics, samples and stream controls
    Server {
        #[command(flatten)]
        config: ConfigArgs,

        /// Port to listen on
        #[arg(long, default_value = "8077")]
        port: u16,

        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Start streaming immediately instead of waiting for POST /api/v1/stream/start
        #[arg(long)]
        autostart: bool,

        /// Directory that POST /api/v1/export writes into
        #[arg(long, default_value = ".")]
        export_dir: String,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Monitor {
            config,
            output,
            autostart,
        } => {
            commands::init_logging("off");
            commands::monitor::run(config.into_config(), &output, autostart)
        }
        Commands::Stream {
            config,
            intervals,
            duration,
            output,
        } => {
            commands::init_logging("info");
            commands::stream::run(
                config.into_config(),
                intervals,
                duration.as_deref(),
                output.as_deref(),
            )
        }
        Commands::Server {
            config,
            port,
            host,
            autostart,
            export_dir,
        } => {
            commands::init_logging("info");
            commands::server::run(
                config.into_config(),
                &host,
                port,
                autostart,
                PathBuf::from(export_dir),
            )
        }
    }
}
