//! logmon - stream appended lines of watched text files.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use logmon::config::{ConfigLoader, LogmonConfig};
use logmon::server::{resolve_watch_path, ApiError, LogmonServer};
use logmon::watcher::WatchRegistry;

#[derive(Parser)]
#[command(
    name = "logmon",
    about = "Watch text files and stream appended lines over HTTP",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server.
    Serve {
        /// Host address to bind to.
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on.
        #[arg(short, long)]
        port: Option<u16>,
        /// Delay between two reads of a watched file, in milliseconds.
        #[arg(long)]
        poll_interval_ms: Option<u64>,
        /// Files to watch from startup.
        paths: Vec<String>,
    },
    /// Print the resolved configuration.
    Config,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Option<LogmonConfig> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    match loader.load() {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            None
        }
    }
}

async fn serve(config: LogmonConfig, paths: Vec<String>) -> ExitCode {
    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return ExitCode::FAILURE;
    }

    let registry = Arc::new(WatchRegistry::new(config.watcher.clone()));

    for raw in paths {
        let added = match resolve_watch_path(&raw).await {
            Ok(resolved) => registry.add(resolved.path).await.map_err(ApiError::from),
            Err(e) => Err(e),
        };
        match added {
            Ok(id) => tracing::info!(id, path = %raw, "Watching file"),
            Err(e) => tracing::warn!(path = %raw, error = %e, "Skipping file"),
        }
    }

    let cancel = CancellationToken::new();
    let server = LogmonServer::new(registry)
        .with_config(config.server)
        .with_cancellation(cancel.clone());

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
        cancel.cancel();
    });

    tracing::info!(address = %server.address(), "Starting logmon server");
    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(mut config) = load_config(cli.config) else {
        return ExitCode::FAILURE;
    };

    match cli.command {
        Commands::Serve {
            host,
            port,
            poll_interval_ms,
            paths,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(ms) = poll_interval_ms {
                config.watcher.poll_interval_ms = ms;
            }
            serve(config, paths).await
        }
        Commands::Config => match toml::to_string_pretty(&config) {
            Ok(text) => {
                print!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to render configuration");
                ExitCode::FAILURE
            }
        },
    }
}
