// src/main.rs
use std::path::PathBuf;
use std::process::exit;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use domain_exporter::config::{load_config, DEFAULT_CONFIG_PATH};
use domain_exporter::logging::{self, LogFormat, LogOptions};
use domain_exporter::{server, surfacer, Prober};

#[derive(Parser)]
#[command(name = "domain_exporter", version)]
#[command(about = "Performs WHOIS lookups for the probes in the config file and reports domain expiry")]
struct Args {
    /// Set the config file
    #[arg(short = 'C', long, default_value = DEFAULT_CONFIG_PATH)]
    config_file: PathBuf,

    /// Enable debug mode
    #[arg(short = 'D', long)]
    debug: bool,

    /// Set the logging level
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Set the logging format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Set the logging output file
    #[arg(long)]
    log_path: Option<PathBuf>,
}

impl Args {
    fn log_options(&self) -> LogOptions {
        LogOptions {
            debug: self.debug,
            level: self.log_level.clone(),
            format: self.log_format,
            path: self.log_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(&args.log_options());

    info!("Starting domain_exporter v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            exit(1);
        }
    };
    let listen = config.server.socket_addr()?;

    let shutdown = CancellationToken::new();
    let (events_tx, events_rx) = mpsc::channel(config.server.event_capacity());
    let surfacer = tokio::spawn(surfacer::log_events(events_rx));

    let (mut prober, handle) = Prober::new(&args.config_file, events_tx, shutdown.clone());
    prober.start(&config)?;
    let prober = tokio::spawn(prober.run());

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                signal.cancel();
            }
            Err(e) => error!("Failed to listen for interrupts: {}", e),
        }
    });

    let served = server::serve(listen, handle, shutdown.clone()).await;
    shutdown.cancel();

    prober.await?;
    surfacer.await?;
    served?;

    info!("domain_exporter stopped");
    Ok(())
}
