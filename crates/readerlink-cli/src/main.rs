//! readerlink - card reader session tool
//!
//! Discovers readers on a simulated terminal, connects to the first one,
//! optionally installs a pending firmware update and echoes reader prompts
//! until it disconnects.

mod config;
mod output;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser};
use futures::StreamExt;
use readerlink_connection::{ConnectionManager, ConnectionManagerConfig};
use readerlink_core::{DiscoveryEvent, Reader, SoftwareUpdateAvailability};
use readerlink_terminal::TerminalSdk;
use readerlink_terminal::mock::MockTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{Config, MergedConfig};

/// How long to wait for the reader to report an available update.
const UPDATE_REPORT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "readerlink")]
#[command(author, version, about = "Card reader connection and firmware update tool")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "READERLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Scan the simulated reader pool instead of the Bluetooth radio
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    simulated: bool,

    /// Location applied to a reader without one
    #[arg(short, long, env = "READERLINK_LOCATION")]
    location: Option<String>,

    /// Install a pending firmware update after connecting
    #[arg(long)]
    install_update: bool,

    /// Give up scanning after this many seconds
    #[arg(long)]
    discovery_timeout: Option<u64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load config file
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::default(),
    };

    let merged = config.merge_with_args(
        cli.location.as_deref(),
        cli.discovery_timeout,
        cli.install_update,
        cli.simulated,
    );
    debug!(?merged, "Resolved configuration");

    run(merged).await
}

async fn run(config: MergedConfig) -> Result<()> {
    let (terminal, _handle) = MockTerminal::simulated(config.terminal.clone());
    let manager = ConnectionManager::with_config(
        Arc::new(terminal),
        ConnectionManagerConfig {
            discovery_timeout: config.discovery_timeout,
        },
    );

    let reader = discover(&manager, config.simulated).await?;
    let reader = if reader.has_location() {
        reader
    } else {
        info!(reader = %reader.id, location = %config.location, "Applying default location");
        reader.with_location_id(config.location.clone())
    };

    let mut prompts = manager.subscribe_prompts();
    let printer = tokio::spawn(async move {
        while let Some(prompt) = prompts.recv().await {
            output::print_prompt(&prompt);
        }
    });

    println!("Connecting to {}...", reader.id);
    let connected = manager
        .connect(&reader)
        .await
        .with_context(|| format!("Cannot connect to {}", reader.id))?;
    if !connected {
        printer.abort();
        bail!("Reader {} refused the connection", reader.id);
    }

    if let Some(connected) = manager.connected_reader() {
        println!("Connected: {}", output::describe_reader(&connected));
    }

    if config.install_update {
        install_update(&manager).await?;
    }

    tokio::time::sleep(config.linger).await;

    let disconnected = manager.disconnect().await.context("Cannot disconnect")?;
    if disconnected {
        println!("Disconnected");
    } else {
        warn!("Reader did not confirm the disconnect");
    }

    // Ends the printer once it has drained the final prompt
    manager.unsubscribe_prompts();
    if let Err(e) = printer.await {
        warn!(error = %e, "Prompt printer failed");
    }
    Ok(())
}

/// Scan until the vendor finishes and return the first reader found.
async fn discover<T: TerminalSdk>(manager: &ConnectionManager<T>, simulated: bool) -> Result<Reader> {
    let mut events = manager.discover_readers(simulated);
    let mut readers = Vec::new();

    while let Some(event) = events.next().await {
        output::print_discovery_event(&event);
        match event {
            DiscoveryEvent::ReadersFound(found) => readers = found,
            DiscoveryEvent::Failed(message) => bail!("Discovery failed: {message}"),
            DiscoveryEvent::Started | DiscoveryEvent::Succeeded => {}
        }
    }

    readers
        .into_iter()
        .next()
        .context("Discovery finished without finding a reader")
}

async fn install_update<T: TerminalSdk>(manager: &ConnectionManager<T>) -> Result<()> {
    let mut availability = manager.software_update_availability();
    let reported = matches!(
        tokio::time::timeout(
            UPDATE_REPORT_TIMEOUT,
            availability.wait_for(|a| *a == SoftwareUpdateAvailability::Available),
        )
        .await,
        Ok(Ok(_))
    );

    if !reported {
        println!("Reader is up to date");
        return Ok(());
    }

    if !manager.install_software_update()? {
        println!("No update to install");
        return Ok(());
    }

    let mut status = manager.software_update_status();
    loop {
        let current = status.borrow_and_update().clone();
        output::print_update_status(&current);
        if current.is_terminal() {
            break;
        }
        status
            .changed()
            .await
            .context("Update status stopped reporting")?;
    }

    if let Some(percent) = manager.connected_reader().and_then(|r| r.battery_percent()) {
        debug!(percent, "Battery after update");
    }
    Ok(())
}
