mod cloud;
mod command;
mod config;
mod location;
mod notification;
mod transport;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use cloud::{CellInfoSource, CloudState, LocationClient, TcpLocationClient};
use command::CommandExecutor;
use location::{LocationEvent, LocationOrchestrator, ModemCellSource};
use notification::{MeasurementStore, NotificationMonitor};
use tokio::sync::mpsc;
use transport::{spawn_line_reader, spawn_line_writer, SerialConnector, TcpConnector, TransportConnector};

use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Cellular and Wi-Fi positioning front-end for an AT-command modem
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Config file (default: cellfix.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Modem serial port; overrides [modem] port
    #[arg(long)]
    modem_port: Option<String>,

    /// Location service address; overrides [cloud] address
    #[arg(long)]
    cloud: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; stdout is reserved for host responses
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref()))
        .init();

    let cli = Cli::parse();
    let mut config = config::load_or_default(cli.config.as_deref())?;
    if let Some(port) = cli.modem_port {
        config.modem.port = Some(port);
    }
    if let Some(address) = cli.cloud {
        config.cloud.address = address;
    }

    info!("Device starting: {}", config.device_id);
    info!("  Location service: {}", config.cloud.address);

    let store = MeasurementStore::new();
    let monitor = Arc::new(NotificationMonitor::new(
        store.clone(),
        config.limits.decode_limits(),
    ));
    let cloud_state = CloudState::new();
    let client: Arc<dyn LocationClient> = Arc::new(TcpLocationClient::new(
        TcpConnector::new(config.cloud.address.clone(), config.cloud.connect_timeout()),
        config.device_id.clone(),
        config.cloud.request_timeout(),
    ));

    // Host link
    let (host_tx, mut host_rx) = mpsc::channel::<String>(32);
    let (out_tx, out_rx) = mpsc::channel::<String>(32);
    spawn_line_reader(tokio::io::stdin(), "HOST", host_tx);
    let writer_handle = spawn_line_writer(tokio::io::stdout(), "HOST", out_rx);

    // Modem link, when configured
    let (modem_line_tx, mut modem_rx) = mpsc::channel::<String>(32);
    let (modem_tx, modem_cells) = match &config.modem.port {
        Some(port) => {
            let connector = SerialConnector::new(port.clone(), config.modem.baud);
            let stream = connector.connect().await?;
            info!("{} link open on {} ({} baud)", connector.name(), port, config.modem.baud);

            let (reader, writer) = tokio::io::split(stream);
            let (cmd_tx, cmd_rx) = mpsc::channel::<String>(8);
            spawn_line_reader(reader, "MODEM", modem_line_tx);
            spawn_line_writer(writer, "MODEM", cmd_rx);
            let cells = Arc::new(ModemCellSource::new(
                cmd_tx.clone(),
                config.modem.response_timeout(),
            ));
            (Some(cmd_tx), Some(cells))
        }
        None => {
            info!("No modem port configured, notifications accepted on the host link");
            drop(modem_line_tx);
            (None, None)
        }
    };

    // Single-cell requests query the modem; without one, the last measurement
    let cell_source: Arc<dyn CellInfoSource> = match &modem_cells {
        Some(cells) => cells.clone(),
        None => Arc::new(store.clone()),
    };
    let (orchestrator, mut location_events) = LocationOrchestrator::new(
        store.clone(),
        cloud_state.clone(),
        cell_source,
        client.clone(),
        config.limits.wifi_ap_min,
    );
    let orchestrator = Arc::new(orchestrator);

    let executor = CommandExecutor::new(
        config.device_id.clone(),
        cloud_state,
        client,
        monitor.clone(),
        orchestrator.clone(),
        modem_tx,
    );

    // Main event loop
    loop {
        tokio::select! {
            line = host_rx.recv() => {
                let Some(line) = line else {
                    info!("[HOST] Host link closed");
                    break;
                };
                for response in executor.execute(&line).await.into_response() {
                    send_to_host(&out_tx, response).await;
                }
            }
            Some(line) = modem_rx.recv() => {
                if modem_cells.as_ref().is_some_and(|cells| cells.on_modem_line(&line)) {
                    debug!("[MODEM] {}", line);
                } else {
                    if NotificationMonitor::is_notification(&line) {
                        monitor.on_notification(&line);
                    }
                    send_to_host(&out_tx, line).await;
                }
            }
            Some(event) = location_events.recv() => {
                report_location(&out_tx, event).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    // Let an accepted request deliver its result before exiting
    if orchestrator.busy() {
        let wait = config.cloud.connect_timeout() + config.cloud.request_timeout();
        debug!("[LOCATION] Waiting up to {:?} for the outstanding request", wait);
        match tokio::time::timeout(wait, location_events.recv()).await {
            Ok(Some(event)) => report_location(&out_tx, event).await,
            _ => warn!("[LOCATION] Outstanding request abandoned"),
        }
    }

    drop(out_tx);
    if let Err(e) = writer_handle.await {
        error!("[HOST] Writer task failed: {}", e);
    }
    Ok(())
}

/// `RUST_LOG` directives when set and valid, `info` otherwise
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

async fn report_location(out_tx: &mpsc::Sender<String>, event: LocationEvent) {
    if let LocationEvent::Failed(code) = event {
        warn!("[LOCATION] Request failed with {}", code);
    }
    send_to_host(out_tx, event.response()).await;
}

async fn send_to_host(out_tx: &mpsc::Sender<String>, line: String) {
    if out_tx.send(line).await.is_err() {
        error!("[HOST] Host writer closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_respects_directives() {
        assert_eq!(log_filter(None).to_string(), "info");
        assert_eq!(log_filter(Some("debug")).to_string(), "debug");
        assert_eq!(
            log_filter(Some("cellfix_device=trace")).to_string(),
            "cellfix_device=trace"
        );
        // Unparseable directives fall back to the default
        assert_eq!(log_filter(Some("cellfix_device=loud")).to_string(), "info");
    }
}
