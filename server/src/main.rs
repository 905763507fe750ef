mod session;

use anyhow::Context;
use clap::Parser;
use session::Position;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Stand-in location service that answers every request with a fixed position
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1:7700")]
    listen: String,

    #[arg(long, default_value_t = 61.491241, allow_negative_numbers = true)]
    lat: f64,

    #[arg(long, default_value_t = 23.771109, allow_negative_numbers = true)]
    lon: f64,

    /// Radius in meters
    #[arg(long, default_value_t = 500)]
    uncertainty: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let position = Position {
        lat: cli.lat,
        lon: cli.lon,
        uncertainty: cli.uncertainty,
    };

    let listener = TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("Failed to bind {}", cli.listen))?;
    info!("Mock location service listening on {}", cli.listen);
    info!("  Position: {:.6},{:.6} +/- {} m", position.lat, position.lon, position.uncertainty);

    loop {
        let (socket, addr) = listener.accept().await?;
        info!("Connection from: {}", addr);

        tokio::spawn(async move {
            if let Err(e) = session::serve(socket, &addr.to_string(), position).await {
                error!("Session {} failed: {:#}", addr, e);
            }
        });
    }
}
