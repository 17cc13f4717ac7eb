//! Standalone mock Datadog server.
//!
//! Runs the Events API and DogStatsD listeners until interrupted, then prints
//! how many events and metrics were captured.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::IpAddr;
use tracing_subscriber::{EnvFilter, fmt};

use mock_datadog::{DEFAULT_HTTP_PORT, DEFAULT_STATSD_PORT, MockServer, ServerConfig, ServerHandle};

#[derive(Parser, Debug)]
#[command(
    name = "mock-datadog",
    version,
    about = "Capture Datadog Events API and DogStatsD traffic for inspection"
)]
struct Cli {
    /// Address both listeners bind to
    #[arg(long, env = "MOCK_DD_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Events API (HTTP) port
    #[arg(long, env = "MOCK_DD_HTTP_PORT", default_value_t = DEFAULT_HTTP_PORT)]
    http_port: u16,

    /// DogStatsD (UDP) port
    #[arg(long, env = "MOCK_DD_STATSD_PORT", default_value_t = DEFAULT_STATSD_PORT)]
    statsd_port: u16,
}

impl Cli {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            host: self.host,
            http_port: self.http_port,
            statsd_port: self.statsd_port,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Cli::parse().into_config();

    let server = MockServer::builder()
        .config(&config)
        .start()
        .await
        .context("failed to start mock Datadog server")?;

    print_banner(&server);

    wait_for_shutdown_signal().await?;

    let snapshot = server.snapshot().await;
    server.shutdown().await?;

    println!("\n\nShutting down...");
    println!("\nFinal Stats:");
    println!("   Events received: {}", snapshot.events_received);
    println!("   Metrics received: {}", snapshot.metrics_received);

    Ok(())
}

fn print_banner(server: &ServerHandle) {
    let rule = "=".repeat(70);
    let http = server.http_addr();

    println!("{rule}");
    println!("Mock Datadog Server");
    println!("{rule}");
    println!();
    println!("DogStatsD server listening on {}", server.statsd_addr());
    println!("Events API server listening on http://{http}");
    println!("   Use: DD_API_URL='http://localhost:{}'", http.port());
    println!();
    println!("Status endpoint: http://localhost:{}/status", http.port());
    println!();
    println!("Press Ctrl+C to stop");
    println!("{rule}");
    println!();
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    tokio::select! {
        r = tokio::signal::ctrl_c() => r.context("listen for Ctrl+C")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await.context("listen for Ctrl+C")
}
