use clap::Parser;
use client::network::{Client, ClientConfig};
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Milliseconds between automatic shots, 0 to hold fire
    #[arg(short = 'f', long, default_value = "750")]
    fire_interval_ms: u64,

    /// Do not draw beam effects
    #[arg(long)]
    no_trail: bool,

    /// Milliseconds to wait after losing a body before asking for a new one
    #[arg(long, default_value = "2000")]
    respawn_delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let mut client = Client::new(ClientConfig {
        server_addr: args.server,
        fake_ping_ms: args.fake_ping,
        fire_interval: Duration::from_millis(args.fire_interval_ms),
        respawn_delay: Duration::from_millis(args.respawn_delay_ms),
        draw_trails: !args.no_trail,
    })
    .await?;

    client.run().await?;

    Ok(())
}
