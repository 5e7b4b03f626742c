use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use shared::RESEND_INTERVAL_MS;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Seed for respawn selection, for reproducible matches
    #[arg(long)]
    seed: Option<u64>,

    /// Re-trace client-reported hits on moving targets before applying damage
    #[arg(long)]
    validate_dynamic_hits: bool,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    client_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let tick_rate = args.tick_rate.max(1);

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        tick_duration: Duration::from_secs_f64(1.0 / tick_rate as f64),
        client_timeout: Duration::from_secs(args.client_timeout_secs),
        resend_interval: Duration::from_millis(RESEND_INTERVAL_MS),
        seed: args.seed,
        validate_dynamic_hits: args.validate_dynamic_hits,
    };

    info!("Starting match server at {} Hz", tick_rate);
    if config.validate_dynamic_hits {
        info!("Validating client-reported hits on moving targets");
    }

    let mut server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
