//! Relay binary entry point.

use clap::Parser;
use colloquy::relay::{RealtimeRelay, DEFAULT_RELAY_HOST, DEFAULT_RELAY_PORT};
use colloquy::session::SessionConfig;

#[derive(Parser)]
#[command(
    name = "colloquy-relay",
    about = "Bridge local websocket clients to the realtime API"
)]
struct Args {
    /// Host to listen on.
    #[arg(long, env = "HOSTNAME", default_value = DEFAULT_RELAY_HOST)]
    host: String,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = DEFAULT_RELAY_PORT)]
    port: u16,

    /// Model requested from the upstream endpoint.
    #[arg(long)]
    model: Option<String>,

    /// Upstream endpoint URL.
    #[arg(long)]
    url: Option<String>,

    /// API key for the upstream endpoint; falls back to `OPENAI_API_KEY`.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = SessionConfig::from_env();
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(url) = args.url {
        config.base_url = url;
    }
    if let Some(api_key) = args.api_key {
        config.api_key = Some(api_key);
    }

    let relay = RealtimeRelay::new(config, args.host, args.port);
    if let Err(e) = relay.run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
