//! BraidPay host server.
//!
//! Accepts signed payment notifications from BraidPay on
//! `/api/braidpay-webhook` and answers the checkout page's status poller on
//! `/api/check-payment-status`.

mod api;
mod config;
mod server;
mod shutdown;
mod state;
mod sweeper;

use clap::Parser;
use config::ConfigLoader;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "braidpay-server", version, about = "BraidPay webhook receiver and payment status endpoint")]
struct Args {
    /// TOML configuration file
    #[arg(short, long, default_value = "./braidpay-config.toml")]
    config: PathBuf,

    /// Listen address, overriding `server.listen`
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Webhook secret, overriding `webhook.secret`
    #[arg(long, env = "BRAIDPAY_WEBHOOK_SECRET", hide_env_values = true)]
    webhook_secret: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "braidpay-server starting");

    let loader = Arc::new(ConfigLoader::new(&args.config, args.listen, args.webhook_secret));
    let loaded = loader
        .load()
        .inspect_err(|e| tracing::error!(error = %e, path = ?args.config, "Cannot load configuration"))?;
    let listen = loaded.server.listen;

    let payments = loaded.payments;
    let state = state::AppState::new(loaded.into_shared(), payments);
    let reload_stop = shutdown::spawn_config_reload_handler(state.clone(), loader);
    let sweeper = sweeper::spawn_registration_sweeper(state.book.clone());

    let served = server::run_server(server::build_router(state), listen).await;

    sweeper.abort();
    reload_stop.notify_one();
    tracing::info!("braidpay-server stopped");
    served.map_err(Into::into)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
