//! svchub entry point.
//!
//! Starts the service hub gateway. Configuration comes from the environment:
//!
//! | Env var       | Default | Meaning                          |
//! |---------------|---------|----------------------------------|
//! | `SVCHUB_PORT` | `8000`  | Listener port                    |
//! | `RUST_LOG`    | `info`  | Tracing filter                   |
//!
//! The listener accepts loopback traffic on both address families
//! (`127.0.0.1` and `[::1]`). Exit code is 0 on clean shutdown (ctrl-c) and
//! non-zero for unrecoverable startup errors such as a failed bind.

use anyhow::{Context, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use svchub_common::SystemClock;
use svchub_gateway::{Gateway, HttpServer};

const DEFAULT_PORT: u16 = 8000;

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let port = match std::env::var("SVCHUB_PORT") {
        Ok(raw) => raw
            .parse::<u16>()
            .with_context(|| format!("invalid SVCHUB_PORT '{raw}'"))?,
        Err(_) => DEFAULT_PORT,
    };

    let clock: Arc<SystemClock> = Arc::new(SystemClock::new());
    let gateway = Gateway::new(clock);

    let addrs = [
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
        SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), port),
    ];

    tracing::info!(port, "starting svchub");
    HttpServer::new(gateway)
        .run(&addrs)
        .await
        .context("gateway server failed")?;

    Ok(())
}
