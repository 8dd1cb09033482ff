// src/main.rs

//! The main entry point for the Peridot server application.

use anyhow::Result;
use peridot::config::Config;
use peridot::server;
use std::env;
use tracing::error;

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().skip(1).collect();
    if args.contains(&"--version".to_string()) {
        println!("Peridot version {VERSION}");
        return Ok(());
    }

    let config = match Config::parse_args(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid invocation: {e}");
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the configured level.
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .compact()
        .with_ansi(true)
        .init();

    if let Err(e) = server::run(config).await {
        error!("server runtime error: {e}");
        return Err(e);
    }
    Ok(())
}
